pub mod activity;
pub mod build_info;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod error;
pub mod html;
pub mod registry;
pub mod runner;
pub mod service;
pub mod sweep;
pub mod web;

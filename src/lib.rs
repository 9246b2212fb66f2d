pub mod cm;

use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "composemaster", version, about = "idle-aware docker compose supervisor")]
pub struct Args {
    /// Path to master config TOML
    #[arg(short = 'c', long = "config", default_value = "config.toml")]
    pub config: PathBuf,
}

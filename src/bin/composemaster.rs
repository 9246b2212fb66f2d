use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("composemaster=info")),
        )
        .init();

    let args = composemaster::cm::cli::Args::parse();
    let cfg = composemaster::cm::config::load_master_config(&args.config)?;
    composemaster::cm::daemon::run_daemon_async(cfg).await
}

use anyhow::Context as _;
use std::sync::Arc;

use crate::cm::config::MasterConfig;
use crate::cm::runner::Runner;
use crate::cm::sweep;
use crate::cm::web::{self, WebState};

pub async fn run_daemon_async(cfg: MasterConfig) -> anyhow::Result<()> {
    let cfg = Arc::new(cfg);
    let runner = Runner::new(cfg.server.dry_run);

    tracing::info!("{}", crate::cm::build_info::banner());
    if cfg.server.dry_run {
        tracing::info!("dry_run enabled: docker compose commands will not take effect");
    }

    let sweeps = if cfg.server.disable_background_tasks {
        tracing::info!("background sweeps disabled by configuration");
        None
    } else {
        Some(sweep::start(Arc::clone(&cfg), runner.clone()))
    };

    if cfg.server.disable_interface {
        tracing::info!("web interface disabled; waiting for shutdown signal");
        tokio::signal::ctrl_c()
            .await
            .context("wait for shutdown signal")?;
    } else {
        let state = WebState { cfg: Arc::clone(&cfg), runner };
        let app = web::build_router(state);
        let addr = format!("{}:{}", cfg.server.bind, cfg.server.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        tracing::info!("listening on http://{addr}");
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await
            .context("serve web interface")?;
    }

    // Both sweep loops must be cancelled and waited out before exit so no
    // subprocess reader stays attached past teardown.
    if let Some(sweeps) = sweeps {
        tracing::info!("shutting down sweep loops");
        sweeps.shutdown().await;
    }
    Ok(())
}

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::cm::activity::{self, LastAccess, LastActivity};
use crate::cm::config::MasterConfig;
use crate::cm::error::Result;
use crate::cm::registry;
use crate::cm::runner::Runner;
use crate::cm::service::Service;

/// Handles to the two background sweep loops.
pub struct SweepTasks {
    remove_obsolete: JoinHandle<()>,
    stop_inactive: JoinHandle<()>,
}

/// Spawn both sweep loops. Each loop sleeps for its configured interval,
/// runs one pass, logs any failure, and repeats; a single failed pass never
/// stops future passes.
pub fn start(cfg: Arc<MasterConfig>, runner: Runner) -> SweepTasks {
    tracing::info!(
        "scheduling remove_obsolete sweep every {}s",
        cfg.remove_obsolete.check_interval_secs
    );
    tracing::info!(
        "scheduling stop_inactive sweep every {}s",
        cfg.stop_inactive.check_interval_secs
    );
    SweepTasks {
        remove_obsolete: tokio::spawn(remove_obsolete_loop(Arc::clone(&cfg), runner.clone())),
        stop_inactive: tokio::spawn(stop_inactive_loop(cfg, runner)),
    }
}

impl SweepTasks {
    /// Cancel both loops (interrupting any in-progress sleep) and wait them
    /// out. The cancellation itself never surfaces as an error.
    pub async fn shutdown(self) {
        self.remove_obsolete.abort();
        self.stop_inactive.abort();
        for handle in [self.remove_obsolete, self.stop_inactive] {
            match handle.await {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => {}
                Err(e) => tracing::warn!("sweep task ended abnormally: {e}"),
            }
        }
    }
}

async fn remove_obsolete_loop(cfg: Arc<MasterConfig>, runner: Runner) {
    let interval = Duration::from_secs(cfg.remove_obsolete.check_interval_secs);
    loop {
        tokio::time::sleep(interval).await;
        if let Err(e) = remove_obsolete_pass(&cfg, &runner).await {
            tracing::warn!("remove_obsolete sweep failed: {e}");
        }
    }
}

async fn stop_inactive_loop(cfg: Arc<MasterConfig>, runner: Runner) {
    let interval = Duration::from_secs(cfg.stop_inactive.check_interval_secs);
    loop {
        tokio::time::sleep(interval).await;
        if let Err(e) = stop_inactive_pass(&cfg, &runner).await {
            tracing::warn!("stop_inactive sweep failed: {e}");
        }
    }
}

/// Remove flagged, non-running services whose newest process exit is older
/// than the obsolete threshold. Irreversible; removed services disappear
/// from the next discovery snapshot, so a repeated pass is a no-op.
async fn remove_obsolete_pass(cfg: &MasterConfig, runner: &Runner) -> Result<()> {
    tracing::debug!("running remove_obsolete sweep");
    let services = registry::discover(runner, cfg).await?;
    let now = Utc::now();
    for service in &services {
        // Cheap gates first; unflagged or running services cost no inspect
        // calls.
        if service.is_running() || !service.flags.remove_obsolete {
            continue;
        }
        let last = activity::last_activity(service, runner).await?;
        if !should_remove(service, &last, now, cfg.remove_obsolete.obsolete_threshold_secs) {
            continue;
        }
        if let LastActivity::At(at) = last {
            tracing::info!(
                "removing {} (inactive for {}s)",
                service.name,
                now.signed_duration_since(at).num_seconds()
            );
        }
        service.remove(runner).await?;
    }
    Ok(())
}

/// Kill running services whose newest observed access is older than the
/// inactive threshold.
async fn stop_inactive_pass(cfg: &MasterConfig, runner: &Runner) -> Result<()> {
    tracing::debug!("running stop_inactive sweep");
    let services = registry::discover(runner, cfg).await?;
    let now = Utc::now();
    for service in &services {
        if !service.is_running() {
            continue;
        }
        let access = activity::last_access(service, runner).await?;
        if !should_kill(service, &access, now, cfg.stop_inactive.inactive_threshold_secs) {
            continue;
        }
        if let LastAccess::At { at, .. } = access {
            tracing::info!(
                "stopping {} (inactive for {}s)",
                service.name,
                now.signed_duration_since(at).num_seconds()
            );
        }
        service.kill(runner).await?;
    }
    Ok(())
}

/// Whether one remove_obsolete pass removes this service: flagged, not
/// running, and its newest process exit older than the threshold. `Running`
/// and `Unknown` activity never qualify.
fn should_remove(
    service: &Service,
    last: &LastActivity,
    now: DateTime<Utc>,
    threshold_secs: u64,
) -> bool {
    if service.is_running() || !service.flags.remove_obsolete {
        return false;
    }
    matches!(last, LastActivity::At(at) if exceeded(now, *at, threshold_secs))
}

/// Whether one stop_inactive pass kills this service: running, with a newest
/// observed access older than the threshold. `Never` does not qualify.
fn should_kill(
    service: &Service,
    access: &LastAccess,
    now: DateTime<Utc>,
    threshold_secs: u64,
) -> bool {
    if !service.is_running() {
        return false;
    }
    matches!(access, LastAccess::At { at, .. } if exceeded(now, *at, threshold_secs))
}

fn exceeded(now: DateTime<Utc>, at: DateTime<Utc>, threshold_secs: u64) -> bool {
    now.signed_duration_since(at).num_seconds() > threshold_secs as i64
}

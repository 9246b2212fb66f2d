use bytes::Bytes;
use std::collections::HashMap;

use crate::cm::config::MasterConfig;
use crate::cm::error::{Result, SupervisorError};
use crate::cm::registry::PsEntry;
use crate::cm::runner::{argv, OutputStream, Runner};

/// Grace period for `stop`: a short deadline favoring fast idling over a
/// clean shutdown of every container.
pub const DEFAULT_STOP_TIMEOUT_SECS: u32 = 5;

/// One running/exited container belonging to a service.
#[derive(Debug, Clone)]
pub struct ProcessInstance {
    pub id: String,
    pub labels: HashMap<String, String>,
    pub image: String,
    pub name: String,
    pub state: String,
    pub status: String,
    pub command: String,
    pub created_at: String,
    pub local_volumes: String,
    pub mounts: String,
    pub networks: String,
    pub ports: String,
    pub running_for: String,
    pub size: String,
}

impl ProcessInstance {
    pub fn from_ps(entry: PsEntry, labels: HashMap<String, String>) -> Self {
        Self {
            id: entry.id,
            labels,
            image: entry.image,
            name: entry.names,
            state: entry.state,
            status: entry.status,
            command: entry.command,
            created_at: entry.created_at,
            local_volumes: entry.local_volumes,
            mounts: entry.mounts,
            networks: entry.networks,
            ports: entry.ports,
            running_for: entry.running_for,
            size: entry.size,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == "running"
    }
}

/// Sweep opt-ins derived from instance labels at discovery time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceFlags {
    pub remove_obsolete: bool,
    pub stop_inactive: bool,
}

/// One externally-managed compose project: the declared group plus whatever
/// live instances the last discovery snapshot attached to it.
///
/// Services are rebuilt fresh on every discovery call and discarded after the
/// request or sweep iteration that created them.
#[derive(Debug, Clone)]
pub struct Service {
    pub name: String,
    /// Free-form status text from `docker compose ls`, e.g. "running(2)".
    pub status: String,
    pub config_files: Vec<String>,
    pub instances: Vec<ProcessInstance>,
    pub flags: ServiceFlags,
}

impl Service {
    pub fn new(
        name: String,
        status: String,
        config_files: Vec<String>,
        instances: Vec<ProcessInstance>,
        cfg: &MasterConfig,
    ) -> Self {
        let flags = ServiceFlags {
            remove_obsolete: label_set(&instances, &cfg.remove_obsolete.label),
            stop_inactive: label_set(&instances, &cfg.stop_inactive.label),
        };
        Self { name, status, config_files, instances, flags }
    }

    pub fn is_running(&self) -> bool {
        self.status.contains("running")
    }

    pub fn is_exited(&self) -> bool {
        self.status.contains("exited")
    }

    /// `-f file` pairs reconstructing the project's command-line invocation.
    pub fn config_args(&self) -> Vec<String> {
        self.config_files
            .iter()
            .flat_map(|f| ["-f".to_string(), f.clone()])
            .collect()
    }

    /// Resolve the externally reachable address by the first matching
    /// configured url rule.
    pub fn url(&self, cfg: &MasterConfig) -> Result<String> {
        for rule in &cfg.urls {
            if rule.pattern.is_match(&self.name) {
                return Ok(rule.pattern.replace(&self.name, rule.url.as_str()).into_owned());
            }
        }
        Err(SupervisorError::NoUrlMatch(self.name.clone()))
    }

    /// Human-readable per-instance state summaries for the index page.
    pub fn states(&self) -> Vec<String> {
        self.instances
            .iter()
            .map(|i| {
                let short: String = i.id.chars().take(12).collect();
                format!("{short} ({}): {}", i.name, i.state)
            })
            .collect()
    }

    /// Bring the full declared group up in background mode. Booting an
    /// already-running group is a no-op success (compose handles it).
    pub async fn boot(&self, runner: &Runner) -> Result<Vec<u8>> {
        let mut cmd = argv(["docker", "compose"]);
        cmd.extend(self.config_args());
        cmd.extend(argv(["up", "-d"]));
        runner.run(&cmd).await
    }

    /// Resume a previously stopped group by project identity alone; the
    /// compose objects persist, so no config files are needed.
    pub async fn start(&self, runner: &Runner) -> Result<Vec<u8>> {
        runner
            .run(&argv(["docker", "compose", "-p", self.name.as_str(), "start"]))
            .await
    }

    /// Gracefully stop the group with a bounded grace period.
    pub async fn stop(&self, runner: &Runner, timeout_secs: u32) -> Result<Vec<u8>> {
        runner.run(&self.stop_argv(timeout_secs)).await
    }

    /// Streaming variant of `stop`, for pages that interleave its output
    /// with a concurrent log follow.
    pub fn stop_streaming(&self, runner: &Runner, timeout_secs: u32) -> Result<OutputStream> {
        runner.run_streaming(&self.stop_argv(timeout_secs))
    }

    fn stop_argv(&self, timeout_secs: u32) -> Vec<String> {
        let timeout = timeout_secs.to_string();
        argv([
            "docker",
            "compose",
            "-p",
            self.name.as_str(),
            "stop",
            "-t",
            timeout.as_str(),
        ])
    }

    /// Immediately terminate the group, no grace period.
    pub async fn kill(&self, runner: &Runner) -> Result<Vec<u8>> {
        runner
            .run(&argv(["docker", "compose", "-p", self.name.as_str(), "kill"]))
            .await
    }

    /// Stop and fully delete the group's containers, locally-built images
    /// and volumes. Irreversible: the next boot rebuilds from scratch.
    pub async fn remove(&self, runner: &Runner) -> Result<()> {
        let mut cmd = argv(["docker", "compose"]);
        cmd.extend(self.config_args());
        cmd.extend(argv(["down", "--rmi", "local", "--volumes"]));
        runner.run(&cmd).await?;
        Ok(())
    }

    /// Open a fresh live log follow with the given break conditions.
    ///
    /// `tail` seeds only the most recent N lines of prior output into the
    /// backlog before live-following begins.
    pub fn logs(
        &self,
        runner: &Runner,
        break_on: Vec<(String, bool)>,
        tail: Option<u32>,
    ) -> Result<LogTail> {
        let mut cmd = argv(["docker", "compose", "-p", self.name.as_str(), "logs"]);
        if let Some(n) = tail {
            cmd.extend(argv(["--tail", n.to_string().as_str()]));
        }
        cmd.push("-f".to_string());
        Ok(LogTail::new(runner.run_streaming(&cmd)?, break_on))
    }
}

fn label_set(instances: &[ProcessInstance], label: &str) -> bool {
    instances
        .iter()
        .any(|i| i.labels.get(label).is_some_and(|v| v != "false"))
}

enum TailState {
    Streaming,
    EndClean,
    EndFatal(String),
}

/// Scans a live output stream against ordered substring break conditions.
///
/// Every received chunk is appended to a cumulative backlog (matches may span
/// chunk boundaries), then each `(substring, fatal)` pair is tested in order
/// against the whole backlog. The matching chunk is still emitted; the next
/// pull ends the sequence cleanly (non-fatal match) or with `StreamBreak`
/// (fatal match), after terminating the followed process exactly once. EOF
/// with a non-zero exit code surfaces as `ProcessExit(code)`.
pub struct LogTail {
    stream: OutputStream,
    break_on: Vec<(String, bool)>,
    backlog: String,
    state: TailState,
}

impl LogTail {
    pub fn new(stream: OutputStream, break_on: Vec<(String, bool)>) -> Self {
        Self {
            stream,
            break_on,
            backlog: String::new(),
            state: TailState::Streaming,
        }
    }

    /// Pull the next chunk. `Ok(None)` ends the sequence.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        match &self.state {
            TailState::Streaming => {}
            TailState::EndClean => return Ok(None),
            TailState::EndFatal(pattern) => {
                let pattern = pattern.clone();
                self.state = TailState::EndClean;
                return Err(SupervisorError::StreamBreak(pattern));
            }
        }

        match self.stream.next_chunk().await {
            Some(chunk) => {
                self.backlog.push_str(&String::from_utf8_lossy(&chunk));
                for (pattern, fatal) in &self.break_on {
                    if self.backlog.contains(pattern.as_str()) {
                        self.state = if *fatal {
                            TailState::EndFatal(pattern.clone())
                        } else {
                            TailState::EndClean
                        };
                        self.stream.terminate().await;
                        break;
                    }
                }
                Ok(Some(chunk))
            }
            None => {
                self.state = TailState::EndClean;
                let code = self.stream.wait_code().await?;
                if code != 0 {
                    return Err(SupervisorError::ProcessExit(code));
                }
                Ok(None)
            }
        }
    }
}

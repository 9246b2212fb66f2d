use bytes::Bytes;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use crate::cm::error::Result;

/// How much live output to pull per read. Small enough to keep break-condition
/// latency low while a service is still chatty during startup.
const CHUNK_SIZE: usize = 256;

/// Build an owned argv from string literals.
pub fn argv<I, S>(parts: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    parts.into_iter().map(Into::into).collect()
}

/// Executes external commands, capturing or streaming their combined output.
///
/// In dry-run mode every `docker compose` invocation is rewritten to its
/// `--dry-run` equivalent and logged; other commands run untouched.
#[derive(Debug, Clone)]
pub struct Runner {
    dry_run: bool,
}

impl Runner {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    pub(crate) fn effective_argv(&self, argv: &[String]) -> Vec<String> {
        if self.dry_run && argv.len() >= 2 && argv[0] == "docker" && argv[1] == "compose" {
            let mut out = argv[..2].to_vec();
            out.push("--dry-run".to_string());
            out.extend_from_slice(&argv[2..]);
            tracing::info!("dry_run: {}", out.join(" "));
            return out;
        }
        argv.to_vec()
    }

    /// Run a command to completion and capture combined stdout+stderr.
    pub async fn run(&self, argv: &[String]) -> Result<Vec<u8>> {
        let argv = self.effective_argv(argv);
        let out = Command::new(&argv[0])
            .args(&argv[1..])
            .stdin(Stdio::null())
            .output()
            .await?;
        let mut combined = out.stdout;
        combined.extend_from_slice(&out.stderr);
        Ok(combined)
    }

    /// Spawn a command and expose its combined output as a live chunk stream.
    ///
    /// The child is killed on drop, so an abandoned stream never leaves an
    /// unattended process behind.
    pub fn run_streaming(&self, argv: &[String]) -> Result<OutputStream> {
        let argv = self.effective_argv(argv);
        let mut child = Command::new(&argv[0])
            .args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let (tx, rx) = mpsc::channel(8);
        if let Some(stdout) = child.stdout.take() {
            spawn_pump(stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_pump(stderr, tx);
        }

        Ok(OutputStream { child, rx, terminated: false })
    }
}

fn spawn_pump<R>(mut src: R, tx: mpsc::Sender<Bytes>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = [0u8; CHUNK_SIZE];
        loop {
            match src.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if tx.send(Bytes::copy_from_slice(&buf[..n])).await.is_err() {
                        break;
                    }
                }
            }
        }
    });
}

/// Live combined output of one spawned command.
///
/// Ends when both pipes reach EOF; `wait_code` then reports the exit code.
pub struct OutputStream {
    child: Child,
    rx: mpsc::Receiver<Bytes>,
    terminated: bool,
}

impl OutputStream {
    /// Next chunk of combined output, or `None` once both pipes are closed.
    pub async fn next_chunk(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Deliver SIGTERM once and reap the child. Subsequent calls are no-ops.
    pub async fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        if let Some(pid) = self.child.id() {
            let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
        }
        let _ = self.child.wait().await;
    }

    /// Wait for the child to exit. Exits without a code (killed by signal)
    /// are reported as -1.
    pub async fn wait_code(&mut self) -> Result<i32> {
        let status = self.child.wait().await?;
        Ok(status.code().unwrap_or(-1))
    }
}

#[cfg(test)]
mod tests;

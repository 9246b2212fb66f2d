use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

use crate::cm::error::Result;
use crate::cm::runner::{argv, Runner};
use crate::cm::service::Service;

/// HTTP access lines as emitted by the typical wsgi-style service log:
/// `svc-1  | 2025-01-02 10:11:12,345 17 INFO db werkzeug: "GET /web HTTP/1.1" ...`
static ACCESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#".*\| (?P<timestamp>[\d-]+ [\d:-]+)(?:,\d+)? \d+ .+ "(GET|POST|PUT|DELETE) (?P<url>\S+) HTTP.*"#,
    )
    .expect("access pattern")
});

/// Startup/ready lines, e.g. `... HTTP service (werkzeug) running on 0.0.0.0:8069`.
/// Counts as activity so a freshly booted service is not stopped before its
/// first request.
static READY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r".*\| (?P<timestamp>[\d-]+ [\d:-]+)(?:,\d+)? \d+ .+ running on (?P<url>\S+).*")
        .expect("ready pattern")
});

/// Most recent external access of a service, inferred from its logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LastAccess {
    /// No access or ready line anywhere in the log history.
    Never,
    At { at: DateTime<Utc>, url: String },
}

/// Most recent process exit across a service's instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LastActivity {
    /// At least one instance is running; exit times are irrelevant.
    Running,
    At(DateTime<Utc>),
    /// No instances, or none with a parseable finish time.
    Unknown,
}

/// Replay the service's full log history and return the newest access or
/// ready line, scanning from the most recent line backward.
pub async fn last_access(service: &Service, runner: &Runner) -> Result<LastAccess> {
    let mut cmd = argv(["docker", "compose"]);
    cmd.extend(service.config_args());
    cmd.push("logs".to_string());
    let out = runner.run(&cmd).await?;
    Ok(scan_last_access(&String::from_utf8_lossy(&out)))
}

pub fn scan_last_access(text: &str) -> LastAccess {
    for line in text.lines().rev() {
        for re in [&*ACCESS_RE, &*READY_RE] {
            if let Some(caps) = re.captures(line) {
                if let Some(at) = parse_log_timestamp(&caps["timestamp"]) {
                    return LastAccess::At { at, url: caps["url"].to_string() };
                }
            }
        }
    }
    LastAccess::Never
}

/// Newest `{{.State.FinishedAt}}` across non-running instances, or `Running`
/// the moment any instance is running.
pub async fn last_activity(service: &Service, runner: &Runner) -> Result<LastActivity> {
    // "running" wins outright regardless of instance order, so look for it
    // before spending any inspect calls.
    if service.instances.iter().any(|i| i.is_running()) {
        return Ok(LastActivity::Running);
    }

    let mut newest: Option<DateTime<Utc>> = None;
    for instance in &service.instances {
        let out = runner
            .run(&argv([
                "docker",
                "inspect",
                "-f",
                "{{.State.FinishedAt}}",
                instance.id.as_str(),
            ]))
            .await?;
        if let Some(at) = parse_finished_at(&String::from_utf8_lossy(&out)) {
            newest = Some(newest.map_or(at, |n| n.max(at)));
        }
    }

    Ok(match newest {
        Some(at) => LastActivity::At(at),
        None => LastActivity::Unknown,
    })
}

/// Log timestamps carry no zone; assume UTC.
fn parse_log_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

pub fn parse_finished_at(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests;

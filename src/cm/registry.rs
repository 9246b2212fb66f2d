use serde::Deserialize;
use std::collections::HashMap;

use crate::cm::config::MasterConfig;
use crate::cm::error::{Result, SupervisorError};
use crate::cm::runner::{argv, Runner};
use crate::cm::service::{ProcessInstance, Service};

/// The label docker compose stamps on every container of a project.
/// Instances without it do not belong to any service and are dropped.
pub const COMPOSE_PROJECT_LABEL: &str = "com.docker.compose.project";

/// One line of `docker compose ls --all --format json`.
#[derive(Debug, Clone, Deserialize)]
pub struct ComposeListing {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "ConfigFiles")]
    pub config_files: String,
}

/// One line of `docker ps --all --no-trunc --format json` (NDJSON).
#[derive(Debug, Clone, Deserialize)]
pub struct PsEntry {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Labels")]
    pub labels: String,
    #[serde(rename = "State")]
    pub state: String,
    #[serde(rename = "Image", default)]
    pub image: String,
    #[serde(rename = "Names", default)]
    pub names: String,
    #[serde(rename = "Status", default)]
    pub status: String,
    #[serde(rename = "Command", default)]
    pub command: String,
    #[serde(rename = "CreatedAt", default)]
    pub created_at: String,
    #[serde(rename = "LocalVolumes", default)]
    pub local_volumes: String,
    #[serde(rename = "Mounts", default)]
    pub mounts: String,
    #[serde(rename = "Networks", default)]
    pub networks: String,
    #[serde(rename = "Ports", default)]
    pub ports: String,
    #[serde(rename = "RunningFor", default)]
    pub running_for: String,
    #[serde(rename = "Size", default)]
    pub size: String,
}

/// Split docker's flat `key=value,key=value` label string into a map.
/// A label without `=` maps to the empty value.
pub fn parse_labels(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter(|kv| !kv.is_empty())
        .map(|kv| match kv.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (kv.to_string(), String::new()),
        })
        .collect()
}

/// Fetch both docker listings concurrently and merge them into services.
///
/// Each call is a fresh snapshot; nothing is cached between calls since the
/// external state may have changed arbitrarily in between.
pub async fn discover(runner: &Runner, cfg: &MasterConfig) -> Result<Vec<Service>> {
    let ls_argv = argv(["docker", "compose", "ls", "--all", "--format", "json"]);
    let ps_argv = argv(["docker", "ps", "--all", "--no-trunc", "--format", "json"]);
    let (ls_out, ps_out) = tokio::try_join!(runner.run(&ls_argv), runner.run(&ps_argv))?;

    let listings: Vec<ComposeListing> = serde_json::from_slice(&ls_out)
        .map_err(|e| SupervisorError::Discovery(format!("docker compose ls: {e}")))?;
    let entries = parse_ps_lines(&String::from_utf8_lossy(&ps_out))?;

    Ok(merge_listings(listings, entries, cfg))
}

/// Look a service up by name in a fresh discovery snapshot.
pub async fn get_by_name(runner: &Runner, cfg: &MasterConfig, name: &str) -> Result<Service> {
    let services = discover(runner, cfg).await?;
    services
        .into_iter()
        .find(|s| s.name == name)
        .ok_or_else(|| SupervisorError::UnknownService(name.to_string()))
}

/// Parse `docker ps` NDJSON output, one container object per line.
pub fn parse_ps_lines(raw: &str) -> Result<Vec<PsEntry>> {
    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            serde_json::from_str(line)
                .map_err(|e| SupervisorError::Discovery(format!("docker ps: {e}")))
        })
        .collect()
}

/// Merge live instances into the declared project listing by project label.
/// Result order follows the compose listing.
pub fn merge_listings(
    listings: Vec<ComposeListing>,
    entries: Vec<PsEntry>,
    cfg: &MasterConfig,
) -> Vec<Service> {
    let mut by_project: HashMap<String, Vec<ProcessInstance>> = HashMap::new();
    for entry in entries {
        let labels = parse_labels(&entry.labels);
        let Some(project) = labels.get(COMPOSE_PROJECT_LABEL).cloned() else {
            continue;
        };
        by_project
            .entry(project)
            .or_default()
            .push(ProcessInstance::from_ps(entry, labels));
    }

    listings
        .into_iter()
        .map(|line| {
            let instances = by_project.remove(&line.name).unwrap_or_default();
            let config_files = line
                .config_files
                .split(',')
                .filter(|f| !f.is_empty())
                .map(str::to_string)
                .collect();
            Service::new(line.name, line.status, config_files, instances, cfg)
        })
        .collect()
}

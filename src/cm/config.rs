use anyhow::Context as _;
use regex::Regex;
use serde::Deserialize;
use std::path::Path;

/// Runtime configuration, built once at startup from the TOML file and
/// passed explicitly to everything that needs it.
#[derive(Debug, Clone)]
pub struct MasterConfig {
    /// Ordered url rules; the first pattern matching a service name wins.
    pub urls: Vec<UrlRule>,
    pub remove_obsolete: RemoveObsoleteConfig,
    pub stop_inactive: StopInactiveConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone)]
pub struct UrlRule {
    pub pattern: Regex,
    /// Replacement template; capture groups are available as `$1`, `$2`, ...
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct RemoveObsoleteConfig {
    /// Container label that opts a service into the remove-obsolete sweep.
    pub label: String,
    pub check_interval_secs: u64,
    pub obsolete_threshold_secs: u64,
}

#[derive(Debug, Clone)]
pub struct StopInactiveConfig {
    /// Container label surfaced as the `stop_inactive` service flag.
    pub label: String,
    pub check_interval_secs: u64,
    pub inactive_threshold_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Rewrite `docker compose` invocations to their `--dry-run` equivalents.
    pub dry_run: bool,
    pub disable_background_tasks: bool,
    pub disable_interface: bool,
}

// -------- TOML file schema (strict) --------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct MasterConfigFile {
    #[serde(default)]
    urls: Vec<UrlRuleFile>,
    #[serde(default)]
    remove_obsolete: Option<RemoveObsoleteFile>,
    #[serde(default)]
    stop_inactive: Option<StopInactiveFile>,
    #[serde(default)]
    server: Option<ServerConfigFile>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct UrlRuleFile {
    pattern: String,
    url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RemoveObsoleteFile {
    #[serde(default = "default_remove_obsolete_label")]
    label: String,
    #[serde(default = "default_remove_obsolete_interval")]
    check_interval: u64,
    #[serde(default = "default_obsolete_threshold")]
    obsolete_threshold: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct StopInactiveFile {
    #[serde(default = "default_stop_inactive_label")]
    label: String,
    #[serde(default = "default_stop_inactive_interval")]
    check_interval: u64,
    #[serde(default = "default_inactive_threshold")]
    inactive_threshold: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ServerConfigFile {
    #[serde(default = "default_bind")]
    bind: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default)]
    dry_run: bool,
    #[serde(default)]
    disable_background_tasks: bool,
    #[serde(default)]
    disable_interface: bool,
}

fn default_remove_obsolete_label() -> String {
    "composemaster.remove_obsolete".to_string()
}
fn default_stop_inactive_label() -> String {
    "composemaster.stop_inactive".to_string()
}
fn default_remove_obsolete_interval() -> u64 {
    3600
}
fn default_obsolete_threshold() -> u64 {
    // One week without a process exit before a flagged service is removed.
    7 * 24 * 3600
}
fn default_stop_inactive_interval() -> u64 {
    600
}
fn default_inactive_threshold() -> u64 {
    3600
}
fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    1212
}

pub fn load_master_config(config_path: &Path) -> anyhow::Result<MasterConfig> {
    let raw = std::fs::read_to_string(config_path)
        .map_err(|e| anyhow::anyhow!("failed to read config {}: {e}", config_path.display()))?;
    let file_cfg: MasterConfigFile = toml::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("failed to parse config {}: {e}", config_path.display()))?;

    let mut urls = Vec::with_capacity(file_cfg.urls.len());
    for rule in file_cfg.urls {
        let pattern = Regex::new(&rule.pattern)
            .with_context(|| format!("invalid url pattern {:?}", rule.pattern))?;
        anyhow::ensure!(
            !rule.url.trim().is_empty(),
            "url template for pattern {:?} must not be empty",
            rule.pattern
        );
        urls.push(UrlRule { pattern, url: rule.url });
    }

    let remove_obsolete = match file_cfg.remove_obsolete {
        Some(ro) => RemoveObsoleteConfig {
            label: ro.label,
            check_interval_secs: ro.check_interval,
            obsolete_threshold_secs: ro.obsolete_threshold,
        },
        None => RemoveObsoleteConfig {
            label: default_remove_obsolete_label(),
            check_interval_secs: default_remove_obsolete_interval(),
            obsolete_threshold_secs: default_obsolete_threshold(),
        },
    };

    let stop_inactive = match file_cfg.stop_inactive {
        Some(si) => StopInactiveConfig {
            label: si.label,
            check_interval_secs: si.check_interval,
            inactive_threshold_secs: si.inactive_threshold,
        },
        None => StopInactiveConfig {
            label: default_stop_inactive_label(),
            check_interval_secs: default_stop_inactive_interval(),
            inactive_threshold_secs: default_inactive_threshold(),
        },
    };

    let server = match file_cfg.server {
        Some(s) => ServerConfig {
            bind: s.bind,
            port: s.port,
            dry_run: s.dry_run,
            disable_background_tasks: s.disable_background_tasks,
            disable_interface: s.disable_interface,
        },
        None => ServerConfig {
            bind: default_bind(),
            port: default_port(),
            dry_run: false,
            disable_background_tasks: false,
            disable_interface: false,
        },
    };

    anyhow::ensure!(
        remove_obsolete.check_interval_secs > 0,
        "remove_obsolete.check_interval must be > 0"
    );
    anyhow::ensure!(
        stop_inactive.check_interval_secs > 0,
        "stop_inactive.check_interval must be > 0"
    );
    anyhow::ensure!(
        !remove_obsolete.label.trim().is_empty(),
        "remove_obsolete.label must not be empty"
    );
    anyhow::ensure!(
        !stop_inactive.label.trim().is_empty(),
        "stop_inactive.label must not be empty"
    );

    Ok(MasterConfig { urls, remove_obsolete, stop_inactive, server })
}

/// Minimal in-memory config for unit tests elsewhere in the crate.
#[cfg(test)]
pub(crate) fn test_config(urls: &[(&str, &str)]) -> MasterConfig {
    MasterConfig {
        urls: urls
            .iter()
            .map(|(pattern, url)| UrlRule {
                pattern: Regex::new(pattern).unwrap(),
                url: url.to_string(),
            })
            .collect(),
        remove_obsolete: RemoveObsoleteConfig {
            label: default_remove_obsolete_label(),
            check_interval_secs: default_remove_obsolete_interval(),
            obsolete_threshold_secs: default_obsolete_threshold(),
        },
        stop_inactive: StopInactiveConfig {
            label: default_stop_inactive_label(),
            check_interval_secs: default_stop_inactive_interval(),
            inactive_threshold_secs: default_inactive_threshold(),
        },
        server: ServerConfig {
            bind: default_bind(),
            port: default_port(),
            dry_run: false,
            disable_background_tasks: true,
            disable_interface: true,
        },
    }
}

#[cfg(test)]
mod tests;

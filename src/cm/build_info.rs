use chrono::{DateTime, Utc};

pub fn build_host() -> &'static str {
    option_env!("COMPOSEMASTER_BUILD_HOST").unwrap_or("unknown")
}

pub fn build_time() -> String {
    format_build_epoch(option_env!("COMPOSEMASTER_BUILD_EPOCH").unwrap_or(""))
}

/// Epoch seconds, rendered in UTC. Anything unparseable becomes "unknown".
pub fn format_build_epoch(raw: &str) -> String {
    raw.trim()
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub fn banner() -> String {
    format!(
        "Compose master (built on {} at {}).",
        build_host(),
        build_time()
    )
}

use std::env;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn hostname() -> Option<String> {
    let out = Command::new("hostname").output().ok()?;
    if !out.status.success() {
        return None;
    }
    let s = String::from_utf8_lossy(&out.stdout).trim().to_string();
    (!s.is_empty()).then_some(s)
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // SOURCE_DATE_EPOCH wins, for reproducible builds.
    let build_epoch = env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs()
        });

    let build_host = env::var("HOSTNAME")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(hostname)
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=COMPOSEMASTER_BUILD_EPOCH={build_epoch}");
    println!("cargo:rustc-env=COMPOSEMASTER_BUILD_HOST={build_host}");
}

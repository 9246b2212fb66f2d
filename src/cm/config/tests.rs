use super::*;
use std::io::Write as _;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    f.flush().unwrap();
    f
}

#[test]
fn empty_file_yields_defaults() {
    let f = write_config("");
    let cfg = load_master_config(f.path()).unwrap();

    assert!(cfg.urls.is_empty());
    assert_eq!(cfg.server.bind, "0.0.0.0");
    assert_eq!(cfg.server.port, 1212);
    assert!(!cfg.server.dry_run);
    assert!(!cfg.server.disable_background_tasks);
    assert!(!cfg.server.disable_interface);
    assert_eq!(cfg.remove_obsolete.label, "composemaster.remove_obsolete");
    assert_eq!(cfg.remove_obsolete.check_interval_secs, 3600);
    assert_eq!(cfg.stop_inactive.label, "composemaster.stop_inactive");
    assert_eq!(cfg.stop_inactive.check_interval_secs, 600);
    assert_eq!(cfg.stop_inactive.inactive_threshold_secs, 3600);
}

#[test]
fn full_config_overrides_defaults() {
    let f = write_config(
        r#"
[[urls]]
pattern = "^demo-(.*)$"
url = "https://$1.example.com"

[[urls]]
pattern = ".*"
url = "http://fallback.localhost"

[remove_obsolete]
label = "acme.remove"
check_interval = 60
obsolete_threshold = 120

[stop_inactive]
label = "acme.stop"
check_interval = 30
inactive_threshold = 90

[server]
bind = "127.0.0.1"
port = 8080
dry_run = true
disable_background_tasks = true
disable_interface = true
"#,
    );
    let cfg = load_master_config(f.path()).unwrap();

    assert_eq!(cfg.urls.len(), 2);
    // Declared order is preserved: first match wins at resolution time.
    assert_eq!(cfg.urls[0].url, "https://$1.example.com");
    assert_eq!(cfg.urls[1].url, "http://fallback.localhost");
    assert_eq!(cfg.remove_obsolete.label, "acme.remove");
    assert_eq!(cfg.remove_obsolete.check_interval_secs, 60);
    assert_eq!(cfg.remove_obsolete.obsolete_threshold_secs, 120);
    assert_eq!(cfg.stop_inactive.inactive_threshold_secs, 90);
    assert_eq!(cfg.server.bind, "127.0.0.1");
    assert_eq!(cfg.server.port, 8080);
    assert!(cfg.server.dry_run);
    assert!(cfg.server.disable_background_tasks);
    assert!(cfg.server.disable_interface);
}

#[test]
fn invalid_url_pattern_is_fatal() {
    let f = write_config("[[urls]]\npattern = \"(\"\nurl = \"http://x\"\n");
    let err = load_master_config(f.path()).unwrap_err();
    assert!(err.to_string().contains("invalid url pattern"));
}

#[test]
fn empty_url_template_is_fatal() {
    let f = write_config("[[urls]]\npattern = \".*\"\nurl = \" \"\n");
    assert!(load_master_config(f.path()).is_err());
}

#[test]
fn unknown_keys_are_rejected() {
    let f = write_config("[server]\nprot = 8080\n");
    assert!(load_master_config(f.path()).is_err());
}

#[test]
fn zero_check_interval_is_fatal() {
    let f = write_config("[stop_inactive]\ncheck_interval = 0\n");
    let err = load_master_config(f.path()).unwrap_err();
    assert!(err.to_string().contains("check_interval"));
}

#[test]
fn missing_file_is_fatal() {
    let err = load_master_config(std::path::Path::new("/nonexistent/config.toml")).unwrap_err();
    assert!(err.to_string().contains("failed to read config"));
}

use super::*;
use crate::cm::config;
use crate::cm::service::{ProcessInstance, Service};
use chrono::TimeZone as _;

fn instance(id: &str, state: &str) -> ProcessInstance {
    ProcessInstance {
        id: id.to_string(),
        labels: Default::default(),
        image: "img".to_string(),
        name: format!("{id}-1"),
        state: state.to_string(),
        status: String::new(),
        command: String::new(),
        created_at: String::new(),
        local_volumes: String::new(),
        mounts: String::new(),
        networks: String::new(),
        ports: String::new(),
        running_for: String::new(),
        size: String::new(),
    }
}

fn service(instances: Vec<ProcessInstance>) -> Service {
    let cfg = config::test_config(&[]);
    Service::new(
        "app".to_string(),
        "exited(1)".to_string(),
        Vec::new(),
        instances,
        &cfg,
    )
}

fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
}

#[test]
fn newest_access_line_wins_scanning_backward() {
    let text = concat!(
        "web-1  | 2025-03-01 10:00:00,123 42 INFO db werkzeug: \"GET /old HTTP/1.1\" 200\n",
        "web-1  | some unrelated noise\n",
        "web-1  | 2025-03-01 11:30:00,456 42 INFO db werkzeug: \"POST /new HTTP/1.1\" 200\n",
    );
    let access = scan_last_access(text);
    assert_eq!(
        access,
        LastAccess::At { at: utc(2025, 3, 1, 11, 30, 0), url: "/new".to_string() }
    );
}

#[test]
fn ready_line_counts_as_access() {
    let text =
        "web-1  | 2025-03-01 09:00:00,001 7 INFO ? server: HTTP service running on 0.0.0.0:8069\n";
    let access = scan_last_access(text);
    assert_eq!(
        access,
        LastAccess::At { at: utc(2025, 3, 1, 9, 0, 0), url: "0.0.0.0:8069".to_string() }
    );
}

#[test]
fn no_matching_line_means_never() {
    assert_eq!(scan_last_access("web-1  | starting up\nweb-1  | warming cache\n"), LastAccess::Never);
    assert_eq!(scan_last_access(""), LastAccess::Never);
}

#[test]
fn finished_at_parses_rfc3339() {
    let at = parse_finished_at("2025-03-01T12:00:00.123456789Z\n").unwrap();
    assert_eq!(at.timestamp(), utc(2025, 3, 1, 12, 0, 0).timestamp());
    assert!(parse_finished_at("garbage").is_none());
}

#[tokio::test]
async fn running_instance_short_circuits_last_activity() {
    // A running instance wins regardless of its position, before any
    // inspect call is attempted (no docker needed here).
    let runner = Runner::new(false);
    let svc = service(vec![instance("c1", "exited"), instance("c2", "running")]);
    assert_eq!(last_activity(&svc, &runner).await.unwrap(), LastActivity::Running);

    let svc = service(vec![instance("c2", "running"), instance("c1", "exited")]);
    assert_eq!(last_activity(&svc, &runner).await.unwrap(), LastActivity::Running);
}

#[tokio::test]
async fn no_instances_means_unknown_activity() {
    let runner = Runner::new(false);
    let svc = service(Vec::new());
    assert_eq!(last_activity(&svc, &runner).await.unwrap(), LastActivity::Unknown);
}

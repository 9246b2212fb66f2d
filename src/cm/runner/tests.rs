use super::*;
use std::time::Duration;
use tokio::time::timeout;

#[tokio::test]
async fn run_captures_combined_output() {
    let runner = Runner::new(false);
    let out = runner
        .run(&argv(["sh", "-c", "echo to-stdout; echo to-stderr 1>&2"]))
        .await
        .unwrap();
    let text = String::from_utf8_lossy(&out);
    assert!(text.contains("to-stdout"));
    assert!(text.contains("to-stderr"));
}

#[tokio::test]
async fn run_streaming_yields_chunks_and_exit_code() {
    let runner = Runner::new(false);
    let mut stream = runner
        .run_streaming(&argv(["sh", "-c", "echo one; echo two 1>&2; exit 3"]))
        .unwrap();

    let mut text = String::new();
    while let Some(chunk) = stream.next_chunk().await {
        text.push_str(&String::from_utf8_lossy(&chunk));
    }
    assert!(text.contains("one"));
    assert!(text.contains("two"));
    assert_eq!(stream.wait_code().await.unwrap(), 3);
}

#[tokio::test]
async fn terminate_ends_a_long_running_child() {
    let runner = Runner::new(false);
    let mut stream = runner.run_streaming(&argv(["sh", "-c", "sleep 30"])).unwrap();

    timeout(Duration::from_secs(5), stream.terminate())
        .await
        .expect("terminate must not wait the child out");
    // Pipes close once the child is gone.
    timeout(Duration::from_secs(5), async {
        while stream.next_chunk().await.is_some() {}
    })
    .await
    .unwrap();
}

#[test]
fn dry_run_rewrites_compose_invocations() {
    let runner = Runner::new(true);
    let rewritten = runner.effective_argv(&argv(["docker", "compose", "-p", "app", "kill"]));
    assert_eq!(rewritten, argv(["docker", "compose", "--dry-run", "-p", "app", "kill"]));
}

#[test]
fn dry_run_leaves_other_commands_alone() {
    let runner = Runner::new(true);
    let argv_in = argv(["docker", "inspect", "-f", "{{.State.FinishedAt}}", "abc"]);
    assert_eq!(runner.effective_argv(&argv_in), argv_in);

    let runner = Runner::new(false);
    let argv_in = argv(["docker", "compose", "ls"]);
    assert_eq!(runner.effective_argv(&argv_in), argv_in);
}

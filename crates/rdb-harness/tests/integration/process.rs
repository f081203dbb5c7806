//! Stream case with real child processes. `sh` stands in for the interpreter.

use rdb_harness::config::{ClusterSection, ProbeMode};
use rdb_harness::{
    HarnessError, ProcessCluster, ProcessRunner, SiblingResolver, StaticCluster, StreamTestCase,
};

fn companion(dir: &tempfile::TempDir, body: &str) {
    std::fs::write(dir.path().join("stream.rb"), body).unwrap();
}

#[tokio::test]
async fn test_port_reaches_script_environment() {
    let dir = tempfile::tempdir().unwrap();
    companion(&dir, "test \"$RDB_DRIVER_PORT\" = 28015 || exit 7\n");

    let case = StreamTestCase::new(
        StaticCluster::new("localhost", vec![28015, 28016]),
        ProcessRunner::new(true),
        SiblingResolver::new(dir.path()),
    )
    .interpreter_override(Some("sh".into()));

    let report = case.run().await.unwrap();
    assert_eq!(report.outcome.code, Some(0));
    assert!(report.invocation.script.is_absolute());
}

#[tokio::test]
async fn test_script_failure_surfaces_code_and_output() {
    let dir = tempfile::tempdir().unwrap();
    companion(&dir, "echo 'changefeed closed early' >&2\nexit 1\n");

    let case = StreamTestCase::new(
        StaticCluster::new("localhost", vec![28015, 28016]),
        ProcessRunner::new(true),
        SiblingResolver::new(dir.path()),
    )
    .interpreter_override(Some("sh".into()));

    match case.run().await {
        Err(HarnessError::ScriptFailed { code, stderr, .. }) => {
            assert_eq!(code, Some(1));
            assert_eq!(stderr, "changefeed closed early\n");
        }
        other => panic!("expected ScriptFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_companion_script() {
    let dir = tempfile::tempdir().unwrap();
    let case = StreamTestCase::new(
        StaticCluster::new("localhost", vec![28015, 28016]),
        ProcessRunner::new(true),
        SiblingResolver::new(dir.path()),
    );
    assert!(matches!(
        case.run().await,
        Err(HarnessError::ScriptNotFound(_))
    ));
}

#[tokio::test]
async fn test_missing_interpreter() {
    let dir = tempfile::tempdir().unwrap();
    companion(&dir, "exit 0\n");
    let case = StreamTestCase::new(
        StaticCluster::new("localhost", vec![28015, 28016]),
        ProcessRunner::new(true),
        SiblingResolver::new(dir.path()),
    )
    .interpreter_override(Some("/nonexistent/ruby".into()));

    assert!(matches!(
        case.run().await,
        Err(HarnessError::Spawn { .. })
    ));
}

/// Spawned "servers" are placeholders (`sleep`); the script echoes the port it got.
#[tokio::test]
async fn test_process_cluster_first_port_exported() {
    let dir = tempfile::tempdir().unwrap();
    companion(&dir, "echo \"$RDB_DRIVER_PORT\"\n");

    let fixture = ProcessCluster::new(ClusterSection {
        server_binary: "sleep".into(),
        server_args: vec!["30".into()],
        join_args: vec![],
        probe: ProbeMode::None,
        ..ClusterSection::default()
    });
    let case = StreamTestCase::new(fixture, ProcessRunner::new(true), SiblingResolver::new(dir.path()))
        .interpreter_override(Some("sh".into()));

    let report = case.run().await.unwrap();
    assert_eq!(report.server.name, "server_0");
    assert_eq!(
        report.outcome.stdout.trim(),
        report.server.driver_port.to_string()
    );
}

//! The stream test against a real two-server cluster.
//!
//! Skips unless RDB_SERVER_BINARY points at a server binary. The companion
//! script `stream.rb` lives next to this file; INTERPRETER_PATH overrides `ruby`.

use rdb_harness::config::{ClusterSection, HarnessConfig};
use rdb_harness::{HarnessError, ProcessCluster, ProcessRunner, SiblingResolver, StreamTestCase};

#[tokio::test]
async fn test_stream() {
    let Ok(server_binary) = std::env::var("RDB_SERVER_BINARY") else {
        eprintln!("RDB_SERVER_BINARY not set, skipping live stream test");
        return;
    };

    let cfg = HarnessConfig {
        cluster: ClusterSection {
            server_binary,
            ..ClusterSection::default()
        },
        ..HarnessConfig::default()
    };

    let case = StreamTestCase::from_config(
        &cfg,
        ProcessCluster::new(cfg.cluster.clone()),
        ProcessRunner::new(cfg.script.capture_output),
        SiblingResolver::integration_dir(env!("CARGO_MANIFEST_DIR")),
    );

    match case.run().await {
        Ok(report) => assert_eq!(report.outcome.code, Some(0)),
        Err(HarnessError::ScriptFailed {
            code,
            stdout,
            stderr,
            ..
        }) => panic!(
            "stream.rb exited with {:?}\n--- stdout ---\n{}\n--- stderr ---\n{}",
            code, stdout, stderr
        ),
        Err(e) => panic!("stream test could not run: {}", e),
    }
}

#[test]
fn test_companion_script_ships_with_tests() {
    let resolver = SiblingResolver::integration_dir(env!("CARGO_MANIFEST_DIR"));
    let path = rdb_harness::PathResolver::resolve(&resolver, rdb_harness::STREAM_SCRIPT).unwrap();
    assert!(path.ends_with("tests/integration/stream.rb"));

    // Servers bind 127.0.0.1; `localhost` may resolve to ::1 first.
    let body = std::fs::read_to_string(&path).unwrap();
    assert!(body.contains("'127.0.0.1'"));
    assert!(!body.contains("'localhost'"));
}

//! Fakes for driving StreamTestCase without servers or interpreters.
//!
//! FakeFixture hands out a fixed server list and counts starts, RecordingRunner
//! records every invocation and answers with a canned exit code, FakeResolver
//! maps script names into a directory without touching the filesystem.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rdb_harness::{
    Cluster, ClusterFixture, HarnessError, PathResolver, ScriptInvocation, ScriptOutcome,
    ScriptRunner, ServerInfo,
};

/// Two servers on the classic driver ports.
pub fn two_servers() -> Vec<ServerInfo> {
    vec![
        ServerInfo::driver_only("server_0", "localhost", 28015),
        ServerInfo::driver_only("server_1", "localhost", 28016),
    ]
}

#[derive(Clone, Default)]
pub struct FakeFixture {
    servers: Vec<ServerInfo>,
    fail: bool,
    pub starts: Arc<AtomicUsize>,
    pub requested: Arc<Mutex<Vec<usize>>>,
}

#[allow(dead_code)]
impl FakeFixture {
    pub fn new(servers: Vec<ServerInfo>) -> Self {
        Self {
            servers,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }
}

impl ClusterFixture for FakeFixture {
    async fn start(&self, server_count: usize) -> rdb_harness::Result<Cluster> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push(server_count);
        if self.fail {
            return Err(HarnessError::ClusterStart("fake fixture refused".into()));
        }
        Ok(Cluster::from_servers(self.servers.clone()))
    }
}

#[derive(Clone)]
pub struct RecordingRunner {
    code: Option<i32>,
    pub calls: Arc<Mutex<Vec<ScriptInvocation>>>,
}

#[allow(dead_code)]
impl RecordingRunner {
    pub fn exiting(code: i32) -> Self {
        Self {
            code: Some(code),
            calls: Arc::default(),
        }
    }

    pub fn killed() -> Self {
        Self {
            code: None,
            calls: Arc::default(),
        }
    }

    pub fn only_call(&self) -> ScriptInvocation {
        let calls = self.calls.lock().unwrap();
        assert_eq!(calls.len(), 1, "expected exactly one script run");
        calls[0].clone()
    }
}

impl ScriptRunner for RecordingRunner {
    async fn run(&self, invocation: &ScriptInvocation) -> rdb_harness::Result<ScriptOutcome> {
        self.calls.lock().unwrap().push(invocation.clone());
        Ok(ScriptOutcome {
            code: self.code,
            stdout: "fake stdout".into(),
            stderr: String::new(),
        })
    }
}

pub struct FakeResolver {
    pub dir: PathBuf,
}

impl FakeResolver {
    pub fn new(dir: &str) -> Self {
        Self { dir: dir.into() }
    }
}

impl PathResolver for FakeResolver {
    fn resolve(&self, script: &str) -> rdb_harness::Result<PathBuf> {
        Ok(self.dir.join(script))
    }
}

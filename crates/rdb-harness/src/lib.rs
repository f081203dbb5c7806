//! RDB Harness -- cluster fixtures and companion-script runs for driver tests.
//!
//! The stream case starts a cluster, exports the first server's driver port
//! as `RDB_DRIVER_PORT` to a companion script and requires it to exit 0.

pub mod cluster;
pub mod config;
pub mod probe;
pub mod resolve;
pub mod runner;
pub mod stream_case;

use std::path::PathBuf;

pub use cluster::{Cluster, ClusterFixture, ProcessCluster, ServerInfo, StaticCluster};
pub use config::HarnessConfig;
pub use resolve::{PathResolver, SiblingResolver};
pub use runner::{ProcessRunner, ScriptInvocation, ScriptOutcome, ScriptRunner};
pub use stream_case::{CaseReport, StreamTestCase};

/// Cluster size used by the stream case.
pub const STREAM_SERVERS: usize = 2;

/// Env var carrying the driver port to the companion script.
pub const DRIVER_PORT_ENV: &str = "RDB_DRIVER_PORT";

/// Env var overriding the interpreter binary.
pub const INTERPRETER_ENV: &str = "INTERPRETER_PATH";

pub const DEFAULT_INTERPRETER: &str = "ruby";

/// Companion script run by the stream case.
pub const STREAM_SCRIPT: &str = "stream.rb";

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),
    #[error("cluster failed to start: {0}")]
    ClusterStart(String),
    #[error("cluster started with no servers")]
    EmptyCluster,
    #[error("server {name} has no usable driver port")]
    InvalidDriverPort { name: String },
    #[error("server {name} not ready on port {port}: {reason}")]
    NotReady {
        name: String,
        port: u16,
        reason: String,
    },
    #[error("companion script not found: {}", .0.display())]
    ScriptNotFound(PathBuf),
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("script {} {}", .script.display(), describe_exit(.code))]
    ScriptFailed {
        script: PathBuf,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HarnessError>;

fn describe_exit(code: &Option<i32>) -> String {
    match *code {
        Some(code) => format!("exited with code {code} (expected 0)"),
        None => "terminated by signal".into(),
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    PathBuf::from(path)
}

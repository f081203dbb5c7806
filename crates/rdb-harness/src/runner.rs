//! Running companion scripts under an interpreter.
//!
//! The child inherits the harness environment plus the invocation's env map.
//! The harness's own environment is never modified.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;

use crate::{HarnessError, Result};

/// `<interpreter> <script>` with extra environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptInvocation {
    pub interpreter: OsString,
    pub script: PathBuf,
    pub env: BTreeMap<String, String>,
}

/// How a script run ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptOutcome {
    /// None when the child was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ScriptOutcome {
    pub fn exited(code: i32) -> Self {
        Self {
            code: Some(code),
            ..Self::default()
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

pub trait ScriptRunner: Send + Sync {
    /// Run the script to completion. A nonzero exit is an outcome, not an error.
    fn run(&self, invocation: &ScriptInvocation) -> impl Future<Output = Result<ScriptOutcome>> + Send;
}

/// Runs scripts as child processes.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    capture_output: bool,
}

impl ProcessRunner {
    /// With `capture_output`, stdout/stderr are collected into the outcome;
    /// otherwise they go straight to the harness's own stdio.
    pub fn new(capture_output: bool) -> Self {
        Self { capture_output }
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ScriptRunner for ProcessRunner {
    async fn run(&self, invocation: &ScriptInvocation) -> Result<ScriptOutcome> {
        let mut cmd = Command::new(&invocation.interpreter);
        cmd.arg(&invocation.script)
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        tracing::info!(
            interpreter = ?invocation.interpreter,
            script = %invocation.script.display(),
            env = ?invocation.env,
            "running companion script"
        );

        let spawn_err = |source| HarnessError::Spawn {
            program: invocation.interpreter.to_string_lossy().into_owned(),
            source,
        };

        let outcome = if self.capture_output {
            let output = cmd.output().await.map_err(spawn_err)?;
            ScriptOutcome {
                code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }
        } else {
            let status = cmd.status().await.map_err(spawn_err)?;
            ScriptOutcome {
                code: status.code(),
                ..ScriptOutcome::default()
            }
        };

        tracing::info!(code = ?outcome.code, "companion script finished");
        Ok(outcome)
    }
}

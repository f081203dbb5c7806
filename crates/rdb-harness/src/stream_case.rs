//! The stream case: cluster up, companion script against server 0, exit 0 required.
//!
//! Steps:
//!   1. fixture.start(servers)
//!   2. first server's driver port (nonzero) -> env map `{ port_env: "<port>" }`
//!   3. interpreter = override or default, script = resolver.resolve(name)
//!   4. runner.run(<interpreter> <script>), then cluster teardown
//!   5. exit code 0 passes, anything else is `HarnessError::ScriptFailed`

use std::collections::BTreeMap;
use std::ffi::OsString;

use crate::cluster::{Cluster, ClusterFixture, ServerInfo};
use crate::config::HarnessConfig;
use crate::resolve::{interpreter_override, resolve_interpreter, PathResolver};
use crate::runner::{ScriptInvocation, ScriptOutcome, ScriptRunner};
use crate::{HarnessError, Result};

/// What a passing run looked like.
#[derive(Debug, Clone)]
pub struct CaseReport {
    pub server: ServerInfo,
    pub invocation: ScriptInvocation,
    pub outcome: ScriptOutcome,
}

pub struct StreamTestCase<F, R, P> {
    fixture: F,
    runner: R,
    resolver: P,
    servers: usize,
    script: String,
    port_env: String,
    interpreter: String,
    interpreter_override: Option<OsString>,
}

impl<F, R, P> StreamTestCase<F, R, P>
where
    F: ClusterFixture,
    R: ScriptRunner,
    P: PathResolver,
{
    /// Two servers, `stream.rb`, `RDB_DRIVER_PORT`, `ruby` with no override.
    pub fn new(fixture: F, runner: R, resolver: P) -> Self {
        Self {
            fixture,
            runner,
            resolver,
            servers: crate::STREAM_SERVERS,
            script: crate::STREAM_SCRIPT.into(),
            port_env: crate::DRIVER_PORT_ENV.into(),
            interpreter: crate::DEFAULT_INTERPRETER.into(),
            interpreter_override: None,
        }
    }

    /// Settings from `[cluster]`/`[script]`; the interpreter override is read
    /// from the environment variable named by `script.interpreter_env`.
    pub fn from_config(cfg: &HarnessConfig, fixture: F, runner: R, resolver: P) -> Self {
        Self::new(fixture, runner, resolver)
            .servers(cfg.cluster.servers)
            .script(&cfg.script.name)
            .port_env(&cfg.script.port_env)
            .interpreter(&cfg.script.interpreter)
            .interpreter_override(interpreter_override(&cfg.script.interpreter_env))
    }

    pub fn servers(mut self, servers: usize) -> Self {
        self.servers = servers;
        self
    }

    pub fn script(mut self, script: &str) -> Self {
        self.script = script.into();
        self
    }

    pub fn port_env(mut self, var: &str) -> Self {
        self.port_env = var.into();
        self
    }

    /// Default interpreter, used when no override is set.
    pub fn interpreter(mut self, interpreter: &str) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    /// Used verbatim when set and non-empty.
    pub fn interpreter_override(mut self, value: Option<OsString>) -> Self {
        self.interpreter_override = value;
        self
    }

    pub async fn run(&self) -> Result<CaseReport> {
        let cluster = self.fixture.start(self.servers).await?;
        let result = self.run_against(&cluster).await;
        cluster.teardown().await;

        let report = result?;
        if !report.outcome.success() {
            tracing::warn!(
                script = %report.invocation.script.display(),
                code = ?report.outcome.code,
                "stream case failed"
            );
            return Err(HarnessError::ScriptFailed {
                script: report.invocation.script,
                code: report.outcome.code,
                stdout: report.outcome.stdout,
                stderr: report.outcome.stderr,
            });
        }

        tracing::info!(driver_port = report.server.driver_port, "stream case passed");
        Ok(report)
    }

    async fn run_against(&self, cluster: &Cluster) -> Result<CaseReport> {
        let server = cluster.first().ok_or(HarnessError::EmptyCluster)?.clone();
        if server.driver_port == 0 {
            return Err(HarnessError::InvalidDriverPort { name: server.name });
        }

        let env = BTreeMap::from([(self.port_env.clone(), server.driver_port.to_string())]);
        let invocation = ScriptInvocation {
            interpreter: resolve_interpreter(self.interpreter_override.as_deref(), &self.interpreter),
            script: self.resolver.resolve(&self.script)?,
            env,
        };

        let outcome = self.runner.run(&invocation).await?;
        Ok(CaseReport {
            server,
            invocation,
            outcome,
        })
    }
}

//! Cluster fixtures.
//!
//! `ProcessCluster` spawns N server processes on free loopback ports. Server 0
//! is the seed, servers 1..N join it. `StaticCluster` wraps a cluster somebody
//! else already started.

use std::collections::BTreeMap;
use std::future::Future;
use std::net::TcpListener;
use std::path::Path;
use std::process::Stdio;

use tokio::process::{Child, Command};

use crate::config::ClusterSection;
use crate::{probe, HarnessError, Result};

/// One cluster member as seen by tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub name: String,
    pub host: String,
    pub driver_port: u16,
    pub cluster_port: Option<u16>,
    pub http_port: Option<u16>,
}

impl ServerInfo {
    /// A server known only by its driver port.
    pub fn driver_only(name: impl Into<String>, host: impl Into<String>, driver_port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            driver_port,
            cluster_port: None,
            http_port: None,
        }
    }
}

/// A started cluster. Servers are kept in start order.
pub struct Cluster {
    servers: Vec<ServerInfo>,
    processes: Vec<Child>,
    _data_dir: Option<tempfile::TempDir>,
}

impl Cluster {
    /// A cluster with no processes to manage.
    pub fn from_servers(servers: Vec<ServerInfo>) -> Self {
        Self {
            servers,
            processes: Vec::new(),
            _data_dir: None,
        }
    }

    pub fn servers(&self) -> &[ServerInfo] {
        &self.servers
    }

    pub fn first(&self) -> Option<&ServerInfo> {
        self.servers.first()
    }

    /// Kill owned server processes in reverse start order and reap them.
    pub async fn teardown(mut self) {
        while let Some(mut child) = self.processes.pop() {
            let name = self
                .servers
                .get(self.processes.len())
                .map(|s| s.name.clone())
                .unwrap_or_default();
            if let Err(e) = child.start_kill() {
                tracing::debug!(server = %name, error = %e, "kill failed (already exited?)");
            }
            match child.wait().await {
                Ok(status) => tracing::info!(server = %name, %status, "server stopped"),
                Err(e) => tracing::warn!(server = %name, error = %e, "failed to reap server"),
            }
        }
    }
}

/// Something that can hand out a running cluster of a given size.
pub trait ClusterFixture: Send + Sync {
    fn start(&self, server_count: usize) -> impl Future<Output = Result<Cluster>> + Send;
}

/// Spawns real server processes from `ClusterSection`.
pub struct ProcessCluster {
    config: ClusterSection,
}

impl ProcessCluster {
    pub fn new(config: ClusterSection) -> Self {
        Self { config }
    }

    fn command_for(&self, info: &ServerInfo, vars: &BTreeMap<&'static str, String>, seed: bool) -> Command {
        let mut cmd = Command::new(&self.config.server_binary);
        cmd.args(expand_args(&self.config.server_args, vars));
        if !seed {
            cmd.args(expand_args(&self.config.join_args, vars));
        }
        cmd.stdin(Stdio::null()).kill_on_drop(true);
        tracing::debug!(server = %info.name, cmd = ?cmd.as_std(), "spawning server");
        cmd
    }

    async fn spawn_all(&self, cluster: &mut Cluster, server_count: usize, data_dir: &Path) -> Result<()> {
        let ports = allocate_ports(server_count * 3)?;
        let seed_cluster_port = ports[1];

        for i in 0..server_count {
            let name = format!("server_{}", i);
            let info = ServerInfo {
                name: name.clone(),
                host: self.config.host.clone(),
                driver_port: ports[i * 3],
                cluster_port: Some(ports[i * 3 + 1]),
                http_port: Some(ports[i * 3 + 2]),
            };

            let server_dir = data_dir.join(&name);
            let vars = BTreeMap::from([
                ("name", name.clone()),
                ("host", info.host.clone()),
                ("driver_port", ports[i * 3].to_string()),
                ("cluster_port", ports[i * 3 + 1].to_string()),
                ("http_port", ports[i * 3 + 2].to_string()),
                ("data_dir", server_dir.display().to_string()),
                ("seed_cluster_port", seed_cluster_port.to_string()),
            ]);

            let log = std::fs::File::create(data_dir.join(format!("{}.log", name)))?;
            let mut cmd = self.command_for(&info, &vars, i == 0);
            cmd.stdout(Stdio::from(log.try_clone()?)).stderr(Stdio::from(log));

            let child = cmd.spawn().map_err(|source| HarnessError::Spawn {
                program: self.config.server_binary.clone(),
                source,
            })?;
            tracing::info!(
                server = %name,
                driver_port = info.driver_port,
                pid = child.id(),
                "server spawned"
            );
            cluster.servers.push(info);
            cluster.processes.push(child);
        }

        for (info, child) in cluster.servers.iter().zip(cluster.processes.iter_mut()) {
            let ready = probe::wait_ready(
                &info.host,
                info.driver_port,
                &self.config.auth_key,
                self.config.probe,
                self.config.ready_timeout(),
            );
            let reason = tokio::select! {
                result = ready => match result {
                    Ok(()) => continue,
                    Err(e) => e.to_string(),
                },
                status = child.wait() => match status {
                    Ok(status) => format!("process exited early ({status})"),
                    Err(e) => format!("process wait failed: {e}"),
                },
            };
            let log_path = data_dir.join(format!("{}.log", info.name));
            let reason = match log_tail(&log_path) {
                Some(tail) => format!("{reason}; log tail:\n{tail}"),
                None => reason,
            };
            return Err(HarnessError::NotReady {
                name: info.name.clone(),
                port: info.driver_port,
                reason,
            });
        }

        Ok(())
    }
}

impl ClusterFixture for ProcessCluster {
    async fn start(&self, server_count: usize) -> Result<Cluster> {
        if server_count == 0 {
            return Err(HarnessError::ClusterStart("server count must be at least 1".into()));
        }

        let data_dir = tempfile::Builder::new().prefix("rdb-harness-").tempdir()?;
        tracing::info!(
            servers = server_count,
            binary = %self.config.server_binary,
            data_dir = %data_dir.path().display(),
            "starting cluster"
        );

        let mut cluster = Cluster::from_servers(Vec::with_capacity(server_count));
        let path = data_dir.path().to_path_buf();
        cluster._data_dir = Some(data_dir);

        match self.spawn_all(&mut cluster, server_count, &path).await {
            Ok(()) => {
                tracing::info!(servers = server_count, "cluster ready");
                Ok(cluster)
            }
            Err(e) => {
                tracing::warn!(error = %e, "cluster start failed, stopping started servers");
                cluster.teardown().await;
                Err(e)
            }
        }
    }
}

/// An externally managed cluster, addressed by driver ports.
pub struct StaticCluster {
    host: String,
    driver_ports: Vec<u16>,
}

impl StaticCluster {
    pub fn new(host: impl Into<String>, driver_ports: Vec<u16>) -> Self {
        Self {
            host: host.into(),
            driver_ports,
        }
    }
}

impl ClusterFixture for StaticCluster {
    async fn start(&self, server_count: usize) -> Result<Cluster> {
        if self.driver_ports.len() < server_count {
            return Err(HarnessError::ClusterStart(format!(
                "need {} servers, {} external driver ports configured",
                server_count,
                self.driver_ports.len()
            )));
        }
        if let Some(i) = self.driver_ports.iter().take(server_count).position(|p| *p == 0) {
            return Err(HarnessError::InvalidDriverPort {
                name: format!("external_{}", i),
            });
        }
        let servers = self
            .driver_ports
            .iter()
            .take(server_count)
            .enumerate()
            .map(|(i, port)| ServerInfo::driver_only(format!("external_{}", i), self.host.clone(), *port))
            .collect();
        Ok(Cluster::from_servers(servers))
    }
}

/// Bytes of server log carried into a `NotReady` error.
const LOG_TAIL_BYTES: usize = 4096;

/// Last `LOG_TAIL_BYTES` of a server log, or None if missing or empty.
fn log_tail(path: &Path) -> Option<String> {
    let bytes = std::fs::read(path).ok()?;
    let start = bytes.len().saturating_sub(LOG_TAIL_BYTES);
    let tail = String::from_utf8_lossy(&bytes[start..]).trim().to_string();
    (!tail.is_empty()).then_some(tail)
}

/// Reserve `n` distinct free loopback ports. All listeners are held until every
/// port is picked so the OS cannot hand out the same one twice.
pub fn allocate_ports(n: usize) -> std::io::Result<Vec<u16>> {
    let listeners = (0..n)
        .map(|_| TcpListener::bind("127.0.0.1:0"))
        .collect::<std::io::Result<Vec<_>>>()?;
    listeners
        .iter()
        .map(|l| l.local_addr().map(|a| a.port()))
        .collect()
}

/// Replace `{key}` placeholders in each argument. Unknown keys are left as written.
pub fn expand_args(template: &[String], vars: &BTreeMap<&'static str, String>) -> Vec<String> {
    template
        .iter()
        .map(|arg| {
            vars.iter().fold(arg.clone(), |acc, (key, value)| {
                acc.replace(&format!("{{{}}}", key), value)
            })
        })
        .collect()
}

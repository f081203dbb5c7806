//! Configuration types for rdb-harness.
//! Parsed from a TOML file (default `rdb-harness.toml`); every field is optional.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarnessConfig {
    #[serde(default)]
    pub cluster: ClusterSection,
    #[serde(default)]
    pub script: ScriptSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSection {
    #[serde(default = "default_servers")]
    pub servers: usize,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_server_binary")]
    pub server_binary: String,
    /// Arguments for every server. Placeholders are expanded per server.
    #[serde(default = "default_server_args")]
    pub server_args: Vec<String>,
    /// Appended for every server after the first (the seed).
    #[serde(default = "default_join_args")]
    pub join_args: Vec<String>,
    /// Attach to an already-running cluster on these driver ports instead of spawning.
    #[serde(default)]
    pub external_driver_ports: Vec<u16>,
    #[serde(default)]
    pub probe: ProbeMode,
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,
    #[serde(default)]
    pub auth_key: String,
}

/// How a server's driver port is judged ready.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeMode {
    /// Full client handshake, SUCCESS reply required.
    #[default]
    Handshake,
    /// TCP connect only.
    Tcp,
    None,
}

impl Default for ClusterSection {
    fn default() -> Self {
        Self {
            servers: default_servers(),
            host: default_host(),
            server_binary: default_server_binary(),
            server_args: default_server_args(),
            join_args: default_join_args(),
            external_driver_ports: Vec::new(),
            probe: ProbeMode::default(),
            ready_timeout_secs: default_ready_timeout_secs(),
            auth_key: String::new(),
        }
    }
}

impl ClusterSection {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptSection {
    #[serde(default = "default_script_name")]
    pub name: String,
    /// Directory holding the companion script. Defaults to the integration test sources.
    pub dir: Option<String>,
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
    #[serde(default = "default_interpreter_env")]
    pub interpreter_env: String,
    #[serde(default = "default_port_env")]
    pub port_env: String,
    #[serde(default = "default_true")]
    pub capture_output: bool,
}

impl Default for ScriptSection {
    fn default() -> Self {
        Self {
            name: default_script_name(),
            dir: None,
            interpreter: default_interpreter(),
            interpreter_env: default_interpreter_env(),
            port_env: default_port_env(),
            capture_output: true,
        }
    }
}

// Default value functions
fn default_servers() -> usize {
    crate::STREAM_SERVERS
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_server_binary() -> String {
    "rethinkdb".into()
}
fn default_server_args() -> Vec<String> {
    [
        "--server-name",
        "{name}",
        "--directory",
        "{data_dir}",
        "--bind",
        "{host}",
        "--driver-port",
        "{driver_port}",
        "--cluster-port",
        "{cluster_port}",
        "--http-port",
        "{http_port}",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_join_args() -> Vec<String> {
    vec!["--join".into(), "{host}:{seed_cluster_port}".into()]
}
fn default_ready_timeout_secs() -> u64 {
    30
}
fn default_script_name() -> String {
    crate::STREAM_SCRIPT.into()
}
fn default_interpreter() -> String {
    crate::DEFAULT_INTERPRETER.into()
}
fn default_interpreter_env() -> String {
    crate::INTERPRETER_ENV.into()
}
fn default_port_env() -> String {
    crate::DRIVER_PORT_ENV.into()
}
fn default_true() -> bool {
    true
}

impl HarnessConfig {
    /// Load config from file, or fall back to defaults if missing.
    pub fn load_or_default(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: HarnessConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }
}

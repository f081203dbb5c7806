//! rdb-harness -- run the stream case against a fresh or existing cluster.
//!
//! Usage:
//!   rdb-harness stream                    # Two servers, tests/integration/stream.rb
//!   rdb-harness --config h.toml stream    # Custom config
//!   rdb-harness probe --port 28015        # One driver handshake
//!   rdb-harness config                    # Print effective config

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use rdb_harness::config::HarnessConfig;
use rdb_harness::probe;
use rdb_harness::{
    expand_tilde, HarnessError, ProcessCluster, ProcessRunner, SiblingResolver, StaticCluster,
    StreamTestCase,
};

#[derive(Parser)]
#[command(name = "rdb-harness", about = "Cluster fixture and companion-script runner")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "rdb-harness.toml")]
    config: String,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a cluster and run the stream companion script (default)
    Stream {
        /// Override cluster size
        #[arg(long)]
        servers: Option<usize>,
        /// Directory holding the companion script
        #[arg(long)]
        script_dir: Option<PathBuf>,
    },
    /// Handshake once with a driver port
    Probe {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long)]
        port: u16,
        #[arg(long, default_value_t = 2)]
        timeout_secs: u64,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    let cfg = HarnessConfig::load_or_default(&expand_tilde(&cli.config))?;

    match cli.command {
        Some(Commands::Stream {
            servers,
            script_dir,
        }) => run_stream(cfg, servers, script_dir).await?,
        None => run_stream(cfg, None, None).await?,
        Some(Commands::Probe {
            host,
            port,
            timeout_secs,
        }) => {
            probe::handshake(&host, port, &cfg.cluster.auth_key, Duration::from_secs(timeout_secs))
                .await?;
            println!("{}:{} ready", host, port);
        }
        Some(Commands::Config) => {
            println!("{}", toml::to_string_pretty(&cfg)?);
        }
    }

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "rdb_harness=info,rdb_protocol=info".into());
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn run_stream(
    mut cfg: HarnessConfig,
    servers: Option<usize>,
    script_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    if let Some(n) = servers {
        cfg.cluster.servers = n;
    }

    let resolver = match script_dir {
        Some(dir) => SiblingResolver::new(dir),
        None => match &cfg.script.dir {
            Some(dir) => SiblingResolver::new(expand_tilde(dir)),
            None => SiblingResolver::integration_dir(env!("CARGO_MANIFEST_DIR")),
        },
    };
    let runner = ProcessRunner::new(cfg.script.capture_output);

    let result = if cfg.cluster.external_driver_ports.is_empty() {
        let fixture = ProcessCluster::new(cfg.cluster.clone());
        StreamTestCase::from_config(&cfg, fixture, runner, resolver).run().await
    } else {
        let fixture = StaticCluster::new(
            cfg.cluster.host.clone(),
            cfg.cluster.external_driver_ports.clone(),
        );
        StreamTestCase::from_config(&cfg, fixture, runner, resolver).run().await
    };

    match result {
        Ok(report) => {
            println!(
                "PASS {} (driver port {})",
                report.invocation.script.display(),
                report.server.driver_port
            );
            Ok(())
        }
        Err(HarnessError::ScriptFailed {
            script,
            code,
            stdout,
            stderr,
        }) => {
            if !stdout.is_empty() {
                eprintln!("--- stdout ---\n{}", stdout);
            }
            if !stderr.is_empty() {
                eprintln!("--- stderr ---\n{}", stderr);
            }
            anyhow::bail!(HarnessError::ScriptFailed {
                script,
                code,
                stdout: String::new(),
                stderr: String::new(),
            })
        }
        Err(e) => Err(e.into()),
    }
}

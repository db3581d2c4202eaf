//! Fabric orchagent entry point.
//!
//! Loads the daemon configuration and a netcfg topology file, then runs the
//! reconciler against an in-memory recording programmer until interrupted.

use anyhow::Context;
use clap::Parser;
use fabric_orchagent::audit::{init_logging, AuditCategory, AuditOutcome, AuditRecord};
use fabric_orchagent::audit_log;
use fabric_orchagent::memory::{RecordingProgrammer, StaticMastership};
use fabric_orchagent::{netcfg, Collaborators, FabricConfig, FabricDaemon};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Leaf-spine fabric forwarding state reconciler
#[derive(Parser, Debug)]
#[command(name = "fabric-orchagent")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Daemon configuration file (TOML)
    #[arg(short = 'c', long, default_value = "/etc/fabric/orchagent.toml")]
    config: PathBuf,

    /// Network configuration file (JSON) describing devices, ports, links
    /// and hosts
    #[arg(short = 'n', long)]
    netcfg: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long)]
    run_for_secs: Option<u64>,
}

/// Loads and validates the daemon configuration, auditing the outcome.
fn load_config(path: &Path) -> anyhow::Result<FabricConfig> {
    let record = AuditRecord::new(AuditCategory::ConfigurationChange, "main", "load_config")
        .with_object_id(path.display().to_string());
    let loaded = FabricConfig::load_or_default(path).and_then(|config| {
        config.validate()?;
        Ok(config)
    });
    match loaded {
        Ok(config) => {
            audit_log!(record
                .with_outcome(AuditOutcome::Success)
                .with_details(serde_json::json!({
                    "app": config.app.name,
                    "worker_threads": config.reconcile.worker_threads,
                })));
            Ok(config)
        }
        Err(e) => {
            audit_log!(record.with_error(e.to_string()));
            Err(e).with_context(|| format!("loading {}", path.display()))
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = load_config(&args.config)?;

    let topology = Arc::new(
        netcfg::load(&args.netcfg).with_context(|| format!("loading {}", args.netcfg.display()))?,
    );
    let programmer = Arc::new(RecordingProgrammer::new());

    let mut daemon = FabricDaemon::new(
        &config,
        Collaborators {
            topology: topology.clone(),
            mastership: Arc::new(StaticMastership::all()),
            net_config: topology,
            programmer: programmer.clone(),
        },
    );

    daemon.start().await?;

    match args.run_for_secs {
        Some(secs) => {
            info!(secs, "running for a fixed duration");
            tokio::time::sleep(Duration::from_secs(secs)).await;
        }
        None => {
            tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
            warn!("received SIGINT, shutting down");
        }
    }

    info!(operations = programmer.operations().len(), "programming calls issued");
    let cleanup = daemon.stop().await?;
    info!(
        devices = cleanup.devices.len(),
        groups_removed = cleanup.groups_removed,
        "application state removed"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level, args.log_json);

    info!(config = %args.config.display(), netcfg = %args.netcfg.display(), "starting fabric orchagent");

    match run(args).await {
        Ok(()) => {
            info!("fabric orchagent shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "fabric orchagent failed");
            ExitCode::FAILURE
        }
    }
}

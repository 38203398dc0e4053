//! # Baker Provisioner CLI
//!
//! Interactive provisioning of an Octez node and baker.
//!
//! ## Startup Sequence
//!
//! 1. Parse arguments and initialize logging
//! 2. Resolve configuration from the environment and flags
//! 3. Check that `octez-node` (and `octez-client` unless `--skip-baker`) are installed
//! 4. Wire adapters and run the workflow

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use baker_provisioner::adapters::{
    find_executable, CommandFaucet, HttpDownloader, JsonSummaryHandoff, LogProgress, OctezClient,
    OctezNode, RpcNodeClient, SystemdRunRegistrar, TcpPortProbe, TerminalPrompter, TokioSleeper,
};
use baker_provisioner::domain::{HistoryMode, Network};
use baker_provisioner::{
    Collaborators, ProvisionError, ProvisionerConfig, ProvisioningWorkflow, WorkflowError,
};
use provision_telemetry::{init_telemetry, TelemetryConfig};

/// Provision an Octez validator node and optionally activate a baker.
#[derive(Parser, Debug)]
#[command(name = "baker-provisioner", version)]
struct Args {
    /// Network to join (mainnet, ghostnet)
    #[arg(long, default_value = "ghostnet")]
    network: Network,

    /// History mode (full, rolling)
    #[arg(long, default_value = "rolling")]
    history_mode: HistoryMode,

    /// Default parent directory offered for the data directory
    #[arg(long)]
    parent_dir: Option<PathBuf>,

    /// octez-node executable
    #[arg(long)]
    node_bin: Option<String>,

    /// octez-client executable
    #[arg(long)]
    client_bin: Option<String>,

    /// Snapshot provider base URL
    #[arg(long)]
    snapshot_base_url: Option<String>,

    /// Write the provisioning summary here instead of stdout
    #[arg(long)]
    summary_out: Option<PathBuf>,

    /// Do not offer baker setup
    #[arg(long)]
    skip_baker: bool,
}

fn build_config(args: &Args) -> ProvisionerConfig {
    let mut config = ProvisionerConfig::from_env(args.network, args.history_mode);
    if let Some(parent) = &args.parent_dir {
        config.directory.default_parent = parent.clone();
    }
    if let Some(bin) = &args.node_bin {
        config.binaries.node = bin.clone();
    }
    if let Some(bin) = &args.client_bin {
        config.binaries.client = bin.clone();
    }
    if let Some(url) = &args.snapshot_base_url {
        config.snapshot.base_url = url.clone();
    }
    config
}

fn require_binary(name: &str) -> Result<String, ProvisionError> {
    let path_var = std::env::var_os("PATH");
    find_executable(name, path_var.as_deref())
        .map(|path| path.display().to_string())
        .ok_or_else(|| ProvisionError::MissingBinary(name.to_string()))
}

async fn run(args: Args) -> Result<()> {
    let mut config = build_config(&args);

    config.binaries.node = require_binary(&config.binaries.node).context("checking installed binaries")?;
    if !args.skip_baker {
        config.binaries.client =
            require_binary(&config.binaries.client).context("checking installed binaries")?;
    }

    let deps = Collaborators {
        prompter: Arc::new(TerminalPrompter::stdin()),
        node_cli: Arc::new(OctezNode::new(
            config.binaries.node.clone(),
            config.snapshot.integrity_check_flag.clone(),
        )),
        port_probe: Arc::new(TcpPortProbe),
        downloader: Arc::new(HttpDownloader::new()?),
        progress: Arc::new(LogProgress::new()),
        rpc: Arc::new(RpcNodeClient::new(config.bootstrap.request_timeout)?),
        client: Arc::new(OctezClient::new(config.binaries.client.clone())),
        faucet: Arc::new(CommandFaucet::new(config.binaries.faucet.clone())),
        registrar: Arc::new(SystemdRunRegistrar::new(
            config.binaries.node.clone(),
            config.directory.owner,
        )),
        handoff: Arc::new(JsonSummaryHandoff::new(args.summary_out.clone())),
        sleeper: Arc::new(TokioSleeper),
    };

    let outcome = ProvisioningWorkflow::new(config, deps)
        .run(args.skip_baker)
        .await?;

    info!(
        data_dir = %outcome.node.data_dir.display(),
        rpc_port = outcome.node.rpc_port,
        net_port = outcome.node.net_port,
        protocol = outcome.node.protocol_hash.as_deref().unwrap_or("-"),
        identity_cleanups = outcome.identity.cleanups,
        service = outcome.service_registered,
        baker = outcome.baker.as_ref().map(|b| b.address.as_str()).unwrap_or("-"),
        "Provisioning complete"
    );
    Ok(())
}

fn report(err: &anyhow::Error) {
    match err.downcast_ref::<WorkflowError>() {
        Some(failure) => {
            error!(stage = %failure.stage, error = %failure.error, "Provisioning failed");
            eprintln!("Error: {}", failure);
            if failure.stage.after_service_registration() {
                eprintln!("The node service was left running.");
            }
        }
        None => {
            error!(error = %err, "Provisioning failed");
            eprintln!("Error: {:#}", err);
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let telemetry = TelemetryConfig::from_env().with_network(args.network.as_str());
    let _guard = match init_telemetry(telemetry) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: {}", e);
            None
        }
    };

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}

//! # Service Registrar
//!
//! Starts the node as a transient systemd unit that restarts on failure.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use crate::config::Ownership;
use crate::domain::{NodeInstance, ProvisionError};
use crate::ports::ServiceRegistrar;

/// Registers the node with `systemd-run`.
pub struct SystemdRunRegistrar {
    systemd_run: String,
    node_binary: String,
    owner: Option<Ownership>,
}

impl SystemdRunRegistrar {
    /// `node_binary` should be an absolute path; systemd does not search
    /// the invoking user's `PATH`.
    pub fn new(node_binary: impl Into<String>, owner: Option<Ownership>) -> Self {
        Self {
            systemd_run: "systemd-run".to_string(),
            node_binary: node_binary.into(),
            owner,
        }
    }

    /// Use another `systemd-run` executable.
    pub fn with_systemd_run(mut self, program: impl Into<String>) -> Self {
        self.systemd_run = program.into();
        self
    }

    /// Full `systemd-run` argument list for `node`.
    pub fn unit_args(&self, node: &NodeInstance, service_name: &str) -> Vec<String> {
        let mut args = vec![
            format!("--unit={}", service_name),
            format!("--description=Octez node ({})", node.network),
            "--property=Restart=always".to_string(),
            "--property=RestartSec=5".to_string(),
        ];
        if let Some(owner) = self.owner {
            args.push(format!("--uid={}", owner.uid));
            args.push(format!("--gid={}", owner.gid));
        }
        args.extend([
            self.node_binary.clone(),
            "run".to_string(),
            "--data-dir".to_string(),
            node.data_dir.display().to_string(),
            "--rpc-addr".to_string(),
            node.rpc_addr(),
            "--net-addr".to_string(),
            node.net_addr(),
        ]);
        args
    }
}

#[async_trait]
impl ServiceRegistrar for SystemdRunRegistrar {
    async fn register(&self, node: &NodeInstance, service_name: &str) -> Result<(), ProvisionError> {
        let output = Command::new(&self.systemd_run)
            .args(self.unit_args(node, service_name))
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ProvisionError::Service(format!("cannot run {}: {}", self.systemd_run, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProvisionError::Service(format!(
                "{} exited with {}: {}",
                self.systemd_run,
                output.status,
                stderr.trim()
            )));
        }

        info!(service = service_name, "[service] Unit started");
        Ok(())
    }
}

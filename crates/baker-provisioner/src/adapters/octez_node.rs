//! # Octez Node Adapter
//!
//! Drives the `octez-node` executable: configuration, the short identity run
//! and snapshot import.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::domain::{ImportMode, NodeInstance, ProvisionError};
use crate::ports::{NodeCli, NodeHandle};

/// How long an interrupted node may take to exit before it is killed.
pub const STOP_GRACE_PERIOD: Duration = Duration::from_secs(30);

/// `octez-node` invoked as a child process.
pub struct OctezNode {
    binary: String,
    integrity_check_flag: String,
}

impl OctezNode {
    /// Adapter for `binary`, passing `integrity_check_flag` on safe imports.
    pub fn new(binary: impl Into<String>, integrity_check_flag: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            integrity_check_flag: integrity_check_flag.into(),
        }
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args).stdin(Stdio::null()).kill_on_drop(true);
        cmd
    }

    fn process_error(&self, message: impl ToString) -> ProvisionError {
        ProvisionError::Process {
            program: self.binary.clone(),
            message: message.to_string(),
        }
    }
}

/// Arguments of `octez-node config init`.
pub fn config_init_args(node: &NodeInstance) -> Vec<String> {
    vec![
        "config".to_string(),
        "init".to_string(),
        "--data-dir".to_string(),
        node.data_dir.display().to_string(),
        "--network".to_string(),
        node.network.to_string(),
        "--history-mode".to_string(),
        node.history_mode.to_string(),
        "--rpc-addr".to_string(),
        node.rpc_addr(),
        "--net-addr".to_string(),
        node.net_addr(),
    ]
}

/// Arguments of `octez-node run`.
pub fn run_args(node: &NodeInstance) -> Vec<String> {
    vec![
        "run".to_string(),
        "--data-dir".to_string(),
        node.data_dir.display().to_string(),
    ]
}

/// Arguments of `octez-node snapshot import`. The integrity flag is only
/// present in safe mode.
pub fn snapshot_import_args(
    node: &NodeInstance,
    artifact: &Path,
    mode: ImportMode,
    integrity_check_flag: &str,
) -> Vec<String> {
    let mut args = vec![
        "snapshot".to_string(),
        "import".to_string(),
        artifact.display().to_string(),
        "--data-dir".to_string(),
        node.data_dir.display().to_string(),
    ];
    if mode.checks_integrity() {
        args.push(integrity_check_flag.to_string());
    }
    args
}

fn describe_failure(status: ExitStatus, stderr: &[u8]) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("exited with {}", status)
    } else {
        format!("exited with {}: {}", status, stderr)
    }
}

#[async_trait]
impl NodeCli for OctezNode {
    async fn init_config(&self, node: &NodeInstance) -> Result<(), ProvisionError> {
        let args = config_init_args(node);
        debug!(binary = %self.binary, ?args, "[octez-node] config init");

        let output = self
            .command(&args)
            .output()
            .await
            .map_err(|e| ProvisionError::ConfigInit(format!("cannot run {}: {}", self.binary, e)))?;

        if !output.status.success() {
            return Err(ProvisionError::ConfigInit(describe_failure(
                output.status,
                &output.stderr,
            )));
        }
        Ok(())
    }

    async fn spawn_for_identity(
        &self,
        node: &NodeInstance,
    ) -> Result<Box<dyn NodeHandle>, ProvisionError> {
        let child = self
            .command(&run_args(node))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| self.process_error(e))?;

        Ok(Box::new(OctezNodeProcess::new(self.binary.clone(), child)))
    }

    async fn import_snapshot(
        &self,
        node: &NodeInstance,
        artifact: &Path,
        mode: ImportMode,
    ) -> Result<(), ProvisionError> {
        let args = snapshot_import_args(node, artifact, mode, &self.integrity_check_flag);
        info!(?mode, "[octez-node] Running snapshot import");

        // Import prints its own progress; let it reach the terminal.
        let status = self
            .command(&args)
            .status()
            .await
            .map_err(|e| ProvisionError::SnapshotImport(format!("cannot run {}: {}", self.binary, e)))?;

        if !status.success() {
            return Err(ProvisionError::SnapshotImport(format!("exited with {}", status)));
        }
        Ok(())
    }
}

/// A running `octez-node`. Killed if dropped while still running.
pub struct OctezNodeProcess {
    program: String,
    child: Child,
    grace: Duration,
}

impl OctezNodeProcess {
    /// Wrap a spawned child.
    pub fn new(program: String, child: Child) -> Self {
        Self {
            program,
            child,
            grace: STOP_GRACE_PERIOD,
        }
    }

    /// Override the grace period before a forced kill.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    fn error(&self, message: impl ToString) -> ProvisionError {
        ProvisionError::Process {
            program: self.program.clone(),
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl NodeHandle for OctezNodeProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    async fn interrupt(&mut self) -> Result<(), ProvisionError> {
        let Some(pid) = self.child.id() else {
            return Ok(());
        };

        match signal::kill(Pid::from_raw(pid as i32), Signal::SIGINT) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(self.error(format!("SIGINT to {} failed: {}", pid, e))),
        }
    }

    async fn wait(&mut self) -> Result<(), ProvisionError> {
        match tokio::time::timeout(self.grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                debug!(%status, "[octez-node] Node process exited");
                Ok(())
            }
            Ok(Err(e)) => Err(self.error(e)),
            Err(_) => {
                warn!(grace = ?self.grace, "[octez-node] Node did not exit in time, killing it");
                self.child.kill().await.map_err(|e| self.error(e))
            }
        }
    }
}

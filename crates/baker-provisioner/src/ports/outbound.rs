//! # Outbound Ports
//!
//! Traits for everything the workflow depends on: the operator, the node and
//! client executables, the host, remote services and the clock.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::{
    BakerIdentity, BootstrapStatus, FundingPlan, ImportMode, KeySource, KnownAddress, Mutez,
    Network, NodeInstance, PortPair, ProvisionError,
};

/// Directory chosen by the operator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryChoice {
    /// Parent directory.
    pub parent: PathBuf,
    /// Name of the data directory below `parent`.
    pub name: String,
}

impl DirectoryChoice {
    /// Full data directory path.
    pub fn path(&self) -> PathBuf {
        self.parent.join(&self.name)
    }
}

/// Operator prompts. Each call blocks until answered.
#[async_trait]
pub trait Prompter: Send + Sync {
    /// Ask for the data directory name and parent.
    async fn data_directory(&self, default: &DirectoryChoice) -> Result<DirectoryChoice, ProvisionError>;

    /// `path` already exists: delete it?
    async fn confirm_delete(&self, path: &Path) -> Result<bool, ProvisionError>;

    /// Deletion declined: pick another directory (true) or abort (false)?
    async fn choose_another_directory(&self) -> Result<bool, ProvisionError>;

    /// Ask for both ports.
    async fn port_pair(&self, default: PortPair) -> Result<PortPair, ProvisionError>;

    /// Fast or safe snapshot import.
    async fn import_mode(&self) -> Result<ImportMode, ProvisionError>;

    /// Register the node as a background service?
    async fn confirm_service_setup(&self, service_name: &str) -> Result<bool, ProvisionError>;

    /// Set up a baker after the node is bootstrapped?
    async fn confirm_baker_setup(&self) -> Result<bool, ProvisionError>;

    /// Choose how the baking key is obtained.
    async fn key_source(&self, known: &[KnownAddress]) -> Result<KeySource, ProvisionError>;

    /// Choose how to cover `shortfall` for `address`.
    async fn funding_plan(
        &self,
        network: Network,
        address: &str,
        shortfall: Mutez,
    ) -> Result<FundingPlan, ProvisionError>;

    /// Delegate registration failed: wait for more funds and retry?
    async fn retry_registration(&self, error: &ProvisionError) -> Result<bool, ProvisionError>;
}

/// A node process started in the background.
#[async_trait]
pub trait NodeHandle: Send {
    /// OS process id, if still known.
    fn id(&self) -> Option<u32>;

    /// Send a graceful interrupt.
    async fn interrupt(&mut self) -> Result<(), ProvisionError>;

    /// Wait for the process to exit, forcing it down if it lingers.
    async fn wait(&mut self) -> Result<(), ProvisionError>;
}

/// The `octez-node` executable.
#[async_trait]
pub trait NodeCli: Send + Sync {
    /// Write `config.json` for the node's network, history mode and ports.
    async fn init_config(&self, node: &NodeInstance) -> Result<(), ProvisionError>;

    /// Start `octez-node run` against the data directory.
    async fn spawn_for_identity(
        &self,
        node: &NodeInstance,
    ) -> Result<Box<dyn NodeHandle>, ProvisionError>;

    /// Import a staged snapshot.
    async fn import_snapshot(
        &self,
        node: &NodeInstance,
        artifact: &Path,
        mode: ImportMode,
    ) -> Result<(), ProvisionError>;
}

/// Host port availability.
#[async_trait]
pub trait PortProbe: Send + Sync {
    /// `Ok(true)` when nothing listens on `port`; errors other than
    /// "address in use" are propagated.
    async fn is_free(&self, port: u16) -> Result<bool, ProvisionError>;
}

/// Observer of a transfer.
pub trait TransferProgress: Send + Sync {
    /// Transfer started; `total` is the declared length, if any.
    fn started(&self, total: Option<u64>);

    /// `downloaded` bytes written so far.
    fn advanced(&self, downloaded: u64);

    /// Transfer finished with `downloaded` bytes.
    fn finished(&self, downloaded: u64);
}

/// File transfer.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Fetch `url` into `dest`, resolving only once the file is fully
    /// written. Returns the number of bytes written.
    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        progress: &dyn TransferProgress,
    ) -> Result<u64, ProvisionError>;
}

/// Node RPC reads.
#[async_trait]
pub trait NodeRpc: Send + Sync {
    /// One bootstrap-status query.
    async fn bootstrap_status(&self, node: &NodeInstance) -> Result<BootstrapStatus, ProvisionError>;

    /// Protocol of the current head.
    async fn head_protocol(&self, node: &NodeInstance) -> Result<String, ProvisionError>;
}

/// The `octez-client` executable.
#[async_trait]
pub trait BakerClient: Send + Sync {
    /// Point subsequent commands at a node RPC endpoint.
    fn use_endpoint(&self, _endpoint: &str) {}

    /// Addresses the client knows about.
    async fn known_addresses(&self) -> Result<Vec<KnownAddress>, ProvisionError>;

    /// Generate a new key under `alias`.
    async fn generate_key(&self, alias: &str) -> Result<(), ProvisionError>;

    /// Import a secret key URI (`ledger://...` or `unencrypted:...`).
    async fn import_secret_key(&self, alias: &str, uri: &str) -> Result<(), ProvisionError>;

    /// Public key hash of `alias`.
    async fn show_address(&self, alias: &str) -> Result<String, ProvisionError>;

    /// Current balance of `alias`.
    async fn balance(&self, alias: &str) -> Result<Mutez, ProvisionError>;

    /// Authorize the Ledger to bake for `alias`.
    async fn setup_ledger_baking(&self, alias: &str) -> Result<(), ProvisionError>;

    /// Register `alias` as a delegate.
    async fn register_delegate(&self, alias: &str) -> Result<(), ProvisionError>;
}

/// Test-network faucet.
#[async_trait]
pub trait Faucet: Send + Sync {
    /// Send `amount` to `address`.
    async fn request(&self, network: Network, address: &str, amount: Mutez) -> Result<(), ProvisionError>;
}

/// Supervised background service creation.
#[async_trait]
pub trait ServiceRegistrar: Send + Sync {
    /// Create and start a supervised service running `node`.
    async fn register(&self, node: &NodeInstance, service_name: &str) -> Result<(), ProvisionError>;
}

/// Receiver of the provisioning result.
#[async_trait]
pub trait MonitoringHandoff: Send + Sync {
    /// Accept the provisioned node and, if set up, its baker.
    async fn hand_off(
        &self,
        node: &NodeInstance,
        baker: Option<&BakerIdentity>,
    ) -> Result<(), ProvisionError>;
}

/// Suspension between polling attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Suspend for `duration`.
    async fn sleep(&self, duration: Duration);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_choice_path() {
        let choice = DirectoryChoice {
            parent: PathBuf::from("/srv"),
            name: "octez-node-ghostnet".to_string(),
        };
        assert_eq!(choice.path(), PathBuf::from("/srv/octez-node-ghostnet"));
    }
}

//! # Bootstrap Monitor
//!
//! Polls the node until it reports itself bootstrapped, then reads the
//! active protocol from the head block.

use std::sync::Arc;

use tracing::info;

use crate::config::BootstrapConfig;
use crate::domain::{BootstrapStatus, NodeInstance, ProvisionError};
use crate::ports::{NodeRpc, Sleeper};

/// Waits for the node to sync.
pub struct BootstrapMonitor {
    config: BootstrapConfig,
    rpc: Arc<dyn NodeRpc>,
    sleeper: Arc<dyn Sleeper>,
}

impl BootstrapMonitor {
    /// Create a monitor.
    pub fn new(config: BootstrapConfig, rpc: Arc<dyn NodeRpc>, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            config,
            rpc,
            sleeper,
        }
    }

    /// Query until the node is bootstrapped. Returns how many queries
    /// reported "not yet".
    ///
    /// There is no timeout: a node that never syncs keeps this waiting.
    /// Unexpected answers fail immediately.
    pub async fn wait_until_bootstrapped(&self, node: &NodeInstance) -> Result<u32, ProvisionError> {
        let mut retries = 0u32;
        loop {
            match self.rpc.bootstrap_status(node).await? {
                BootstrapStatus::Bootstrapped => {
                    info!(retries, "[bootstrap] Node is bootstrapped");
                    return Ok(retries);
                }
                BootstrapStatus::NotBootstrapped => {
                    retries += 1;
                    info!(retries, "[bootstrap] Node not bootstrapped yet, retrying");
                    self.sleeper.sleep(self.config.retry_delay).await;
                }
                BootstrapStatus::Unexpected(answer) => {
                    return Err(ProvisionError::UnexpectedBootstrapStatus(answer));
                }
            }
        }
    }

    /// Protocol hash of the current head. Read once; failures are returned.
    pub async fn active_protocol(&self, node: &NodeInstance) -> Result<String, ProvisionError> {
        let protocol = self.rpc.head_protocol(node).await?;
        if protocol.trim().is_empty() {
            return Err(ProvisionError::Rpc("head header has an empty protocol".to_string()));
        }
        Ok(protocol)
    }

    /// Wait for bootstrap and record the active protocol on `node`.
    pub async fn run(&self, node: &mut NodeInstance) -> Result<String, ProvisionError> {
        self.wait_until_bootstrapped(node).await?;
        let protocol = self.active_protocol(node).await?;
        info!(protocol = %protocol, "[bootstrap] Active protocol");
        node.protocol_hash = Some(protocol.clone());
        Ok(protocol)
    }
}

//! # Port Negotiator
//!
//! Asks for an RPC/P2P port pair until both ports are free at the same time.
//! Every round re-asks and re-probes both ports.

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::{PortPair, ProvisionError};
use crate::ports::{PortProbe, Prompter};

/// Negotiates the node's port pair.
pub struct PortNegotiator {
    defaults: PortPair,
    prompter: Arc<dyn Prompter>,
    probe: Arc<dyn PortProbe>,
}

impl PortNegotiator {
    /// Create a negotiator offering `defaults`.
    pub fn new(defaults: PortPair, prompter: Arc<dyn Prompter>, probe: Arc<dyn PortProbe>) -> Self {
        Self {
            defaults,
            prompter,
            probe,
        }
    }

    /// Return a pair of distinct ports that were both free when probed.
    ///
    /// Probe errors other than "address in use" abort negotiation.
    pub async fn negotiate(&self) -> Result<PortPair, ProvisionError> {
        let mut round = 0u32;

        loop {
            round += 1;
            let pair = self.prompter.port_pair(self.defaults).await?;

            if !pair.is_distinct() {
                warn!(port = pair.rpc_port, round, "[ports] RPC and P2P ports must differ");
                continue;
            }

            let (rpc_free, net_free) = tokio::try_join!(
                self.probe.is_free(pair.rpc_port),
                self.probe.is_free(pair.net_port)
            )?;

            if rpc_free && net_free {
                info!(
                    rpc_port = pair.rpc_port,
                    net_port = pair.net_port,
                    "[ports] Ports available"
                );
                return Ok(pair);
            }

            warn!(
                rpc_port = pair.rpc_port,
                rpc_free,
                net_port = pair.net_port,
                net_free,
                round,
                "[ports] Port already in use, choose again"
            );
        }
    }
}

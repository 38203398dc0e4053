//! # Domain Entities
//!
//! The node being provisioned, its port pair, the baker identity and the
//! transient snapshot artifact.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::value_objects::{HistoryMode, Mutez, Network};

/// RPC and P2P ports, checked together.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortPair {
    /// Local RPC port.
    pub rpc_port: u16,
    /// P2P listening port.
    pub net_port: u16,
}

impl PortPair {
    /// Create a port pair.
    pub fn new(rpc_port: u16, net_port: u16) -> Self {
        Self { rpc_port, net_port }
    }

    /// Both ports must differ.
    pub fn is_distinct(&self) -> bool {
        self.rpc_port != self.net_port
    }
}

/// A node under provisioning.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInstance {
    /// Data directory.
    pub data_dir: PathBuf,
    /// Local RPC port.
    pub rpc_port: u16,
    /// P2P port.
    pub net_port: u16,
    /// Network joined.
    pub network: Network,
    /// History mode.
    pub history_mode: HistoryMode,
    /// Active protocol, known once the node is bootstrapped.
    pub protocol_hash: Option<String>,
}

impl NodeInstance {
    /// Create a node instance without a protocol hash.
    pub fn new(
        data_dir: PathBuf,
        ports: PortPair,
        network: Network,
        history_mode: HistoryMode,
    ) -> Self {
        Self {
            data_dir,
            rpc_port: ports.rpc_port,
            net_port: ports.net_port,
            network,
            history_mode,
            protocol_hash: None,
        }
    }

    /// The port pair this node listens on.
    pub fn ports(&self) -> PortPair {
        PortPair::new(self.rpc_port, self.net_port)
    }

    /// `--rpc-addr` value.
    pub fn rpc_addr(&self) -> String {
        format!("127.0.0.1:{}", self.rpc_port)
    }

    /// `--net-addr` value.
    pub fn net_addr(&self) -> String {
        format!("[::]:{}", self.net_port)
    }

    /// Base URL of the local RPC server.
    pub fn rpc_endpoint(&self) -> String {
        format!("http://127.0.0.1:{}", self.rpc_port)
    }
}

/// A funded baking key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BakerIdentity {
    /// Client alias.
    pub alias: String,
    /// Public key hash (`tz1...`, `tz2...`, ...).
    pub address: String,
    /// Last observed balance.
    pub balance: Mutez,
}

/// A downloaded snapshot awaiting import.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotArtifact {
    /// Network of the snapshot.
    pub network: Network,
    /// History mode of the snapshot.
    pub history_mode: HistoryMode,
    /// Bytes written to `local_path`.
    pub size_bytes: u64,
    /// Staging path.
    pub local_path: PathBuf,
}

/// An address the client already knows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KnownAddress {
    /// Client alias.
    pub alias: String,
    /// Public key hash.
    pub address: String,
}

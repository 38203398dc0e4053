//! # Baker Provisioner
//!
//! Provisions an Octez validator node end-to-end and, optionally, activates a
//! baker on it.
//!
//! ## Workflow
//!
//! ```text
//! Directory ──→ Ports ──→ Identity ──→ Snapshot ──→ Service ──→ Bootstrap ──→ Baker
//!                            │ ↑
//!                            └─┘ cleanup and retry
//! ```
//!
//! Stages run strictly in sequence. Retry loops live inside stages:
//!
//! | Stage | Loop | Bound |
//! |-------|------|-------|
//! | Ports | re-ask both ports until free | operator |
//! | Identity | poll `identity.json`, then clean and re-init | attempts per run, unbounded runs |
//! | Bootstrap | query `is_bootstrapped` | unbounded |
//! | Baker | poll balance until the minimum | unbounded |
//!
//! ## Error Classes
//!
//! - **Fatal setup**: directory deletion, config init, missing binaries
//! - **Transient**: absorbed by the loops above, logged per attempt
//! - **Operator-recoverable**: delegate registration, offered a retry
//! - **External service**: faucet, download, import; fatal, never retried
//!
//! Failures after service registration leave the node service running.
//!
//! ## Module Structure (Hexagonal Architecture)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  adapters/ - octez-node, octez-client, HTTP, sockets, terminal   │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ implements ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  ports/outbound.rs - Prompter, NodeCli, NodeRpc, BakerClient ... │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ uses ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  application/ - one service per stage, ProvisioningWorkflow      │
//! │  domain/      - NodeInstance, PortPair, Mutez, ProvisionError    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod testing;

pub use application::{Collaborators, ProvisionOutcome, ProvisioningWorkflow};
pub use config::ProvisionerConfig;
pub use domain::{ProvisionError, Stage, WorkflowError};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

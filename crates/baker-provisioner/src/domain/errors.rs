//! # Domain Errors
//!
//! Error types for the provisioning workflow.
//!
//! Errors fall into four classes: fatal setup errors, transient conditions
//! that polling loops absorb (never surfaced as errors while retrying),
//! operator-recoverable errors, and external-service errors.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use super::value_objects::{Mutez, Network};

/// Provisioning error types.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The operator declined to continue.
    #[error("Provisioning aborted by operator")]
    Aborted,

    /// An existing data directory could not be removed.
    #[error("Failed to delete existing directory {path}: {source}")]
    DirectoryDelete {
        /// Directory that was being removed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The data directory could not be created.
    #[error("Failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Directory that was being created
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Ownership of the data directory could not be changed.
    #[error("Failed to set ownership of {path}: {source}")]
    Ownership {
        /// Path whose owner was being set
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Binding a probe listener failed for a reason other than "in use".
    #[error("Port probe on {port} failed: {source}")]
    PortProbe {
        /// Port being probed
        port: u16,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// `octez-node config init` failed.
    #[error("Node configuration init failed: {0}")]
    ConfigInit(String),

    /// A child process could not be started, signalled or awaited.
    #[error("Process error ({program}): {message}")]
    Process {
        /// Program name
        program: String,
        /// What went wrong
        message: String,
    },

    /// Snapshot transfer failed.
    #[error("Snapshot download failed: {0}")]
    Download(String),

    /// Snapshot import failed.
    #[error("Snapshot import failed: {0}")]
    SnapshotImport(String),

    /// Node RPC request failed.
    #[error("Node RPC error: {0}")]
    Rpc(String),

    /// The bootstrap query returned something other than "bootstrapped" or
    /// "not yet".
    #[error("Unexpected bootstrap status: {0}")]
    UnexpectedBootstrapStatus(String),

    /// An `octez-client` command failed.
    #[error("Client command '{command}' failed: {message}")]
    Client {
        /// Command summary (never includes secrets)
        command: String,
        /// Error output
        message: String,
    },

    /// The requested faucet amount does not cover the shortfall.
    #[error("Faucet amount {requested} is below the required {shortfall}")]
    FaucetAmountTooLow {
        /// Amount requested
        requested: Mutez,
        /// Amount missing to reach the minimum balance
        shortfall: Mutez,
    },

    /// No faucet exists for the network.
    #[error("No faucet available on {0}")]
    FaucetUnavailable(Network),

    /// The faucet service failed.
    #[error("Faucet request failed: {0}")]
    Faucet(String),

    /// Delegate registration failed; the operator may fund and retry.
    #[error("Delegate registration failed: {0}")]
    DelegateRegistration(String),

    /// Service registration failed.
    #[error("Service registration failed: {0}")]
    Service(String),

    /// A required executable is not on `PATH`.
    #[error("Required executable '{0}' not found on PATH")]
    MissingBinary(String),

    /// Operator input could not be read or parsed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProvisionError {
    /// Whether the operator can fix the cause and retry the same step.
    pub fn is_operator_recoverable(&self) -> bool {
        matches!(self, ProvisionError::DelegateRegistration(_))
    }
}

/// Workflow stage, used to attribute failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// Data directory allocation.
    Directory,
    /// RPC/P2P port negotiation.
    Ports,
    /// Identity generation.
    Identity,
    /// Snapshot download and import.
    Snapshot,
    /// Background service registration.
    Service,
    /// Waiting for the node to sync.
    Bootstrap,
    /// Baking key funding and registration.
    Baker,
    /// Passing the result to monitoring.
    Handoff,
}

impl Stage {
    /// Whether the node service may already be running at this stage.
    pub fn after_service_registration(&self) -> bool {
        matches!(self, Stage::Bootstrap | Stage::Baker | Stage::Handoff)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Directory => "data directory",
            Stage::Ports => "port negotiation",
            Stage::Identity => "identity bootstrap",
            Stage::Snapshot => "snapshot import",
            Stage::Service => "service registration",
            Stage::Bootstrap => "bootstrap monitor",
            Stage::Baker => "baker activation",
            Stage::Handoff => "monitoring hand-off",
        };
        f.write_str(name)
    }
}

/// A failure attributed to the stage that produced it.
#[derive(Debug, Error)]
#[error("{stage} failed: {error}")]
pub struct WorkflowError {
    /// Failing stage
    pub stage: Stage,
    /// Underlying error
    #[source]
    pub error: ProvisionError,
}

impl WorkflowError {
    /// Attach a stage to an error.
    pub fn new(stage: Stage, error: ProvisionError) -> Self {
        Self { stage, error }
    }
}

/// Attach a stage to a `Result`.
pub trait StageContext<T> {
    /// Map the error into a [`WorkflowError`] for `stage`.
    fn at_stage(self, stage: Stage) -> Result<T, WorkflowError>;
}

impl<T> StageContext<T> for Result<T, ProvisionError> {
    fn at_stage(self, stage: Stage) -> Result<T, WorkflowError> {
        self.map_err(|error| WorkflowError::new(stage, error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_error_names_stage() {
        let err = WorkflowError::new(Stage::Snapshot, ProvisionError::Download("404".into()));
        let msg = err.to_string();
        assert!(msg.contains("snapshot import"));
        assert!(msg.contains("404"));
    }

    #[test]
    fn test_faucet_amount_error_shows_whole_tez() {
        let err = ProvisionError::FaucetAmountTooLow {
            requested: Mutez::from_tez(100),
            shortfall: Mutez::from_tez(6000),
        };
        assert!(err.to_string().contains("100 tez"));
        assert!(err.to_string().contains("6000 tez"));
    }

    #[test]
    fn test_only_registration_is_operator_recoverable() {
        assert!(ProvisionError::DelegateRegistration("low balance".into()).is_operator_recoverable());
        assert!(!ProvisionError::Faucet("down".into()).is_operator_recoverable());
        assert!(!ProvisionError::Aborted.is_operator_recoverable());
    }

    #[test]
    fn test_stage_context() {
        let result: Result<(), ProvisionError> = Err(ProvisionError::Aborted);
        let err = result.at_stage(Stage::Ports).unwrap_err();
        assert_eq!(err.stage, Stage::Ports);
        assert!(!err.stage.after_service_registration());
        assert!(Stage::Baker.after_service_registration());
    }
}

//! Application layer: one service per provisioning stage plus the workflow
//! that sequences them.

pub mod baker;
pub mod directory;
pub mod identity;
pub mod monitor;
pub mod port_negotiator;
pub mod snapshot;
pub mod workflow;

pub use baker::{BakerActivator, PreparedBaker};
pub use directory::DirectoryProvisioner;
pub use identity::{IdentityBootstrapper, IdentityReport, IdentityState};
pub use monitor::BootstrapMonitor;
pub use port_negotiator::PortNegotiator;
pub use snapshot::SnapshotPipeline;
pub use workflow::{Collaborators, ProvisionOutcome, ProvisioningWorkflow};

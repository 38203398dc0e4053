//! # Identity Bootstrapper
//!
//! Runs the node just long enough for it to write `identity.json`.
//!
//! ## State Machine
//!
//! ```text
//! InitConfig ──► RunningForIdentity ──► IdentityReady
//!      ▲                 │
//!      │           (no identity)
//!      │                 ▼
//!      └────────── CleanupAndRetry
//! ```
//!
//! The node process is stopped on every exit from `RunningForIdentity`.
//! There is no overall attempt cap; a node that never produces an identity
//! keeps the bootstrapper cycling.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::IdentityConfig;
use crate::domain::{layout, NodeInstance, ProvisionError};
use crate::ports::{NodeCli, NodeHandle, Sleeper};

/// Position in the identity state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdentityState {
    /// Write the node configuration.
    InitConfig,
    /// Node running, polling for `identity.json`.
    RunningForIdentity,
    /// Identity never appeared; remove node state and start over.
    CleanupAndRetry,
    /// `identity.json` exists and the node is stopped.
    IdentityReady,
}

/// What it took to obtain the identity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IdentityReport {
    /// `config init` invocations.
    pub config_inits: u32,
    /// Cleanup cycles performed.
    pub cleanups: u32,
}

/// Drives the node until it has an identity.
pub struct IdentityBootstrapper {
    config: IdentityConfig,
    node_cli: Arc<dyn NodeCli>,
    sleeper: Arc<dyn Sleeper>,
}

impl IdentityBootstrapper {
    /// Create a bootstrapper.
    pub fn new(config: IdentityConfig, node_cli: Arc<dyn NodeCli>, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            config,
            node_cli,
            sleeper,
        }
    }

    /// Loop until `identity.json` exists in the node's data directory.
    ///
    /// On return the node process is stopped and `config.json` is present.
    pub async fn bootstrap(&self, node: &NodeInstance) -> Result<IdentityReport, ProvisionError> {
        let mut report = IdentityReport::default();
        let mut state = IdentityState::InitConfig;

        loop {
            debug!(?state, "[identity] Entering state");
            state = match state {
                IdentityState::InitConfig => {
                    report.config_inits += 1;
                    self.node_cli.init_config(node).await.map_err(|e| match e {
                        ProvisionError::ConfigInit(_) => e,
                        other => ProvisionError::ConfigInit(other.to_string()),
                    })?;
                    IdentityState::RunningForIdentity
                }
                IdentityState::RunningForIdentity => {
                    let mut handle = self.node_cli.spawn_for_identity(node).await?;
                    info!(pid = ?handle.id(), "[identity] Node started to generate identity");

                    let found = self.await_identity(node).await;
                    self.stop(handle.as_mut()).await?;

                    if found {
                        IdentityState::IdentityReady
                    } else {
                        IdentityState::CleanupAndRetry
                    }
                }
                IdentityState::CleanupAndRetry => {
                    report.cleanups += 1;
                    let removed = layout::clean_node_state(&node.data_dir)?;
                    warn!(
                        cleanups = report.cleanups,
                        removed = ?removed,
                        "[identity] No identity produced, cleaned node state and retrying"
                    );
                    IdentityState::InitConfig
                }
                IdentityState::IdentityReady => {
                    info!(
                        config_inits = report.config_inits,
                        cleanups = report.cleanups,
                        "[identity] Identity ready"
                    );
                    return Ok(report);
                }
            };
        }
    }

    async fn await_identity(&self, node: &NodeInstance) -> bool {
        for attempt in 1..=self.config.max_attempts {
            if layout::identity_exists(&node.data_dir) {
                info!(attempt, "[identity] identity.json found");
                return true;
            }
            info!(
                attempt,
                max_attempts = self.config.max_attempts,
                "[identity] Waiting for identity.json"
            );
            self.sleeper.sleep(self.config.poll_interval).await;
        }
        layout::identity_exists(&node.data_dir)
    }

    async fn stop(&self, handle: &mut dyn NodeHandle) -> Result<(), ProvisionError> {
        handle.interrupt().await?;
        self.sleeper.sleep(self.config.settle_delay).await;
        handle.wait().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{HistoryMode, Network, PortPair};
    use crate::testing::{FakeNodeCli, LogCapture, RecordingSleeper};
    use std::time::Duration;

    fn setup(dir: &std::path::Path) -> NodeInstance {
        NodeInstance::new(
            dir.to_path_buf(),
            PortPair::new(8732, 9732),
            Network::Ghostnet,
            HistoryMode::Rolling,
        )
    }

    fn config() -> IdentityConfig {
        IdentityConfig {
            poll_interval: Duration::from_millis(1),
            max_attempts: 3,
            settle_delay: Duration::from_millis(2),
        }
    }

    #[tokio::test]
    async fn test_identity_on_first_run() {
        let tmp = tempfile::tempdir().unwrap();
        let node = setup(tmp.path());
        let cli = Arc::new(FakeNodeCli::new());
        let sleeper = Arc::new(RecordingSleeper::new());

        let report = IdentityBootstrapper::new(config(), cli.clone(), sleeper.clone())
            .bootstrap(&node)
            .await
            .unwrap();

        assert_eq!(report, IdentityReport { config_inits: 1, cleanups: 0 });
        assert!(layout::identity_exists(tmp.path()));
        assert_eq!(cli.interrupts(), 1);
        assert_eq!(cli.waits(), 1);
        assert_eq!(sleeper.count_of(Duration::from_millis(2)), 1);
    }

    #[tokio::test]
    async fn test_failed_runs_trigger_cleanup_cycles() {
        let tmp = tempfile::tempdir().unwrap();
        let node = setup(tmp.path());
        let cli = Arc::new(FakeNodeCli::new().with_identity_failures(2));
        let sleeper = Arc::new(RecordingSleeper::new());

        let report = IdentityBootstrapper::new(config(), cli.clone(), sleeper.clone())
            .bootstrap(&node)
            .await
            .unwrap();

        assert_eq!(report.cleanups, 2);
        assert_eq!(report.config_inits, 3);
        assert_eq!(cli.config_inits(), 3);
        assert_eq!(cli.spawns(), 3);
        assert_eq!(cli.interrupts(), 3);
        // Each failed run polls max_attempts times.
        assert_eq!(sleeper.count_of(Duration::from_millis(1)), 6);
    }

    #[tokio::test]
    async fn test_each_identity_poll_is_reported_at_info() {
        let logs = LogCapture::install();
        let tmp = tempfile::tempdir().unwrap();
        let node = setup(tmp.path());
        let cli = Arc::new(FakeNodeCli::new().with_identity_failures(1));

        IdentityBootstrapper::new(config(), cli, Arc::new(RecordingSleeper::new()))
            .bootstrap(&node)
            .await
            .unwrap();

        let waits = logs.lines_containing("Waiting for identity.json");
        assert_eq!(waits.len(), 3);
        assert!(waits.iter().all(|l| l.contains("INFO")));
        assert!(waits[2].contains("attempt=3"));
        assert_eq!(logs.lines_containing("identity.json found").len(), 1);
    }

    #[tokio::test]
    async fn test_ready_state_keeps_config_and_identity() {
        let tmp = tempfile::tempdir().unwrap();
        let node = setup(tmp.path());
        let cli = Arc::new(FakeNodeCli::new().with_identity_failures(1));

        IdentityBootstrapper::new(config(), cli, Arc::new(RecordingSleeper::new()))
            .bootstrap(&node)
            .await
            .unwrap();

        assert!(tmp.path().join(layout::CONFIG_FILE).exists());
        assert!(layout::identity_exists(tmp.path()));
    }

    #[tokio::test]
    async fn test_config_init_failure_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let node = setup(tmp.path());
        let cli = Arc::new(FakeNodeCli::new().failing_config_init());

        let result = IdentityBootstrapper::new(config(), cli.clone(), Arc::new(RecordingSleeper::new()))
            .bootstrap(&node)
            .await;

        assert!(matches!(result, Err(ProvisionError::ConfigInit(_))));
        assert_eq!(cli.spawns(), 0);
    }
}

//! # Provisioning Workflow
//!
//! Runs the stages strictly in order:
//!
//! ```text
//! Directory → Ports → Identity → Snapshot → Service → Bootstrap → Baker → Hand-off
//! ```
//!
//! Each stage's failure is tagged with its [`Stage`]. Nothing is rolled back
//! beyond the cleanups the stages already perform; once the service is
//! registered it is left running whatever happens later.

use std::sync::Arc;

use provision_telemetry::stage_span;
use tracing::{info, warn, Instrument};

use crate::application::baker::BakerActivator;
use crate::application::directory::{set_owner_recursive, DirectoryProvisioner};
use crate::application::identity::{IdentityBootstrapper, IdentityReport};
use crate::application::monitor::BootstrapMonitor;
use crate::application::port_negotiator::PortNegotiator;
use crate::application::snapshot::SnapshotPipeline;
use crate::config::ProvisionerConfig;
use crate::domain::{
    BakerIdentity, NodeInstance, PortPair, ProvisionError, Stage, StageContext, WorkflowError,
};
use crate::ports::{
    BakerClient, Downloader, Faucet, MonitoringHandoff, NodeCli, NodeRpc, PortProbe, Prompter,
    ServiceRegistrar, Sleeper, TransferProgress,
};

/// Every outbound dependency of the workflow.
#[derive(Clone)]
pub struct Collaborators {
    /// Operator prompts.
    pub prompter: Arc<dyn Prompter>,
    /// `octez-node`.
    pub node_cli: Arc<dyn NodeCli>,
    /// Host port checks.
    pub port_probe: Arc<dyn PortProbe>,
    /// Snapshot transfer.
    pub downloader: Arc<dyn Downloader>,
    /// Transfer progress display.
    pub progress: Arc<dyn TransferProgress>,
    /// Node RPC.
    pub rpc: Arc<dyn NodeRpc>,
    /// `octez-client`.
    pub client: Arc<dyn BakerClient>,
    /// Test-network faucet.
    pub faucet: Arc<dyn Faucet>,
    /// Background service creation.
    pub registrar: Arc<dyn ServiceRegistrar>,
    /// Result receiver.
    pub handoff: Arc<dyn MonitoringHandoff>,
    /// Clock.
    pub sleeper: Arc<dyn Sleeper>,
}

/// Result of a provisioning run.
#[derive(Clone, Debug)]
pub struct ProvisionOutcome {
    /// The provisioned node.
    pub node: NodeInstance,
    /// Registered baker, if one was set up.
    pub baker: Option<BakerIdentity>,
    /// What the identity stage needed.
    pub identity: IdentityReport,
    /// Whether a background service was registered.
    pub service_registered: bool,
}

/// End-to-end provisioning.
pub struct ProvisioningWorkflow {
    config: ProvisionerConfig,
    deps: Collaborators,
}

impl ProvisioningWorkflow {
    /// Create a workflow.
    pub fn new(config: ProvisionerConfig, deps: Collaborators) -> Self {
        Self { config, deps }
    }

    /// Run every stage. With `skip_baker` the baker question is not asked.
    pub async fn run(&self, skip_baker: bool) -> Result<ProvisionOutcome, WorkflowError> {
        let network = self.config.network;
        let history_mode = self.config.history_mode;
        info!(%network, %history_mode, "Starting node provisioning");

        let data_dir = DirectoryProvisioner::new(
            self.config.directory.clone(),
            Arc::clone(&self.deps.prompter),
        )
        .provision()
        .instrument(stage_span!("directory"))
        .await
        .at_stage(Stage::Directory)?;

        let defaults = PortPair::new(self.config.ports.default_rpc, self.config.ports.default_net);
        let ports = PortNegotiator::new(
            defaults,
            Arc::clone(&self.deps.prompter),
            Arc::clone(&self.deps.port_probe),
        )
        .negotiate()
        .instrument(stage_span!("ports"))
        .await
        .at_stage(Stage::Ports)?;

        let mut node = NodeInstance::new(data_dir, ports, network, history_mode);

        let identity = IdentityBootstrapper::new(
            self.config.identity.clone(),
            Arc::clone(&self.deps.node_cli),
            Arc::clone(&self.deps.sleeper),
        )
        .bootstrap(&node)
        .instrument(stage_span!("identity"))
        .await
        .at_stage(Stage::Identity)?;

        self.import_snapshot(&node)
            .instrument(stage_span!("snapshot", network = %network, history_mode = %history_mode))
            .await
            .at_stage(Stage::Snapshot)?;

        let service_name = self.config.service.name.clone();
        let register = self
            .deps
            .prompter
            .confirm_service_setup(&service_name)
            .await
            .at_stage(Stage::Service)?;

        if !register {
            warn!("Service setup declined, the node will not be started");
            self.hand_off(&node, None).await?;
            return Ok(ProvisionOutcome {
                node,
                baker: None,
                identity,
                service_registered: false,
            });
        }

        self.deps
            .registrar
            .register(&node, &service_name)
            .instrument(stage_span!("service", name = %service_name))
            .await
            .at_stage(Stage::Service)?;
        info!(service = %service_name, "Node service registered");

        let rpc_endpoint = node.rpc_endpoint();
        BootstrapMonitor::new(
            self.config.bootstrap.clone(),
            Arc::clone(&self.deps.rpc),
            Arc::clone(&self.deps.sleeper),
        )
        .run(&mut node)
        .instrument(stage_span!("bootstrap", rpc = %rpc_endpoint))
        .await
        .at_stage(Stage::Bootstrap)?;

        let baker = if skip_baker {
            None
        } else {
            self.deps.client.use_endpoint(&rpc_endpoint);
            self.activate_baker()
                .instrument(stage_span!("baker"))
                .await
                .at_stage(Stage::Baker)?
        };

        self.hand_off(&node, baker.as_ref()).await?;

        Ok(ProvisionOutcome {
            node,
            baker,
            identity,
            service_registered: true,
        })
    }

    async fn import_snapshot(&self, node: &NodeInstance) -> Result<(), ProvisionError> {
        let mode = self.deps.prompter.import_mode().await?;
        SnapshotPipeline::new(
            self.config.snapshot.clone(),
            Arc::clone(&self.deps.node_cli),
            Arc::clone(&self.deps.downloader),
            Arc::clone(&self.deps.progress),
        )
        .run(node, mode)
        .await?;

        // config init, the identity run and the import all wrote as this process.
        if let Some(owner) = self.config.directory.owner {
            set_owner_recursive(&node.data_dir, owner)?;
            info!(uid = owner.uid, gid = owner.gid, "[snapshot] Node data handed to directory owner");
        }
        Ok(())
    }

    async fn activate_baker(&self) -> Result<Option<BakerIdentity>, ProvisionError> {
        if !self.deps.prompter.confirm_baker_setup().await? {
            info!("Baker setup declined");
            return Ok(None);
        }

        let activator = BakerActivator::new(
            self.config.baker.clone(),
            self.config.network,
            Arc::clone(&self.deps.prompter),
            Arc::clone(&self.deps.client),
            Arc::clone(&self.deps.faucet),
            Arc::clone(&self.deps.sleeper),
        );

        let prepared = activator.prepare().await?;
        let mut identity = prepared.identity;

        if prepared.uses_ledger {
            activator.setup_signer(&identity.alias).await;
        }

        loop {
            match activator.register(&identity.alias).await {
                Ok(()) => break,
                Err(e) if e.is_operator_recoverable() => {
                    warn!(error = %e, "Delegate registration failed");
                    if !self.deps.prompter.retry_registration(&e).await? {
                        return Err(e);
                    }
                    identity.balance = activator.wait_for_balance(&identity.alias).await?;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(Some(identity))
    }

    async fn hand_off(
        &self,
        node: &NodeInstance,
        baker: Option<&BakerIdentity>,
    ) -> Result<(), WorkflowError> {
        self.deps
            .handoff
            .hand_off(node, baker)
            .instrument(stage_span!("handoff"))
            .await
            .at_stage(Stage::Handoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Ownership;
    use crate::domain::{BootstrapStatus, FundingPlan, ImportMode, KeySource, Mutez};
    use crate::testing::{
        FakeBakerClient, FakeDownloader, FakeFaucet, FakeNodeCli, FakeNodeRpc, FakePortProbe,
        FakeRegistrar, RecordingHandoff, RecordingProgress, RecordingSleeper, ScriptedPrompter,
    };
    use std::path::Path;

    struct Fakes {
        node_cli: Arc<FakeNodeCli>,
        registrar: Arc<FakeRegistrar>,
        handoff: Arc<RecordingHandoff>,
        client: Arc<FakeBakerClient>,
        rpc: Arc<FakeNodeRpc>,
    }

    fn build(
        root: &Path,
        prompter: ScriptedPrompter,
        client: FakeBakerClient,
        rpc: FakeNodeRpc,
    ) -> (ProvisioningWorkflow, Arc<ScriptedPrompter>, Fakes) {
        let mut config = ProvisionerConfig::for_testing();
        config.directory.default_parent = root.to_path_buf();
        config.snapshot.staging_path = root.join("snapshot");

        let prompter = Arc::new(prompter);
        let fakes = Fakes {
            node_cli: Arc::new(FakeNodeCli::new()),
            registrar: Arc::new(FakeRegistrar::default()),
            handoff: Arc::new(RecordingHandoff::default()),
            client: Arc::new(client),
            rpc: Arc::new(rpc),
        };
        let deps = Collaborators {
            prompter: prompter.clone(),
            node_cli: fakes.node_cli.clone(),
            port_probe: Arc::new(FakePortProbe::new()),
            downloader: Arc::new(FakeDownloader::new(b"snapshot")),
            progress: Arc::new(RecordingProgress::default()),
            rpc: fakes.rpc.clone(),
            client: fakes.client.clone(),
            faucet: Arc::new(FakeFaucet::default()),
            registrar: fakes.registrar.clone(),
            handoff: fakes.handoff.clone(),
            sleeper: Arc::new(RecordingSleeper::new()),
        };
        (ProvisioningWorkflow::new(config, deps), prompter, fakes)
    }

    fn node_answers(root: &Path) -> ScriptedPrompter {
        ScriptedPrompter::new()
            .with_directory(root, "node")
            .with_ports(8732, 9732)
            .with_import_mode(ImportMode::Fast)
    }

    #[tokio::test]
    async fn test_service_decline_stops_before_bootstrap() {
        let tmp = tempfile::tempdir().unwrap();
        let prompter = node_answers(tmp.path()).with_service_answer(false);
        let (workflow, _, fakes) = build(
            tmp.path(),
            prompter,
            FakeBakerClient::new(vec![]),
            FakeNodeRpc::new(vec![]),
        );

        let outcome = workflow.run(false).await.unwrap();

        assert!(!outcome.service_registered);
        assert!(outcome.node.protocol_hash.is_none());
        assert!(fakes.registrar.registered().is_empty());
        assert_eq!(fakes.rpc.status_queries(), 0);
        let (handed, baker) = fakes.handoff.received().unwrap();
        assert_eq!(handed.data_dir, tmp.path().join("node"));
        assert!(baker.is_none());
    }

    #[tokio::test]
    async fn test_baker_registration_retried_after_operator_confirms() {
        let tmp = tempfile::tempdir().unwrap();
        let prompter = node_answers(tmp.path())
            .with_service_answer(true)
            .with_baker_answer(true)
            .with_key_source(KeySource::Generate {
                alias: "baker".to_string(),
            })
            .with_funding_plan(FundingPlan::SelfFund)
            .with_retry_answer(true);
        let client = FakeBakerClient::new(vec![Mutez::ZERO, Mutez::from_tez(6000)])
            .with_registration_failures(1);
        let (workflow, prompter, fakes) = build(
            tmp.path(),
            prompter,
            client,
            FakeNodeRpc::new(vec![BootstrapStatus::NotBootstrapped]),
        );

        let outcome = workflow.run(false).await.unwrap();

        let baker = outcome.baker.unwrap();
        assert_eq!(baker.alias, "baker");
        assert_eq!(baker.balance, Mutez::from_tez(6000));
        assert_eq!(prompter.times_asked("retry_registration"), 1);
        let registrations = fakes
            .client
            .calls()
            .iter()
            .filter(|c| c.starts_with("register"))
            .count();
        assert_eq!(registrations, 2);
        assert!(fakes.handoff.received().unwrap().1.is_some());
    }

    #[tokio::test]
    async fn test_declined_retry_fails_baker_stage() {
        let tmp = tempfile::tempdir().unwrap();
        let prompter = node_answers(tmp.path())
            .with_service_answer(true)
            .with_baker_answer(true)
            .with_key_source(KeySource::Existing {
                alias: "baker".to_string(),
            })
            .with_retry_answer(false);
        let client = FakeBakerClient::new(vec![Mutez::from_tez(6000)])
            .with_known("baker", "tz1baker")
            .with_registration_failures(1);
        let (workflow, _, fakes) = build(tmp.path(), prompter, client, FakeNodeRpc::new(vec![]));

        let err = workflow.run(false).await.unwrap_err();

        assert_eq!(err.stage, Stage::Baker);
        assert!(err.stage.after_service_registration());
        assert!(err.error.is_operator_recoverable());
        assert_eq!(fakes.registrar.registered().len(), 1);
        assert!(fakes.handoff.received().is_none());
    }

    /// Registrar recording the owner of every data-dir entry at registration.
    #[derive(Default)]
    struct OwnerCheckingRegistrar {
        owners: parking_lot::Mutex<Vec<(std::path::PathBuf, u32, u32)>>,
    }

    fn collect_owners(path: &Path, out: &mut Vec<(std::path::PathBuf, u32, u32)>) {
        use std::os::unix::fs::MetadataExt;
        let meta = std::fs::symlink_metadata(path).unwrap();
        out.push((path.to_path_buf(), meta.uid(), meta.gid()));
        if meta.is_dir() {
            for entry in std::fs::read_dir(path).unwrap() {
                collect_owners(&entry.unwrap().path(), out);
            }
        }
    }

    #[async_trait::async_trait]
    impl ServiceRegistrar for OwnerCheckingRegistrar {
        async fn register(&self, node: &NodeInstance, _: &str) -> Result<(), ProvisionError> {
            collect_owners(&node.data_dir, &mut self.owners.lock());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_node_data_owned_by_directory_owner_before_registration() {
        let tmp = tempfile::tempdir().unwrap();
        let owner = if nix::unistd::geteuid().is_root() {
            Ownership { uid: 65534, gid: 65534 }
        } else {
            Ownership {
                uid: nix::unistd::getuid().as_raw(),
                gid: nix::unistd::getgid().as_raw(),
            }
        };
        let mut config = ProvisionerConfig::for_testing();
        config.directory.default_parent = tmp.path().to_path_buf();
        config.directory.owner = Some(owner);
        config.snapshot.staging_path = tmp.path().join("snapshot");
        let registrar = Arc::new(OwnerCheckingRegistrar::default());
        let deps = Collaborators {
            prompter: Arc::new(node_answers(tmp.path()).with_service_answer(true)),
            node_cli: Arc::new(FakeNodeCli::new()),
            port_probe: Arc::new(FakePortProbe::new()),
            downloader: Arc::new(FakeDownloader::new(b"snapshot")),
            progress: Arc::new(RecordingProgress::default()),
            rpc: Arc::new(FakeNodeRpc::new(vec![])),
            client: Arc::new(FakeBakerClient::new(vec![])),
            faucet: Arc::new(FakeFaucet::default()),
            registrar: registrar.clone(),
            handoff: Arc::new(RecordingHandoff::default()),
            sleeper: Arc::new(RecordingSleeper::new()),
        };

        ProvisioningWorkflow::new(config, deps).run(true).await.unwrap();

        let owners = registrar.owners.lock().clone();
        let data_dir = tmp.path().join("node");
        for name in ["identity.json", "config.json", "store", "context"] {
            assert!(
                owners.iter().any(|(p, _, _)| *p == data_dir.join(name)),
                "{name} missing at registration"
            );
        }
        for (path, uid, gid) in owners {
            assert_eq!((uid, gid), (owner.uid, owner.gid), "{}", path.display());
        }
    }

    #[tokio::test]
    async fn test_config_init_failure_is_attributed_to_identity() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = ProvisionerConfig::for_testing();
        config.directory.default_parent = tmp.path().to_path_buf();
        let prompter = Arc::new(
            ScriptedPrompter::new()
                .with_directory(tmp.path(), "node")
                .with_ports(8732, 9732),
        );
        let deps = Collaborators {
            prompter: prompter.clone(),
            node_cli: Arc::new(FakeNodeCli::new().failing_config_init()),
            port_probe: Arc::new(FakePortProbe::new()),
            downloader: Arc::new(FakeDownloader::new(b"")),
            progress: Arc::new(RecordingProgress::default()),
            rpc: Arc::new(FakeNodeRpc::new(vec![])),
            client: Arc::new(FakeBakerClient::new(vec![])),
            faucet: Arc::new(FakeFaucet::default()),
            registrar: Arc::new(FakeRegistrar::default()),
            handoff: Arc::new(RecordingHandoff::default()),
            sleeper: Arc::new(RecordingSleeper::new()),
        };

        let err = ProvisioningWorkflow::new(config, deps).run(true).await.unwrap_err();

        assert_eq!(err.stage, Stage::Identity);
        assert!(!err.stage.after_service_registration());
        assert!(err.to_string().contains("identity bootstrap failed"));
        assert_eq!(prompter.times_asked("import_mode"), 0);
    }
}

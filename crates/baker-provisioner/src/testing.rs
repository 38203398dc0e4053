//! Centralized Testing Utilities
//!
//! Scripted fakes for every outbound port. Each fake records what it was
//! asked so tests can assert on call counts and ordering, and none of them
//! touch the network or spawn processes.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::domain::{
    layout, BakerIdentity, BootstrapStatus, FundingPlan, ImportMode, KeySource, KnownAddress,
    Mutez, Network, NodeInstance, PortPair, ProvisionError,
};
use crate::ports::{
    BakerClient, DirectoryChoice, Downloader, Faucet, MonitoringHandoff, NodeCli, NodeHandle,
    NodeRpc, PortProbe, Prompter, ServiceRegistrar, Sleeper, TransferProgress,
};

fn pop<T>(queue: &Mutex<VecDeque<T>>, question: &str) -> Result<T, ProvisionError> {
    queue
        .lock()
        .pop_front()
        .ok_or_else(|| ProvisionError::InvalidInput(format!("no scripted answer for {}", question)))
}

// =============================================================================
// Prompter
// =============================================================================

/// Prompter answering from pre-loaded queues.
///
/// A question with an empty queue fails with `InvalidInput`, so a test
/// notices when the workflow asks more than expected.
#[derive(Default)]
pub struct ScriptedPrompter {
    directories: Mutex<VecDeque<DirectoryChoice>>,
    delete_answers: Mutex<VecDeque<bool>>,
    another_answers: Mutex<VecDeque<bool>>,
    port_pairs: Mutex<VecDeque<PortPair>>,
    import_modes: Mutex<VecDeque<ImportMode>>,
    service_answers: Mutex<VecDeque<bool>>,
    baker_answers: Mutex<VecDeque<bool>>,
    key_sources: Mutex<VecDeque<KeySource>>,
    funding_plans: Mutex<VecDeque<FundingPlan>>,
    retry_answers: Mutex<VecDeque<bool>>,
    asked: Mutex<Vec<&'static str>>,
}

impl ScriptedPrompter {
    /// Empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a directory answer.
    pub fn with_directory(self, parent: impl Into<PathBuf>, name: &str) -> Self {
        self.directories.lock().push_back(DirectoryChoice {
            parent: parent.into(),
            name: name.to_string(),
        });
        self
    }

    /// Queue a delete confirmation answer.
    pub fn with_delete_answer(self, answer: bool) -> Self {
        self.delete_answers.lock().push_back(answer);
        self
    }

    /// Queue a "choose another directory" answer.
    pub fn with_another_directory_answer(self, answer: bool) -> Self {
        self.another_answers.lock().push_back(answer);
        self
    }

    /// Queue a port pair.
    pub fn with_ports(self, rpc_port: u16, net_port: u16) -> Self {
        self.port_pairs.lock().push_back(PortPair::new(rpc_port, net_port));
        self
    }

    /// Queue an import mode.
    pub fn with_import_mode(self, mode: ImportMode) -> Self {
        self.import_modes.lock().push_back(mode);
        self
    }

    /// Queue a service setup answer.
    pub fn with_service_answer(self, answer: bool) -> Self {
        self.service_answers.lock().push_back(answer);
        self
    }

    /// Queue a baker setup answer.
    pub fn with_baker_answer(self, answer: bool) -> Self {
        self.baker_answers.lock().push_back(answer);
        self
    }

    /// Queue a key source.
    pub fn with_key_source(self, source: KeySource) -> Self {
        self.key_sources.lock().push_back(source);
        self
    }

    /// Queue a funding plan.
    pub fn with_funding_plan(self, plan: FundingPlan) -> Self {
        self.funding_plans.lock().push_back(plan);
        self
    }

    /// Queue a registration retry answer.
    pub fn with_retry_answer(self, answer: bool) -> Self {
        self.retry_answers.lock().push_back(answer);
        self
    }

    /// How many times `question` was asked.
    pub fn times_asked(&self, question: &str) -> usize {
        self.asked.lock().iter().filter(|q| **q == question).count()
    }

    /// Questions in the order they were asked.
    pub fn questions(&self) -> Vec<&'static str> {
        self.asked.lock().clone()
    }

    fn record(&self, question: &'static str) {
        self.asked.lock().push(question);
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn data_directory(&self, _default: &DirectoryChoice) -> Result<DirectoryChoice, ProvisionError> {
        self.record("data_directory");
        pop(&self.directories, "data_directory")
    }

    async fn confirm_delete(&self, _path: &Path) -> Result<bool, ProvisionError> {
        self.record("confirm_delete");
        pop(&self.delete_answers, "confirm_delete")
    }

    async fn choose_another_directory(&self) -> Result<bool, ProvisionError> {
        self.record("choose_another_directory");
        pop(&self.another_answers, "choose_another_directory")
    }

    async fn port_pair(&self, _default: PortPair) -> Result<PortPair, ProvisionError> {
        self.record("port_pair");
        pop(&self.port_pairs, "port_pair")
    }

    async fn import_mode(&self) -> Result<ImportMode, ProvisionError> {
        self.record("import_mode");
        pop(&self.import_modes, "import_mode")
    }

    async fn confirm_service_setup(&self, _service_name: &str) -> Result<bool, ProvisionError> {
        self.record("confirm_service_setup");
        pop(&self.service_answers, "confirm_service_setup")
    }

    async fn confirm_baker_setup(&self) -> Result<bool, ProvisionError> {
        self.record("confirm_baker_setup");
        pop(&self.baker_answers, "confirm_baker_setup")
    }

    async fn key_source(&self, _known: &[KnownAddress]) -> Result<KeySource, ProvisionError> {
        self.record("key_source");
        pop(&self.key_sources, "key_source")
    }

    async fn funding_plan(
        &self,
        _network: Network,
        _address: &str,
        _shortfall: Mutez,
    ) -> Result<FundingPlan, ProvisionError> {
        self.record("funding_plan");
        pop(&self.funding_plans, "funding_plan")
    }

    async fn retry_registration(&self, _error: &ProvisionError) -> Result<bool, ProvisionError> {
        self.record("retry_registration");
        pop(&self.retry_answers, "retry_registration")
    }
}

// =============================================================================
// Node executable
// =============================================================================

/// Shared counters of a [`FakeNodeHandle`].
#[derive(Debug, Default)]
pub struct HandleLog {
    /// Interrupts sent.
    pub interrupts: AtomicU32,
    /// Waits completed.
    pub waits: AtomicU32,
}

/// Handle returned by [`FakeNodeCli::spawn_for_identity`].
pub struct FakeNodeHandle {
    log: Arc<HandleLog>,
}

#[async_trait]
impl NodeHandle for FakeNodeHandle {
    fn id(&self) -> Option<u32> {
        Some(4242)
    }

    async fn interrupt(&mut self) -> Result<(), ProvisionError> {
        self.log.interrupts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn wait(&mut self) -> Result<(), ProvisionError> {
        self.log.waits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// One recorded snapshot import.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportRecord {
    /// Artifact passed to the import.
    pub artifact: PathBuf,
    /// Mode requested.
    pub mode: ImportMode,
    /// Whether the artifact existed when the import ran.
    pub artifact_present: bool,
    /// Whether stale chain state was absent when the import ran.
    pub chain_state_clean: bool,
}

/// Node executable that writes `config.json` and, after a configurable
/// number of failed runs, `identity.json`.
#[derive(Default)]
pub struct FakeNodeCli {
    identity_failures: u32,
    fail_config_init: bool,
    fail_import: bool,
    config_inits: AtomicU32,
    spawns: AtomicU32,
    handles: Arc<HandleLog>,
    imports: Mutex<Vec<ImportRecord>>,
}

impl FakeNodeCli {
    /// Node that produces its identity on the first run.
    pub fn new() -> Self {
        Self::default()
    }

    /// The first `failures` runs never produce an identity.
    pub fn with_identity_failures(mut self, failures: u32) -> Self {
        self.identity_failures = failures;
        self
    }

    /// `config init` always fails.
    pub fn failing_config_init(mut self) -> Self {
        self.fail_config_init = true;
        self
    }

    /// `snapshot import` always fails.
    pub fn failing_import(mut self) -> Self {
        self.fail_import = true;
        self
    }

    /// `config init` invocations.
    pub fn config_inits(&self) -> u32 {
        self.config_inits.load(Ordering::SeqCst)
    }

    /// `run` invocations.
    pub fn spawns(&self) -> u32 {
        self.spawns.load(Ordering::SeqCst)
    }

    /// Interrupts sent to spawned processes.
    pub fn interrupts(&self) -> u32 {
        self.handles.interrupts.load(Ordering::SeqCst)
    }

    /// Waits on spawned processes.
    pub fn waits(&self) -> u32 {
        self.handles.waits.load(Ordering::SeqCst)
    }

    /// Recorded imports.
    pub fn imports(&self) -> Vec<ImportRecord> {
        self.imports.lock().clone()
    }
}

#[async_trait]
impl NodeCli for FakeNodeCli {
    async fn init_config(&self, node: &NodeInstance) -> Result<(), ProvisionError> {
        self.config_inits.fetch_add(1, Ordering::SeqCst);
        if self.fail_config_init {
            return Err(ProvisionError::ConfigInit("simulated failure".to_string()));
        }
        std::fs::write(node.data_dir.join(layout::CONFIG_FILE), "{}")?;
        Ok(())
    }

    async fn spawn_for_identity(
        &self,
        node: &NodeInstance,
    ) -> Result<Box<dyn NodeHandle>, ProvisionError> {
        let run = self.spawns.fetch_add(1, Ordering::SeqCst) + 1;

        std::fs::create_dir_all(node.data_dir.join(layout::STORE_DIR))?;
        std::fs::write(node.data_dir.join(layout::LOCK_FILE), "")?;
        if run > self.identity_failures {
            std::fs::write(layout::identity_path(&node.data_dir), "{\"peer_id\":\"idt\"}")?;
        }

        Ok(Box::new(FakeNodeHandle {
            log: Arc::clone(&self.handles),
        }))
    }

    async fn import_snapshot(
        &self,
        node: &NodeInstance,
        artifact: &Path,
        mode: ImportMode,
    ) -> Result<(), ProvisionError> {
        let chain_state_clean = !node.data_dir.join(layout::STORE_DIR).exists()
            && !node.data_dir.join(layout::CONTEXT_DIR).exists()
            && !node.data_dir.join(layout::LOCK_FILE).exists();
        self.imports.lock().push(ImportRecord {
            artifact: artifact.to_path_buf(),
            mode,
            artifact_present: artifact.is_file(),
            chain_state_clean,
        });
        if self.fail_import {
            return Err(ProvisionError::SnapshotImport("corrupted archive".to_string()));
        }
        std::fs::create_dir_all(node.data_dir.join(layout::STORE_DIR))?;
        std::fs::create_dir_all(node.data_dir.join(layout::CONTEXT_DIR))?;
        Ok(())
    }
}

// =============================================================================
// Host ports
// =============================================================================

/// Port probe backed by a set of busy ports.
#[derive(Default)]
pub struct FakePortProbe {
    busy: Mutex<HashSet<u16>>,
    broken: HashSet<u16>,
    probed: Mutex<Vec<u16>>,
}

impl FakePortProbe {
    /// All ports free.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `port` as in use.
    pub fn with_busy(self, port: u16) -> Self {
        self.busy.lock().insert(port);
        self
    }

    /// Probing `port` fails with a non-"in use" error.
    pub fn with_broken(mut self, port: u16) -> Self {
        self.broken.insert(port);
        self
    }

    /// Release a busy port.
    pub fn release(&self, port: u16) {
        self.busy.lock().remove(&port);
    }

    /// Ports probed so far, in order.
    pub fn probed(&self) -> Vec<u16> {
        self.probed.lock().clone()
    }
}

#[async_trait]
impl PortProbe for FakePortProbe {
    async fn is_free(&self, port: u16) -> Result<bool, ProvisionError> {
        self.probed.lock().push(port);
        if self.broken.contains(&port) {
            return Err(ProvisionError::PortProbe {
                port,
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "permission denied"),
            });
        }
        Ok(!self.busy.lock().contains(&port))
    }
}

// =============================================================================
// Transfer
// =============================================================================

/// Downloader writing fixed bytes to the destination.
pub struct FakeDownloader {
    payload: Vec<u8>,
    declared_total: Option<u64>,
    fail: bool,
    urls: Mutex<Vec<String>>,
}

impl FakeDownloader {
    /// Downloader producing `payload`.
    pub fn new(payload: &[u8]) -> Self {
        Self {
            payload: payload.to_vec(),
            declared_total: Some(payload.len() as u64),
            fail: false,
            urls: Mutex::new(Vec::new()),
        }
    }

    /// Pretend the server sent no content length.
    pub fn without_length(mut self) -> Self {
        self.declared_total = None;
        self
    }

    /// Every transfer fails.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// URLs fetched.
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }
}

#[async_trait]
impl Downloader for FakeDownloader {
    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        progress: &dyn TransferProgress,
    ) -> Result<u64, ProvisionError> {
        self.urls.lock().push(url.to_string());
        if self.fail {
            return Err(ProvisionError::Download("connection reset".to_string()));
        }
        progress.started(self.declared_total);
        std::fs::write(dest, &self.payload)?;
        let written = self.payload.len() as u64;
        progress.advanced(written);
        progress.finished(written);
        Ok(written)
    }
}

/// Progress observer keeping every update.
#[derive(Default)]
pub struct RecordingProgress {
    /// Declared totals passed to `started`.
    pub totals: Mutex<Vec<Option<u64>>>,
    /// Byte counts passed to `advanced`.
    pub updates: Mutex<Vec<u64>>,
    /// Byte counts passed to `finished`.
    pub finished: Mutex<Vec<u64>>,
}

impl TransferProgress for RecordingProgress {
    fn started(&self, total: Option<u64>) {
        self.totals.lock().push(total);
    }

    fn advanced(&self, downloaded: u64) {
        self.updates.lock().push(downloaded);
    }

    fn finished(&self, downloaded: u64) {
        self.finished.lock().push(downloaded);
    }
}

// =============================================================================
// Node RPC
// =============================================================================

/// RPC answering bootstrap queries from a script.
pub struct FakeNodeRpc {
    statuses: Mutex<VecDeque<BootstrapStatus>>,
    protocol: Option<String>,
    status_queries: AtomicU32,
    protocol_queries: AtomicU32,
}

impl FakeNodeRpc {
    /// RPC returning `statuses` in order, then `Bootstrapped` forever.
    pub fn new(statuses: Vec<BootstrapStatus>) -> Self {
        Self {
            statuses: Mutex::new(statuses.into()),
            protocol: Some("PtParisBxoLz5gzMmn3d9WBQNoPSZakgnkMC2VNuQ3KXfUtUQeZ".to_string()),
            status_queries: AtomicU32::new(0),
            protocol_queries: AtomicU32::new(0),
        }
    }

    /// Protocol reads fail.
    pub fn without_protocol(mut self) -> Self {
        self.protocol = None;
        self
    }

    /// Bootstrap queries issued.
    pub fn status_queries(&self) -> u32 {
        self.status_queries.load(Ordering::SeqCst)
    }

    /// Protocol queries issued.
    pub fn protocol_queries(&self) -> u32 {
        self.protocol_queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NodeRpc for FakeNodeRpc {
    async fn bootstrap_status(&self, _node: &NodeInstance) -> Result<BootstrapStatus, ProvisionError> {
        self.status_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .statuses
            .lock()
            .pop_front()
            .unwrap_or(BootstrapStatus::Bootstrapped))
    }

    async fn head_protocol(&self, _node: &NodeInstance) -> Result<String, ProvisionError> {
        self.protocol_queries.fetch_add(1, Ordering::SeqCst);
        self.protocol
            .clone()
            .ok_or_else(|| ProvisionError::Rpc("connection refused".to_string()))
    }
}

// =============================================================================
// Client, faucet, registrar, hand-off
// =============================================================================

/// Client with a scripted balance sequence; the last balance repeats.
pub struct FakeBakerClient {
    known: Vec<KnownAddress>,
    balances: Mutex<VecDeque<Mutez>>,
    last_balance: Mutex<Mutez>,
    registration_failures: AtomicU32,
    calls: Mutex<Vec<String>>,
}

impl FakeBakerClient {
    /// Client reporting `balances` in order.
    pub fn new(balances: Vec<Mutez>) -> Self {
        Self {
            known: Vec::new(),
            balances: Mutex::new(balances.into()),
            last_balance: Mutex::new(Mutez::ZERO),
            registration_failures: AtomicU32::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Add a known address.
    pub fn with_known(mut self, alias: &str, address: &str) -> Self {
        self.known.push(KnownAddress {
            alias: alias.to_string(),
            address: address.to_string(),
        });
        self
    }

    /// The first `count` registrations fail.
    pub fn with_registration_failures(self, count: u32) -> Self {
        self.registration_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Commands issued, as short strings.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Number of balance reads.
    pub fn balance_reads(&self) -> usize {
        self.calls.lock().iter().filter(|c| c.starts_with("balance")).count()
    }
}

#[async_trait]
impl BakerClient for FakeBakerClient {
    async fn known_addresses(&self) -> Result<Vec<KnownAddress>, ProvisionError> {
        self.calls.lock().push("known_addresses".to_string());
        Ok(self.known.clone())
    }

    async fn generate_key(&self, alias: &str) -> Result<(), ProvisionError> {
        self.calls.lock().push(format!("generate {}", alias));
        Ok(())
    }

    async fn import_secret_key(&self, alias: &str, uri: &str) -> Result<(), ProvisionError> {
        let scheme = uri.split(':').next().unwrap_or_default();
        self.calls.lock().push(format!("import {} {}", alias, scheme));
        Ok(())
    }

    async fn show_address(&self, alias: &str) -> Result<String, ProvisionError> {
        self.calls.lock().push(format!("show {}", alias));
        Ok(self
            .known
            .iter()
            .find(|k| k.alias == alias)
            .map(|k| k.address.clone())
            .unwrap_or_else(|| "tz1burnburnburnburnburnburnburjAYjjX".to_string()))
    }

    async fn balance(&self, alias: &str) -> Result<Mutez, ProvisionError> {
        self.calls.lock().push(format!("balance {}", alias));
        let mut last = self.last_balance.lock();
        if let Some(next) = self.balances.lock().pop_front() {
            *last = next;
        }
        Ok(*last)
    }

    async fn setup_ledger_baking(&self, alias: &str) -> Result<(), ProvisionError> {
        self.calls.lock().push(format!("setup_ledger {}", alias));
        Ok(())
    }

    async fn register_delegate(&self, alias: &str) -> Result<(), ProvisionError> {
        self.calls.lock().push(format!("register {}", alias));
        let remaining = self.registration_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.registration_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ProvisionError::Client {
                command: "register key as delegate".to_string(),
                message: "Balance too low".to_string(),
            });
        }
        Ok(())
    }
}

/// Faucet recording requests.
#[derive(Default)]
pub struct FakeFaucet {
    requests: Mutex<Vec<(String, Mutez)>>,
}

impl FakeFaucet {
    /// Requests received.
    pub fn requests(&self) -> Vec<(String, Mutez)> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Faucet for FakeFaucet {
    async fn request(&self, _network: Network, address: &str, amount: Mutez) -> Result<(), ProvisionError> {
        self.requests.lock().push((address.to_string(), amount));
        Ok(())
    }
}

/// Registrar recording registrations.
#[derive(Default)]
pub struct FakeRegistrar {
    registered: Mutex<Vec<(PathBuf, String)>>,
}

impl FakeRegistrar {
    /// `(data_dir, service_name)` pairs registered.
    pub fn registered(&self) -> Vec<(PathBuf, String)> {
        self.registered.lock().clone()
    }
}

#[async_trait]
impl ServiceRegistrar for FakeRegistrar {
    async fn register(&self, node: &NodeInstance, service_name: &str) -> Result<(), ProvisionError> {
        self.registered
            .lock()
            .push((node.data_dir.clone(), service_name.to_string()));
        Ok(())
    }
}

/// Hand-off keeping the last result.
#[derive(Default)]
pub struct RecordingHandoff {
    received: Mutex<Option<(NodeInstance, Option<BakerIdentity>)>>,
}

impl RecordingHandoff {
    /// Last hand-off, if any.
    pub fn received(&self) -> Option<(NodeInstance, Option<BakerIdentity>)> {
        self.received.lock().clone()
    }
}

#[async_trait]
impl MonitoringHandoff for RecordingHandoff {
    async fn hand_off(
        &self,
        node: &NodeInstance,
        baker: Option<&BakerIdentity>,
    ) -> Result<(), ProvisionError> {
        *self.received.lock() = Some((node.clone(), baker.cloned()));
        Ok(())
    }
}

// =============================================================================
// Clock
// =============================================================================

/// Sleeper that returns immediately and records each requested delay.
#[derive(Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    /// New sleeper.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sleeps.
    pub fn count(&self) -> usize {
        self.sleeps.lock().len()
    }

    /// Number of sleeps of exactly `duration`.
    pub fn count_of(&self, duration: Duration) -> usize {
        self.sleeps.lock().iter().filter(|d| **d == duration).count()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().push(duration);
        tokio::task::yield_now().await;
    }
}

// =============================================================================
// Log capture
// =============================================================================

/// Collects formatted `INFO`-and-above events for the current thread, the
/// same level the default filter lets through.
#[cfg(test)]
pub(crate) struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
    _guard: tracing::subscriber::DefaultGuard,
}

#[cfg(test)]
struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

#[cfg(test)]
impl std::io::Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
impl LogCapture {
    /// Install a thread-local subscriber until the capture is dropped.
    pub(crate) fn install() -> Self {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let writer = Arc::clone(&buffer);
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || CaptureWriter(Arc::clone(&writer)))
            .finish();
        Self {
            buffer,
            _guard: tracing::subscriber::set_default(subscriber),
        }
    }

    /// Captured lines containing `needle`.
    pub(crate) fn lines_containing(&self, needle: &str) -> Vec<String> {
        String::from_utf8_lossy(&self.buffer.lock())
            .lines()
            .filter(|line| line.contains(needle))
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_prompter_fails_when_exhausted() {
        let prompter = ScriptedPrompter::new().with_ports(8732, 9732);
        assert!(prompter.port_pair(PortPair::new(1, 2)).await.is_ok());
        assert!(prompter.port_pair(PortPair::new(1, 2)).await.is_err());
        assert_eq!(prompter.times_asked("port_pair"), 2);
    }

    #[tokio::test]
    async fn test_fake_client_repeats_last_balance() {
        let client = FakeBakerClient::new(vec![Mutez::from_tez(1), Mutez::from_tez(2)]);
        assert_eq!(client.balance("b").await.unwrap(), Mutez::from_tez(1));
        assert_eq!(client.balance("b").await.unwrap(), Mutez::from_tez(2));
        assert_eq!(client.balance("b").await.unwrap(), Mutez::from_tez(2));
        assert_eq!(client.balance_reads(), 3);
    }
}

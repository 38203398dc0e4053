//! # Baker Activator
//!
//! Acquires a baking key, funds it to the minimum balance and registers it
//! as a delegate.
//!
//! ## Phases
//!
//! 1. Key acquisition, dispatched once over [`KeySource`]
//! 2. Funding, dispatched once over [`FundingPlan`], followed by an unbounded
//!    balance wait
//! 3. Optional Ledger signer setup, then delegate registration
//!
//! Registration failures are returned as
//! [`ProvisionError::DelegateRegistration`]; retrying is the caller's call.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::BakerConfig;
use crate::domain::{BakerIdentity, FundingPlan, KeySource, Mutez, Network, ProvisionError};
use crate::ports::{BakerClient, Faucet, Prompter, Sleeper};

const LEDGER_SCHEME: &str = "ledger://";
const UNENCRYPTED_SCHEME: &str = "unencrypted:";

/// A funded key ready for registration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedBaker {
    /// Funded identity.
    pub identity: BakerIdentity,
    /// Whether the key lives on a Ledger.
    pub uses_ledger: bool,
}

/// Baking key setup.
pub struct BakerActivator {
    config: BakerConfig,
    network: Network,
    prompter: Arc<dyn Prompter>,
    client: Arc<dyn BakerClient>,
    faucet: Arc<dyn Faucet>,
    sleeper: Arc<dyn Sleeper>,
}

impl BakerActivator {
    /// Create an activator for `network`.
    pub fn new(
        config: BakerConfig,
        network: Network,
        prompter: Arc<dyn Prompter>,
        client: Arc<dyn BakerClient>,
        faucet: Arc<dyn Faucet>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            config,
            network,
            prompter,
            client,
            faucet,
            sleeper,
        }
    }

    /// Balance the key must reach before registration.
    pub fn minimum_balance(&self) -> Mutez {
        self.config.minimum_balance
    }

    /// Acquire and fund a key.
    pub async fn prepare(&self) -> Result<PreparedBaker, ProvisionError> {
        let known = self.client.known_addresses().await?;
        let source = self.prompter.key_source(&known).await?;
        let alias = self.acquire_key(&source).await?;

        let address = self.client.show_address(&alias).await?;
        let balance = self.client.balance(&alias).await?;
        info!(%alias, %address, %balance, "[baker] Key acquired");

        let balance = self.fund(&alias, &address, balance).await?;

        Ok(PreparedBaker {
            identity: BakerIdentity {
                alias,
                address,
                balance,
            },
            uses_ledger: source.is_ledger(),
        })
    }

    /// Run the chosen acquisition path and return the alias.
    pub async fn acquire_key(&self, source: &KeySource) -> Result<String, ProvisionError> {
        let alias = source.alias().trim();
        if alias.is_empty() {
            return Err(ProvisionError::InvalidInput("key alias must not be empty".to_string()));
        }

        match source {
            KeySource::Existing { .. } => {
                info!(%alias, "[baker] Using existing key");
            }
            KeySource::Generate { .. } => {
                info!(%alias, "[baker] Generating new key");
                self.client.generate_key(alias).await?;
            }
            KeySource::Ledger { device_path, .. } => {
                info!(%alias, "[baker] Importing key from Ledger");
                self.client
                    .import_secret_key(alias, &ledger_uri(device_path))
                    .await?;
            }
            KeySource::SecretKey { secret, .. } => {
                info!(%alias, "[baker] Importing secret key");
                self.client
                    .import_secret_key(alias, &unencrypted_uri(secret))
                    .await?;
            }
        }

        Ok(alias.to_string())
    }

    /// Bring the balance of `alias` up to the minimum. Returns the balance
    /// observed once the minimum is met.
    pub async fn fund(&self, alias: &str, address: &str, balance: Mutez) -> Result<Mutez, ProvisionError> {
        let shortfall = self.config.minimum_balance.saturating_sub(balance);
        if shortfall == Mutez::ZERO {
            return Ok(balance);
        }

        loop {
            let plan = self
                .prompter
                .funding_plan(self.network, address, shortfall)
                .await?;

            match self.apply_plan(&plan, address, shortfall).await {
                Ok(()) => break,
                Err(e @ (ProvisionError::FaucetAmountTooLow { .. } | ProvisionError::FaucetUnavailable(_))) => {
                    warn!(error = %e, "[baker] Funding choice rejected");
                }
                Err(e) => return Err(e),
            }
        }

        self.wait_for_balance(alias).await
    }

    async fn apply_plan(&self, plan: &FundingPlan, address: &str, shortfall: Mutez) -> Result<(), ProvisionError> {
        match plan {
            FundingPlan::SelfFund => {
                info!(%address, %shortfall, "[baker] Send funds to the baker address");
                Ok(())
            }
            FundingPlan::Faucet { amount } => {
                if !self.network.has_faucet() {
                    return Err(ProvisionError::FaucetUnavailable(self.network));
                }
                if *amount < shortfall {
                    return Err(ProvisionError::FaucetAmountTooLow {
                        requested: *amount,
                        shortfall,
                    });
                }
                info!(%address, %amount, "[baker] Requesting funds from faucet");
                self.faucet.request(self.network, address, *amount).await
            }
        }
    }

    /// Poll the balance of `alias` until it reaches the minimum.
    ///
    /// Never times out. Stops polling as soon as the minimum is observed.
    pub async fn wait_for_balance(&self, alias: &str) -> Result<Mutez, ProvisionError> {
        let minimum = self.config.minimum_balance;
        let mut polls = 0u32;
        loop {
            polls += 1;
            let balance = self.client.balance(alias).await?;
            if balance >= minimum {
                info!(%balance, polls, "[baker] Minimum balance reached");
                return Ok(balance);
            }
            info!(%balance, %minimum, polls, "[baker] Waiting for funds");
            self.sleeper.sleep(self.config.balance_poll_interval).await;
        }
    }

    /// Ask the Ledger to bake for `alias`. Failures are logged only; the
    /// device needs a physical confirmation the workflow cannot observe.
    pub async fn setup_signer(&self, alias: &str) {
        info!(%alias, "[baker] Confirm baking authorization on the Ledger");
        if let Err(e) = self.client.setup_ledger_baking(alias).await {
            warn!(%alias, error = %e, "[baker] Ledger baking setup failed");
        }
    }

    /// Register `alias` as a delegate once.
    pub async fn register(&self, alias: &str) -> Result<(), ProvisionError> {
        self.client.register_delegate(alias).await.map_err(|e| match e {
            ProvisionError::Client { message, .. } => ProvisionError::DelegateRegistration(message),
            ProvisionError::DelegateRegistration(_) => e,
            other => ProvisionError::DelegateRegistration(other.to_string()),
        })?;
        info!(%alias, "[baker] Registered as delegate");
        Ok(())
    }
}

fn ledger_uri(device_path: &str) -> String {
    let path = device_path.trim();
    if path.starts_with(LEDGER_SCHEME) {
        path.to_string()
    } else {
        format!("{}{}", LEDGER_SCHEME, path)
    }
}

fn unencrypted_uri(secret: &str) -> String {
    let secret = secret.trim();
    if secret.starts_with(UNENCRYPTED_SCHEME) {
        secret.to_string()
    } else {
        format!("{}{}", UNENCRYPTED_SCHEME, secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBakerClient, FakeFaucet, RecordingSleeper, ScriptedPrompter};
    use std::time::Duration;

    struct Harness {
        prompter: Arc<ScriptedPrompter>,
        client: Arc<FakeBakerClient>,
        faucet: Arc<FakeFaucet>,
        sleeper: Arc<RecordingSleeper>,
        activator: BakerActivator,
    }

    fn harness(network: Network, prompter: ScriptedPrompter, client: FakeBakerClient) -> Harness {
        let prompter = Arc::new(prompter);
        let client = Arc::new(client);
        let faucet = Arc::new(FakeFaucet::default());
        let sleeper = Arc::new(RecordingSleeper::new());
        let config = BakerConfig {
            minimum_balance: Mutez::from_tez(6000),
            balance_poll_interval: Duration::from_millis(10),
        };
        let activator = BakerActivator::new(
            config,
            network,
            prompter.clone(),
            client.clone(),
            faucet.clone(),
            sleeper.clone(),
        );
        Harness {
            prompter,
            client,
            faucet,
            sleeper,
            activator,
        }
    }

    fn generate(alias: &str) -> KeySource {
        KeySource::Generate {
            alias: alias.to_string(),
        }
    }

    #[tokio::test]
    async fn test_self_fund_stops_polling_at_threshold() {
        let h = harness(
            Network::Ghostnet,
            ScriptedPrompter::new()
                .with_key_source(generate("baker"))
                .with_funding_plan(FundingPlan::SelfFund),
            FakeBakerClient::new(vec![
                Mutez::ZERO,
                Mutez::ZERO,
                Mutez::from_tez(2500),
                Mutez::from_tez(6000),
                Mutez::from_tez(9000),
            ]),
        );

        let prepared = h.activator.prepare().await.unwrap();

        assert_eq!(prepared.identity.balance, Mutez::from_tez(6000));
        // One read to compute the shortfall, three in the wait loop.
        assert_eq!(h.client.balance_reads(), 4);
        assert_eq!(h.sleeper.count_of(Duration::from_millis(10)), 2);
        assert!(h.client.calls().contains(&"generate baker".to_string()));
    }

    #[tokio::test]
    async fn test_sufficient_balance_skips_funding() {
        let h = harness(
            Network::Mainnet,
            ScriptedPrompter::new().with_key_source(KeySource::Existing {
                alias: "baker".to_string(),
            }),
            FakeBakerClient::new(vec![Mutez::from_tez(7000)]).with_known("baker", "tz1known"),
        );

        let prepared = h.activator.prepare().await.unwrap();

        assert_eq!(prepared.identity.address, "tz1known");
        assert_eq!(h.prompter.times_asked("funding_plan"), 0);
        assert_eq!(h.client.balance_reads(), 1);
    }

    #[tokio::test]
    async fn test_faucet_amount_below_shortfall_is_rejected() {
        let h = harness(Network::Ghostnet, ScriptedPrompter::new(), FakeBakerClient::new(vec![]));
        let plan = FundingPlan::Faucet {
            amount: Mutez::from_tez(5999),
        };

        let result = h
            .activator
            .apply_plan(&plan, "tz1addr", Mutez::from_tez(6000))
            .await;

        assert!(matches!(result, Err(ProvisionError::FaucetAmountTooLow { .. })));
        assert!(h.faucet.requests().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_faucet_amount_is_asked_again() {
        let h = harness(
            Network::Ghostnet,
            ScriptedPrompter::new()
                .with_funding_plan(FundingPlan::Faucet {
                    amount: Mutez::from_tez(100),
                })
                .with_funding_plan(FundingPlan::Faucet {
                    amount: Mutez::from_tez(6000),
                }),
            FakeBakerClient::new(vec![Mutez::from_tez(6000)]),
        );

        let balance = h.activator.fund("baker", "tz1addr", Mutez::ZERO).await.unwrap();

        assert_eq!(balance, Mutez::from_tez(6000));
        assert_eq!(h.prompter.times_asked("funding_plan"), 2);
        assert_eq!(
            h.faucet.requests(),
            vec![("tz1addr".to_string(), Mutez::from_tez(6000))]
        );
    }

    #[tokio::test]
    async fn test_faucet_unavailable_on_mainnet() {
        let h = harness(Network::Mainnet, ScriptedPrompter::new(), FakeBakerClient::new(vec![]));
        let plan = FundingPlan::Faucet {
            amount: Mutez::from_tez(6000),
        };

        let result = h.activator.apply_plan(&plan, "tz1addr", Mutez::from_tez(6000)).await;

        assert!(matches!(result, Err(ProvisionError::FaucetUnavailable(Network::Mainnet))));
    }

    #[tokio::test]
    async fn test_ledger_and_secret_imports_use_uri_schemes() {
        let h = harness(Network::Ghostnet, ScriptedPrompter::new(), FakeBakerClient::new(vec![]));

        h.activator
            .acquire_key(&KeySource::Ledger {
                alias: "ledger_baker".to_string(),
                device_path: "fox-bear-cat-dog/ed25519/0h/0h".to_string(),
            })
            .await
            .unwrap();
        h.activator
            .acquire_key(&KeySource::SecretKey {
                alias: "hot".to_string(),
                secret: "edsk3QoqBuvdamxouPhin7swCvkQNgq4jP5KZPbwWNnwdZpSpJiEbq".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(
            h.client.calls(),
            vec![
                "import ledger_baker ledger".to_string(),
                "import hot unencrypted".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_registration_failure_is_operator_recoverable() {
        let h = harness(
            Network::Ghostnet,
            ScriptedPrompter::new(),
            FakeBakerClient::new(vec![]).with_registration_failures(1),
        );

        let err = h.activator.register("baker").await.unwrap_err();
        assert!(err.is_operator_recoverable());
        assert!(h.activator.register("baker").await.is_ok());
    }

    #[test]
    fn test_uri_prefixes_not_doubled() {
        assert_eq!(ledger_uri("ledger://a/b"), "ledger://a/b");
        assert_eq!(ledger_uri("a/b"), "ledger://a/b");
        assert_eq!(unencrypted_uri("unencrypted:edsk1"), "unencrypted:edsk1");
    }
}

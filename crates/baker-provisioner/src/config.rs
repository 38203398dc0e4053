//! # Provisioner Configuration
//!
//! Every timing constant, default and environment-derived value the
//! workflow uses. Components receive their section explicitly; nothing reads
//! the environment or the working directory after [`ProvisionerConfig::from_env`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::{HistoryMode, Mutez, Network};

/// Interval between identity file checks.
pub const IDENTITY_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Identity checks before the data directory is cleaned and retried.
pub const IDENTITY_MAX_ATTEMPTS: u32 = 60;

/// Wait after interrupting the node before touching its directory.
pub const NODE_SETTLE_DELAY: Duration = Duration::from_secs(5);

/// Delay between bootstrap-status queries.
pub const BOOTSTRAP_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Delay between balance checks while waiting for funds.
pub const BALANCE_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Minimum baker balance, in tez.
pub const MIN_BAKER_BALANCE_TEZ: u64 = 6000;

/// Default node RPC port.
pub const DEFAULT_RPC_PORT: u16 = 8732;

/// Default node P2P port.
pub const DEFAULT_NET_PORT: u16 = 9732;

/// Where snapshots are staged before import.
pub const SNAPSHOT_STAGING_PATH: &str = "/tmp/snapshot";

/// Snapshot provider; files live at `<base>/<network>/<history_mode>`.
pub const SNAPSHOT_BASE_URL: &str = "https://snapshots.eu.tzinit.org";

/// Flag that turns on snapshot verification during import.
pub const INTEGRITY_CHECK_FLAG: &str = "--check";

/// Complete provisioner configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProvisionerConfig {
    /// Network to join.
    pub network: Network,
    /// History mode to run.
    pub history_mode: HistoryMode,
    /// Data directory settings.
    pub directory: DirectoryConfig,
    /// Port defaults.
    pub ports: PortConfig,
    /// Identity bootstrap timing.
    pub identity: IdentityConfig,
    /// Snapshot source and staging.
    pub snapshot: SnapshotConfig,
    /// Bootstrap monitor timing.
    pub bootstrap: BootstrapConfig,
    /// Baker funding policy.
    pub baker: BakerConfig,
    /// External executables.
    pub binaries: BinaryConfig,
    /// Service registration.
    pub service: ServiceConfig,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        let network = Network::Ghostnet;
        Self {
            network,
            history_mode: HistoryMode::Rolling,
            directory: DirectoryConfig::default(),
            ports: PortConfig::default(),
            identity: IdentityConfig::default(),
            snapshot: SnapshotConfig::default(),
            bootstrap: BootstrapConfig::default(),
            baker: BakerConfig::default(),
            binaries: BinaryConfig::default(),
            service: ServiceConfig::for_network(network),
        }
    }
}

impl ProvisionerConfig {
    /// Build a configuration for `network`/`history_mode`, resolving the
    /// working directory and the invoking user from the process environment.
    ///
    /// # Environment Variables
    ///
    /// - `SUDO_UID` / `SUDO_GID`: owner of the data directory when run via sudo
    /// - `OCTEZ_NODE_BIN` / `OCTEZ_CLIENT_BIN`: executable overrides
    /// - `SNAPSHOT_BASE_URL`: snapshot provider override
    pub fn from_env(network: Network, history_mode: HistoryMode) -> Self {
        let mut config = Self {
            network,
            history_mode,
            service: ServiceConfig::for_network(network),
            ..Self::default()
        };

        if let Ok(cwd) = std::env::current_dir() {
            config.directory.default_parent = cwd;
        }
        config.directory.default_name = format!("octez-node-{}", network);
        config.directory.owner = Some(Ownership::invoking_user());

        if let Ok(bin) = std::env::var("OCTEZ_NODE_BIN") {
            config.binaries.node = bin;
        }
        if let Ok(bin) = std::env::var("OCTEZ_CLIENT_BIN") {
            config.binaries.client = bin;
        }
        if let Ok(url) = std::env::var("SNAPSHOT_BASE_URL") {
            config.snapshot.base_url = url;
        }

        config
    }

    /// Configuration with zero delays and a tiny identity budget.
    pub fn for_testing() -> Self {
        Self {
            directory: DirectoryConfig {
                owner: None,
                ..DirectoryConfig::default()
            },
            identity: IdentityConfig {
                poll_interval: Duration::ZERO,
                max_attempts: 3,
                settle_delay: Duration::ZERO,
            },
            bootstrap: BootstrapConfig {
                retry_delay: Duration::ZERO,
                request_timeout: Duration::from_secs(1),
            },
            baker: BakerConfig {
                balance_poll_interval: Duration::ZERO,
                ..BakerConfig::default()
            },
            ..Self::default()
        }
    }
}

/// User and group that should own the data directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ownership {
    /// User id.
    pub uid: u32,
    /// Group id.
    pub gid: u32,
}

impl Ownership {
    /// The user who invoked the program: `SUDO_UID`/`SUDO_GID` when present,
    /// the real user otherwise.
    pub fn invoking_user() -> Self {
        let sudo = |var: &str| std::env::var(var).ok().and_then(|v| v.parse::<u32>().ok());
        Self {
            uid: sudo("SUDO_UID").unwrap_or_else(|| nix::unistd::getuid().as_raw()),
            gid: sudo("SUDO_GID").unwrap_or_else(|| nix::unistd::getgid().as_raw()),
        }
    }
}

/// Data directory settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Parent offered by default.
    pub default_parent: PathBuf,
    /// Directory name offered by default.
    pub default_name: String,
    /// Owner applied after creation; `None` leaves ownership untouched.
    pub owner: Option<Ownership>,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            default_parent: PathBuf::from("."),
            default_name: "octez-node".to_string(),
            owner: None,
        }
    }
}

/// Port defaults offered to the operator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PortConfig {
    /// Suggested RPC port.
    pub default_rpc: u16,
    /// Suggested P2P port.
    pub default_net: u16,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            default_rpc: DEFAULT_RPC_PORT,
            default_net: DEFAULT_NET_PORT,
        }
    }
}

/// Identity bootstrap timing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Interval between identity checks.
    pub poll_interval: Duration,
    /// Checks before cleanup and retry.
    pub max_attempts: u32,
    /// Wait after interrupting the node.
    pub settle_delay: Duration,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            poll_interval: IDENTITY_POLL_INTERVAL,
            max_attempts: IDENTITY_MAX_ATTEMPTS,
            settle_delay: NODE_SETTLE_DELAY,
        }
    }
}

/// Snapshot source and staging.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Provider base URL.
    pub base_url: String,
    /// Local staging file.
    pub staging_path: PathBuf,
    /// Flag added to the import command in safe mode.
    pub integrity_check_flag: String,
}

impl SnapshotConfig {
    /// Snapshot URL for a network and history mode.
    pub fn url_for(&self, network: Network, history_mode: HistoryMode) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            network,
            history_mode
        )
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            base_url: SNAPSHOT_BASE_URL.to_string(),
            staging_path: PathBuf::from(SNAPSHOT_STAGING_PATH),
            integrity_check_flag: INTEGRITY_CHECK_FLAG.to_string(),
        }
    }
}

/// Bootstrap monitor timing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Delay between status queries.
    pub retry_delay: Duration,
    /// Timeout of a single RPC request.
    pub request_timeout: Duration,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            retry_delay: BOOTSTRAP_RETRY_DELAY,
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Baker funding policy.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BakerConfig {
    /// Balance required before registering as delegate.
    pub minimum_balance: Mutez,
    /// Delay between balance checks.
    pub balance_poll_interval: Duration,
}

impl Default for BakerConfig {
    fn default() -> Self {
        Self {
            minimum_balance: Mutez::from_tez(MIN_BAKER_BALANCE_TEZ),
            balance_poll_interval: BALANCE_POLL_INTERVAL,
        }
    }
}

/// External executables.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BinaryConfig {
    /// Node executable.
    pub node: String,
    /// Client executable.
    pub client: String,
    /// Faucet command and its leading arguments.
    pub faucet: Vec<String>,
}

impl Default for BinaryConfig {
    fn default() -> Self {
        Self {
            node: "octez-node".to_string(),
            client: "octez-client".to_string(),
            faucet: vec!["npx".to_string(), "@tacoinfra/get-tez".to_string()],
        }
    }
}

/// Service registration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Unit name of the node service.
    pub name: String,
}

impl ServiceConfig {
    /// Default service name for a network.
    pub fn for_network(network: Network) -> Self {
        Self {
            name: format!("octez-node-{}", network),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ProvisionerConfig::default();
        assert_eq!(config.ports.default_rpc, 8732);
        assert_eq!(config.ports.default_net, 9732);
        assert_eq!(config.baker.minimum_balance, Mutez::from_tez(6000));
        assert_eq!(config.identity.max_attempts, IDENTITY_MAX_ATTEMPTS);
        assert_eq!(config.snapshot.staging_path, PathBuf::from("/tmp/snapshot"));
        assert_eq!(config.service.name, "octez-node-ghostnet");
    }

    #[test]
    fn test_testing_config_has_no_delays() {
        let config = ProvisionerConfig::for_testing();
        assert_eq!(config.identity.poll_interval, Duration::ZERO);
        assert_eq!(config.bootstrap.retry_delay, Duration::ZERO);
        assert!(config.directory.owner.is_none());
    }

    #[test]
    fn test_snapshot_url() {
        let snapshot = SnapshotConfig {
            base_url: "https://example.org/".to_string(),
            ..SnapshotConfig::default()
        };
        assert_eq!(
            snapshot.url_for(Network::Ghostnet, HistoryMode::Rolling),
            "https://example.org/ghostnet/rolling"
        );
    }

    #[test]
    fn test_from_env_sets_network_defaults() {
        let config = ProvisionerConfig::from_env(Network::Mainnet, HistoryMode::Full);
        assert_eq!(config.network, Network::Mainnet);
        assert_eq!(config.directory.default_name, "octez-node-mainnet");
        assert_eq!(config.service.name, "octez-node-mainnet");
        assert!(config.directory.owner.is_some());
    }
}

//! # Value Objects
//!
//! Small immutable types shared across the provisioning stages.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::errors::ProvisionError;

/// Tezos network the node joins.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Production network.
    Mainnet,
    /// Long-running test network with a public faucet.
    Ghostnet,
}

impl Network {
    /// Name used by `octez-node --network` and snapshot URLs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Ghostnet => "ghostnet",
        }
    }

    /// Whether a public faucet exists for this network.
    pub fn has_faucet(&self) -> bool {
        matches!(self, Network::Ghostnet)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "ghostnet" => Ok(Network::Ghostnet),
            other => Err(ProvisionError::InvalidInput(format!("unknown network '{}'", other))),
        }
    }
}

/// How much chain history the node keeps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryMode {
    /// All block data since the snapshot, pruned context.
    Full,
    /// Only recent cycles.
    Rolling,
}

impl HistoryMode {
    /// Name used by `octez-node --history-mode` and snapshot URLs.
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryMode::Full => "full",
            HistoryMode::Rolling => "rolling",
        }
    }
}

impl fmt::Display for HistoryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryMode {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(HistoryMode::Full),
            "rolling" => Ok(HistoryMode::Rolling),
            other => Err(ProvisionError::InvalidInput(format!(
                "unknown history mode '{}'",
                other
            ))),
        }
    }
}

/// Snapshot import integrity mode, chosen by the operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Skip integrity checks.
    Fast,
    /// Verify the snapshot while importing.
    Safe,
}

impl ImportMode {
    /// Whether the import command carries the integrity-check flag.
    pub fn checks_integrity(&self) -> bool {
        matches!(self, ImportMode::Safe)
    }
}

/// An amount of tez held as integer micro-tez.
///
/// Comparisons are exact; `Display` renders whole tez, truncating the
/// fractional part.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Mutez(u64);

impl Mutez {
    /// Micro-tez per tez.
    pub const PER_TEZ: u64 = 1_000_000;

    /// Zero balance.
    pub const ZERO: Mutez = Mutez(0);

    /// Construct from raw micro-tez.
    pub const fn new(mutez: u64) -> Self {
        Mutez(mutez)
    }

    /// Construct from whole tez.
    pub const fn from_tez(tez: u64) -> Self {
        Mutez(tez.saturating_mul(Self::PER_TEZ))
    }

    /// Raw micro-tez value.
    pub fn as_mutez(&self) -> u64 {
        self.0
    }

    /// Whole tez, fractional part truncated.
    pub fn whole_tez(&self) -> u64 {
        self.0 / Self::PER_TEZ
    }

    /// `self - other`, floored at zero.
    pub fn saturating_sub(self, other: Mutez) -> Mutez {
        Mutez(self.0.saturating_sub(other.0))
    }

    /// Parse a decimal tez amount such as `"6000"`, `"12.5"` or
    /// `"1,234.000001"`. At most six fractional digits are accepted.
    pub fn parse_tez(input: &str) -> Result<Self, ProvisionError> {
        let cleaned: String = input.trim().chars().filter(|c| *c != ',').collect();
        let invalid = || ProvisionError::InvalidInput(format!("invalid tez amount '{}'", input));

        let (whole, fraction) = match cleaned.split_once('.') {
            Some((w, f)) => (w, f),
            None => (cleaned.as_str(), ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        if fraction.len() > 6
            || !whole.chars().all(|c| c.is_ascii_digit())
            || !fraction.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }

        let whole: u64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let fraction: u64 = if fraction.is_empty() {
            0
        } else {
            format!("{:0<6}", fraction).parse().map_err(|_| invalid())?
        };

        whole
            .checked_mul(Self::PER_TEZ)
            .and_then(|m| m.checked_add(fraction))
            .map(Mutez)
            .ok_or_else(invalid)
    }
}

impl fmt::Display for Mutez {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} tez", self.whole_tez())
    }
}

/// Answer of a single bootstrap-status query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BootstrapStatus {
    /// The node is synchronized with the network.
    Bootstrapped,
    /// The node is reachable-but-behind or not yet listening.
    NotBootstrapped,
    /// Anything else; indicates a configuration problem.
    Unexpected(String),
}

/// How the baking key is obtained. Each variant yields one alias.
#[derive(Clone, PartialEq, Eq)]
pub enum KeySource {
    /// A key already known to the client.
    Existing {
        /// Client alias.
        alias: String,
    },
    /// Generate a fresh key.
    Generate {
        /// Alias for the new key.
        alias: String,
    },
    /// Import a key held by a Ledger device.
    Ledger {
        /// Alias for the imported key.
        alias: String,
        /// Device path, e.g. `ledger://fox-bear-cat-dog/ed25519/0h/0h`.
        device_path: String,
    },
    /// Import raw secret key material.
    SecretKey {
        /// Alias for the imported key.
        alias: String,
        /// Secret key (`edsk...`), never logged.
        secret: String,
    },
}

impl KeySource {
    /// Alias every later step refers to.
    pub fn alias(&self) -> &str {
        match self {
            KeySource::Existing { alias }
            | KeySource::Generate { alias }
            | KeySource::Ledger { alias, .. }
            | KeySource::SecretKey { alias, .. } => alias,
        }
    }

    /// Whether the key lives on a hardware signer.
    pub fn is_ledger(&self) -> bool {
        matches!(self, KeySource::Ledger { .. })
    }
}

impl fmt::Debug for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySource::Existing { alias } => f.debug_struct("Existing").field("alias", alias).finish(),
            KeySource::Generate { alias } => f.debug_struct("Generate").field("alias", alias).finish(),
            KeySource::Ledger { alias, device_path } => f
                .debug_struct("Ledger")
                .field("alias", alias)
                .field("device_path", device_path)
                .finish(),
            KeySource::SecretKey { alias, .. } => f
                .debug_struct("SecretKey")
                .field("alias", alias)
                .field("secret", &"<redacted>")
                .finish(),
        }
    }
}

/// How a balance shortfall is covered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FundingPlan {
    /// The operator transfers funds manually.
    SelfFund,
    /// Request `amount` from the network faucet.
    Faucet {
        /// Requested amount, at least the shortfall.
        amount: Mutez,
    },
}

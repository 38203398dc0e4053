//! # Octez Client Adapter
//!
//! Key management, balances and delegate registration through
//! `octez-client`, always against the provisioned node's RPC endpoint.

use std::process::Stdio;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::process::Command;
use tracing::debug;

use crate::domain::{KnownAddress, Mutez, ProvisionError};
use crate::ports::BakerClient;

/// `octez-client` invoked as a child process.
pub struct OctezClient {
    binary: String,
    endpoint: RwLock<Option<String>>,
}

impl OctezClient {
    /// Adapter for `binary`. Commands use the client's own endpoint until
    /// [`BakerClient::use_endpoint`] is called.
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            endpoint: RwLock::new(None),
        }
    }

    fn base_args(&self) -> Vec<String> {
        match self.endpoint.read().as_ref() {
            Some(endpoint) => vec!["--endpoint".to_string(), endpoint.clone()],
            None => Vec::new(),
        }
    }

    /// Run a command and return its stdout. `summary` names the command in
    /// errors and logs and must not contain secrets.
    async fn run(&self, summary: &str, args: &[&str]) -> Result<String, ProvisionError> {
        let mut full = self.base_args();
        full.extend(args.iter().map(|a| a.to_string()));
        debug!(command = summary, "[octez-client] Running");

        let output = Command::new(&self.binary)
            .args(&full)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| client_error(summary, e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr
            };
            return Err(client_error(summary, message));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn client_error(command: &str, message: String) -> ProvisionError {
    ProvisionError::Client {
        command: command.to_string(),
        message,
    }
}

/// Strip `secret` from client output echoed into an error.
fn redact_secret(error: ProvisionError, secret: &str) -> ProvisionError {
    match error {
        ProvisionError::Client { command, message } if !secret.is_empty() => ProvisionError::Client {
            command,
            message: message.replace(secret, "<redacted>"),
        },
        other => other,
    }
}

/// Parse `list known addresses` output (`alias: tz1... (comment)`).
pub fn parse_known_addresses(output: &str) -> Vec<KnownAddress> {
    output
        .lines()
        .filter_map(|line| {
            let (alias, rest) = line.split_once(':')?;
            let address = rest.split_whitespace().next()?;
            if alias.trim().is_empty() || !address.starts_with("tz") {
                return None;
            }
            Some(KnownAddress {
                alias: alias.trim().to_string(),
                address: address.to_string(),
            })
        })
        .collect()
}

/// Extract the `Hash:` line of `show address` output.
pub fn parse_address(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        line.trim()
            .strip_prefix("Hash:")
            .map(|hash| hash.trim().to_string())
            .filter(|hash| !hash.is_empty())
    })
}

/// Parse `get balance for` output such as `6000.5 ꜩ`.
pub fn parse_balance(output: &str) -> Result<Mutez, ProvisionError> {
    let amount = output
        .split_whitespace()
        .next()
        .ok_or_else(|| ProvisionError::InvalidInput("empty balance output".to_string()))?;
    Mutez::parse_tez(amount)
}

#[async_trait]
impl BakerClient for OctezClient {
    fn use_endpoint(&self, endpoint: &str) {
        *self.endpoint.write() = Some(endpoint.to_string());
    }

    async fn known_addresses(&self) -> Result<Vec<KnownAddress>, ProvisionError> {
        let out = self
            .run("list known addresses", &["list", "known", "addresses"])
            .await?;
        Ok(parse_known_addresses(&out))
    }

    async fn generate_key(&self, alias: &str) -> Result<(), ProvisionError> {
        self.run("gen keys", &["gen", "keys", alias]).await?;
        Ok(())
    }

    /// `octez-client` only takes the key URI as an argument, so an
    /// `unencrypted:` secret is visible in the process list while the
    /// import runs. It is kept out of logs and errors.
    async fn import_secret_key(&self, alias: &str, uri: &str) -> Result<(), ProvisionError> {
        let (scheme, secret) = uri.split_once(':').unwrap_or((uri, ""));
        let summary = format!("import secret key ({})", scheme);
        self.run(&summary, &["import", "secret", "key", alias, uri])
            .await
            .map_err(|e| redact_secret(e, secret))?;
        Ok(())
    }

    async fn show_address(&self, alias: &str) -> Result<String, ProvisionError> {
        let out = self
            .run("show address", &["show", "address", alias])
            .await?;
        parse_address(&out).ok_or_else(|| client_error("show address", "no Hash: line in output".to_string()))
    }

    async fn balance(&self, alias: &str) -> Result<Mutez, ProvisionError> {
        let out = self
            .run("get balance", &["get", "balance", "for", alias])
            .await?;
        parse_balance(&out)
    }

    async fn setup_ledger_baking(&self, alias: &str) -> Result<(), ProvisionError> {
        self.run(
            "setup ledger to bake",
            &["setup", "ledger", "to", "bake", "for", alias],
        )
        .await?;
        Ok(())
    }

    async fn register_delegate(&self, alias: &str) -> Result<(), ProvisionError> {
        self.run(
            "register key as delegate",
            &["register", "key", alias, "as", "delegate"],
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_import_failure_does_not_echo_secret() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let script = tmp.path().join("octez-client");
        std::fs::write(&script, "#!/bin/sh\necho \"cannot parse $5\" >&2\nexit 1\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        let secret = "edsk3QoqBuvdamxouPhin7swCvkQNgq4jP5KZPbwWNnwdZpSpJiEbq";

        let err = OctezClient::new(script.to_string_lossy())
            .import_secret_key("baker", &format!("unencrypted:{}", secret))
            .await
            .unwrap_err();

        match err {
            ProvisionError::Client { command, message } => {
                assert_eq!(command, "import secret key (unencrypted)");
                assert!(message.contains("cannot parse unencrypted:<redacted>"));
                assert!(!message.contains(secret));
            }
            other => panic!("expected Client error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_known_addresses() {
        let out = "baker: tz1VSUr8wwNhLAzempoch5d6hLRiTh8Cjcjb (unencrypted sk known)\n\
                   ledger_baker: tz1Ke2h7sDdakHJQh8WX4Z372du1KChsksyU (ledger sk known)\n\
                   Warning: the node you are connecting to claims to be running\n";
        let known = parse_known_addresses(out);
        assert_eq!(known.len(), 2);
        assert_eq!(known[0].alias, "baker");
        assert_eq!(known[1].address, "tz1Ke2h7sDdakHJQh8WX4Z372du1KChsksyU");
    }

    #[test]
    fn test_parse_address() {
        let out = "Hash: tz1VSUr8wwNhLAzempoch5d6hLRiTh8Cjcjb\nPublic Key: edpkuBknW28nW72KG6RoHtYW7p12T6GKc7nAbwYX5m8Wd9sDVC9yav\n";
        assert_eq!(
            parse_address(out).as_deref(),
            Some("tz1VSUr8wwNhLAzempoch5d6hLRiTh8Cjcjb")
        );
        assert!(parse_address("Public Key: edpk").is_none());
    }

    #[test]
    fn test_parse_balance_is_exact() {
        assert_eq!(parse_balance("5999.999999 ꜩ\n").unwrap(), Mutez::new(5_999_999_999));
        assert_eq!(parse_balance("6000 ꜩ").unwrap(), Mutez::from_tez(6000));
        assert!(parse_balance("").is_err());
    }

    #[test]
    fn test_endpoint_prefixes_commands() {
        let client = OctezClient::new("octez-client");
        assert!(client.base_args().is_empty());
        client.use_endpoint("http://127.0.0.1:8732");
        assert_eq!(client.base_args(), vec!["--endpoint", "http://127.0.0.1:8732"]);
    }

    #[tokio::test]
    async fn test_missing_binary_is_client_error() {
        let client = OctezClient::new("/nonexistent/octez-client");
        let err = client.balance("baker").await.unwrap_err();
        assert!(matches!(err, ProvisionError::Client { .. }));
    }
}

//! Ghostnet faucet through the `get-tez` command line tool.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use crate::domain::{Mutez, Network, ProvisionError};
use crate::ports::Faucet;

/// Runs the faucet command, e.g. `npx @tacoinfra/get-tez`.
pub struct CommandFaucet {
    command: Vec<String>,
}

impl CommandFaucet {
    /// `command` is the program followed by its leading arguments.
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

/// Arguments appended to the faucet command. Amounts are whole tez,
/// rounded up so the request never falls short.
pub fn faucet_args(network: Network, address: &str, amount: Mutez) -> Vec<String> {
    let mut tez = amount.whole_tez();
    if amount.as_mutez() % Mutez::PER_TEZ != 0 {
        tez += 1;
    }
    vec![
        address.to_string(),
        "--amount".to_string(),
        tez.to_string(),
        "--network".to_string(),
        network.to_string(),
    ]
}

#[async_trait]
impl Faucet for CommandFaucet {
    async fn request(&self, network: Network, address: &str, amount: Mutez) -> Result<(), ProvisionError> {
        if !network.has_faucet() {
            return Err(ProvisionError::FaucetUnavailable(network));
        }
        let (program, leading) = self
            .command
            .split_first()
            .ok_or_else(|| ProvisionError::Faucet("no faucet command configured".to_string()))?;

        info!(%address, %amount, "[faucet] Requesting funds");
        let output = Command::new(program)
            .args(leading)
            .args(faucet_args(network, address, amount))
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ProvisionError::Faucet(format!("cannot run {}: {}", program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProvisionError::Faucet(format!(
                "exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

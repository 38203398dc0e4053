//! Node RPC over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::domain::{BootstrapStatus, NodeInstance, ProvisionError};
use crate::ports::NodeRpc;

const IS_BOOTSTRAPPED_PATH: &str = "/chains/main/is_bootstrapped";
const HEAD_HEADER_PATH: &str = "/chains/main/blocks/head/header";

/// Body of `GET /chains/main/is_bootstrapped`.
#[derive(Debug, Deserialize)]
pub struct IsBootstrapped {
    /// Whether the node considers itself bootstrapped.
    pub bootstrapped: bool,
    /// `synced`, `unsynced` or `stuck`.
    pub sync_state: String,
}

#[derive(Debug, Deserialize)]
struct HeadHeader {
    protocol: String,
}

/// Classify an `is_bootstrapped` answer.
pub fn interpret_bootstrap(answer: &IsBootstrapped) -> BootstrapStatus {
    match answer.sync_state.as_str() {
        "synced" if answer.bootstrapped => BootstrapStatus::Bootstrapped,
        "synced" | "unsynced" | "stuck" => BootstrapStatus::NotBootstrapped,
        other => BootstrapStatus::Unexpected(format!("sync_state '{}'", other)),
    }
}

/// `reqwest`-backed node RPC.
pub struct RpcNodeClient {
    client: Client,
}

impl RpcNodeClient {
    /// Create a client whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, ProvisionError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| ProvisionError::Rpc(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl NodeRpc for RpcNodeClient {
    async fn bootstrap_status(&self, node: &NodeInstance) -> Result<BootstrapStatus, ProvisionError> {
        let url = format!("{}{}", node.rpc_endpoint(), IS_BOOTSTRAPPED_PATH);

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            // The RPC server is not listening yet.
            Err(e) if e.is_connect() || e.is_timeout() => {
                debug!(error = %e, "[rpc] Node RPC not reachable yet");
                return Ok(BootstrapStatus::NotBootstrapped);
            }
            Err(e) => return Err(ProvisionError::Rpc(e.to_string())),
        };

        let status = response.status();
        if !status.is_success() {
            return Ok(BootstrapStatus::Unexpected(format!("HTTP {}", status)));
        }

        match response.json::<IsBootstrapped>().await {
            Ok(answer) => Ok(interpret_bootstrap(&answer)),
            Err(e) => Ok(BootstrapStatus::Unexpected(format!("malformed answer: {}", e))),
        }
    }

    async fn head_protocol(&self, node: &NodeInstance) -> Result<String, ProvisionError> {
        let url = format!("{}{}", node.rpc_endpoint(), HEAD_HEADER_PATH);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ProvisionError::Rpc(e.to_string()))?;

        let header: HeadHeader = response
            .json()
            .await
            .map_err(|e| ProvisionError::Rpc(format!("malformed head header: {}", e)))?;
        Ok(header.protocol)
    }
}

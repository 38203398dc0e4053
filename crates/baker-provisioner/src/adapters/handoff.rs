//! Monitoring hand-off as a JSON summary.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::domain::{BakerIdentity, NodeInstance, ProvisionError};
use crate::ports::MonitoringHandoff;

/// Document written for the monitoring setup.
#[derive(Debug, Serialize)]
pub struct ProvisioningSummary<'a> {
    /// Provisioned node.
    pub node: &'a NodeInstance,
    /// Baker, if one was registered.
    pub baker: Option<&'a BakerIdentity>,
}

/// Writes the summary to a file, or to stdout without one.
pub struct JsonSummaryHandoff {
    output: Option<PathBuf>,
}

impl JsonSummaryHandoff {
    /// Hand-off writing to `output`, or stdout when `None`.
    pub fn new(output: Option<PathBuf>) -> Self {
        Self { output }
    }
}

#[async_trait]
impl MonitoringHandoff for JsonSummaryHandoff {
    async fn hand_off(
        &self,
        node: &NodeInstance,
        baker: Option<&BakerIdentity>,
    ) -> Result<(), ProvisionError> {
        let summary = ProvisioningSummary { node, baker };
        let json = serde_json::to_string_pretty(&summary)
            .map_err(|e| ProvisionError::InvalidInput(format!("summary encoding: {}", e)))?;

        match &self.output {
            Some(path) => {
                tokio::fs::write(path, json.as_bytes()).await?;
                info!(path = %path.display(), "[handoff] Summary written");
            }
            None => println!("{}", json),
        }
        Ok(())
    }
}

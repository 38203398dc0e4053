//! # Snapshot Pipeline
//!
//! Clears stale chain state, fetches the snapshot for the node's network and
//! history mode, imports it, and removes the staged archive.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::SnapshotConfig;
use crate::domain::{layout, ImportMode, NodeInstance, ProvisionError, SnapshotArtifact};
use crate::ports::{Downloader, NodeCli, TransferProgress};

/// Snapshot download and import.
pub struct SnapshotPipeline {
    config: SnapshotConfig,
    node_cli: Arc<dyn NodeCli>,
    downloader: Arc<dyn Downloader>,
    progress: Arc<dyn TransferProgress>,
}

impl SnapshotPipeline {
    /// Create a pipeline.
    pub fn new(
        config: SnapshotConfig,
        node_cli: Arc<dyn NodeCli>,
        downloader: Arc<dyn Downloader>,
        progress: Arc<dyn TransferProgress>,
    ) -> Self {
        Self {
            config,
            node_cli,
            downloader,
            progress,
        }
    }

    /// Import a fresh snapshot into `node`.
    ///
    /// Nothing is retried. The staged archive is removed whether or not the
    /// import succeeds.
    pub async fn run(
        &self,
        node: &NodeInstance,
        mode: ImportMode,
    ) -> Result<SnapshotArtifact, ProvisionError> {
        let removed = layout::clean_node_state(&node.data_dir)?;
        info!(removed = ?removed, "[snapshot] Cleared node state before import");

        // Cleanup drops config.json; the import needs it.
        self.node_cli.init_config(node).await?;

        let url = self.config.url_for(node.network, node.history_mode);
        let staging = self.config.staging_path.clone();
        if let Some(parent) = staging.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!(%url, staging = %staging.display(), "[snapshot] Downloading snapshot");
        let fetched = self
            .downloader
            .fetch(&url, &staging, self.progress.as_ref())
            .await;
        let size_bytes = match fetched {
            Ok(size) => size,
            Err(e) => {
                discard_staged(&staging);
                return Err(e);
            }
        };

        info!(?mode, size_bytes, "[snapshot] Importing snapshot");
        let imported = self.node_cli.import_snapshot(node, &staging, mode).await;
        discard_staged(&staging);
        imported?;

        info!("[snapshot] Snapshot imported");
        Ok(SnapshotArtifact {
            network: node.network,
            history_mode: node.history_mode,
            size_bytes,
            local_path: staging,
        })
    }
}

fn discard_staged(path: &std::path::Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "[snapshot] Could not remove staged snapshot"),
    }
}

//! # Snapshot Download
//!
//! Streams an HTTP resource to disk and reports progress.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use futures_util::StreamExt;
use parking_lot::Mutex;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::domain::ProvisionError;
use crate::ports::{Downloader, TransferProgress};

/// Downloader streaming responses to a file.
pub struct HttpDownloader {
    client: Client,
}

impl HttpDownloader {
    /// Create a downloader. No overall timeout: snapshots are large.
    pub fn new() -> Result<Self, ProvisionError> {
        let client = Client::builder()
            .build()
            .map_err(|e| ProvisionError::Download(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        progress: &dyn TransferProgress,
    ) -> Result<u64, ProvisionError> {
        let download_err = |e: reqwest::Error| ProvisionError::Download(e.to_string());

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(download_err)?;

        let total = response.content_length();
        progress.started(total);

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(download_err)?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            progress.advanced(written);
        }
        file.flush().await?;
        file.sync_all().await?;

        if let Some(total) = total {
            if written != total {
                return Err(ProvisionError::Download(format!(
                    "transfer truncated: {} of {} bytes",
                    written, total
                )));
            }
        }

        progress.finished(written);
        Ok(written)
    }
}

/// Bytes between reports when the total length is unknown.
const INDETERMINATE_STEP: u64 = 256 * 1024 * 1024;

/// Progress as log lines: every 10 percent with a known total, every
/// 256 MiB otherwise.
#[derive(Default)]
pub struct LogProgress {
    total: Mutex<Option<u64>>,
    last_reported: AtomicU64,
}

impl LogProgress {
    /// New progress reporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report bucket for `downloaded` bytes: a percentage decile with a
    /// known total, a 256 MiB step otherwise.
    fn bucket(&self, downloaded: u64) -> u64 {
        match *self.total.lock() {
            Some(total) if total > 0 => downloaded.saturating_mul(10) / total,
            _ => downloaded / INDETERMINATE_STEP,
        }
    }
}

impl TransferProgress for LogProgress {
    fn started(&self, total: Option<u64>) {
        *self.total.lock() = total;
        self.last_reported.store(0, Ordering::SeqCst);
        match total {
            Some(bytes) => info!(total_mib = bytes / (1024 * 1024), "[snapshot] Download started"),
            None => info!("[snapshot] Download started, size unknown"),
        }
    }

    fn advanced(&self, downloaded: u64) {
        let bucket = self.bucket(downloaded);
        if bucket <= self.last_reported.swap(bucket, Ordering::SeqCst) {
            return;
        }
        match *self.total.lock() {
            Some(total) if total > 0 => info!(
                percent = downloaded.saturating_mul(100) / total,
                downloaded_mib = downloaded / (1024 * 1024),
                "[snapshot] Downloading"
            ),
            _ => info!(downloaded_mib = downloaded / (1024 * 1024), "[snapshot] Downloading"),
        }
    }

    fn finished(&self, downloaded: u64) {
        info!(downloaded_mib = downloaded / (1024 * 1024), "[snapshot] Download complete");
    }
}

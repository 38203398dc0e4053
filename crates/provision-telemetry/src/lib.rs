//! # Provision Telemetry
//!
//! Logging bootstrap shared by the provisioning binary and its tests.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use provision_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     let _guard = init_telemetry(TelemetryConfig::from_env()).expect("telemetry");
//!     tracing::info!("provisioning started");
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `PROVISION_SERVICE_NAME` | `baker-provisioner` | Service name in logs |
//! | `PROVISION_LOG_LEVEL` | `info` | Log filter (falls back to `RUST_LOG`) |
//! | `PROVISION_JSON_LOGS` | `false` | Emit JSON lines |

#![warn(missing_docs)]

mod config;
mod logging;

pub use config::TelemetryConfig;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The global subscriber could not be installed (usually already set).
    #[error("Failed to initialize tracing subscriber: {0}")]
    SubscriberInit(String),

    /// The configuration could not be turned into a filter.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging for the provisioning run.
///
/// Returns a guard that should be held for the lifetime of the process.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    logging::init_logging(&config)?;

    tracing::info!(
        service = %config.service_name,
        network = %config.network,
        json_logs = config.json_logs,
        "Logging initialized"
    );

    Ok(TelemetryGuard {
        service_name: config.service_name,
    })
}

/// Guard that keeps telemetry active for the process lifetime.
pub struct TelemetryGuard {
    service_name: String,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::debug!(service = %self.service_name, "Shutting down telemetry");
    }
}

/// Open an `info` span tagged with a provisioning stage.
///
/// # Example
///
/// ```rust,ignore
/// use provision_telemetry::stage_span;
///
/// let span = stage_span!("snapshot", network = "ghostnet");
/// let _entered = span.enter();
/// ```
#[macro_export]
macro_rules! stage_span {
    ($stage:expr) => {
        tracing::info_span!("stage", stage = $stage)
    };
    ($stage:expr, $($field:tt)*) => {
        tracing::info_span!("stage", stage = $stage, $($field)*)
    };
}

//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for provisioning logs.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to every log line.
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error) or a full
    /// `EnvFilter` directive string.
    pub log_level: String,

    /// Emit JSON lines instead of human-readable output.
    pub json_logs: bool,

    /// Colourise human-readable output.
    pub ansi: bool,

    /// Network the provisioning run targets (mainnet, ghostnet).
    pub network: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "baker-provisioner".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            ansi: true,
            network: "ghostnet".to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `PROVISION_SERVICE_NAME`: Service name (default: baker-provisioner)
    /// - `PROVISION_LOG_LEVEL` or `RUST_LOG`: Log filter (default: info)
    /// - `PROVISION_JSON_LOGS`: JSON output (default: false)
    /// - `NO_COLOR`: Disable ANSI colours when set
    pub fn from_env() -> Self {
        Self {
            service_name: env::var("PROVISION_SERVICE_NAME")
                .unwrap_or_else(|_| "baker-provisioner".to_string()),

            log_level: env::var("PROVISION_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            json_logs: env::var("PROVISION_JSON_LOGS")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),

            ansi: env::var("NO_COLOR").is_err(),

            network: "ghostnet".to_string(),
        }
    }

    /// Set the network label used in the startup log line.
    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = network.into();
        self
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

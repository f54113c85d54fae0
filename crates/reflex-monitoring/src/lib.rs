//! Monitoring module for the Reflex engine.
//!
//! Currently this is structured logging only: a `tracing` subscriber with
//! an env filter and either pretty or JSON output.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};

/// Structured logging setup
pub mod logging;

pub use logging::{init_logging, init_test_logging};

/// Configuration for initializing logging
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Service name attached to the startup log line
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// Log level filter (e.g., "info,reflex_core=debug"); `RUST_LOG` wins when set
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// Emit JSON lines instead of pretty output
    #[serde(default)]
    pub enable_json_logging: bool,
}

fn default_service_name() -> String {
    "reflex".to_string()
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            log_filter: default_log_filter(),
            enable_json_logging: false,
        }
    }
}

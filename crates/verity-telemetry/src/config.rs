//! Telemetry configuration from environment variables.

use std::env;

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name recorded on startup
    pub service_name: String,

    /// Filter directive (trace, debug, info, warn, error, or a full `EnvFilter` string)
    pub log_level: String,

    /// JSON formatted logs instead of pretty console output
    pub json_logs: bool,

    /// Include thread ids, file and line in each record
    pub verbose_fields: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "block-verity".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            verbose_fields: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `VERITY_SERVICE_NAME`: Service name (default: block-verity)
    /// - `VERITY_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `VERITY_JSON_LOGS`: Enable JSON logs (default: false)
    /// - `VERITY_VERBOSE_LOGS`: Thread ids and source locations (default: false)
    pub fn from_env() -> Self {
        Self {
            service_name: env::var("VERITY_SERVICE_NAME")
                .unwrap_or_else(|_| "block-verity".to_string()),

            log_level: env::var("VERITY_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            json_logs: env::var("VERITY_JSON_LOGS")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),

            verbose_fields: env::var("VERITY_VERBOSE_LOGS")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
        }
    }

    /// Override the log level.
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Switch JSON output on or off.
    pub fn with_json_logs(mut self, enabled: bool) -> Self {
        self.json_logs = enabled;
        self
    }
}

fn parse_flag(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1"
}

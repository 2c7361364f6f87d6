//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the agent.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Service name stamped on every transaction and error.
    pub service_name: String,

    /// Initial running state. An inactive agent instruments nothing.
    pub active: bool,

    /// Regular expressions matched against the request path.
    /// Tested in order; a match exempts the request from instrumentation.
    pub ignore_url_patterns: Vec<String>,

    /// Propagation header names, looked up in order (case-insensitive).
    pub trace_headers: Vec<String>,

    /// Copy request/response headers into the transaction context.
    pub capture_headers: bool,

    /// Header names whose values are redacted in captured context.
    pub sanitize_field_names: Vec<String>,

    /// Logging settings.
    pub logging: LoggingConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown-service".to_string(),
            active: true,
            ignore_url_patterns: Vec::new(),
            trace_headers: vec![
                "elastic-apm-traceparent".to_string(),
                "traceparent".to_string(),
            ],
            capture_headers: true,
            sanitize_field_names: vec![
                "authorization".to_string(),
                "cookie".to_string(),
                "set-cookie".to_string(),
            ],
            logging: LoggingConfig::default(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,

    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "apm_middleware=info,tower_http=info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

use serde::{Deserialize, Serialize};

/// Logger configuration for tracing output.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct LoggerConfig {
    /// Log level filter (e.g., "info", "debug", or module-specific like
    /// "info,sparql_mirror::proxy=trace")
    pub level: String,
    /// Output format: "pretty" for human-readable, "json" for structured JSON logs
    pub format: LogFormat,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

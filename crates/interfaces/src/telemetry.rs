use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One tool call as reported by the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub tool_name: String,
    pub tokens_used: u64,
    pub latency_ms: u64,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    /// Set once the record has passed through the tokenization engine.
    #[serde(default)]
    pub sanitized: bool,
}

impl TelemetryRecord {
    pub fn new(tool_name: impl Into<String>, tokens_used: u64, latency_ms: u64, success: bool) -> Self {
        Self {
            tool_name: tool_name.into(),
            tokens_used,
            latency_ms,
            success,
            timestamp: Utc::now(),
            context_id: None,
            sanitized: false,
        }
    }

    pub fn with_context(mut self, context_id: Option<String>) -> Self {
        self.context_id = context_id;
        self
    }
}

/// Externally-safe projection of a [`TelemetryRecord`].
///
/// Field names follow the sink's insert schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SanitizedTelemetry {
    pub tool_name: String,
    #[serde(rename = "token_used")]
    pub tokens_used: u64,
    pub latency_ms: u64,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

/// A `{name, parameters}` call handed to the control-flow executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub name: String,
    #[serde(default)]
    pub parameters: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
}

impl ToolInvocation {
    pub fn new(name: impl Into<String>, parameters: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            parameters,
            context_id: None,
        }
    }
}

/// What the executor reports back after running a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOutcome {
    pub output: serde_json::Value,
    pub tokens_used: u64,
    pub latency_ms: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

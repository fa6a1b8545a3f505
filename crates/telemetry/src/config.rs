use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkConfig {
    Jsonl { path: PathBuf },
    Http { endpoint: String },
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Oldest records are dropped once history reaches this size.
    pub max_records: usize,
    /// Per-call cost if every tool schema were loaded upfront.
    pub naive_tokens_per_call: u64,
    pub top_n: usize,
    pub sink: Option<SinkConfig>,
    /// Per-attempt limit on a sink send; `None` waits indefinitely.
    pub sink_timeout_ms: Option<u64>,
    pub sink_retries: u32,
    pub sink_backoff_ms: u64,
    pub dead_letter_capacity: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            max_records: 10_000,
            naive_tokens_per_call: 2_000,
            top_n: 5,
            sink: None,
            sink_timeout_ms: Some(10_000),
            sink_retries: 2,
            sink_backoff_ms: 100,
            dead_letter_capacity: 256,
        }
    }
}

impl TelemetryConfig {
    pub fn sink_timeout(&self) -> Option<Duration> {
        self.sink_timeout_ms.map(Duration::from_millis)
    }

    pub fn sink_backoff(&self) -> Duration {
        Duration::from_millis(self.sink_backoff_ms)
    }
}

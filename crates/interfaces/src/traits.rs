use crate::telemetry::SanitizedTelemetry;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Sink rejected record: {0}")]
    Rejected(String),
}

/// Insert-only destination for telemetry leaving the process.
///
/// Only [`SanitizedTelemetry`] can be handed to a sink, so nothing that
/// carries free-form caller data crosses this boundary.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, record: &SanitizedTelemetry) -> Result<(), SinkError>;
}

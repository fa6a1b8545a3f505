use crate::config::ConfigError;
use thiserror::Error;
use toolgate_interfaces::SinkError;
use toolgate_registry::RegistryError;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Message has already been passed through the tokenization engine.
    #[error("Tool '{tool}' failed: {message}")]
    Executor { tool: String, message: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Telemetry sink setup failed: {0}")]
    Sink(#[from] SinkError),
}

impl GatewayError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::Registry(RegistryError::NotFound(_)))
    }
}

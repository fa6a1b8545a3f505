//! YAML configuration for the whole gateway.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use toolgate_pii::PiiConfig;
use toolgate_registry::{min_summary_budget, RegistryConfig};
use toolgate_telemetry::{SinkConfig, TelemetryConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub registry: RegistryConfig,
    pub pii: PiiConfig,
    pub telemetry: TelemetryConfig,
}

impl GatewayConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes to unit, not to an empty mapping.
        let config: Self = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(content)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let nonzero = [
            ("registry.max_loaded_tools", self.registry.max_loaded_tools),
            ("registry.summary_token_budget", self.registry.summary_token_budget),
            ("pii.max_entries", self.pii.max_entries),
            ("telemetry.max_records", self.telemetry.max_records),
            ("telemetry.dead_letter_capacity", self.telemetry.dead_letter_capacity),
        ];
        for (field, value) in nonzero {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{} must be greater than zero", field)));
            }
        }

        let floor = min_summary_budget();
        if self.registry.summary_token_budget < floor {
            return Err(ConfigError::Invalid(format!(
                "registry.summary_token_budget must be at least {} (cost of an empty summary)",
                floor
            )));
        }

        if self.registry.candidate_extensions.is_empty() {
            return Err(ConfigError::Invalid(
                "registry.candidate_extensions must not be empty".to_string(),
            ));
        }

        if let Some(SinkConfig::Http { endpoint }) = &self.telemetry.sink {
            if endpoint.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "telemetry.sink.endpoint is required for http sinks".to_string(),
                ));
            }
        }

        Ok(())
    }
}

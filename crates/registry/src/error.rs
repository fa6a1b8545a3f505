use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Failed to load tool {name}: {reason}")]
    Load { name: String, reason: String },

    #[error("Loading tool {name} timed out after {timeout_ms}ms")]
    Timeout { name: String, timeout_ms: u64 },

    #[error("Stale version for {name}: {current} is not older than {proposed}")]
    StaleVersion {
        name: String,
        current: String,
        proposed: String,
    },

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

use crate::error::RegistryError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;

pub const MANIFEST_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub description: String,
    /// Path of the tool module, relative to the tools directory.
    pub storage_locator: String,
    #[serde(default)]
    pub input_schema: Value,
    #[serde(default)]
    pub output_schema: Value,
    #[serde(default)]
    pub estimated_tokens: u64,
    #[serde(default)]
    pub estimated_latency_ms: u64,
}

impl ToolDescriptor {
    /// Top-level property names of the input schema.
    pub fn parameter_names(&self) -> Vec<String> {
        self.input_schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| props.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolManifest {
    pub version: String,
    pub tools: BTreeMap<String, ToolDescriptor>,
    pub last_updated: DateTime<Utc>,
}

impl ToolManifest {
    pub fn new() -> Self {
        Self {
            version: MANIFEST_VERSION.to_string(),
            tools: BTreeMap::new(),
            last_updated: Utc::now(),
        }
    }

    pub fn from_descriptors(descriptors: impl IntoIterator<Item = ToolDescriptor>) -> Self {
        let mut manifest = Self::new();
        for descriptor in descriptors {
            manifest.tools.insert(descriptor.name.clone(), descriptor);
        }
        manifest
    }

    /// Insert or replace a descriptor; returns the previous one.
    pub fn insert(&mut self, descriptor: ToolDescriptor) -> Option<ToolDescriptor> {
        self.last_updated = Utc::now();
        self.tools.insert(descriptor.name.clone(), descriptor)
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub async fn load(path: &Path) -> Result<Self, RegistryError> {
        let content = fs::read_to_string(path).await?;
        let manifest: ToolManifest = serde_json::from_str(&content)?;

        for (key, descriptor) in &manifest.tools {
            if key != &descriptor.name {
                return Err(RegistryError::InvalidManifest(format!(
                    "entry '{}' describes tool '{}'",
                    key, descriptor.name
                )));
            }
        }

        tracing::info!(tools = manifest.len(), "Loaded tool manifest from {:?}", path);
        Ok(manifest)
    }

    pub async fn save(&self, path: &Path) -> Result<(), RegistryError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Atomic write: write to temp file, then rename
        let temp_path = path.with_extension("tmp");
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&temp_path, content).await?;
        fs::rename(&temp_path, path).await?;

        tracing::debug!(tools = self.len(), "Saved tool manifest to {:?}", path);
        Ok(())
    }
}

impl Default for ToolManifest {
    fn default() -> Self {
        Self::new()
    }
}

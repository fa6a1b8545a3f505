use crate::error::RegistryError;
use crate::manifest::ToolDescriptor;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// A tool whose implementation has been brought into memory.
#[derive(Debug)]
pub struct LoadedTool {
    pub descriptor: ToolDescriptor,
    pub body: String,
    pub loaded_at: DateTime<Utc>,
}

impl LoadedTool {
    pub fn new(descriptor: ToolDescriptor, body: String) -> Self {
        Self {
            descriptor,
            body,
            loaded_at: Utc::now(),
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }
}

/// Shared handle; the registry keeps at most one live handle per name.
pub type ToolHandle = Arc<LoadedTool>;

/// Performs the expensive part of bringing a tool in.
#[async_trait]
pub trait ToolLoader: Send + Sync {
    async fn load(&self, descriptor: &ToolDescriptor) -> Result<LoadedTool, RegistryError>;
}

/// Reads tool modules from the tools directory.
pub struct FileToolLoader {
    root: PathBuf,
}

impl FileToolLoader {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn resolve(&self, descriptor: &ToolDescriptor) -> Result<PathBuf, RegistryError> {
        let locator = Path::new(&descriptor.storage_locator);

        // Security: locator must stay within the tools directory
        let contained = locator
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !contained || descriptor.storage_locator.is_empty() {
            return Err(RegistryError::Load {
                name: descriptor.name.clone(),
                reason: format!("locator '{}' escapes tool directory", descriptor.storage_locator),
            });
        }

        Ok(self.root.join(locator))
    }
}

#[async_trait]
impl ToolLoader for FileToolLoader {
    async fn load(&self, descriptor: &ToolDescriptor) -> Result<LoadedTool, RegistryError> {
        let path = self.resolve(descriptor)?;
        let body = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| RegistryError::Load {
                name: descriptor.name.clone(),
                reason: e.to_string(),
            })?;

        Ok(LoadedTool::new(descriptor.clone(), body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor(locator: &str) -> ToolDescriptor {
        ToolDescriptor {
            name: "echo".to_string(),
            version: "1.0.0".to_string(),
            author: None,
            description: "Echo input".to_string(),
            storage_locator: locator.to_string(),
            input_schema: json!({}),
            output_schema: json!({}),
            estimated_tokens: 0,
            estimated_latency_ms: 0,
        }
    }

    #[tokio::test]
    async fn test_loads_body_from_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(temp_dir.path().join("util")).unwrap();
        std::fs::write(temp_dir.path().join("util/echo.tool"), "body").unwrap();

        let loader = FileToolLoader::new(temp_dir.path());
        let tool = loader.load(&descriptor("util/echo.tool")).await.unwrap();

        assert_eq!(tool.body, "body");
        assert_eq!(tool.name(), "echo");
    }

    #[tokio::test]
    async fn test_rejects_escaping_locator() {
        let temp_dir = tempfile::tempdir().unwrap();
        let loader = FileToolLoader::new(temp_dir.path());

        for locator in ["../secret", "/etc/passwd", ""] {
            let result = loader.load(&descriptor(locator)).await;
            assert!(matches!(result, Err(RegistryError::Load { .. })), "{}", locator);
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_load_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let loader = FileToolLoader::new(temp_dir.path());
        let result = loader.load(&descriptor("gone.tool")).await;
        assert!(matches!(result, Err(RegistryError::Load { .. })));
    }
}

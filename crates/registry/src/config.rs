use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Directory scanned for tool modules.
    pub tools_dir: PathBuf,
    pub manifest_path: PathBuf,
    /// File extensions treated as candidate tool modules.
    pub candidate_extensions: Vec<String>,
    /// Write the manifest back after discovery.
    pub persist_manifest: bool,
    pub max_loaded_tools: usize,
    pub summary_token_budget: usize,
    /// `None` disables the load timeout.
    pub load_timeout_ms: Option<u64>,
    pub load_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            tools_dir: PathBuf::from("./tools"),
            manifest_path: PathBuf::from("./tools/manifest.json"),
            candidate_extensions: ["tool", "rs", "ts", "js", "py"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            persist_manifest: true,
            max_loaded_tools: 64,
            summary_token_budget: 50,
            load_timeout_ms: Some(5_000),
            load_retries: 2,
            retry_backoff_ms: 100,
        }
    }
}

impl RegistryConfig {
    /// Config rooted at `tools_dir`, manifest stored alongside the tools.
    pub fn for_dir(tools_dir: impl Into<PathBuf>) -> Self {
        let tools_dir = tools_dir.into();
        Self {
            manifest_path: tools_dir.join("manifest.json"),
            tools_dir,
            ..Self::default()
        }
    }

    pub fn load_timeout(&self) -> Option<Duration> {
        self.load_timeout_ms.map(Duration::from_millis)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

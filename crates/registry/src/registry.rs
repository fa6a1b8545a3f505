use crate::config::RegistryConfig;
use crate::discovery::{discover_tools, DiscoveryFailure, DiscoveryReport};
use crate::error::RegistryError;
use crate::loader::{FileToolLoader, ToolHandle, ToolLoader};
use crate::manifest::{ToolDescriptor, ToolManifest};
use crate::summary::{build_summary, min_summary_budget, ToolSummary};
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OnceCell};
use tracing::{debug, info, warn};

/// Manifest-backed tool registry with lazy, single-flight loading.
///
/// Lock order when nested: `in_flight`, then `loaded` or `published`.
pub struct ToolRegistry {
    config: RegistryConfig,
    loader: Arc<dyn ToolLoader>,
    manifest: AsyncMutex<Option<Arc<ToolManifest>>>,
    /// Copy of the cached manifest readable without awaiting.
    published: Mutex<Option<Arc<ToolManifest>>>,
    last_discovery: Mutex<Option<DiscoveryReport>>,
    loaded: Mutex<LruCache<String, ToolHandle>>,
    in_flight: Mutex<HashMap<String, Arc<OnceCell<ToolHandle>>>>,
}

impl ToolRegistry {
    /// A `summary_token_budget` below [`min_summary_budget`] is raised to it.
    pub fn new(mut config: RegistryConfig, loader: Arc<dyn ToolLoader>) -> Self {
        let floor = min_summary_budget();
        if config.summary_token_budget < floor {
            warn!(
                budget = config.summary_token_budget,
                floor, "Summary token budget below the empty-summary cost, raising it"
            );
            config.summary_token_budget = floor;
        }
        let capacity = NonZeroUsize::new(config.max_loaded_tools).unwrap_or(NonZeroUsize::MIN);
        Self {
            config,
            loader,
            manifest: AsyncMutex::new(None),
            published: Mutex::new(None),
            last_discovery: Mutex::new(None),
            loaded: Mutex::new(LruCache::new(capacity)),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Registry reading tool bodies from `config.tools_dir`.
    pub fn with_file_loader(config: RegistryConfig) -> Self {
        let loader = Arc::new(FileToolLoader::new(&config.tools_dir));
        Self::new(config, loader)
    }

    /// Registry seeded with an already-built manifest.
    pub fn from_manifest(config: RegistryConfig, loader: Arc<dyn ToolLoader>, manifest: ToolManifest) -> Self {
        let manifest = Arc::new(manifest);
        let registry = Self::new(config, loader);
        *registry.published.lock() = Some(Arc::clone(&manifest));
        Self {
            manifest: AsyncMutex::new(Some(manifest)),
            ..registry
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Cached manifest, else the persisted file, else a fresh discovery.
    pub async fn load_manifest(&self) -> Result<Arc<ToolManifest>, RegistryError> {
        let mut cached = self.manifest.lock().await;
        if let Some(manifest) = cached.as_ref() {
            return Ok(Arc::clone(manifest));
        }

        let manifest = if self.config.manifest_path.exists() {
            ToolManifest::load(&self.config.manifest_path).await?
        } else {
            self.discover_manifest().await?
        };

        let manifest = Arc::new(manifest);
        self.publish(&mut cached, Arc::clone(&manifest));
        Ok(manifest)
    }

    /// Drop the cached manifest and rebuild it from the tools directory.
    pub async fn refresh(&self) -> Result<Arc<ToolManifest>, RegistryError> {
        let mut cached = self.manifest.lock().await;
        let manifest = Arc::new(self.discover_manifest().await?);
        self.publish(&mut cached, Arc::clone(&manifest));
        Ok(manifest)
    }

    async fn discover_manifest(&self) -> Result<ToolManifest, RegistryError> {
        let report = discover_tools(&self.config.tools_dir, &self.config.candidate_extensions).await?;
        let manifest = ToolManifest::from_descriptors(report.descriptors.iter().cloned());
        *self.last_discovery.lock() = Some(report);

        if self.config.persist_manifest {
            if let Err(e) = manifest.save(&self.config.manifest_path).await {
                warn!(error = %e, "Failed to persist tool manifest");
            }
        }

        Ok(manifest)
    }

    /// Write the current manifest to `manifest_path`.
    pub async fn save_manifest(&self) -> Result<(), RegistryError> {
        let manifest = self.load_manifest().await?;
        manifest.save(&self.config.manifest_path).await
    }

    /// Failures from the most recent discovery, if one ran.
    pub fn discovery_failures(&self) -> Vec<DiscoveryFailure> {
        self.last_discovery
            .lock()
            .as_ref()
            .map(|report| report.failures.clone())
            .unwrap_or_default()
    }

    pub async fn get_tool_schema(&self, name: &str) -> Result<ToolDescriptor, RegistryError> {
        self.load_manifest()
            .await?
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, RegistryError> {
        Ok(self.load_manifest().await?.tools.values().cloned().collect())
    }

    /// Case-insensitive term search over names and descriptions.
    ///
    /// A term found in the name scores 3, in the description 1. Ties are
    /// broken by name.
    pub async fn search_tools(&self, query: &str) -> Result<Vec<ToolDescriptor>, RegistryError> {
        let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let manifest = self.load_manifest().await?;
        let mut scored: Vec<(usize, &ToolDescriptor)> = manifest
            .tools
            .values()
            .filter_map(|tool| {
                let name = tool.name.to_lowercase();
                let description = tool.description.to_lowercase();
                let score: usize = terms
                    .iter()
                    .map(|t| {
                        let mut s = 0;
                        if name.contains(t.as_str()) {
                            s += 3;
                        }
                        if description.contains(t.as_str()) {
                            s += 1;
                        }
                        s
                    })
                    .sum();
                (score > 0).then_some((score, tool))
            })
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.name.cmp(&b.1.name)));
        Ok(scored.into_iter().map(|(_, tool)| tool.clone()).collect())
    }

    /// Name, description and parameter names only, within the token budget.
    pub async fn get_tool_summary(&self, name: &str) -> Result<ToolSummary, RegistryError> {
        let descriptor = self.get_tool_schema(name).await?;
        Ok(build_summary(&descriptor, self.config.summary_token_budget))
    }

    /// Add a tool, or bump the version of an existing one.
    ///
    /// A bump evicts any loaded handle so the next load picks up the new
    /// implementation.
    pub async fn register_tool(&self, descriptor: ToolDescriptor) -> Result<(), RegistryError> {
        self.load_manifest().await?;
        let mut cached = self.manifest.lock().await;
        let manifest = cached.get_or_insert_with(|| Arc::new(ToolManifest::new()));

        if let Some(current) = manifest.get(&descriptor.name) {
            if !version_is_newer(&current.version, &descriptor.version) {
                return Err(RegistryError::StaleVersion {
                    name: descriptor.name,
                    current: current.version.clone(),
                    proposed: descriptor.version,
                });
            }
        }

        info!(tool = %descriptor.name, version = %descriptor.version, "Registered tool");
        let name = descriptor.name.clone();
        Arc::make_mut(manifest).insert(descriptor);
        *self.published.lock() = Some(Arc::clone(manifest));

        // A load of the previous version may still be running; detach it so
        // its result is never cached.
        let mut in_flight = self.in_flight.lock();
        in_flight.remove(&name);
        if self.loaded.lock().pop(&name).is_some() {
            debug!(tool = %name, "Unloaded superseded tool");
        }
        Ok(())
    }

    /// Resolve and load a tool, reusing the cached handle when present.
    ///
    /// Concurrent callers for the same name share one underlying load.
    pub async fn load_tool(&self, name: &str) -> Result<ToolHandle, RegistryError> {
        let cached = self.loaded.lock().get(name).cloned();
        if let Some(handle) = cached {
            debug!(tool = %name, "Tool cache hit");
            return Ok(handle);
        }

        let descriptor = self.get_tool_schema(name).await?;

        let cell = {
            let mut in_flight = self.in_flight.lock();
            // Re-check under the in-flight lock: a load may have just finished.
            if let Some(handle) = self.loaded.lock().get(name).cloned() {
                return Ok(handle);
            }
            Arc::clone(
                in_flight
                    .entry(name.to_string())
                    .or_insert_with(|| Arc::new(OnceCell::new())),
            )
        };

        let result = cell
            .get_or_try_init(|| self.load_with_policy(&descriptor))
            .await
            .cloned();

        let mut in_flight = self.in_flight.lock();
        let current = in_flight.get(name).is_some_and(|c| Arc::ptr_eq(c, &cell));
        if current {
            in_flight.remove(name);
            match &result {
                Ok(handle) if self.is_current_version(handle) => {
                    if let Some((evicted, _)) = self.loaded.lock().push(name.to_string(), Arc::clone(handle)) {
                        if evicted != name {
                            debug!(tool = %evicted, "Evicted least recently used tool");
                        }
                    }
                }
                Ok(handle) => {
                    debug!(tool = %name, version = %handle.descriptor.version, "Not caching superseded tool");
                }
                Err(_) => {}
            }
        }

        result
    }

    async fn load_with_policy(&self, descriptor: &ToolDescriptor) -> Result<ToolHandle, RegistryError> {
        let mut last_error = None;

        for attempt in 0..=self.config.load_retries {
            let attempt_result = match self.config.load_timeout() {
                Some(timeout) => match tokio::time::timeout(timeout, self.loader.load(descriptor)).await {
                    Ok(result) => result,
                    Err(_) => Err(RegistryError::Timeout {
                        name: descriptor.name.clone(),
                        timeout_ms: timeout.as_millis() as u64,
                    }),
                },
                None => self.loader.load(descriptor).await,
            };

            match attempt_result {
                Ok(tool) => {
                    metrics::counter!("tool_loads", 1);
                    info!(tool = %descriptor.name, version = %descriptor.version, "Loaded tool");
                    return Ok(Arc::new(tool));
                }
                Err(e) => {
                    warn!(tool = %descriptor.name, error = %e, "Tool load failed (attempt {})", attempt + 1);
                    last_error = Some(e);
                    if attempt < self.config.load_retries {
                        let delay = self.config.retry_backoff() * (attempt + 1);
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| RegistryError::Load {
            name: descriptor.name.clone(),
            reason: "no load attempt was made".to_string(),
        }))
    }

    /// Whether `handle` was loaded from the descriptor the manifest holds now.
    fn is_current_version(&self, handle: &ToolHandle) -> bool {
        self.published
            .lock()
            .as_ref()
            .and_then(|m| m.get(handle.name()))
            .is_some_and(|d| d.version == handle.descriptor.version)
    }

    /// Store `manifest` as the cached one and make it visible to sync readers.
    fn publish(&self, cached: &mut Option<Arc<ToolManifest>>, manifest: Arc<ToolManifest>) {
        *self.published.lock() = Some(Arc::clone(&manifest));
        *cached = Some(manifest);
    }

    /// Evict the cached handle for `name`. The manifest is untouched.
    pub fn unload_tool(&self, name: &str) -> bool {
        let removed = self.loaded.lock().pop(name).is_some();
        if removed {
            debug!(tool = %name, "Unloaded tool");
        }
        removed
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.lock().contains(name)
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded.lock().len()
    }

    /// Evict every loaded handle.
    pub fn clear_loaded(&self) {
        self.loaded.lock().clear();
    }
}

/// Compare dotted numeric versions; non-numeric parts fall back to a
/// plain inequality check.
fn version_is_newer(current: &str, proposed: &str) -> bool {
    let parse = |v: &str| -> Option<Vec<u64>> { v.split('.').map(|p| p.parse().ok()).collect() };
    match (parse(current), parse(proposed)) {
        (Some(a), Some(b)) => b > a,
        _ => current != proposed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_newer() {
        assert!(version_is_newer("1.0.0", "1.0.1"));
        assert!(version_is_newer("1.9.0", "1.10.0"));
        assert!(!version_is_newer("1.2.0", "1.2.0"));
        assert!(!version_is_newer("2.0.0", "1.9.9"));
        assert!(version_is_newer("beta", "rc"));
        assert!(!version_is_newer("beta", "beta"));
    }
}

use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use toolgate_registry::*;

/// Loader that counts calls and takes a while, so loads can overlap.
struct CountingLoader {
    calls: AtomicUsize,
    delay: Duration,
    failures_before_success: usize,
}

impl CountingLoader {
    fn new(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay,
            failures_before_success: 0,
        }
    }

    fn flaky(failures: usize) -> Self {
        Self {
            failures_before_success: failures,
            ..Self::new(Duration::from_millis(1))
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolLoader for CountingLoader {
    async fn load(&self, descriptor: &ToolDescriptor) -> Result<LoadedTool, RegistryError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if call < self.failures_before_success {
            return Err(RegistryError::Load {
                name: descriptor.name.clone(),
                reason: "transient".to_string(),
            });
        }
        Ok(LoadedTool::new(descriptor.clone(), format!("body of {}", descriptor.name)))
    }
}

fn descriptor(name: &str, description: &str) -> ToolDescriptor {
    ToolDescriptor {
        name: name.to_string(),
        version: "1.0.0".to_string(),
        author: None,
        description: description.to_string(),
        storage_locator: format!("{}.tool", name),
        input_schema: json!({"type": "object", "properties": {"query": {"type": "string"}}}),
        output_schema: json!({"type": "object"}),
        estimated_tokens: 100,
        estimated_latency_ms: 20,
    }
}

fn test_config() -> RegistryConfig {
    RegistryConfig {
        persist_manifest: false,
        retry_backoff_ms: 1,
        ..RegistryConfig::for_dir("/nonexistent/toolgate-tools")
    }
}

fn registry_with(loader: Arc<CountingLoader>, config: RegistryConfig) -> ToolRegistry {
    let manifest = ToolManifest::from_descriptors(vec![
        descriptor("crm.lookup", "Look up a customer in the CRM"),
        descriptor("invoice.create", "Create an invoice for a customer"),
        descriptor("ads.report", "Fetch the ads performance report"),
    ]);
    ToolRegistry::from_manifest(config, loader, manifest)
}

#[tokio::test]
async fn test_sequential_loads_share_handle() {
    let loader = Arc::new(CountingLoader::new(Duration::from_millis(1)));
    let registry = registry_with(Arc::clone(&loader), test_config());

    let first = registry.load_tool("crm.lookup").await.unwrap();
    let second = registry.load_tool("crm.lookup").await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(loader.calls(), 1);
    assert_eq!(first.body, "body of crm.lookup");
}

#[tokio::test]
async fn test_unload_forces_fresh_load() {
    let loader = Arc::new(CountingLoader::new(Duration::from_millis(1)));
    let registry = registry_with(Arc::clone(&loader), test_config());

    let first = registry.load_tool("crm.lookup").await.unwrap();
    assert!(registry.unload_tool("crm.lookup"));
    assert!(!registry.is_loaded("crm.lookup"));
    assert!(!registry.unload_tool("crm.lookup"));

    let second = registry.load_tool("crm.lookup").await.unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(loader.calls(), 2);
    assert!(registry.get_tool_schema("crm.lookup").await.is_ok());
}

#[tokio::test]
async fn test_concurrent_loads_share_one_load() {
    let loader = Arc::new(CountingLoader::new(Duration::from_millis(50)));
    let registry = registry_with(Arc::clone(&loader), test_config());

    let (a, b) = tokio::join!(registry.load_tool("crm.lookup"), registry.load_tool("crm.lookup"));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(loader.calls(), 1);
    assert!(Arc::ptr_eq(&a, &b));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_spawned_loads_share_one_load() {
    let loader = Arc::new(CountingLoader::new(Duration::from_millis(50)));
    let registry = Arc::new(registry_with(Arc::clone(&loader), test_config()));

    let mut handles = vec![];
    for _ in 0..16 {
        let registry = Arc::clone(&registry);
        handles.push(tokio::spawn(async move { registry.load_tool("invoice.create").await }));
    }

    let mut loaded = vec![];
    for handle in handles {
        loaded.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(loader.calls(), 1);
    assert!(loaded.iter().all(|h| Arc::ptr_eq(h, &loaded[0])));
}

#[tokio::test]
async fn test_different_tools_load_independently() {
    let loader = Arc::new(CountingLoader::new(Duration::from_millis(10)));
    let registry = registry_with(Arc::clone(&loader), test_config());

    let (a, b) = tokio::join!(registry.load_tool("crm.lookup"), registry.load_tool("ads.report"));
    assert_eq!(a.unwrap().name(), "crm.lookup");
    assert_eq!(b.unwrap().name(), "ads.report");
    assert_eq!(loader.calls(), 2);
    assert_eq!(registry.loaded_count(), 2);
}

#[tokio::test]
async fn test_unknown_tool_is_not_found() {
    let loader = Arc::new(CountingLoader::new(Duration::from_millis(1)));
    let registry = registry_with(Arc::clone(&loader), test_config());

    assert!(matches!(registry.load_tool("nope").await, Err(RegistryError::NotFound(_))));
    assert!(matches!(registry.get_tool_schema("nope").await, Err(RegistryError::NotFound(_))));
    assert!(matches!(registry.get_tool_summary("nope").await, Err(RegistryError::NotFound(_))));
    assert_eq!(loader.calls(), 0);
}

#[tokio::test]
async fn test_transient_failure_retried() {
    let loader = Arc::new(CountingLoader::flaky(2));
    let config = RegistryConfig {
        load_retries: 2,
        ..test_config()
    };
    let registry = registry_with(Arc::clone(&loader), config);

    assert!(registry.load_tool("crm.lookup").await.is_ok());
    assert_eq!(loader.calls(), 3);
}

#[tokio::test]
async fn test_exhausted_retries_surface_error_and_allow_retry() {
    let loader = Arc::new(CountingLoader::flaky(1));
    let config = RegistryConfig {
        load_retries: 0,
        ..test_config()
    };
    let registry = registry_with(Arc::clone(&loader), config);

    assert!(matches!(
        registry.load_tool("crm.lookup").await,
        Err(RegistryError::Load { .. })
    ));
    assert!(!registry.is_loaded("crm.lookup"));

    assert!(registry.load_tool("crm.lookup").await.is_ok());
    assert_eq!(loader.calls(), 2);
}

#[tokio::test]
async fn test_load_timeout() {
    let loader = Arc::new(CountingLoader::new(Duration::from_millis(200)));
    let config = RegistryConfig {
        load_timeout_ms: Some(20),
        load_retries: 0,
        ..test_config()
    };
    let registry = registry_with(Arc::clone(&loader), config);

    let result = registry.load_tool("crm.lookup").await;
    assert!(matches!(result, Err(RegistryError::Timeout { timeout_ms: 20, .. })));
}

#[tokio::test]
async fn test_loaded_cache_is_bounded() {
    let loader = Arc::new(CountingLoader::new(Duration::from_millis(1)));
    let config = RegistryConfig {
        max_loaded_tools: 2,
        ..test_config()
    };
    let registry = registry_with(Arc::clone(&loader), config);

    registry.load_tool("crm.lookup").await.unwrap();
    registry.load_tool("invoice.create").await.unwrap();
    registry.load_tool("ads.report").await.unwrap();

    assert_eq!(registry.loaded_count(), 2);
    assert!(!registry.is_loaded("crm.lookup"));
    assert!(registry.is_loaded("ads.report"));
}

#[tokio::test]
async fn test_discovery_queries_never_load() {
    let loader = Arc::new(CountingLoader::new(Duration::from_millis(1)));
    let registry = registry_with(Arc::clone(&loader), test_config());

    assert_eq!(registry.list_tools().await.unwrap().len(), 3);
    registry.search_tools("customer").await.unwrap();
    registry.get_tool_summary("crm.lookup").await.unwrap();
    registry.get_tool_schema("ads.report").await.unwrap();

    assert_eq!(loader.calls(), 0);
    assert_eq!(registry.loaded_count(), 0);
}

#[tokio::test]
async fn test_search_ranking() {
    let loader = Arc::new(CountingLoader::new(Duration::from_millis(1)));
    let registry = registry_with(loader, test_config());

    let names: Vec<String> = registry
        .search_tools("CRM customer")
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.name)
        .collect();
    assert_eq!(names, vec!["crm.lookup", "invoice.create"]);

    assert!(registry.search_tools("   ").await.unwrap().is_empty());
    assert!(registry.search_tools("kubernetes").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_manifest() {
    let temp_dir = tempfile::tempdir().unwrap();
    let registry = ToolRegistry::with_file_loader(RegistryConfig::for_dir(temp_dir.path()));

    assert!(registry.list_tools().await.unwrap().is_empty());
    assert!(registry.search_tools("anything").await.unwrap().is_empty());
    assert!(registry.discovery_failures().is_empty());
}

#[tokio::test]
async fn test_summary_respects_budget() {
    let loader = Arc::new(CountingLoader::new(Duration::from_millis(1)));
    let mut big = descriptor("bulk.export", &"Export every record in the warehouse ".repeat(40));
    let properties: serde_json::Map<String, serde_json::Value> = (0..200)
        .map(|i| (format!("column_{i}"), json!({"type": "string", "examples": ["a", "b"]})))
        .collect();
    big.input_schema = json!({"type": "object", "properties": properties});
    let config = RegistryConfig {
        summary_token_budget: 50,
        ..test_config()
    };
    let registry = ToolRegistry::from_manifest(config, loader, ToolManifest::from_descriptors(vec![big]));

    let summary = registry.get_tool_summary("bulk.export").await.unwrap();
    assert!(summary.estimated_tokens() <= 50);
    assert_eq!(summary.name, "bulk.export");
}

#[tokio::test]
async fn test_register_tool_version_bump() {
    let loader = Arc::new(CountingLoader::new(Duration::from_millis(1)));
    let registry = registry_with(Arc::clone(&loader), test_config());

    registry.load_tool("crm.lookup").await.unwrap();

    let mut same = descriptor("crm.lookup", "changed");
    same.version = "1.0.0".to_string();
    assert!(matches!(
        registry.register_tool(same).await,
        Err(RegistryError::StaleVersion { .. })
    ));

    let mut bumped = descriptor("crm.lookup", "Look up a customer in the CRM");
    bumped.version = "1.1.0".to_string();
    registry.register_tool(bumped).await.unwrap();

    assert!(!registry.is_loaded("crm.lookup"));
    assert_eq!(registry.get_tool_schema("crm.lookup").await.unwrap().version, "1.1.0");

    registry.register_tool(descriptor("new.tool", "Brand new")).await.unwrap();
    assert_eq!(registry.list_tools().await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_version_bump_during_load_is_not_cached() {
    let loader = Arc::new(CountingLoader::new(Duration::from_millis(100)));
    let registry = Arc::new(registry_with(Arc::clone(&loader), test_config()));

    let pending = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move { registry.load_tool("crm.lookup").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let mut bumped = descriptor("crm.lookup", "Look up a customer in the CRM");
    bumped.version = "2.0.0".to_string();
    registry.register_tool(bumped).await.unwrap();

    // The load that started first still completes with what it loaded.
    let old = pending.await.unwrap().unwrap();
    assert_eq!(old.descriptor.version, "1.0.0");
    assert!(!registry.is_loaded("crm.lookup"));

    let fresh = registry.load_tool("crm.lookup").await.unwrap();
    assert_eq!(fresh.descriptor.version, "2.0.0");
    assert_eq!(loader.calls(), 2);

    let again = registry.load_tool("crm.lookup").await.unwrap();
    assert!(Arc::ptr_eq(&fresh, &again));
}

#[tokio::test]
async fn test_summary_budget_below_floor_is_raised() {
    let loader = Arc::new(CountingLoader::new(Duration::from_millis(1)));
    let config = RegistryConfig {
        summary_token_budget: 1,
        ..test_config()
    };
    let registry = registry_with(loader, config);
    let floor = min_summary_budget();

    assert_eq!(registry.config().summary_token_budget, floor);
    let summary = registry.get_tool_summary("crm.lookup").await.unwrap();
    assert!(summary.estimated_tokens() <= floor);
}

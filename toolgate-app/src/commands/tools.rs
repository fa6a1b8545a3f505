use anyhow::{Context, Result};
use toolgate_registry::{RegistryConfig, ToolDescriptor, ToolRegistry};

fn open(config: &RegistryConfig) -> ToolRegistry {
    ToolRegistry::with_file_loader(config.clone())
}

pub async fn discover(config: &RegistryConfig) -> Result<()> {
    let registry = open(config);
    let manifest = registry
        .refresh()
        .await
        .with_context(|| format!("Discovery failed in {}", config.tools_dir.display()))?;

    println!("🔍 Discovered {} tool(s) in {}", manifest.len(), config.tools_dir.display());
    for descriptor in manifest.tools.values() {
        println!("  ✓ {} ({})", descriptor.name, descriptor.storage_locator);
    }

    let failures = registry.discovery_failures();
    if !failures.is_empty() {
        println!("\n{} module(s) skipped:", failures.len());
        for failure in &failures {
            println!("  ✗ {}: {}", failure.path.display(), failure.reason);
        }
    }

    if config.persist_manifest {
        println!("\nManifest written to {}", config.manifest_path.display());
    }
    Ok(())
}

pub async fn list(config: &RegistryConfig) -> Result<()> {
    let tools = open(config).list_tools().await?;
    if tools.is_empty() {
        println!("No tools found.");
        return Ok(());
    }
    for tool in &tools {
        println!("{}", format_line(tool));
    }
    Ok(())
}

pub async fn search(config: &RegistryConfig, query: &str) -> Result<()> {
    let tools = open(config).search_tools(query).await?;
    if tools.is_empty() {
        println!("No tools match '{}'.", query);
        return Ok(());
    }
    for tool in &tools {
        println!("{}", format_line(tool));
    }
    Ok(())
}

pub async fn summary(config: &RegistryConfig, name: &str) -> Result<()> {
    let summary = open(config).get_tool_summary(name).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

pub async fn schema(config: &RegistryConfig, name: &str) -> Result<()> {
    let descriptor = open(config).get_tool_schema(name).await?;
    println!("{}", serde_json::to_string_pretty(&descriptor)?);
    Ok(())
}

fn format_line(tool: &ToolDescriptor) -> String {
    format!(
        "{:<24} v{:<8} ~{} tokens  {}",
        tool.name, tool.version, tool.estimated_tokens, tool.description
    )
}

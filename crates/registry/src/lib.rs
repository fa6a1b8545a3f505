//! Tool manifest, progressive discovery and lazy loading.
//!
//! Listing, searching and describing tools only ever touch the manifest.
//! Tool bodies are read on the first `load_tool` call and cached per name.

pub mod config;
pub mod discovery;
pub mod error;
pub mod loader;
pub mod manifest;
pub mod registry;
pub mod summary;

pub use config::RegistryConfig;
pub use discovery::{discover_tools, parse_tool_module, DiscoveryFailure, DiscoveryReport};
pub use error::RegistryError;
pub use loader::{FileToolLoader, LoadedTool, ToolHandle, ToolLoader};
pub use manifest::{ToolDescriptor, ToolManifest, MANIFEST_VERSION};
pub use registry::ToolRegistry;
pub use summary::{build_summary, estimate_tokens, min_summary_budget, ToolSummary};

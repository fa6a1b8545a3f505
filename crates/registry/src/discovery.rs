//! Static, non-executing extraction of tool metadata.
//!
//! A tool module declares itself through comment tags and a literal JSON
//! schema block:
//!
//! ```text
//! /// Look up a customer record in the CRM.
//! /// @tool crm.lookup
//! /// @version 1.2.0
//! /// @author ops
//! /// @schema
//! /// {
//! ///   "input": {"type": "object", "properties": {"email": {"type": "string"}}},
//! ///   "output": {"type": "object"},
//! ///   "estimatedTokens": 180,
//! ///   "estimatedLatencyMs": 40
//! /// }
//! /// @end-schema
//! ```
//!
//! The block is parsed as data. Module bodies are never run.

use crate::error::RegistryError;
use crate::manifest::ToolDescriptor;
use crate::summary::estimate_tokens;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

const DEFAULT_VERSION: &str = "0.1.0";

/// Comment leaders, longest first so `///` wins over `//`.
const COMMENT_LEADERS: [&str; 9] = ["///", "//!", "//", "/**", "/*", "*/", "*", "#", "--"];

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no @schema block")]
    MissingSchema,
    #[error("@schema block is not closed by @end-schema")]
    UnterminatedSchema,
    #[error("schema block is not valid: {0}")]
    InvalidSchema(#[from] serde_json::Error),
    #[error("no description")]
    MissingDescription,
    #[error("invalid tool name '{0}'")]
    InvalidName(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of a scan. Failures are collected, never raised.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryReport {
    pub descriptors: Vec<ToolDescriptor>,
    pub failures: Vec<DiscoveryFailure>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SchemaBlock {
    #[serde(default)]
    input: Value,
    #[serde(default)]
    output: Value,
    estimated_tokens: Option<u64>,
    #[serde(default)]
    estimated_latency_ms: u64,
}

fn comment_body(line: &str) -> Option<&str> {
    if line.starts_with("#!") {
        return None;
    }
    COMMENT_LEADERS
        .iter()
        .find_map(|leader| line.strip_prefix(leader))
        .map(str::trim)
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Build a descriptor from the text of one tool module.
///
/// `locator` is recorded as the storage locator; `default_name` is used
/// when the module carries no `@tool` tag.
pub fn parse_tool_module(
    locator: &str,
    default_name: &str,
    content: &str,
) -> Result<ToolDescriptor, ExtractError> {
    let mut name: Option<String> = None;
    let mut description: Option<String> = None;
    let mut first_line: Option<String> = None;
    let mut version: Option<String> = None;
    let mut author: Option<String> = None;
    let mut schema_lines: Vec<&str> = Vec::new();
    let mut in_schema = false;
    let mut schema_closed = false;

    for raw in content.lines() {
        let line = raw.trim();

        if in_schema {
            let body = comment_body(line).unwrap_or(line);
            if body == "@end-schema" {
                in_schema = false;
                schema_closed = true;
            } else {
                schema_lines.push(body);
            }
            continue;
        }

        let Some(body) = comment_body(line) else {
            continue;
        };

        if body == "@schema" {
            if !schema_closed {
                in_schema = true;
            }
            continue;
        }

        if let Some(tagged) = body.strip_prefix('@') {
            let (tag, value) = tagged.split_once(char::is_whitespace).unwrap_or((tagged, ""));
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match tag {
                "tool" => name = Some(value.to_string()),
                "description" => description = Some(value.to_string()),
                "version" => version = Some(value.to_string()),
                "author" => author = Some(value.to_string()),
                _ => {}
            }
        } else if first_line.is_none() && !body.is_empty() {
            first_line = Some(body.to_string());
        }
    }

    if in_schema {
        return Err(ExtractError::UnterminatedSchema);
    }
    if !schema_closed {
        return Err(ExtractError::MissingSchema);
    }

    let schema: SchemaBlock = serde_json::from_str(&schema_lines.join("\n"))?;

    let name = name.unwrap_or_else(|| default_name.to_string());
    if !is_valid_name(&name) {
        return Err(ExtractError::InvalidName(name));
    }

    let description = description
        .or(first_line)
        .ok_or(ExtractError::MissingDescription)?;

    let estimated_tokens = schema.estimated_tokens.unwrap_or_else(|| {
        let schema_text = format!("{}{}", schema.input, schema.output);
        (estimate_tokens(&description) + estimate_tokens(&schema_text)) as u64
    });

    Ok(ToolDescriptor {
        name,
        version: version.unwrap_or_else(|| DEFAULT_VERSION.to_string()),
        author,
        description,
        storage_locator: locator.to_string(),
        input_schema: schema.input,
        output_schema: schema.output,
        estimated_tokens,
        estimated_latency_ms: schema.estimated_latency_ms,
    })
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|allowed| allowed == ext))
}

fn skip(failures: &mut Vec<DiscoveryFailure>, path: PathBuf, reason: String) {
    warn!(path = ?path, %reason, "Skipping tool path");
    failures.push(DiscoveryFailure { path, reason });
}

/// Walk `root` for candidate modules, following symlinks.
///
/// Only an unreadable `root` is an error; anything below it that cannot be
/// read is recorded in `failures` and skipped.
async fn collect_candidates(
    root: &Path,
    extensions: &[String],
    failures: &mut Vec<DiscoveryFailure>,
) -> Result<Vec<PathBuf>, RegistryError> {
    let mut candidates = Vec::new();
    let mut visited = HashSet::new();
    if let Ok(canonical) = fs::canonicalize(root).await {
        visited.insert(canonical);
    }

    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if dir == root => return Err(e.into()),
            Err(e) => {
                skip(failures, dir, format!("failed to list directory: {}", e));
                continue;
            }
        };
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    skip(failures, dir.clone(), format!("failed to list directory: {}", e));
                    break;
                }
            };
            let path = entry.path();

            let metadata = match fs::metadata(&path).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    if has_extension(&path, extensions) || entry.file_type().await.is_ok_and(|t| t.is_dir()) {
                        skip(failures, path, format!("unreadable: {}", e));
                    }
                    continue;
                }
            };

            if metadata.is_dir() {
                // Symlinked directories may point back up the tree.
                match fs::canonicalize(&path).await {
                    Ok(canonical) if !visited.insert(canonical.clone()) => continue,
                    Ok(_) => {}
                    Err(e) => {
                        skip(failures, path, format!("unreadable: {}", e));
                        continue;
                    }
                }
                pending.push(path);
            } else if metadata.is_file() && has_extension(&path, extensions) {
                candidates.push(path);
            }
        }
    }

    candidates.sort();
    Ok(candidates)
}

/// Scan `root` for tool modules and extract a descriptor from each.
///
/// A missing directory yields an empty report. Unreadable subdirectories,
/// unreadable or malformed modules, and repeated tool names are recorded as
/// failures and skipped.
pub async fn discover_tools(root: &Path, extensions: &[String]) -> Result<DiscoveryReport, RegistryError> {
    let mut report = DiscoveryReport::default();

    if !root.exists() {
        warn!("Tool directory {:?} does not exist; nothing to discover", root);
        return Ok(report);
    }

    let mut seen = HashSet::new();
    for path in collect_candidates(root, extensions, &mut report.failures).await? {
        let locator = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");
        let default_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let extracted = match fs::read_to_string(&path).await {
            Ok(content) => parse_tool_module(&locator, &default_name, &content).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match extracted {
            Ok(descriptor) if !seen.insert(descriptor.name.clone()) => {
                let reason = format!("duplicate tool name '{}'", descriptor.name);
                warn!(path = ?path, %reason, "Skipping tool module");
                report.failures.push(DiscoveryFailure { path, reason });
            }
            Ok(descriptor) => {
                debug!(tool = %descriptor.name, "Discovered tool");
                report.descriptors.push(descriptor);
            }
            Err(reason) => {
                warn!(path = ?path, %reason, "Skipping tool module");
                report.failures.push(DiscoveryFailure { path, reason });
            }
        }
    }

    info!(
        discovered = report.descriptors.len(),
        failed = report.failures.len(),
        "Tool discovery finished for {:?}",
        root
    );
    Ok(report)
}

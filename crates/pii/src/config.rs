use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PiiConfig {
    /// Upper bound on live token mappings; least recently used pairs are
    /// evicted in both directions at once.
    pub max_entries: usize,
    /// Object keys whose values are structural and never scanned.
    pub safe_keys: Vec<String>,
}

impl Default for PiiConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            safe_keys: ["id", "uuid", "timestamp", "created_at", "updated_at", "tool_name"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl PiiConfig {
    pub fn is_safe_key(&self, key: &str) -> bool {
        self.safe_keys.iter().any(|k| k.eq_ignore_ascii_case(key))
    }
}

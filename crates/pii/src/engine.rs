use crate::config::PiiConfig;
use crate::detectors::{self, token_re};
use crate::types::{PiiCategory, TokenizedEntry};
use lru::LruCache;
use parking_lot::Mutex;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use toolgate_interfaces::{SanitizedTelemetry, TelemetryRecord};
use tracing::debug;

/// Bytes of the SHA-256 digest kept in a token (16 hex chars).
const TOKEN_DIGEST_BYTES: usize = 8;

/// Forward (token -> entry) and reverse ((category, original) -> token) maps.
///
/// Both directions are always inserted and evicted together.
struct TokenStore {
    forward: LruCache<String, TokenizedEntry>,
    reverse: HashMap<(PiiCategory, String), String>,
}

impl TokenStore {
    fn new(capacity: NonZeroUsize) -> Self {
        Self {
            forward: LruCache::new(capacity),
            reverse: HashMap::new(),
        }
    }

    fn insert(&mut self, entry: TokenizedEntry) {
        let token = entry.token.clone();
        self.reverse
            .insert((entry.category, entry.original.clone()), token.clone());

        if let Some((evicted_token, evicted)) = self.forward.push(token.clone(), entry) {
            if evicted_token != token {
                self.reverse.remove(&(evicted.category, evicted.original));
                debug!(token = %evicted_token, "evicted least recently used token");
            }
        }
    }

    fn clear(&mut self) {
        self.forward.clear();
        self.reverse.clear();
    }
}

/// Detects PII in nested data and swaps it for deterministic tokens.
///
/// The engine is the sole owner of its token maps. `detokenize_data` hands
/// raw PII back and must only be reached from trusted internal paths.
pub struct TokenizationEngine {
    config: PiiConfig,
    store: Mutex<TokenStore>,
}

impl TokenizationEngine {
    pub fn new() -> Self {
        Self::with_config(PiiConfig::default())
    }

    pub fn with_config(config: PiiConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            config,
            store: Mutex::new(TokenStore::new(capacity)),
        }
    }

    pub fn config(&self) -> &PiiConfig {
        &self.config
    }

    /// Replace every detected PII substring in `value`, preserving shape.
    pub fn tokenize(&self, value: &Value) -> Value {
        match value {
            Value::String(text) => Value::String(self.tokenize_text(text)),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.tokenize(v)).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, v)| {
                        let v = if self.config.is_safe_key(key) {
                            v.clone()
                        } else {
                            self.tokenize(v)
                        };
                        (key.clone(), v)
                    })
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    pub fn tokenize_text(&self, text: &str) -> String {
        let detections = detectors::detect(text);
        if detections.is_empty() {
            return text.to_string();
        }

        let mut output = String::with_capacity(text.len());
        let mut last = 0usize;
        for detection in detections {
            output.push_str(&text[last..detection.start]);
            output.push_str(&self.create_token(&text[detection.start..detection.end], detection.category));
            last = detection.end;
        }
        output.push_str(&text[last..]);
        output
    }

    /// Mint (or reuse) the token for `value`.
    ///
    /// Idempotent: a value seen before gets its existing token back.
    pub fn create_token(&self, value: &str, category: PiiCategory) -> String {
        let mut store = self.store.lock();

        if let Some(token) = store.reverse.get(&(category, value.to_string())).cloned() {
            store.forward.promote(&token);
            return token;
        }

        let token = format_token(value, category);
        store.insert(TokenizedEntry {
            original: value.to_string(),
            token: token.clone(),
            category,
        });
        token
    }

    /// Original value for a known token; `None` for anything else.
    pub fn detokenize(&self, token: &str) -> Option<String> {
        self.store.lock().forward.get(token).map(|e| e.original.clone())
    }

    /// Structural inverse of [`tokenize`](Self::tokenize).
    ///
    /// Privileged: the result contains raw PII. Only live mappings are
    /// restored: once more than `max_entries` distinct values have been
    /// tokenized, tokens for evicted values stay as tokens.
    pub fn detokenize_data(&self, value: &Value) -> Value {
        match value {
            Value::String(text) => Value::String(self.detokenize_text(text)),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.detokenize_data(v)).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, v)| {
                        let v = if self.config.is_safe_key(key) {
                            v.clone()
                        } else {
                            self.detokenize_data(v)
                        };
                        (key.clone(), v)
                    })
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Single pass over `text`; token-shaped substrings the engine never
    /// minted are left as they are.
    pub fn detokenize_text(&self, text: &str) -> String {
        token_re()
            .replace_all(text, |caps: &regex::Captures<'_>| {
                self.detokenize(&caps[0]).unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    /// True iff [`tokenize`](Self::tokenize) would change at least one
    /// nested string. Walks the same shapes, safe keys included.
    pub fn contains_pii(&self, value: &Value) -> bool {
        match value {
            Value::String(text) => detectors::has_match(text),
            Value::Array(items) => items.iter().any(|v| self.contains_pii(v)),
            Value::Object(map) => map
                .iter()
                .any(|(key, v)| !self.config.is_safe_key(key) && self.contains_pii(v)),
            _ => false,
        }
    }

    /// Copy of `record` with its free-form fields tokenized.
    pub fn sanitize_record(&self, record: &TelemetryRecord) -> TelemetryRecord {
        TelemetryRecord {
            tool_name: self.tokenize_text(&record.tool_name),
            context_id: record.context_id.as_deref().map(|c| self.tokenize_text(c)),
            sanitized: true,
            ..record.clone()
        }
    }

    /// Minimal projection safe to emit, whatever the detectors missed.
    pub fn sanitized_telemetry_projection(record: &TelemetryRecord) -> SanitizedTelemetry {
        SanitizedTelemetry {
            tool_name: record.tool_name.clone(),
            tokens_used: record.tokens_used,
            latency_ms: record.latency_ms,
            success: record.success,
            timestamp: record.timestamp,
        }
    }

    pub fn len(&self) -> usize {
        self.store.lock().forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every mapping, e.g. at session end.
    pub fn clear(&self) {
        self.store.lock().clear();
        debug!("token maps cleared");
    }
}

impl Default for TokenizationEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn format_token(value: &str, category: PiiCategory) -> String {
    let mut hasher = Sha256::new();
    hasher.update(category.label().as_bytes());
    hasher.update(b":");
    hasher.update(value.as_bytes());
    let digest = hasher.finalize();
    format!("[{}_{}]", category.label(), hex::encode(&digest[..TOKEN_DIGEST_BYTES]))
}

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;
use toolgate_pii::TokenizationEngine;

/// Result of scanning one document.
pub struct ScanOutcome {
    pub contains_pii: bool,
    pub tokenized: String,
    pub tokens_minted: usize,
}

pub fn scan_text(engine: &TokenizationEngine, text: &str) -> ScanOutcome {
    let contains_pii = engine.contains_pii(&Value::String(text.to_string()));
    let tokenized = engine.tokenize_text(text);
    ScanOutcome {
        contains_pii,
        tokenized,
        tokens_minted: engine.len(),
    }
}

pub async fn run(engine: &TokenizationEngine, path: &Path) -> Result<()> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let outcome = scan_text(engine, &text);
    if outcome.contains_pii {
        println!("⚠️  PII detected ({} distinct value(s))\n", outcome.tokens_minted);
    } else {
        println!("✓ No PII detected (detection is best-effort)\n");
    }
    print!("{}", outcome.tokenized);
    if !outcome.tokenized.ends_with('\n') {
        println!();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_text() {
        let engine = TokenizationEngine::new();
        let outcome = scan_text(&engine, "mail a@b.com, call 555-123-4567, mail a@b.com");

        assert!(outcome.contains_pii);
        assert_eq!(outcome.tokens_minted, 2);
        assert!(!outcome.tokenized.contains("a@b.com"));
        assert_eq!(engine.detokenize_text(&outcome.tokenized), "mail a@b.com, call 555-123-4567, mail a@b.com");
    }

    #[test]
    fn test_scan_clean_text() {
        let engine = TokenizationEngine::new();
        let outcome = scan_text(&engine, "nothing to see here");
        assert!(!outcome.contains_pii);
        assert_eq!(outcome.tokenized, "nothing to see here");
    }

    #[tokio::test]
    async fn test_run_missing_file() {
        let engine = TokenizationEngine::new();
        assert!(run(&engine, Path::new("/nonexistent/toolgate.txt")).await.is_err());
    }
}

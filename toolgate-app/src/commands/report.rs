use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use toolgate_pii::TokenizationEngine;
use toolgate_telemetry::{JsonlFileSink, TelemetryAggregator, TelemetryConfig};

/// Replay a JSONL sink file into a fresh aggregator.
pub async fn replay(config: &TelemetryConfig, path: &Path) -> Result<TelemetryAggregator> {
    let records = JsonlFileSink::read_all(path)
        .await
        .with_context(|| format!("Failed to read telemetry from {}", path.display()))?;

    let config = TelemetryConfig {
        sink: None,
        max_records: config.max_records.max(records.len()),
        ..config.clone()
    };
    let aggregator = TelemetryAggregator::new(config, Arc::new(TokenizationEngine::new()));
    for record in &records {
        aggregator.import(record);
    }
    tracing::debug!(records = records.len(), "Replayed telemetry");
    Ok(aggregator)
}

pub async fn run(config: &TelemetryConfig, path: &Path) -> Result<()> {
    let aggregator = replay(config, path).await?;
    println!("{}", aggregator.generate_optimization_report());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replay_jsonl() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("telemetry.jsonl");
        std::fs::write(
            &path,
            concat!(
                r#"{"tool_name":"a","token_used":100,"latency_ms":10,"success":true,"timestamp":"2024-01-01T00:00:00Z"}"#,
                "\n\n",
                r#"{"tool_name":"b","token_used":300,"latency_ms":50,"success":false,"timestamp":"2024-01-01T00:00:01Z"}"#,
                "\n"
            ),
        )
        .unwrap();

        let aggregator = replay(&TelemetryConfig::default(), &path).await.unwrap();
        let tokens = aggregator.get_token_savings_report();
        assert_eq!(tokens.total_calls, 2);
        assert_eq!(tokens.failed_calls, 1);
        assert_eq!(tokens.total_tokens, 400);
        assert_eq!(aggregator.get_latency_report().p50_ms, 50);
    }

    #[tokio::test]
    async fn test_replay_malformed_line() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("bad.jsonl");
        std::fs::write(&path, "not json\n").unwrap();

        assert!(replay(&TelemetryConfig::default(), &path).await.is_err());
    }
}

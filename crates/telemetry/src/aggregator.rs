use crate::config::TelemetryConfig;
use crate::report::{format_optimization_report, LatencyReport, TokenSavingsReport};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::task::JoinHandle;
use toolgate_interfaces::{SanitizedTelemetry, SinkError, TelemetryRecord, TelemetrySink};
use toolgate_pii::TokenizationEngine;
use tracing::{debug, warn};

/// In-process telemetry history plus best-effort forwarding to a sink.
///
/// Raw records stay in memory for local reporting. Only the sanitized
/// projection of a record is ever handed to the sink, and forwarding runs on
/// a spawned task so `record` never waits on sink latency or failures.
pub struct TelemetryAggregator {
    config: TelemetryConfig,
    engine: Arc<TokenizationEngine>,
    sink: Option<Arc<dyn TelemetrySink>>,
    history: Mutex<VecDeque<TelemetryRecord>>,
    dead_letters: Arc<Mutex<VecDeque<SanitizedTelemetry>>>,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl TelemetryAggregator {
    pub fn new(config: TelemetryConfig, engine: Arc<TokenizationEngine>) -> Self {
        Self {
            config,
            engine,
            sink: None,
            history: Mutex::new(VecDeque::new()),
            dead_letters: Arc::new(Mutex::new(VecDeque::new())),
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    pub fn engine(&self) -> &Arc<TokenizationEngine> {
        &self.engine
    }

    /// Record one tool call and queue its sanitized projection for the sink.
    pub fn record(
        &self,
        tool_name: &str,
        tokens_used: u64,
        latency_ms: u64,
        success: bool,
        context_id: Option<String>,
    ) -> TelemetryRecord {
        let record =
            TelemetryRecord::new(tool_name, tokens_used, latency_ms, success).with_context(context_id);

        metrics::histogram!("tool_execution_latency", latency_ms as f64);
        metrics::counter!("tool_tokens_used", tokens_used);

        self.push_history(record.clone());

        if let Some(sink) = &self.sink {
            let sanitized = self.engine.sanitize_record(&record);
            let projection = TokenizationEngine::sanitized_telemetry_projection(&sanitized);
            self.forward(sink.clone(), projection);
        }

        record
    }

    /// Add a record to history without forwarding it, e.g. when replaying a
    /// sink file.
    pub fn import(&self, projection: &SanitizedTelemetry) {
        let record = TelemetryRecord {
            tool_name: projection.tool_name.clone(),
            tokens_used: projection.tokens_used,
            latency_ms: projection.latency_ms,
            success: projection.success,
            timestamp: projection.timestamp,
            context_id: None,
            sanitized: true,
        };
        self.push_history(record);
    }

    fn push_history(&self, record: TelemetryRecord) {
        push_bounded(&self.history, self.config.max_records, record);
    }

    fn forward(&self, sink: Arc<dyn TelemetrySink>, projection: SanitizedTelemetry) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(sink = sink.name(), "No async runtime; telemetry record dead-lettered");
                metrics::counter!("telemetry_sink_failures", 1);
                push_bounded(&self.dead_letters, self.config.dead_letter_capacity, projection);
                return;
            }
        };

        let retries = self.config.sink_retries;
        let timeout = self.config.sink_timeout();
        let backoff = self.config.sink_backoff();
        let capacity = self.config.dead_letter_capacity;
        let dead_letters = self.dead_letters.clone();

        let task = handle.spawn(async move {
            for attempt in 0..=retries {
                let sent = match timeout {
                    Some(limit) => match tokio::time::timeout(limit, sink.send(&projection)).await {
                        Ok(result) => result,
                        Err(_) => Err(SinkError::Transport(format!(
                            "send timed out after {} ms",
                            limit.as_millis()
                        ))),
                    },
                    None => sink.send(&projection).await,
                };
                match sent {
                    Ok(()) => {
                        debug!(sink = sink.name(), tool = %projection.tool_name, "Telemetry forwarded");
                        return;
                    }
                    Err(e) if attempt < retries => {
                        debug!(sink = sink.name(), attempt = attempt + 1, error = %e, "Telemetry send failed, retrying");
                        tokio::time::sleep(backoff * (attempt + 1)).await;
                    }
                    Err(e) => {
                        warn!(sink = sink.name(), error = %e, "Telemetry forwarding failed");
                        metrics::counter!("telemetry_sink_failures", 1);
                    }
                }
            }
            push_bounded(&dead_letters, capacity, projection);
        });

        let mut pending = self.pending.lock();
        pending.retain(|h| !h.is_finished());
        pending.push(task);
    }

    /// Wait for every outstanding forwarding task.
    pub async fn flush(&self) {
        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.pending.lock());
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Telemetry forwarding task aborted");
            }
        }
    }

    pub fn records(&self) -> Vec<TelemetryRecord> {
        self.history.lock().iter().cloned().collect()
    }

    pub fn dead_letters(&self) -> Vec<SanitizedTelemetry> {
        self.dead_letters.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.history.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_token_savings_report(&self) -> TokenSavingsReport {
        let records = self.records();
        TokenSavingsReport::from_records(&records, self.config.naive_tokens_per_call, self.config.top_n)
    }

    pub fn get_latency_report(&self) -> LatencyReport {
        LatencyReport::from_records(&self.records())
    }

    pub fn generate_optimization_report(&self) -> String {
        format_optimization_report(&self.get_token_savings_report(), &self.get_latency_report())
    }

    /// Drop all history. Dead letters are kept.
    pub fn clear(&self) {
        self.history.lock().clear();
    }
}

/// Append `item`, dropping the oldest entries. A capacity of zero keeps one.
fn push_bounded<T>(queue: &Mutex<VecDeque<T>>, capacity: usize, item: T) {
    let mut queue = queue.lock();
    while queue.len() >= capacity.max(1) {
        queue.pop_front();
    }
    queue.push_back(item);
}

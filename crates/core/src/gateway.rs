use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::executor::ControlFlowExecutor;
use std::sync::Arc;
use std::time::Instant;
use toolgate_interfaces::{ExecutionOutcome, ToolInvocation};
use toolgate_pii::TokenizationEngine;
use toolgate_registry::{ToolDescriptor, ToolLoader, ToolRegistry, ToolSummary};
use toolgate_telemetry::{build_sink, TelemetryAggregator};
use tracing::{info, warn};

/// Caller-facing entry point.
///
/// Everything returned to the caller has been through the tokenization
/// engine. Parameters coming back from the caller are detokenized only on the
/// way to the executor.
pub struct Gateway {
    registry: Arc<ToolRegistry>,
    engine: Arc<TokenizationEngine>,
    aggregator: Arc<TelemetryAggregator>,
    executor: Arc<dyn ControlFlowExecutor>,
}

impl Gateway {
    pub fn new(
        registry: Arc<ToolRegistry>,
        engine: Arc<TokenizationEngine>,
        aggregator: Arc<TelemetryAggregator>,
        executor: Arc<dyn ControlFlowExecutor>,
    ) -> Self {
        Self {
            registry,
            engine,
            aggregator,
            executor,
        }
    }

    /// Build every component from config. A configured sink is opened here.
    pub async fn from_config(
        config: GatewayConfig,
        loader: Arc<dyn ToolLoader>,
        executor: Arc<dyn ControlFlowExecutor>,
    ) -> Result<Self, GatewayError> {
        config.validate()?;

        let engine = Arc::new(TokenizationEngine::with_config(config.pii));
        let mut aggregator = TelemetryAggregator::new(config.telemetry.clone(), engine.clone());
        if let Some(sink) = build_sink(&config.telemetry).await? {
            info!(sink = sink.name(), "Telemetry sink enabled");
            aggregator = aggregator.with_sink(sink);
        }
        let registry = Arc::new(ToolRegistry::new(config.registry, loader));

        Ok(Self::new(registry, engine, Arc::new(aggregator), executor))
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn engine(&self) -> &Arc<TokenizationEngine> {
        &self.engine
    }

    pub fn aggregator(&self) -> &Arc<TelemetryAggregator> {
        &self.aggregator
    }

    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, GatewayError> {
        Ok(self.registry.list_tools().await?)
    }

    pub async fn search_tools(&self, query: &str) -> Result<Vec<ToolDescriptor>, GatewayError> {
        Ok(self.registry.search_tools(query).await?)
    }

    pub async fn tool_summary(&self, name: &str) -> Result<ToolSummary, GatewayError> {
        Ok(self.registry.get_tool_summary(name).await?)
    }

    /// Resolve, load and run a tool, recording the call.
    pub async fn execute(&self, invocation: ToolInvocation) -> Result<ExecutionOutcome, GatewayError> {
        let tool = invocation.name.clone();
        let context_id = invocation.context_id.clone();

        // Unknown names fail here, before anything is loaded or recorded.
        self.registry.get_tool_schema(&tool).await?;
        let handle = self.registry.load_tool(&tool).await?;

        let resolved = ToolInvocation {
            parameters: self.engine.detokenize_data(&invocation.parameters),
            ..invocation
        };

        info!(tool = %tool, "Executing tool");
        let started = Instant::now();

        match self.executor.execute(&handle, resolved).await {
            Ok(outcome) => {
                self.aggregator.record(
                    &tool,
                    outcome.tokens_used,
                    outcome.latency_ms,
                    outcome.success,
                    context_id,
                );
                Ok(ExecutionOutcome {
                    output: self.engine.tokenize(&outcome.output),
                    error: outcome.error.as_deref().map(|e| self.engine.tokenize_text(e)),
                    ..outcome
                })
            }
            Err(e) => {
                let latency_ms = started.elapsed().as_millis() as u64;
                self.aggregator.record(&tool, 0, latency_ms, false, context_id);

                let message = self.engine.tokenize_text(&e.to_string());
                warn!(tool = %tool, error = %message, "Tool execution failed");
                Err(GatewayError::Executor { tool, message })
            }
        }
    }

    /// Flush pending telemetry and drop loaded tools.
    pub async fn shutdown(&self) {
        self.aggregator.flush().await;
        self.registry.clear_loaded();
        info!("Gateway shut down");
    }
}

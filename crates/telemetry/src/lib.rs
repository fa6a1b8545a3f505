//! Token and latency accounting for tool calls.

pub mod aggregator;
pub mod config;
pub mod report;
pub mod sink;

pub use aggregator::TelemetryAggregator;
pub use config::{SinkConfig, TelemetryConfig};
pub use report::{format_optimization_report, percentile, LatencyReport, TokenSavingsReport, ToolLatency, ToolUsage};
pub use sink::{build_sink, HttpTelemetrySink, JsonlFileSink, NoopSink};

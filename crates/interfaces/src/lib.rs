pub mod telemetry;
pub mod traits;

pub use telemetry::{ExecutionOutcome, SanitizedTelemetry, TelemetryRecord, ToolInvocation};
pub use traits::{SinkError, TelemetrySink};

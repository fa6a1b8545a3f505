use async_trait::async_trait;
use thiserror::Error;
use toolgate_interfaces::{ExecutionOutcome, ToolInvocation};
use toolgate_registry::ToolHandle;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Execution failed: {0}")]
    Failed(String),
    #[error("Executor unavailable: {0}")]
    Unavailable(String),
}

/// Runs a loaded tool. How it runs is up to the implementation; it only has
/// to report tokens, latency and success back.
#[async_trait]
pub trait ControlFlowExecutor: Send + Sync {
    async fn execute(
        &self,
        tool: &ToolHandle,
        invocation: ToolInvocation,
    ) -> Result<ExecutionOutcome, ExecutorError>;
}

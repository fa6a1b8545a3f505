//! Composition point for the tool-access layer.
//!
//! [`Gateway`] wires the registry, the tokenization engine and the telemetry
//! aggregator together and hands resolved invocations to an external
//! [`ControlFlowExecutor`].

pub mod config;
pub mod error;
pub mod executor;
pub mod gateway;

pub use config::{ConfigError, GatewayConfig};
pub use error::GatewayError;
pub use executor::{ControlFlowExecutor, ExecutorError};
pub use gateway::Gateway;

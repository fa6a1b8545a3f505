//! Reversible PII tokenization.
//!
//! Detection is best-effort: the detector set is narrow on purpose, and a
//! string that comes back unchanged is not proof that it holds no PII.

pub mod config;
pub mod detectors;
pub mod engine;
pub mod types;

pub use config::PiiConfig;
pub use engine::TokenizationEngine;
pub use types::{PiiCategory, TokenizedEntry};

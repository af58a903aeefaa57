//! Error types for NoBet Insight

use thiserror::Error;

/// Errors that can occur while configuring the engine or decoding its input.
///
/// Scoring itself never returns an error: malformed records are dropped and
/// counted, and degenerate module inputs become `ModuleOutcome` states.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse assessment input: {0}")]
    ParseError(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}

impl EngineError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        EngineError::InvalidConfig(msg.into())
    }
}

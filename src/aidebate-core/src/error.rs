//! Error types for the debate system.

use thiserror::Error;

use crate::flow::Side;

/// Failures surfaced by a model backend. One variant per failure class so
/// the operator can tell a slow backend from a missing one.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("backend did not respond within {seconds}s")]
    Timeout { seconds: u64 },

    #[error("backend unreachable or misconfigured: {0}")]
    Unavailable(String),

    #[error("backend returned empty or malformed output: {0}")]
    InvalidResponse(String),
}

#[derive(Error, Debug)]
pub enum DebateError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// A model call failed mid-turn. The session is left untouched so the
    /// same slot can be retried with another `execute_turn` call.
    #[error("Model call for {side} side ({model}) failed: {source}")]
    Gateway {
        side: Side,
        model: String,
        #[source]
        source: GatewayError,
    },
}

//! Structured error taxonomy for the engine.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Engine failures, classified so callers can map them onto transport
/// responses without string matching.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The request itself is malformed: bad relative expression, inverted
    /// window, unknown variant key.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A named view or test does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request's cancellation signal fired before completion.
    #[error("request cancelled")]
    Cancelled,

    /// The analytical store or side database could not be reached.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// A middleware or consistency failure inside the engine.
    #[error("internal: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::UpstreamUnavailable(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

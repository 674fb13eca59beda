//! Error types for the agentflux domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all agentflux operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Streaming engine errors ---
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Caller misuse of a streaming parser or response handler.
///
/// Malformed LLM output never produces one of these; it degrades to text or
/// drops the affected invocation instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("Stream already finalized; no further input is accepted")]
    Finalized,

    #[error("Cannot start a {requested} segment while segment {open_id} is still open")]
    SegmentAlreadyOpen { open_id: String, requested: String },

    #[error("No segment is open for {operation}")]
    NoOpenSegment { operation: &'static str },
}

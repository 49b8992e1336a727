//! Unified error types for the msgbuf core.
//!
//! Three layers of failure exist:
//! - [`ElementError`]: bad input while constructing or inspecting an element;
//!   raised at the call site, never retried.
//! - [`ApiError`]: the bot capability rejected or could not complete a call.
//!   Only [`ApiError::ActionFailed`] is recognized by the orchestrator's
//!   retry loop; every other variant propagates immediately.
//! - [`SendError`]: the umbrella the buffer/proxy/orchestrator surface
//!   to callers.

use thiserror::Error;

// =============================================================================
// Element Errors
// =============================================================================

/// Errors raised while constructing or inspecting message elements.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ElementError {
    /// No display name could be derived from the file reference.
    #[error("cannot derive a file name from {source_kind} payload")]
    MissingName {
        /// Human-readable description of the payload shape.
        source_kind: &'static str,
    },

    /// A local filesystem path was requested for a non-local reference.
    #[error("not a local file: {reference}")]
    NotLocalFile {
        /// The offending reference.
        reference: String,
    },
}

// =============================================================================
// Api Errors
// =============================================================================

/// Errors signalled by the bot capability.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The platform rejected the outbound call.
    ///
    /// This is the only variant the send orchestrator retries.
    #[error("action failed ({retcode}): {message}")]
    ActionFailed {
        /// Platform return code.
        retcode: i64,
        /// Platform-provided failure description.
        message: String,
    },

    /// The bot is not connected.
    #[error("bot is not connected")]
    NotConnected,

    /// The API call timed out.
    #[error("API call timed out")]
    Timeout,

    /// Failed to serialize or deserialize a payload.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl ApiError {
    /// Creates an [`ApiError::ActionFailed`].
    pub fn action_failed(retcode: i64, message: impl Into<String>) -> Self {
        Self::ActionFailed {
            retcode,
            message: message.into(),
        }
    }

    /// Returns true if this is a recoverable action failure.
    pub fn is_action_failed(&self) -> bool {
        matches!(self, Self::ActionFailed { .. })
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for bot capability calls.
pub type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// Send Errors
// =============================================================================

/// Errors surfaced by the buffer, proxies and the send orchestrator.
#[derive(Debug, Clone, Error)]
pub enum SendError {
    /// An element could not provide the data the conversion needed.
    #[error(transparent)]
    Element(#[from] ElementError),

    /// The bot capability failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// `revert` asked for more elements than the buffer holds.
    #[error("revert underflow: requested {requested}, buffer holds {available}")]
    Underflow {
        /// How many elements the caller asked to remove.
        requested: usize,
        /// How many the buffer held at the time of the call.
        available: usize,
    },
}

impl SendError {
    /// Returns true if this wraps a recoverable action failure.
    pub fn is_action_failed(&self) -> bool {
        matches!(self, Self::Api(err) if err.is_action_failed())
    }
}

/// Result type for buffer and send operations.
pub type SendResult<T> = Result<T, SendError>;

//! Error types used by the ssevisor runtime and its transports.
//!
//! This module defines two enums:
//!
//! - [`StreamError`]: failures of one push-stream connection. They never escape
//!   as `Err` from the runtime; they travel inside `TransportEvent::Error` and are
//!   surfaced to the owner as an informational `sseError` notification.
//! - [`RuntimeError`]: failures talking to the supervisor loop itself.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.

use std::sync::Arc;

use thiserror::Error;

/// # Errors reported by a stream transport.
///
/// Delivered asynchronously. Whether the stream is retried depends on the ready
/// state reported together with the error, not on the variant.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// The request could not be sent or the server was unreachable.
    #[error("failed to connect to {url}: {error}")]
    Connect {
        /// Target URL.
        url: Arc<str>,
        /// Underlying error message.
        error: String,
    },

    /// The server answered with a non-success status.
    #[error("unexpected status {status} from {url}")]
    Status {
        /// Target URL.
        url: Arc<str>,
        /// HTTP status code.
        status: u16,
    },

    /// The server answered with something other than `text/event-stream`.
    #[error("unexpected content type {content_type:?} from {url}")]
    ContentType {
        /// Target URL.
        url: Arc<str>,
        /// Received `Content-Type` header (empty when missing).
        content_type: String,
    },

    /// Reading the body failed after the stream was open.
    #[error("stream interrupted: {error}")]
    Interrupted {
        /// Underlying error message.
        error: String,
    },

    /// The server closed the stream.
    #[error("stream ended by server")]
    Ended,
}

impl StreamError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use ssevisor::StreamError;
    ///
    /// assert_eq!(StreamError::Ended.as_label(), "stream_ended");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            StreamError::Connect { .. } => "stream_connect",
            StreamError::Status { .. } => "stream_status",
            StreamError::ContentType { .. } => "stream_content_type",
            StreamError::Interrupted { .. } => "stream_interrupted",
            StreamError::Ended => "stream_ended",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            StreamError::Connect { url, error } => format!("connect {url}: {error}"),
            StreamError::Status { url, status } => format!("status {status} from {url}"),
            StreamError::ContentType { url, content_type } => {
                format!("content type {content_type:?} from {url}")
            }
            StreamError::Interrupted { error } => format!("interrupted: {error}"),
            StreamError::Ended => "ended by server".to_string(),
        }
    }
}

/// # Errors produced when talking to the supervisor loop.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// The supervisor loop has exited (shutdown or dropped).
    #[error("supervisor is not running")]
    Stopped,
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Stopped => "runtime_stopped",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::Stopped => "supervisor loop exited".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        let url: Arc<str> = Arc::from("/events");
        assert_eq!(
            StreamError::Status { url: url.clone(), status: 502 }.as_label(),
            "stream_status"
        );
        assert_eq!(
            StreamError::Connect { url, error: "refused".into() }.as_message(),
            "connect /events: refused"
        );
        assert_eq!(RuntimeError::Stopped.as_label(), "runtime_stopped");
    }
}

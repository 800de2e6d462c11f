//! # Notification bus of the host framework.
//!
//! Lifecycle and message notifications are raised on a node through [`Notify::trigger`].
//! The boolean result is only meaningful for [`SSE_BEFORE_MESSAGE`]: `false` vetoes
//! the swap of that message for that subscriber.

use std::sync::Arc;

use super::document::NodeId;
use crate::error::StreamError;
use crate::transport::MessageEvent;

/// Raised on a connection owner once its stream is open.
pub const SSE_OPEN: &str = "sseOpen";
/// Raised on a connection owner for every transport error (informational).
pub const SSE_ERROR: &str = "sseError";
/// Raised on a swap subscriber before the payload is applied; may veto.
pub const SSE_BEFORE_MESSAGE: &str = "sseBeforeMessage";
/// Raised on a subscriber after a message was handled.
pub const SSE_MESSAGE: &str = "sseMessage";

/// Payload attached to a notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Detail {
    /// The stream to `source` is open.
    Open {
        /// URL of the stream.
        source: Arc<str>,
    },
    /// The stream to `source` reported an error.
    Error {
        /// URL of the stream.
        source: Arc<str>,
        /// What the transport reported.
        error: StreamError,
    },
    /// An inbound message.
    Message(MessageEvent),
}

/// Host notification bus.
pub trait Notify: Send + Sync + 'static {
    /// Raises `name` on `node`. Returning `false` cancels the default action.
    fn trigger(&self, node: NodeId, name: &str, detail: &Detail) -> bool;
}

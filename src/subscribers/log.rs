//! # LogWriter: runtime events as `tracing` records
//!
//! A minimal subscriber that forwards incoming [`Event`]s to `tracing`.
//! Install any `tracing` subscriber in the host application to see them.
//!
//! ## Levels
//! ```text
//! DEBUG  opening, opened, listener attached/removed, delivered, vetoed
//! INFO   closed, backoff scheduled, reconnect abandoned, shutdown requested
//! WARN   connection failed, subscription orphaned, subscriber overflow
//! ERROR  subscriber panicked
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let node = e.node.map(|n| n.get());
        let connection = e.connection.map(|c| c.get());
        let url = e.url.as_deref();
        let event = e.event_name.as_deref();
        let reason = e.reason.as_deref();

        match e.kind {
            EventKind::ConnectionOpening => {
                tracing::debug!(seq = e.seq, ?node, ?connection, ?url, attempt = ?e.attempt, "connection opening");
            }
            EventKind::ConnectionOpened => {
                tracing::debug!(seq = e.seq, ?node, ?connection, ?url, "connection opened");
            }
            EventKind::ConnectionFailed => {
                tracing::warn!(seq = e.seq, ?node, ?connection, ?url, ?reason, "connection failed");
            }
            EventKind::ConnectionClosed => {
                tracing::info!(seq = e.seq, ?node, ?connection, ?url, ?reason, "connection closed");
            }
            EventKind::BackoffScheduled => {
                tracing::info!(
                    seq = e.seq,
                    ?node,
                    ?connection,
                    ?url,
                    attempt = ?e.attempt,
                    delay_ms = ?e.delay_ms,
                    "reconnect scheduled"
                );
            }
            EventKind::ReconnectAbandoned => {
                tracing::info!(seq = e.seq, ?node, ?connection, ?url, ?reason, "reconnect abandoned");
            }
            EventKind::ListenerAttached => {
                tracing::debug!(seq = e.seq, ?node, ?connection, ?event, "listener attached");
            }
            EventKind::ListenerRemoved => {
                tracing::debug!(seq = e.seq, ?node, ?connection, ?event, ?reason, "listener removed");
            }
            EventKind::SubscriptionOrphaned => {
                tracing::warn!(seq = e.seq, ?node, ?event, "no sse-connect ancestor, subscription skipped");
            }
            EventKind::MessageDelivered => {
                tracing::debug!(seq = e.seq, ?node, ?connection, ?event, "message delivered");
            }
            EventKind::MessageVetoed => {
                tracing::debug!(seq = e.seq, ?node, ?connection, ?event, "message vetoed");
            }
            EventKind::ShutdownRequested => {
                tracing::info!(seq = e.seq, "shutdown requested");
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!(seq = e.seq, ?reason, "subscriber dropped event");
            }
            EventKind::SubscriberPanicked => {
                tracing::error!(seq = e.seq, ?reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}

//! # Runtime events emitted by the supervisor loop.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Connection events**: stream lifecycle (opening, opened, failed, closed)
//! - **Recovery events**: reconnect scheduling and abandonment
//! - **Subscription events**: listeners attached/removed, orphaned subscriptions, deliveries
//! - **Runtime events**: shutdown and subscriber health
//!
//! The [`Event`] struct carries additional metadata such as timestamps, node and
//! connection identifiers, URLs, reasons, and backoff delays.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use ssevisor::{Event, EventKind, NodeId};
//!
//! let ev = Event::new(EventKind::BackoffScheduled)
//!     .with_node(NodeId::new(7))
//!     .with_url("/events")
//!     .with_attempt(0)
//!     .with_delay(Duration::from_millis(320));
//!
//! assert_eq!(ev.kind, EventKind::BackoffScheduled);
//! assert_eq!(ev.url.as_deref(), Some("/events"));
//! assert_eq!(ev.delay_ms, Some(320));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::core::ConnectionId;
use crate::host::NodeId;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Connection lifecycle ===
    /// A transport connection was requested.
    ///
    /// Sets:
    /// - `node`: owner
    /// - `connection`: new connection id
    /// - `url`: target URL
    /// - `attempt`: retry attempt this connection was created with (0 for fresh)
    ConnectionOpening,

    /// The transport handshake succeeded (`sseOpen` was raised on the owner).
    ///
    /// Sets:
    /// - `node`, `connection`, `url`
    ConnectionOpened,

    /// The transport reported an error (`sseError` was raised on the owner).
    ///
    /// Sets:
    /// - `node`, `connection`, `url`
    /// - `reason`: `"{ready_state}: {error}"`
    ConnectionFailed,

    /// A connection was closed and unbound from its owner.
    ///
    /// Emitted exactly once per connection, whatever closed it.
    ///
    /// Sets:
    /// - `node`, `connection`, `url`
    /// - `reason`: `owner-removed`, `owner-detached`, `replaced`, `shutdown`
    ConnectionClosed,

    // === Recovery ===
    /// A replacement connection was scheduled.
    ///
    /// Sets:
    /// - `node`, `connection` (the failed one), `url`
    /// - `attempt`: attempt the delay was computed for
    /// - `delay_ms`: delay before the replacement is created
    BackoffScheduled,

    /// A scheduled reconnect fired but was not carried out.
    ///
    /// Sets:
    /// - `node`, `connection` (the failed one), `url`
    /// - `reason`: `owner-detached` or `superseded`
    ReconnectAbandoned,

    // === Subscriptions ===
    /// A listener was attached to a connection.
    ///
    /// Sets:
    /// - `node`: subscribing element (owner for listeners added through the handle)
    /// - `connection`, `event_name`
    ListenerAttached,

    /// A listener was removed from a connection.
    ///
    /// Sets:
    /// - `node` (when known), `connection`, `event_name`
    /// - `reason`: `subscriber-detached` or `removed`
    ListenerRemoved,

    /// A subscription found no connection-holding ancestor and was skipped.
    ///
    /// Sets:
    /// - `node`: subscribing element
    /// - `event_name`: first requested event name
    SubscriptionOrphaned,

    /// A message was handed to a listener.
    ///
    /// Sets:
    /// - `connection`, `event_name`
    /// - `node`: subscribing element (when the listener has one)
    MessageDelivered,

    /// A `sseBeforeMessage` handler vetoed a swap.
    ///
    /// Sets:
    /// - `connection`, `event_name`, `node`
    MessageVetoed,

    // === Runtime ===
    /// Shutdown requested through the handle or the runtime token.
    ShutdownRequested,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `reason`: `subscriber={name} reason={full|closed}`
    SubscriberOverflow,

    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `reason`: panic info/message
    SubscriberPanicked,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Node the event is about.
    pub node: Option<NodeId>,
    /// Connection the event is about.
    pub connection: Option<ConnectionId>,
    /// Stream URL.
    pub url: Option<Arc<str>>,
    /// Server-sent event name.
    pub event_name: Option<Arc<str>>,
    /// Retry attempt.
    pub attempt: Option<u32>,
    /// Backoff delay before the next attempt in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            node: None,
            connection: None,
            url: None,
            event_name: None,
            attempt: None,
            delay_ms: None,
            reason: None,
        }
    }

    /// Attaches a node.
    #[inline]
    pub fn with_node(mut self, node: NodeId) -> Self {
        self.node = Some(node);
        self
    }

    /// Attaches a connection id.
    #[inline]
    pub fn with_connection(mut self, id: ConnectionId) -> Self {
        self.connection = Some(id);
        self
    }

    /// Attaches a stream URL.
    #[inline]
    pub fn with_url(mut self, url: impl Into<Arc<str>>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Attaches a server-sent event name.
    #[inline]
    pub fn with_event_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.event_name = Some(name.into());
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a backoff delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Returns the backoff delay as a `Duration`, if set.
    #[inline]
    pub fn delay(&self) -> Option<Duration> {
        self.delay_ms.map(|ms| Duration::from_millis(u64::from(ms)))
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_reason(format!("subscriber={subscriber} panic={info}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_is_monotonic() {
        let a = Event::new(EventKind::ConnectionOpening);
        let b = Event::new(EventKind::ConnectionOpened);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn delay_is_clamped_to_u32_millis() {
        let ev = Event::new(EventKind::BackoffScheduled).with_delay(Duration::from_secs(u64::MAX));
        assert_eq!(ev.delay_ms, Some(u32::MAX));
    }

    #[test]
    fn overflow_carries_subscriber_name() {
        let ev = Event::subscriber_overflow("audit", "full");
        assert_eq!(ev.kind, EventKind::SubscriberOverflow);
        assert_eq!(ev.reason.as_deref(), Some("subscriber=audit reason=full"));
    }
}

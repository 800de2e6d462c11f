//! Push-stream transport boundary.
//!
//! A [`Transport`] turns a URL into a stream of [`TransportEvent`]s. It mirrors the
//! browser `EventSource` contract without callbacks:
//!
//! ```text
//! connect(request, cancel) ──► EventStream
//!                                 ├─ Open                          (handshake done)
//!                                 ├─ Message(MessageEvent)*        (arrival order)
//!                                 └─ Error { error, ready_state }  (async, never a panic/Err)
//! ```
//!
//! ## Rules
//! - `connect` must not fail synchronously; unreachable URLs surface as `Error`.
//! - `ready_state` on an error tells the manager whether the transport gave up
//!   (`Closed`, the manager schedules a replacement) or is healing itself (`Connecting`).
//! - Cancelling the token is `close()`: the transport stops producing events and
//!   releases its resources.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use tokio_util::sync::CancellationToken;

use crate::error::StreamError;

#[cfg(feature = "http")]
mod http;
pub mod wire;

#[cfg(feature = "http")]
pub use http::HttpTransport;

/// Event name used when the server does not send an `event:` field.
pub const DEFAULT_EVENT: &str = "message";

/// Connection state as reported by the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReadyState {
    /// Handshake in progress (initially, or while the transport heals itself).
    Connecting,
    /// Events are flowing.
    Open,
    /// Terminal: the transport will not produce further events.
    Closed,
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReadyState::Connecting => "connecting",
            ReadyState::Open => "open",
            ReadyState::Closed => "closed",
        })
    }
}

/// One inbound server-sent event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageEvent {
    /// Event name (`message` when unnamed).
    pub event: String,
    /// Payload, multi-line data joined with `\n`.
    pub data: String,
    /// Last event id seen on the stream when this event was dispatched.
    pub id: Option<String>,
    /// URL of the stream that delivered the event.
    pub origin: Arc<str>,
}

impl MessageEvent {
    /// Builds an event with no id.
    pub fn new(origin: impl Into<Arc<str>>, event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
            id: None,
            origin: origin.into(),
        }
    }

    /// Attaches an event id.
    #[inline]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// What a transport reports.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// The handshake succeeded.
    Open,
    /// A server-sent event arrived.
    Message(MessageEvent),
    /// The stream failed; `ready_state` is the state the transport is left in.
    Error {
        /// What went wrong.
        error: StreamError,
        /// `Closed` if the transport gave up.
        ready_state: ReadyState,
    },
}

/// Events of one connection, in arrival order.
pub type EventStream = Pin<Box<dyn Stream<Item = TransportEvent> + Send>>;

/// Parameters of one connection attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Target URL.
    pub url: Arc<str>,
    /// Id of the last event seen by the connection this one replaces.
    pub last_event_id: Option<String>,
}

/// Transport factory.
pub trait Transport: Send + Sync + 'static {
    /// Starts a connection. Cancelling `cancel` closes it.
    fn connect(&self, request: ConnectRequest, cancel: CancellationToken) -> EventStream;
}

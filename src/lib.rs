//! # ssevisor
//!
//! **ssevisor** supervises long-lived server-sent event streams that are bound to
//! elements of a live document tree.
//!
//! Elements declare a stream with `sse-connect="<url>"`; descendants subscribe with
//! `sse-swap="name, ..."` (payload swapped into the element) or
//! `hx-trigger="sse:name"` (event re-raised on the element). The runtime opens one
//! connection per owner, fans inbound events out to the subscribers in arrival order,
//! reconnects closed streams with capped exponential backoff, and drops everything
//! that belongs to elements which left the document.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   host framework                         ssevisor
//! ┌──────────────────┐  process(root)   ┌───────────────────────────────────────────┐
//! │ document tree    │ ───────────────► │ Supervisor::run (single task)             │
//! │  (Document)      │  cleanup(node)   │   Dispatcher                              │
//! │ notification bus │ ◄─────────────── │    ├─ registry: sse-swap / hx-trigger     │
//! │  (Notify)        │  sseOpen/Error/  │    └─ ConnectionManager                   │
//! │ swap pipeline    │  Before/Message  │         ├─ owner → Connection             │
//! │  (Swap)          │ ◄─────────────── │         ├─ streams  (SelectAll)           │
//! └──────────────────┘  apply(content)  │         └─ timers   (FuturesUnordered)    │
//!                                       └──────────┬───────────────────┬────────────┘
//!                                                  │ connect(url)      │ publish(Event)
//!                                                  ▼                   ▼
//!                                            Transport              Bus ──► SubscriberSet
//!                                      (HttpTransport, mock)              ├─ LogWriter
//!                                                                          └─ custom
//! ```
//!
//! ### Lifecycle of one connection
//! ```text
//! ensure_connection(owner, url, attempt)
//!   ├─► Open          → sseOpen on owner
//!   ├─► Message(ev)   → owner detached? close : listeners[ev.event] in order
//!   └─► Error(e, rs)  → sseError on owner
//!                        ├─ owner detached         → close, no retry
//!                        ├─ rs == Closed           → sleep(backoff.delay(attempt))
//!                        │                           → new Connection(attempt + 1, capped)
//!                        └─ rs == Connecting       → nothing (transport heals itself)
//! ```
//!
//! ## Features
//! | Area              | Description                                                     | Key types / traits                        |
//! |-------------------|-----------------------------------------------------------------|-------------------------------------------|
//! | **Supervision**   | One loop owning every connection, stream and timer.            | [`Supervisor`], [`Handle`]                |
//! | **Host boundary** | Document access, notifications and swaps supplied by the host. | [`Document`], [`Notify`], [`Swap`]        |
//! | **Transport**     | Pluggable stream source; `reqwest` implementation included.    | [`Transport`], [`HttpTransport`]          |
//! | **Listeners**     | Declarative and custom per-event listeners.                    | [`Listener`], [`SwapListener`]            |
//! | **Policies**      | Capped exponential backoff with jitter.                        | [`BackoffPolicy`], [`JitterPolicy`]       |
//! | **Subscriber API**| Observe runtime events (logging, metrics).                     | [`Subscribe`], [`Event`]                  |
//! | **Errors**        | Typed stream and runtime errors.                               | [`StreamError`], [`RuntimeError`]         |
//! | **Configuration** | Attribute names, backoff, credentials, bus size.               | [`Config`]                                |
//!
//! ## Optional features
//! - `http` (default): the [`HttpTransport`] built on `reqwest`.
//! - `logging`: exports the built-in [`LogWriter`] subscriber (events as `tracing` records).
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use ssevisor::testing::{MemoryDocument, MockTransport};
//! use ssevisor::{Config, Supervisor, SSE_MESSAGE};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // <div sse-connect="/events"><p sse-swap="update"></p></div>
//!     let doc = Arc::new(MemoryDocument::new());
//!     let owner = doc.append(doc.root(), &[("sse-connect", "/events")]);
//!     let target = doc.append(owner, &[("sse-swap", "update")]);
//!
//!     let (transport, server) = MockTransport::new();
//!     let sup = Supervisor::builder(Config::default(), doc.clone(), Arc::new(transport)).build();
//!     let handle = sup.handle();
//!     let mut events = handle.events();
//!     tokio::spawn(sup.run());
//!
//!     handle.process(doc.root()).await?;
//!     let conn = server.wait_for(1).await;
//!     conn.open();
//!     conn.send("update", "<b>42</b>");
//!
//!     while events.recv().await?.kind != ssevisor::EventKind::MessageDelivered {}
//!     assert_eq!(doc.content(target), "<b>42</b>");
//!     assert_eq!(doc.notifications_for(target).last().map(String::as_str), Some(SSE_MESSAGE));
//!
//!     handle.shutdown();
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
pub mod host;
mod listeners;
mod policies;
mod subscribers;
pub mod testing;
pub mod transport;

// ---- Public re-exports ----

pub use core::{
    Config, ConnectionId, ConnectionInfo, Handle, ListenerId, Supervisor, SupervisorBuilder,
};
pub use error::{RuntimeError, StreamError};
pub use events::{Bus, Event, EventKind};
pub use host::{
    Detail, Document, Host, NodeId, Notify, Swap, SwapSpec, SwapStyle, SSE_BEFORE_MESSAGE,
    SSE_ERROR, SSE_MESSAGE, SSE_OPEN,
};
pub use listeners::{Delivery, Listener, SwapListener, TriggerListener};
pub use policies::{BackoffPolicy, JitterPolicy, BASE_DELAY, MAX_ATTEMPT};
pub use subscribers::{Subscribe, SubscriberSet};
pub use transport::{MessageEvent, ReadyState, Transport, TransportEvent};

#[cfg(feature = "http")]
pub use transport::HttpTransport;

// Optional: expose a simple built-in logger subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;

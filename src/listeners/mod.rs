//! Message listeners attached to connections.
//!
//! A [`Listener`] receives every inbound message of one event name on one
//! connection, in arrival order, and answers with a [`Delivery`]:
//!
//! ```text
//! Connection::dispatch(msg)
//!   └─► listener.on_message(&msg)
//!         ├─ Delivered    → keep
//!         ├─ Vetoed       → keep (a sseBeforeMessage handler said no)
//!         └─ Unsubscribe  → removed from the connection before the next message
//! ```
//!
//! Two listeners back the declarative attributes:
//! - [`SwapListener`] (`sse-swap`): hands the payload to the host swap pipeline;
//! - [`TriggerListener`] (`hx-trigger="sse:name"`): re-raises the event on its element.
//!
//! Closures `FnMut(&MessageEvent) -> Delivery` are listeners too, for use with
//! [`Handle::add_listener`](crate::Handle::add_listener).

mod listener;
mod swap;
mod trigger;

pub use listener::{Delivery, Listener};
pub use swap::SwapListener;
pub use trigger::TriggerListener;

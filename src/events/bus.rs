//! # Runtime event bus.
//!
//! Every lifecycle change of a stream connection and every message delivery is
//! published once on the [`Bus`]. Nothing in the supervisor loop waits on a reader.
//!
//! ```text
//! ConnectionManager  opening/opened/failed/closed, backoff, listener changes
//! Dispatcher         delivered/vetoed, listener removed on unsubscribe
//! Registry           orphaned subscriptions
//! Supervisor         shutdown requested
//! SubscriberSet      overflow, panics
//!        │
//!        ▼
//!       Bus ──┬──► Supervisor::subscriber_listener ──► SubscriberSet::emit
//!             └──► Handle::events() (host code, tests)
//! ```
//!
//! ## Rules
//! - Sized by `Config::bus_capacity`; one ring buffer is shared by all receivers.
//! - A receiver only sees events published after it was created.
//! - A receiver more than `capacity` events behind gets `Lagged(n)` and resumes at
//!   the oldest event still buffered. The subscriber forwarder skips the gap.
//! - With no receivers, published events are dropped.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel carrying [`Event`]s out of the supervisor loop.
///
/// Clones share the same channel.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus buffering up to `capacity` events (at least 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes without waiting; dropped when nobody listens.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// New receiver for events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

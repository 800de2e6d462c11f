//! # Connection: one push stream and its listener table.
//!
//! A [`Connection`] wraps one transport stream to one URL on behalf of one owner.
//! The transport itself is driven by the manager (its events arrive through the
//! supervisor loop); the connection holds what belongs to it:
//!
//! ```text
//! Connection
//!   ├─ id, owner, url, attempt
//!   ├─ state        Connecting ──► Open ──► Closed
//!   │                    └─────────────────►┘   (Closed is terminal)
//!   ├─ cancel       CancellationToken handed to the transport (close())
//!   ├─ listeners    event name → [Entry { id, key?, listener }]   (registration order)
//!   └─ last_event_id, reconnect_pending
//! ```
//!
//! ## Rules
//! - `close()` is idempotent and returns `true` only the first time.
//! - A closed connection is never reopened; recovery creates a new one.
//! - Listeners of one event name run in registration order, once per message.
//! - A listener answering `Unsubscribe` is removed before the next message.
//! - Declarative subscriptions carry a [`SubscriptionKey`]; a second registration
//!   with an equal key is ignored.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::host::NodeId;
use crate::listeners::{Delivery, Listener};
use crate::transport::{MessageEvent, ReadyState};

static CONNECTION_SEQ: AtomicU64 = AtomicU64::new(1);
static LISTENER_SEQ: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a connection instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(CONNECTION_SEQ.fetch_add(1, AtomicOrdering::Relaxed))
    }

    /// Raw value.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Process-unique identifier of a registered listener.
///
/// Stays valid when the listener moves to a replacement connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    fn next() -> Self {
        Self(LISTENER_SEQ.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

/// Which declarative attribute produced a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum SubscriptionKind {
    Swap,
    Trigger,
}

/// Identity of a declarative subscription.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct SubscriptionKey {
    pub node: NodeId,
    pub kind: SubscriptionKind,
    pub event: String,
}

impl SubscriptionKey {
    pub fn swap(node: NodeId, event: &str) -> Self {
        Self {
            node,
            kind: SubscriptionKind::Swap,
            event: event.to_string(),
        }
    }

    pub fn trigger(node: NodeId, event: &str) -> Self {
        Self {
            node,
            kind: SubscriptionKind::Trigger,
            event: event.to_string(),
        }
    }
}

pub(crate) struct Entry {
    id: ListenerId,
    key: Option<SubscriptionKey>,
    listener: Box<dyn Listener>,
}

/// Result of running one listener on one message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Outcome {
    pub node: Option<NodeId>,
    pub delivery: Delivery,
}

/// Listener table moved from a failed connection into its replacement.
pub(crate) type ListenerTable = HashMap<String, Vec<Entry>>;

/// Point-in-time view of one connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Connection id.
    pub id: ConnectionId,
    /// Owning element.
    pub owner: NodeId,
    /// Stream URL.
    pub url: Arc<str>,
    /// Lifecycle state.
    pub state: ReadyState,
    /// Retry attempt this connection was created with.
    pub attempt: u32,
    /// Number of registered listeners (all event names).
    pub listeners: usize,
    /// True while a replacement is scheduled.
    pub reconnect_pending: bool,
    /// Last event id seen on the stream.
    pub last_event_id: Option<String>,
}

pub(crate) struct Connection {
    pub id: ConnectionId,
    pub owner: NodeId,
    pub url: Arc<str>,
    pub attempt: u32,
    pub state: ReadyState,
    pub reconnect_pending: bool,
    pub last_event_id: Option<String>,
    cancel: CancellationToken,
    listeners: ListenerTable,
}

impl Connection {
    pub fn new(owner: NodeId, url: Arc<str>, attempt: u32, last_event_id: Option<String>) -> Self {
        Self {
            id: ConnectionId::next(),
            owner,
            url,
            attempt,
            state: ReadyState::Connecting,
            reconnect_pending: false,
            last_event_id,
            cancel: CancellationToken::new(),
            listeners: HashMap::new(),
        }
    }

    /// Token handed to the transport.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// True once `close()` was called.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Applies a state reported by the transport. `Closed` is terminal.
    pub fn mark(&mut self, state: ReadyState) {
        if self.state != ReadyState::Closed {
            self.state = state;
        }
    }

    /// Terminates the transport. Returns `false` if it was already closed.
    pub fn close(&mut self) -> bool {
        self.state = ReadyState::Closed;
        if self.cancel.is_cancelled() {
            return false;
        }
        self.cancel.cancel();
        true
    }

    pub fn add_listener(&mut self, event: &str, listener: Box<dyn Listener>) -> ListenerId {
        self.insert(event, None, listener)
    }

    /// Registers a declarative subscription unless an equal one is present.
    pub fn subscribe(&mut self, key: SubscriptionKey, listener: Box<dyn Listener>) -> Option<ListenerId> {
        let duplicate = self
            .listeners
            .get(&key.event)
            .is_some_and(|entries| entries.iter().any(|e| e.key.as_ref() == Some(&key)));
        if duplicate {
            return None;
        }
        let event = key.event.clone();
        Some(self.insert(&event, Some(key), listener))
    }

    fn insert(&mut self, event: &str, key: Option<SubscriptionKey>, listener: Box<dyn Listener>) -> ListenerId {
        let id = ListenerId::next();
        self.listeners
            .entry(event.to_string())
            .or_default()
            .push(Entry { id, key, listener });
        id
    }

    /// Unregisters a listener. Idempotent: `false` if it is not (or no longer) registered.
    pub fn remove_listener(&mut self, event: &str, id: ListenerId) -> bool {
        let Some(entries) = self.listeners.get_mut(event) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|e| e.id != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            self.listeners.remove(event);
        }
        removed
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.values().map(Vec::len).sum()
    }

    /// Runs every listener registered for `message.event`, in registration order.
    pub fn dispatch(&mut self, message: &MessageEvent) -> Vec<Outcome> {
        // the decoder carries its current id on every message; `None` means cleared
        self.last_event_id = message.id.clone();
        let Some(entries) = self.listeners.get_mut(&message.event) else {
            return Vec::new();
        };

        let mut outcomes = Vec::with_capacity(entries.len());
        entries.retain_mut(|entry| {
            let delivery = entry.listener.on_message(message);
            outcomes.push(Outcome {
                node: entry.listener.node(),
                delivery,
            });
            delivery != Delivery::Unsubscribe
        });
        if entries.is_empty() {
            self.listeners.remove(&message.event);
        }
        outcomes
    }

    /// Moves the listener table out (the connection is about to be replaced).
    pub fn take_listeners(&mut self) -> ListenerTable {
        std::mem::take(&mut self.listeners)
    }

    /// Adopts the listener table of the connection this one replaces.
    ///
    /// Adopted listeners run before any registered on this connection so far.
    pub fn adopt(&mut self, table: ListenerTable) {
        for (event, mut entries) in table {
            let slot = self.listeners.entry(event).or_default();
            entries.append(slot);
            *slot = entries;
        }
    }

    pub fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            id: self.id,
            owner: self.owner,
            url: Arc::clone(&self.url),
            state: self.state,
            attempt: self.attempt,
            listeners: self.listener_count(),
            reconnect_pending: self.reconnect_pending,
            last_event_id: self.last_event_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn conn() -> Connection {
        Connection::new(NodeId::new(1), Arc::from("/events"), 0, None)
    }

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> Box<dyn Listener> {
        let log = Arc::clone(log);
        Box::new(move |m: &MessageEvent| {
            log.lock().unwrap().push(format!("{tag}:{}", m.data));
            Delivery::Delivered
        })
    }

    #[test]
    fn fan_out_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut c = conn();
        c.add_listener("update", recorder(&log, "a"));
        c.add_listener("update", recorder(&log, "b"));
        c.add_listener("other", recorder(&log, "x"));

        c.dispatch(&MessageEvent::new("/events", "update", "1"));
        c.dispatch(&MessageEvent::new("/events", "update", "2"));
        assert_eq!(*log.lock().unwrap(), vec!["a:1", "b:1", "a:2", "b:2"]);
    }

    #[test]
    fn unsubscribe_removes_before_next_message() {
        let mut c = conn();
        let mut calls = 0;
        c.add_listener(
            "update",
            Box::new(move |_: &MessageEvent| {
                calls += 1;
                assert_eq!(calls, 1);
                Delivery::Unsubscribe
            }),
        );
        let out = c.dispatch(&MessageEvent::new("/events", "update", "1"));
        assert_eq!(out[0].delivery, Delivery::Unsubscribe);
        assert_eq!(c.listener_count(), 0);
        assert!(c.dispatch(&MessageEvent::new("/events", "update", "2")).is_empty());
    }

    #[test]
    fn remove_listener_is_idempotent() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut c = conn();
        let id = c.add_listener("update", recorder(&log, "a"));
        assert!(c.remove_listener("update", id));
        assert!(!c.remove_listener("update", id));
        assert!(!c.remove_listener("missing", id));
    }

    #[test]
    fn duplicate_subscription_is_ignored() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut c = conn();
        let key = SubscriptionKey::swap(NodeId::new(2), "update");
        assert!(c.subscribe(key.clone(), recorder(&log, "a")).is_some());
        assert!(c.subscribe(key, recorder(&log, "b")).is_none());
        assert!(c
            .subscribe(SubscriptionKey::trigger(NodeId::new(2), "update"), recorder(&log, "c"))
            .is_some());
        assert_eq!(c.listener_count(), 2);
    }

    #[test]
    fn close_is_idempotent_and_terminal() {
        let mut c = conn();
        let token = c.cancel_token();
        assert!(c.close());
        assert!(token.is_cancelled());
        assert!(!c.close());
        c.mark(ReadyState::Open);
        assert_eq!(c.state, ReadyState::Closed);
    }

    #[test]
    fn dispatch_records_last_event_id() {
        let mut c = conn();
        c.dispatch(&MessageEvent::new("/events", "nobody", "x").with_id("41"));
        assert_eq!(c.last_event_id.as_deref(), Some("41"));
    }

    #[test]
    fn dispatch_without_id_clears_last_event_id() {
        let mut c = conn();
        c.dispatch(&MessageEvent::new("/events", "nobody", "x").with_id("41"));
        c.dispatch(&MessageEvent::new("/events", "nobody", "y"));
        assert_eq!(c.last_event_id, None);
    }

    #[test]
    fn adopted_listeners_keep_firing() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut old = conn();
        old.subscribe(SubscriptionKey::swap(NodeId::new(2), "update"), recorder(&log, "a"));
        old.add_listener("update", recorder(&log, "b"));

        let mut new = Connection::new(NodeId::new(1), Arc::from("/events"), 1, None);
        new.adopt(old.take_listeners());
        assert_eq!(old.listener_count(), 0);
        assert!(new
            .subscribe(SubscriptionKey::swap(NodeId::new(2), "update"), recorder(&log, "dup"))
            .is_none());

        new.dispatch(&MessageEvent::new("/events", "update", "1"));
        assert_eq!(*log.lock().unwrap(), vec!["a:1", "b:1"]);
    }
}

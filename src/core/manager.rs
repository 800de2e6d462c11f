//! # ConnectionManager: owner bindings and error recovery.
//!
//! The manager binds at most one [`Connection`] to each owner element and
//! supervises it. It owns every transport stream (polled together through a
//! `SelectAll`) and every pending reconnect timer (`FuturesUnordered`), so the
//! supervisor loop only has to ask it for the [`Input`].
//!
//! ## Error recovery
//! ```text
//! TransportEvent::Error { error, ready_state }
//!   ├─► mark(ready_state), publish ConnectionFailed
//!   ├─► trigger(owner, sseError)                         (informational)
//!   ├─► owner detached?  ── yes ──► close + unbind, stop  (no retry)
//!   ├─► ready_state == Closed && no timer pending:
//!   │      delay = backoff.delay(attempt)
//!   │      publish BackoffScheduled
//!   │      timer(delay) ──► Reconnect { owner, url, replaces, attempt + 1 (capped) }
//!   └─► otherwise: nothing (the transport heals itself)
//!
//! Reconnect fires
//!   ├─► binding no longer points at `replaces`   ──► ReconnectAbandoned(superseded)
//!   ├─► owner detached                            ──► close + unbind, ReconnectAbandoned(owner-detached)
//!   └─► new Connection (listeners + last event id carried over), old one closed
//! ```
//!
//! ## Rules
//! - Liveness is checked when acting, never cached: a timer firing after its owner
//!   died is handled at fire time.
//! - At most one reconnect timer per connection (`reconnect_pending`).
//! - A stream that ends without an error counts as `Error(Ended, Closed)`.
//! - Every connection publishes `ConnectionClosed` exactly once, whatever closed it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::{self, BoxStream, FuturesUnordered, SelectAll};
use futures::StreamExt;

use super::connection::{
    Connection, ConnectionId, ConnectionInfo, ListenerId, ListenerTable, Outcome, SubscriptionKey,
};
use crate::error::StreamError;
use crate::events::{Bus, Event, EventKind};
use crate::host::{closest, Detail, Host, NodeId, SSE_ERROR, SSE_OPEN};
use crate::listeners::Listener;
use crate::policies::BackoffPolicy;
use crate::transport::{ConnectRequest, MessageEvent, ReadyState, Transport, TransportEvent};

type TaggedStream = BoxStream<'static, (ConnectionId, Option<TransportEvent>)>;

/// A scheduled replacement of a failed connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Reconnect {
    pub owner: NodeId,
    pub url: Arc<str>,
    pub replaces: ConnectionId,
    pub attempt: u32,
}

/// Something the supervisor loop has to react to.
pub(crate) enum Input {
    /// A transport event, or `None` once the stream ended.
    Stream(ConnectionId, Option<TransportEvent>),
    /// A backoff timer fired.
    Reconnect(Reconnect),
}

pub(crate) struct ConnectionManager {
    host: Arc<dyn Host>,
    transport: Arc<dyn Transport>,
    backoff: BackoffPolicy,
    bus: Bus,
    bindings: HashMap<NodeId, ConnectionId>,
    connections: HashMap<ConnectionId, Connection>,
    streams: SelectAll<TaggedStream>,
    timers: FuturesUnordered<BoxFuture<'static, Reconnect>>,
}

impl ConnectionManager {
    pub fn new(
        host: Arc<dyn Host>,
        transport: Arc<dyn Transport>,
        backoff: BackoffPolicy,
        bus: Bus,
    ) -> Self {
        Self {
            host,
            transport,
            backoff,
            bus,
            bindings: HashMap::new(),
            connections: HashMap::new(),
            streams: SelectAll::new(),
            timers: FuturesUnordered::new(),
        }
    }

    pub fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Returns the owner's connection, creating (or replacing) it as needed.
    ///
    /// Idempotent: an owner whose connection is still usable for `url` keeps it.
    pub fn ensure_connection(&mut self, owner: NodeId, url: &str, attempt: u32) -> ConnectionId {
        let mut carried = ListenerTable::new();
        if let Some(conn) = self.bound_mut(owner) {
            let usable = conn.state != ReadyState::Closed || conn.reconnect_pending;
            if &*conn.url == url && usable {
                return conn.id;
            }
            if &*conn.url == url {
                carried = conn.take_listeners();
            }
            self.close_owner(owner, "replaced");
        }
        self.open(owner, Arc::from(url), attempt, None, carried)
    }

    fn open(
        &mut self,
        owner: NodeId,
        url: Arc<str>,
        attempt: u32,
        last_event_id: Option<String>,
        listeners: ListenerTable,
    ) -> ConnectionId {
        let mut conn = Connection::new(owner, Arc::clone(&url), attempt, last_event_id.clone());
        conn.adopt(listeners);
        let id = conn.id;
        let cancel = conn.cancel_token();

        let events = self.transport.connect(
            ConnectRequest {
                url: Arc::clone(&url),
                last_event_id,
            },
            cancel.clone(),
        );
        let tagged = events
            .take_until(cancel.cancelled_owned())
            .map(move |ev| (id, Some(ev)))
            .chain(stream::once(async move { (id, None) }))
            .boxed();
        self.streams.push(tagged);

        self.bindings.insert(owner, id);
        self.connections.insert(id, conn);
        self.bus.publish(
            Event::new(EventKind::ConnectionOpening)
                .with_node(owner)
                .with_connection(id)
                .with_url(url)
                .with_attempt(attempt),
        );
        id
    }

    fn bound_mut(&mut self, owner: NodeId) -> Option<&mut Connection> {
        let id = self.bindings.get(&owner)?;
        self.connections.get_mut(id)
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    /// True if `node` holds a connection (open, connecting, or awaiting its replacement).
    pub fn holds_connection(&self, node: NodeId) -> bool {
        self.bindings.contains_key(&node)
    }

    /// Nearest element, starting at `node` and walking up, holding a connection.
    pub fn source_for(&self, node: NodeId) -> Option<NodeId> {
        closest(&*self.host, node, |n| self.holds_connection(n))
    }

    /// Closes and unbinds the owner's connection. Returns `false` if it had none.
    pub fn close_owner(&mut self, owner: NodeId, reason: &'static str) -> bool {
        let Some(id) = self.bindings.remove(&owner) else {
            return false;
        };
        let Some(mut conn) = self.connections.remove(&id) else {
            return false;
        };
        if conn.close() {
            self.bus.publish(
                Event::new(EventKind::ConnectionClosed)
                    .with_node(owner)
                    .with_connection(id)
                    .with_url(Arc::clone(&conn.url))
                    .with_reason(reason),
            );
        }
        true
    }

    /// Closes the owner's connection if the owner left the document.
    pub fn maybe_close_source(&mut self, owner: NodeId) -> bool {
        if self.host.is_attached(owner) {
            return false;
        }
        self.close_owner(owner, "owner-detached");
        true
    }

    /// Closes every connection bound to `node` or to one of its descendants.
    pub fn close_subtree(&mut self, node: NodeId, reason: &'static str) -> usize {
        let owners: Vec<NodeId> = self
            .bindings
            .keys()
            .copied()
            .filter(|owner| closest(&*self.host, *owner, |n| n == node).is_some())
            .collect();
        owners
            .into_iter()
            .filter(|owner| self.close_owner(*owner, reason))
            .count()
    }

    pub fn close_all(&mut self, reason: &'static str) {
        let owners: Vec<NodeId> = self.bindings.keys().copied().collect();
        for owner in owners {
            self.close_owner(owner, reason);
        }
        self.timers.clear();
    }

    /// Registers a declarative subscription on the owner's connection.
    pub fn subscribe(&mut self, owner: NodeId, key: SubscriptionKey, listener: Box<dyn Listener>) {
        let Some(conn) = self.bound_mut(owner) else {
            return;
        };
        let (node, event) = (key.node, key.event.clone());
        if conn.subscribe(key, listener).is_some() {
            let id = conn.id;
            self.bus.publish(
                Event::new(EventKind::ListenerAttached)
                    .with_node(node)
                    .with_connection(id)
                    .with_event_name(event),
            );
        }
    }

    pub fn add_listener(
        &mut self,
        owner: NodeId,
        event: &str,
        listener: Box<dyn Listener>,
    ) -> Option<ListenerId> {
        let conn = self.bound_mut(owner)?;
        let listener_id = conn.add_listener(event, listener);
        let id = conn.id;
        self.bus.publish(
            Event::new(EventKind::ListenerAttached)
                .with_node(owner)
                .with_connection(id)
                .with_event_name(event),
        );
        Some(listener_id)
    }

    pub fn remove_listener(&mut self, owner: NodeId, event: &str, listener: ListenerId) -> bool {
        let Some(conn) = self.bound_mut(owner) else {
            return false;
        };
        if !conn.remove_listener(event, listener) {
            return false;
        }
        let id = conn.id;
        self.bus.publish(
            Event::new(EventKind::ListenerRemoved)
                .with_node(owner)
                .with_connection(id)
                .with_event_name(event)
                .with_reason("removed"),
        );
        true
    }

    /// Runs the connection's listeners for `message`.
    pub fn dispatch(&mut self, id: ConnectionId, message: &MessageEvent) -> Vec<Outcome> {
        match self.connections.get_mut(&id) {
            Some(conn) if !conn.is_closed() => conn.dispatch(message),
            _ => Vec::new(),
        }
    }

    pub fn snapshot(&self) -> Vec<ConnectionInfo> {
        let mut out: Vec<ConnectionInfo> = self.connections.values().map(Connection::info).collect();
        out.sort_by_key(|c| c.id);
        out
    }

    /// Waits for the next transport event or timer. Pending forever when there is neither.
    pub async fn next_input(&mut self) -> Input {
        tokio::select! {
            Some((id, ev)) = self.streams.next(), if !self.streams.is_empty() => Input::Stream(id, ev),
            Some(plan) = self.timers.next(), if !self.timers.is_empty() => Input::Reconnect(plan),
            else => std::future::pending().await,
        }
    }

    pub fn on_open(&mut self, id: ConnectionId) {
        let Some(conn) = self.connections.get_mut(&id) else {
            return;
        };
        if conn.is_closed() {
            return;
        }
        conn.mark(ReadyState::Open);
        let (owner, url) = (conn.owner, Arc::clone(&conn.url));

        self.bus.publish(
            Event::new(EventKind::ConnectionOpened)
                .with_node(owner)
                .with_connection(id)
                .with_url(Arc::clone(&url)),
        );
        self.host.trigger(owner, SSE_OPEN, &Detail::Open { source: url });
    }

    pub fn on_error(&mut self, id: ConnectionId, error: StreamError, ready_state: ReadyState) {
        let Some(conn) = self.connections.get_mut(&id) else {
            return;
        };
        if conn.is_closed() {
            return;
        }
        conn.mark(ready_state);
        let (owner, url, attempt) = (conn.owner, Arc::clone(&conn.url), conn.attempt);

        self.bus.publish(
            Event::new(EventKind::ConnectionFailed)
                .with_node(owner)
                .with_connection(id)
                .with_url(Arc::clone(&url))
                .with_reason(format!("{ready_state}: {error}")),
        );
        self.host.trigger(
            owner,
            SSE_ERROR,
            &Detail::Error {
                source: Arc::clone(&url),
                error,
            },
        );

        if self.maybe_close_source(owner) {
            return;
        }
        if ready_state != ReadyState::Closed {
            return;
        }
        let Some(conn) = self.connections.get_mut(&id) else {
            return;
        };
        if conn.reconnect_pending {
            return;
        }
        conn.reconnect_pending = true;

        let delay = self.backoff.delay(attempt);
        let plan = Reconnect {
            owner,
            url: Arc::clone(&url),
            replaces: id,
            attempt: self.backoff.next_attempt(attempt),
        };
        self.bus.publish(
            Event::new(EventKind::BackoffScheduled)
                .with_node(owner)
                .with_connection(id)
                .with_url(url)
                .with_attempt(attempt)
                .with_delay(delay),
        );
        self.schedule(delay, plan);
    }

    fn schedule(&mut self, delay: Duration, plan: Reconnect) {
        self.timers.push(Box::pin(async move {
            tokio::time::sleep(delay).await;
            plan
        }));
    }

    /// The stream of `id` ended.
    pub fn on_stream_end(&mut self, id: ConnectionId) {
        let ended_open = self
            .connections
            .get(&id)
            .is_some_and(|c| !c.is_closed() && c.state != ReadyState::Closed);
        if ended_open {
            self.on_error(id, StreamError::Ended, ReadyState::Closed);
        }
    }

    /// Carries out a reconnect. Returns the owner when a new connection was created.
    pub fn on_reconnect(&mut self, plan: Reconnect) -> Option<NodeId> {
        let Reconnect {
            owner,
            url,
            replaces,
            attempt,
        } = plan;

        if self.bindings.get(&owner) != Some(&replaces) {
            self.abandon(owner, replaces, url, "superseded");
            return None;
        }
        if self.maybe_close_source(owner) {
            self.abandon(owner, replaces, url, "owner-detached");
            return None;
        }

        let (listeners, last_event_id) = match self.connections.get_mut(&replaces) {
            Some(old) => (old.take_listeners(), old.last_event_id.clone()),
            None => (ListenerTable::new(), None),
        };
        self.close_owner(owner, "replaced");
        self.open(owner, url, attempt, last_event_id, listeners);
        Some(owner)
    }

    fn abandon(&self, owner: NodeId, replaces: ConnectionId, url: Arc<str>, reason: &'static str) {
        self.bus.publish(
            Event::new(EventKind::ReconnectAbandoned)
                .with_node(owner)
                .with_connection(replaces)
                .with_url(url)
                .with_reason(reason),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryDocument, MockTransport};

    fn manager() -> (ConnectionManager, Arc<MemoryDocument>, crate::testing::MockServer) {
        let doc = Arc::new(MemoryDocument::new());
        let (transport, server) = MockTransport::new();
        let mgr = ConnectionManager::new(
            doc.clone(),
            Arc::new(transport),
            BackoffPolicy::default(),
            Bus::new(64),
        );
        (mgr, doc, server)
    }

    #[tokio::test]
    async fn ensure_connection_is_idempotent() {
        let (mut mgr, doc, server) = manager();
        let owner = doc.append(doc.root(), &[("sse-connect", "/events")]);

        let a = mgr.ensure_connection(owner, "/events", 0);
        let b = mgr.ensure_connection(owner, "/events", 0);
        assert_eq!(a, b);
        assert_eq!(server.count(), 1);

        let c = mgr.ensure_connection(owner, "/other", 0);
        assert_ne!(a, c);
        assert_eq!(server.count(), 2);
        assert!(server.connections()[0].is_closed());
        assert_eq!(mgr.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn closed_error_schedules_exactly_one_reconnect() {
        let (mut mgr, doc, _server) = manager();
        let owner = doc.append(doc.root(), &[("sse-connect", "/events")]);
        let id = mgr.ensure_connection(owner, "/events", 0);

        mgr.on_error(id, StreamError::Ended, ReadyState::Closed);
        mgr.on_stream_end(id);
        assert_eq!(mgr.timers.len(), 1);
        assert!(mgr.get(id).is_some_and(|c| c.reconnect_pending));
        assert_eq!(doc.notifications_for(owner), vec![SSE_ERROR]);

        mgr.on_error(id, StreamError::Ended, ReadyState::Closed);
        assert_eq!(mgr.timers.len(), 1);
    }

    #[tokio::test]
    async fn transient_error_is_left_to_the_transport() {
        let (mut mgr, doc, _server) = manager();
        let owner = doc.append(doc.root(), &[("sse-connect", "/events")]);
        let id = mgr.ensure_connection(owner, "/events", 0);

        mgr.on_error(id, StreamError::Ended, ReadyState::Connecting);
        assert!(mgr.timers.is_empty());
        assert_eq!(mgr.get(id).map(|c| c.state), Some(ReadyState::Connecting));
    }

    #[tokio::test]
    async fn error_on_detached_owner_tears_down() {
        let (mut mgr, doc, server) = manager();
        let owner = doc.append(doc.root(), &[("sse-connect", "/events")]);
        let id = mgr.ensure_connection(owner, "/events", 0);
        doc.detach(owner);

        mgr.on_error(id, StreamError::Ended, ReadyState::Closed);
        assert!(mgr.timers.is_empty());
        assert!(!mgr.holds_connection(owner));
        assert!(server.connections()[0].is_closed());
    }

    #[tokio::test]
    async fn reconnect_carries_attempt_and_last_event_id() {
        let (mut mgr, doc, server) = manager();
        let owner = doc.append(doc.root(), &[("sse-connect", "/events")]);
        let id = mgr.ensure_connection(owner, "/events", 0);
        mgr.dispatch(id, &MessageEvent::new("/events", "tick", "1").with_id("17"));
        mgr.on_error(id, StreamError::Ended, ReadyState::Closed);

        let plan = Reconnect {
            owner,
            url: Arc::from("/events"),
            replaces: id,
            attempt: 1,
        };
        assert_eq!(mgr.on_reconnect(plan.clone()), Some(owner));
        let snap = mgr.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].attempt, 1);
        assert_ne!(snap[0].id, id);
        assert_eq!(server.connections()[1].last_event_id(), Some("17"));

        // firing the same plan again finds the binding moved on
        assert_eq!(mgr.on_reconnect(plan), None);
        assert_eq!(server.count(), 2);
    }

    #[tokio::test]
    async fn reconnect_after_owner_removed_is_a_no_op() {
        let (mut mgr, doc, server) = manager();
        let owner = doc.append(doc.root(), &[("sse-connect", "/events")]);
        let id = mgr.ensure_connection(owner, "/events", 0);
        mgr.on_error(id, StreamError::Ended, ReadyState::Closed);
        doc.detach(owner);

        let plan = Reconnect {
            owner,
            url: Arc::from("/events"),
            replaces: id,
            attempt: 1,
        };
        assert_eq!(mgr.on_reconnect(plan), None);
        assert!(!mgr.holds_connection(owner));
        assert_eq!(server.count(), 1);
    }

    #[tokio::test]
    async fn close_subtree_closes_nested_owners() {
        let (mut mgr, doc, server) = manager();
        let section = doc.append(doc.root(), &[]);
        let a = doc.append(section, &[("sse-connect", "/a")]);
        let b = doc.append(a, &[("sse-connect", "/b")]);
        let other = doc.append(doc.root(), &[("sse-connect", "/c")]);
        mgr.ensure_connection(a, "/a", 0);
        mgr.ensure_connection(b, "/b", 0);
        mgr.ensure_connection(other, "/c", 0);

        assert_eq!(mgr.close_subtree(section, "owner-removed"), 2);
        assert!(mgr.holds_connection(other));
        let closed: Vec<bool> = server.connections().iter().map(|c| c.is_closed()).collect();
        assert_eq!(closed, vec![true, true, false]);
    }
}

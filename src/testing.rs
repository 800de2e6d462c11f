//! In-memory doubles for the host and the transport.
//!
//! [`MemoryDocument`] is a small attribute tree implementing [`Host`](crate::host::Host):
//! it records every notification, lets a test veto one, and stores swapped content
//! per node. [`MockTransport`] hands out channel-backed streams that a test drives
//! through [`MockServer`].
//!
//! ```text
//! test ──► MockServer::wait_for(n) ──► MockConnection ── open()/send()/fail() ──► EventStream
//!                                           └─ is_closed()  ◄── cancel token ◄── supervisor
//! ```
//!
//! Both types are cheap to share (`Arc`/clone) and safe to poke from the test task
//! while the supervisor loop runs.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, Notify as TokioNotify};
use tokio_util::sync::CancellationToken;

use crate::error::StreamError;
use crate::host::{Detail, Document, NodeId, Notify, Swap, SwapSpec, SwapStyle};
use crate::transport::{
    ConnectRequest, EventStream, MessageEvent, ReadyState, Transport, TransportEvent,
};

/// A notification raised through [`Notify::trigger`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    /// Node it was raised on.
    pub node: NodeId,
    /// Notification name.
    pub name: String,
    /// Attached detail.
    pub detail: Detail,
}

#[derive(Default)]
struct NodeData {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    attrs: Vec<(String, String)>,
    content: String,
}

struct Tree {
    nodes: HashMap<NodeId, NodeData>,
    root: NodeId,
    next: u64,
    notifications: Vec<Notification>,
    vetoes: HashSet<(NodeId, String)>,
}

/// In-memory document tree.
///
/// Node `0` is the document root and is always attached. A node is attached while
/// its parent chain reaches the root.
pub struct MemoryDocument {
    tree: Mutex<Tree>,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    /// Creates a document holding only the root.
    pub fn new() -> Self {
        let root = NodeId::new(0);
        let mut nodes = HashMap::new();
        nodes.insert(root, NodeData::default());
        Self {
            tree: Mutex::new(Tree {
                nodes,
                root,
                next: 1,
                notifications: Vec::new(),
                vetoes: HashSet::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tree> {
        self.tree.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The document root.
    pub fn root(&self) -> NodeId {
        self.lock().root
    }

    /// Appends a new element with `attrs` as the last child of `parent`.
    pub fn append(&self, parent: NodeId, attrs: &[(&str, &str)]) -> NodeId {
        let mut tree = self.lock();
        let id = NodeId::new(tree.next);
        tree.next += 1;
        tree.nodes.insert(
            id,
            NodeData {
                parent: Some(parent),
                attrs: attrs
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
                ..NodeData::default()
            },
        );
        if let Some(p) = tree.nodes.get_mut(&parent) {
            p.children.push(id);
        }
        id
    }

    /// Removes `node` (and with it its subtree) from its parent.
    pub fn detach(&self, node: NodeId) {
        let mut tree = self.lock();
        let parent = tree.nodes.get_mut(&node).and_then(|n| n.parent.take());
        if let Some(p) = parent.and_then(|p| tree.nodes.get_mut(&p)) {
            p.children.retain(|c| *c != node);
        }
    }

    /// Sets (or replaces) an attribute.
    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        let mut tree = self.lock();
        if let Some(n) = tree.nodes.get_mut(&node) {
            match n.attrs.iter_mut().find(|(k, _)| k == name) {
                Some(slot) => slot.1 = value.to_string(),
                None => n.attrs.push((name.to_string(), value.to_string())),
            }
        }
    }

    /// Content swapped into `node` so far.
    pub fn content(&self, node: NodeId) -> String {
        self.lock()
            .nodes
            .get(&node)
            .map(|n| n.content.clone())
            .unwrap_or_default()
    }

    /// Every notification raised so far, in order.
    pub fn notifications(&self) -> Vec<Notification> {
        self.lock().notifications.clone()
    }

    /// Names of the notifications raised on `node`, in order.
    pub fn notifications_for(&self, node: NodeId) -> Vec<String> {
        self.lock()
            .notifications
            .iter()
            .filter(|n| n.node == node)
            .map(|n| n.name.clone())
            .collect()
    }

    /// Makes `trigger(node, name, ..)` return `false` from now on.
    pub fn veto(&self, node: NodeId, name: &str) {
        self.lock().vetoes.insert((node, name.to_string()));
    }

    fn collect(tree: &Tree, node: NodeId, name: &str, out: &mut Vec<NodeId>) {
        let Some(data) = tree.nodes.get(&node) else {
            return;
        };
        for child in &data.children {
            if let Some(c) = tree.nodes.get(child) {
                if c.attrs.iter().any(|(k, _)| k == name) {
                    out.push(*child);
                }
            }
            Self::collect(tree, *child, name, out);
        }
    }
}

impl Document for MemoryDocument {
    fn is_attached(&self, node: NodeId) -> bool {
        let tree = self.lock();
        let mut current = node;
        loop {
            if current == tree.root {
                return true;
            }
            match tree.nodes.get(&current).and_then(|n| n.parent) {
                Some(p) => current = p,
                None => return false,
            }
        }
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.lock().nodes.get(&node).and_then(|n| n.parent)
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.lock()
            .nodes
            .get(&node)?
            .attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    }

    fn select(&self, root: NodeId, name: &str) -> Vec<NodeId> {
        let tree = self.lock();
        let mut out = Vec::new();
        Self::collect(&tree, root, name, &mut out);
        out
    }
}

impl Notify for MemoryDocument {
    fn trigger(&self, node: NodeId, name: &str, detail: &Detail) -> bool {
        let mut tree = self.lock();
        tree.notifications.push(Notification {
            node,
            name: name.to_string(),
            detail: detail.clone(),
        });
        !tree.vetoes.contains(&(node, name.to_string()))
    }
}

impl Swap for MemoryDocument {
    fn apply(&self, target: NodeId, content: &str, spec: &SwapSpec) {
        let mut tree = self.lock();
        let Some(node) = tree.nodes.get_mut(&target) else {
            return;
        };
        match spec.style {
            SwapStyle::None => {}
            SwapStyle::Delete => node.content.clear(),
            SwapStyle::AfterBegin | SwapStyle::BeforeBegin => node.content.insert_str(0, content),
            SwapStyle::BeforeEnd | SwapStyle::AfterEnd => node.content.push_str(content),
            SwapStyle::InnerHtml | SwapStyle::OuterHtml => node.content = content.to_string(),
        }
    }
}

struct ServerState {
    connections: Mutex<Vec<MockConnection>>,
    changed: TokioNotify,
}

/// Channel-backed [`Transport`].
#[derive(Clone)]
pub struct MockTransport {
    state: Arc<ServerState>,
}

/// Test-side view of every connection a [`MockTransport`] handed out.
#[derive(Clone)]
pub struct MockServer {
    state: Arc<ServerState>,
}

/// One connection handed out by a [`MockTransport`].
#[derive(Clone)]
pub struct MockConnection {
    request: ConnectRequest,
    tx: mpsc::UnboundedSender<TransportEvent>,
    cancel: CancellationToken,
}

impl MockTransport {
    /// Creates a transport and the server used to drive it.
    pub fn new() -> (Self, MockServer) {
        let state = Arc::new(ServerState {
            connections: Mutex::new(Vec::new()),
            changed: TokioNotify::new(),
        });
        (
            Self {
                state: Arc::clone(&state),
            },
            MockServer { state },
        )
    }
}

impl Transport for MockTransport {
    fn connect(&self, request: ConnectRequest, cancel: CancellationToken) -> EventStream {
        let (tx, mut rx) = mpsc::unbounded_channel();
        self.state
            .connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(MockConnection {
                request,
                tx,
                cancel,
            });
        self.state.changed.notify_waiters();
        Box::pin(futures::stream::poll_fn(move |cx| rx.poll_recv(cx)))
    }
}

impl MockServer {
    /// Every connection requested so far, oldest first.
    pub fn connections(&self) -> Vec<MockConnection> {
        self.state
            .connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of connections requested so far.
    pub fn count(&self) -> usize {
        self.state
            .connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Waits until at least `n` connections were requested and returns the `n`-th.
    pub async fn wait_for(&self, n: usize) -> MockConnection {
        loop {
            let notified = self.state.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if let Some(conn) = self.connections().into_iter().nth(n.saturating_sub(1)) {
                return conn;
            }
            notified.await;
        }
    }
}

impl MockConnection {
    /// Requested URL.
    pub fn url(&self) -> &str {
        &self.request.url
    }

    /// `Last-Event-ID` the connection was requested with.
    pub fn last_event_id(&self) -> Option<&str> {
        self.request.last_event_id.as_deref()
    }

    /// Completes the handshake.
    pub fn open(&self) {
        let _ = self.tx.send(TransportEvent::Open);
    }

    /// Pushes a server-sent event.
    pub fn send(&self, event: &str, data: &str) {
        let msg = MessageEvent::new(Arc::clone(&self.request.url), event, data);
        let _ = self.tx.send(TransportEvent::Message(msg));
    }

    /// Pushes a server-sent event carrying an id.
    pub fn send_with_id(&self, event: &str, data: &str, id: &str) {
        let msg = MessageEvent::new(Arc::clone(&self.request.url), event, data).with_id(id);
        let _ = self.tx.send(TransportEvent::Message(msg));
    }

    /// Reports an error leaving the transport in `ready_state`.
    pub fn fail(&self, ready_state: ReadyState) {
        let _ = self.tx.send(TransportEvent::Error {
            error: StreamError::Interrupted {
                error: "connection reset".to_string(),
            },
            ready_state,
        });
    }

    /// True once the consumer closed this connection.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the consumer closed this connection.
    pub async fn closed(&self) {
        self.cancel.cancelled().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_follows_parent_chain() {
        let doc = MemoryDocument::new();
        let a = doc.append(doc.root(), &[("sse-connect", "/a")]);
        let b = doc.append(a, &[("sse-swap", "x")]);
        assert!(doc.is_attached(b));

        doc.detach(a);
        assert!(!doc.is_attached(a));
        assert!(!doc.is_attached(b));
        assert_eq!(doc.parent(b), Some(a));
    }

    #[test]
    fn select_walks_in_document_order() {
        let doc = MemoryDocument::new();
        let a = doc.append(doc.root(), &[("k", "1")]);
        let b = doc.append(a, &[("k", "2")]);
        let c = doc.append(doc.root(), &[("k", "3")]);
        let _ = doc.append(doc.root(), &[("other", "")]);
        assert_eq!(doc.select(doc.root(), "k"), vec![a, b, c]);
        assert_eq!(doc.select(a, "k"), vec![b]);
    }

    #[tokio::test]
    async fn mock_transport_streams_and_observes_cancel() {
        use futures::StreamExt;

        let (transport, server) = MockTransport::new();
        let cancel = CancellationToken::new();
        let mut stream = transport.connect(
            ConnectRequest {
                url: "/events".into(),
                last_event_id: Some("9".to_string()),
            },
            cancel.clone(),
        );

        let conn = server.wait_for(1).await;
        assert_eq!(conn.url(), "/events");
        assert_eq!(conn.last_event_id(), Some("9"));

        conn.open();
        conn.send("tick", "1");
        assert_eq!(stream.next().await, Some(TransportEvent::Open));
        match stream.next().await {
            Some(TransportEvent::Message(m)) => assert_eq!(m.data, "1"),
            other => panic!("unexpected {other:?}"),
        }

        assert!(!conn.is_closed());
        cancel.cancel();
        assert!(conn.is_closed());
    }
}

//! # Dispatcher: lifecycle hooks and message delivery.
//!
//! Glue between the supervisor loop and the [`ConnectionManager`]:
//!
//! ```text
//! process_subtree(root)        ─► ensure_connection for every sse-connect in root (inclusive)
//!                              ─► register_swap_subscriptions(root)
//!                              ─► register_trigger_subscriptions(root)
//! element_removed(node)        ─► close connections owned by node or its descendants
//! Input::Stream(Open)          ─► manager.on_open
//! Input::Stream(Error)         ─► manager.on_error
//! Input::Stream(None)          ─► manager.on_stream_end
//! Input::Stream(Message)       ─► deliver: owner alive? ─► connection.dispatch ─► events
//! Input::Reconnect(plan)       ─► manager.on_reconnect ─► re-register owner subtree
//! ```

use std::sync::Arc;

use super::config::Config;
use super::connection::{ConnectionId, ConnectionInfo, ListenerId};
use super::manager::{ConnectionManager, Input};
use super::registry::{register_swap_subscriptions, register_trigger_subscriptions};
use crate::events::{Bus, Event, EventKind};
use crate::host::{attribute_value, query_inclusive, Host, NodeId};
use crate::listeners::{Delivery, Listener};
use crate::transport::{MessageEvent, Transport, TransportEvent};

pub(crate) struct Dispatcher {
    cfg: Config,
    manager: ConnectionManager,
}

impl Dispatcher {
    pub fn new(cfg: Config, host: Arc<dyn Host>, transport: Arc<dyn Transport>, bus: Bus) -> Self {
        let manager = ConnectionManager::new(host, transport, cfg.backoff, bus);
        Self { cfg, manager }
    }

    /// A subtree was inserted (or re-processed).
    pub fn process_subtree(&mut self, root: NodeId) {
        let host = self.manager.host().clone();
        for owner in query_inclusive(&*host, root, &self.cfg.connect_attr) {
            let Some(url) = attribute_value(&*host, owner, &self.cfg.connect_attr) else {
                continue;
            };
            let url = url.trim();
            if !url.is_empty() {
                self.manager.ensure_connection(owner, url, 0);
            }
        }
        register_swap_subscriptions(&mut self.manager, &self.cfg, root, None);
        register_trigger_subscriptions(&mut self.manager, &self.cfg, root, None);
    }

    /// `node` is being removed from the document.
    pub fn element_removed(&mut self, node: NodeId) -> usize {
        self.manager.close_subtree(node, "owner-removed")
    }

    pub fn ensure_connection(&mut self, owner: NodeId, url: &str) -> ConnectionId {
        self.manager.ensure_connection(owner, url, 0)
    }

    pub fn add_listener(
        &mut self,
        owner: NodeId,
        event: &str,
        listener: Box<dyn Listener>,
    ) -> Option<ListenerId> {
        self.manager.add_listener(owner, event, listener)
    }

    pub fn remove_listener(&mut self, owner: NodeId, event: &str, id: ListenerId) -> bool {
        self.manager.remove_listener(owner, event, id)
    }

    pub fn snapshot(&self) -> Vec<ConnectionInfo> {
        self.manager.snapshot()
    }

    pub fn close_all(&mut self, reason: &'static str) {
        self.manager.close_all(reason);
    }

    pub async fn next_input(&mut self) -> Input {
        self.manager.next_input().await
    }

    pub fn handle_input(&mut self, input: Input) {
        match input {
            Input::Stream(id, Some(TransportEvent::Open)) => self.manager.on_open(id),
            Input::Stream(id, Some(TransportEvent::Message(message))) => self.deliver(id, &message),
            Input::Stream(id, Some(TransportEvent::Error { error, ready_state })) => {
                self.manager.on_error(id, error, ready_state);
            }
            Input::Stream(id, None) => self.manager.on_stream_end(id),
            Input::Reconnect(plan) => {
                if let Some(owner) = self.manager.on_reconnect(plan) {
                    register_swap_subscriptions(&mut self.manager, &self.cfg, owner, Some(owner));
                    register_trigger_subscriptions(&mut self.manager, &self.cfg, owner, Some(owner));
                }
            }
        }
    }

    fn deliver(&mut self, id: ConnectionId, message: &MessageEvent) {
        let Some(owner) = self.manager.get(id).map(|c| c.owner) else {
            return;
        };
        if self.manager.maybe_close_source(owner) {
            return;
        }

        let outcomes = self.manager.dispatch(id, message);
        let bus = self.manager.bus();
        for outcome in outcomes {
            let kind = match outcome.delivery {
                Delivery::Delivered => EventKind::MessageDelivered,
                Delivery::Vetoed => EventKind::MessageVetoed,
                Delivery::Unsubscribe => EventKind::ListenerRemoved,
            };
            let mut ev = Event::new(kind)
                .with_connection(id)
                .with_event_name(message.event.as_str());
            if let Some(node) = outcome.node {
                ev = ev.with_node(node);
            }
            if outcome.delivery == Delivery::Unsubscribe {
                ev = ev.with_reason("subscriber-detached");
            }
            bus.publish(ev);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::manager::Reconnect;
    use crate::error::StreamError;
    use crate::host::{SSE_BEFORE_MESSAGE, SSE_MESSAGE};
    use crate::testing::{MemoryDocument, MockTransport};
    use crate::transport::ReadyState;

    fn setup() -> (Dispatcher, Arc<MemoryDocument>, Bus) {
        let doc = Arc::new(MemoryDocument::new());
        let (transport, _server) = MockTransport::new();
        let bus = Bus::new(256);
        let d = Dispatcher::new(Config::default(), doc.clone(), Arc::new(transport), bus.clone());
        (d, doc, bus)
    }

    #[tokio::test]
    async fn message_reaches_swap_subscriber() {
        let (mut d, doc, _bus) = setup();
        let a = doc.append(doc.root(), &[("sse-connect", "/events")]);
        let b = doc.append(a, &[("sse-swap", "update")]);
        d.process_subtree(doc.root());

        let id = d.snapshot()[0].id;
        d.handle_input(Input::Stream(id, Some(TransportEvent::Open)));
        d.handle_input(Input::Stream(
            id,
            Some(TransportEvent::Message(MessageEvent::new("/events", "update", "<p>42</p>"))),
        ));

        assert_eq!(doc.content(b), "<p>42</p>");
        assert_eq!(doc.notifications_for(b), vec![SSE_BEFORE_MESSAGE, SSE_MESSAGE]);
        assert_eq!(doc.notifications_for(a), vec!["sseOpen"]);
    }

    #[tokio::test]
    async fn message_for_detached_owner_closes_connection() {
        let (mut d, doc, _bus) = setup();
        let a = doc.append(doc.root(), &[("sse-connect", "/events")]);
        let b = doc.append(a, &[("sse-swap", "update")]);
        d.process_subtree(doc.root());
        let id = d.snapshot()[0].id;
        doc.detach(a);

        d.handle_input(Input::Stream(
            id,
            Some(TransportEvent::Message(MessageEvent::new("/events", "update", "x"))),
        ));
        assert!(d.snapshot().is_empty());
        assert_eq!(doc.content(b), "");
    }

    #[tokio::test]
    async fn detached_subscriber_is_unregistered() {
        let (mut d, doc, bus) = setup();
        let a = doc.append(doc.root(), &[("sse-connect", "/events")]);
        let b = doc.append(a, &[("sse-swap", "update")]);
        d.process_subtree(doc.root());
        let id = d.snapshot()[0].id;
        doc.detach(b);

        let mut rx = bus.subscribe();
        d.handle_input(Input::Stream(
            id,
            Some(TransportEvent::Message(MessageEvent::new("/events", "update", "x"))),
        ));
        assert_eq!(d.snapshot()[0].listeners, 0);
        assert_eq!(doc.content(b), "");

        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.kind, EventKind::ListenerRemoved);
        assert_eq!(ev.node, Some(b));
        assert_eq!(ev.reason.as_deref(), Some("subscriber-detached"));
    }

    #[tokio::test]
    async fn reconnect_reattaches_new_subscribers() {
        let (mut d, doc, _bus) = setup();
        let a = doc.append(doc.root(), &[("sse-connect", "/events")]);
        doc.append(a, &[("sse-swap", "update")]);
        d.process_subtree(doc.root());
        let id = d.snapshot()[0].id;

        d.handle_input(Input::Stream(
            id,
            Some(TransportEvent::Error {
                error: StreamError::Ended,
                ready_state: ReadyState::Closed,
            }),
        ));
        // added while the stream was down, processed by nobody
        doc.append(a, &[("hx-trigger", "sse:tick")]);

        d.handle_input(Input::Reconnect(Reconnect {
            owner: a,
            url: Arc::from("/events"),
            replaces: id,
            attempt: 1,
        }));
        let snap = d.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].attempt, 1);
        assert_eq!(snap[0].listeners, 2);
    }

    #[tokio::test]
    async fn element_removed_closes_owned_connection() {
        let (mut d, doc, _bus) = setup();
        let a = doc.append(doc.root(), &[("sse-connect", "/events")]);
        d.process_subtree(doc.root());
        assert_eq!(d.element_removed(a), 1);
        assert_eq!(d.element_removed(a), 0);
        assert!(d.snapshot().is_empty());
    }
}

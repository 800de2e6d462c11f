//! # `hx-trigger="sse:<name>"` listener.
//!
//! Instead of swapping, the message is re-raised on the subscribing element under
//! its own event name and then as `sseMessage`, so the host's regular trigger
//! machinery (requests bound to that name) takes over.

use std::sync::Arc;

use super::{Delivery, Listener};
use crate::host::{Detail, Host, NodeId, SSE_MESSAGE};
use crate::transport::MessageEvent;

/// Re-raises messages on the subscribing element.
pub struct TriggerListener {
    host: Arc<dyn Host>,
    node: NodeId,
    event: Arc<str>,
}

impl TriggerListener {
    /// Listener acting for `node`, raising `event` (the name without the `sse:` prefix).
    pub fn new(host: Arc<dyn Host>, node: NodeId, event: impl Into<Arc<str>>) -> Self {
        Self {
            host,
            node,
            event: event.into(),
        }
    }
}

impl Listener for TriggerListener {
    fn on_message(&mut self, message: &MessageEvent) -> Delivery {
        if !self.host.is_attached(self.node) {
            return Delivery::Unsubscribe;
        }

        let detail = Detail::Message(message.clone());
        self.host.trigger(self.node, &self.event, &detail);
        self.host.trigger(self.node, SSE_MESSAGE, &detail);
        Delivery::Delivered
    }

    fn node(&self) -> Option<NodeId> {
        Some(self.node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryDocument;

    #[test]
    fn raises_event_then_sse_message() {
        let doc = Arc::new(MemoryDocument::new());
        let owner = doc.append(doc.root(), &[("sse-connect", "/prices")]);
        let btn = doc.append(owner, &[("hx-trigger", "sse:priceChanged")]);
        let mut l = TriggerListener::new(doc.clone(), btn, "priceChanged");

        let d = l.on_message(&MessageEvent::new("/prices", "priceChanged", "12.5"));
        assert_eq!(d, Delivery::Delivered);
        assert_eq!(doc.notifications_for(btn), vec!["priceChanged", SSE_MESSAGE]);
        // no swap
        assert_eq!(doc.content(btn), "");
    }

    #[test]
    fn detached_subscriber_unsubscribes_silently() {
        let doc = Arc::new(MemoryDocument::new());
        let owner = doc.append(doc.root(), &[("sse-connect", "/prices")]);
        let btn = doc.append(owner, &[("hx-trigger", "sse:priceChanged")]);
        doc.detach(btn);
        let mut l = TriggerListener::new(doc.clone(), btn, "priceChanged");

        assert_eq!(
            l.on_message(&MessageEvent::new("/prices", "priceChanged", "1")),
            Delivery::Unsubscribe
        );
        assert!(doc.notifications_for(btn).is_empty());
    }
}

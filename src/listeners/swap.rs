//! # `sse-swap` listener.
//!
//! ```text
//! message ─► subscriber attached? ── no ──► Unsubscribe
//!                 │ yes
//!                 ▼
//!        trigger(sseBeforeMessage) ── false ──► Vetoed
//!                 │ true
//!                 ▼
//!        transform → swap_target → swap_spec → apply
//!                 ▼
//!        trigger(sseMessage) ──► Delivered
//! ```
//!
//! Liveness of the connection owner is checked by the dispatcher before any
//! listener runs; this listener only checks its own element.

use std::sync::Arc;

use super::{Delivery, Listener};
use crate::host::{Detail, Host, NodeId, SSE_BEFORE_MESSAGE, SSE_MESSAGE};
use crate::transport::MessageEvent;

/// Swaps message payloads into the subscribing element.
pub struct SwapListener {
    host: Arc<dyn Host>,
    node: NodeId,
}

impl SwapListener {
    /// Listener acting for `node`.
    pub fn new(host: Arc<dyn Host>, node: NodeId) -> Self {
        Self { host, node }
    }
}

impl Listener for SwapListener {
    fn on_message(&mut self, message: &MessageEvent) -> Delivery {
        if !self.host.is_attached(self.node) {
            return Delivery::Unsubscribe;
        }

        let detail = Detail::Message(message.clone());
        if !self.host.trigger(self.node, SSE_BEFORE_MESSAGE, &detail) {
            return Delivery::Vetoed;
        }

        let content = self.host.transform(self.node, message.data.clone());
        let target = self.host.swap_target(self.node);
        let spec = self.host.swap_spec(self.node);
        self.host.apply(target, &content, &spec);

        self.host.trigger(self.node, SSE_MESSAGE, &detail);
        Delivery::Delivered
    }

    fn node(&self) -> Option<NodeId> {
        Some(self.node)
    }
}

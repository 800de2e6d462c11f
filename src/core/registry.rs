//! # Subscriber discovery.
//!
//! Scans a subtree (root included) for the two subscription attributes and attaches
//! listeners to the nearest connection-holding ancestor.
//!
//! ## Architecture
//! ```text
//! register_swap_subscriptions(root)
//!   for node in query_inclusive(root, sse-swap):
//!       names  = split(value, ',') trimmed, empty skipped    (none → skip)
//!       source = closest(node, holds_connection)             (none → SubscriptionOrphaned)
//!       for name: connection(source).subscribe(Swap(node, name), SwapListener)
//!
//! register_trigger_subscriptions(root)
//!   for node in query_inclusive(root, hx-trigger):
//!       name   = value without the `sse:` prefix             (no prefix → ignored entirely)
//!       source = closest(node, holds_connection)             (none → SubscriptionOrphaned)
//!       connection(source).subscribe(Trigger(node, name), TriggerListener)
//! ```
//!
//! ## Rules
//! - Resolution happens once, at registration. Afterwards only liveness is rechecked.
//! - With `only_source`, subscriptions resolving to another owner are left alone
//!   (used to re-attach an owner's subtree after a reconnect; orphans are not reported
//!   again in that mode).
//! - Registering twice is harmless: subscriptions are keyed by (node, kind, event).

use super::config::{swap_events, Config};
use super::connection::SubscriptionKey;
use super::manager::ConnectionManager;
use crate::events::{Event, EventKind};
use crate::host::{attribute_value, query_inclusive, NodeId};
use crate::listeners::{SwapListener, TriggerListener};

pub(crate) fn register_swap_subscriptions(
    manager: &mut ConnectionManager,
    cfg: &Config,
    root: NodeId,
    only_source: Option<NodeId>,
) {
    let host = manager.host().clone();
    for node in query_inclusive(&*host, root, &cfg.swap_attr) {
        let Some(value) = attribute_value(&*host, node, &cfg.swap_attr) else {
            continue;
        };
        let names: Vec<&str> = swap_events(&value).collect();
        let Some(first) = names.first() else {
            continue;
        };
        let Some(source) = resolve(manager, node, first, only_source) else {
            continue;
        };
        for name in names {
            manager.subscribe(
                source,
                SubscriptionKey::swap(node, name),
                Box::new(SwapListener::new(host.clone(), node)),
            );
        }
    }
}

pub(crate) fn register_trigger_subscriptions(
    manager: &mut ConnectionManager,
    cfg: &Config,
    root: NodeId,
    only_source: Option<NodeId>,
) {
    let host = manager.host().clone();
    for node in query_inclusive(&*host, root, &cfg.trigger_attr) {
        let Some(value) = attribute_value(&*host, node, &cfg.trigger_attr) else {
            continue;
        };
        let Some(name) = cfg.trigger_event(&value) else {
            continue;
        };
        let Some(source) = resolve(manager, node, name, only_source) else {
            continue;
        };
        manager.subscribe(
            source,
            SubscriptionKey::trigger(node, name),
            Box::new(TriggerListener::new(host.clone(), node, name)),
        );
    }
}

fn resolve(
    manager: &ConnectionManager,
    node: NodeId,
    event: &str,
    only_source: Option<NodeId>,
) -> Option<NodeId> {
    match (manager.source_for(node), only_source) {
        (None, None) => {
            manager.bus().publish(
                Event::new(EventKind::SubscriptionOrphaned)
                    .with_node(node)
                    .with_event_name(event),
            );
            None
        }
        (None, Some(_)) => None,
        (Some(source), Some(only)) if source != only => None,
        (Some(source), _) => Some(source),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::events::Bus;
    use crate::policies::BackoffPolicy;
    use crate::testing::{MemoryDocument, MockTransport};

    fn setup() -> (ConnectionManager, Arc<MemoryDocument>, Bus) {
        let doc = Arc::new(MemoryDocument::new());
        let (transport, _server) = MockTransport::new();
        let bus = Bus::new(64);
        let mgr = ConnectionManager::new(
            doc.clone(),
            Arc::new(transport),
            BackoffPolicy::default(),
            bus.clone(),
        );
        (mgr, doc, bus)
    }

    fn listeners(mgr: &ConnectionManager) -> usize {
        mgr.snapshot().iter().map(|c| c.listeners).sum()
    }

    #[tokio::test]
    async fn swap_names_are_split_and_deduplicated() {
        let (mut mgr, doc, _bus) = setup();
        let cfg = Config::default();
        let owner = doc.append(doc.root(), &[("sse-connect", "/events")]);
        let _sub = doc.append(owner, &[("sse-swap", "update, delete,,")]);
        mgr.ensure_connection(owner, "/events", 0);

        register_swap_subscriptions(&mut mgr, &cfg, doc.root(), None);
        register_swap_subscriptions(&mut mgr, &cfg, doc.root(), None);
        assert_eq!(listeners(&mgr), 2);
    }

    #[tokio::test]
    async fn data_prefixed_attributes_are_recognised() {
        let (mut mgr, doc, _bus) = setup();
        let cfg = Config::default();
        let owner = doc.append(doc.root(), &[("data-sse-connect", "/events")]);
        doc.append(owner, &[("data-sse-swap", "update")]);
        doc.append(owner, &[("data-hx-trigger", "sse:tick")]);
        mgr.ensure_connection(owner, "/events", 0);

        register_swap_subscriptions(&mut mgr, &cfg, owner, None);
        register_trigger_subscriptions(&mut mgr, &cfg, owner, None);
        assert_eq!(listeners(&mgr), 2);
    }

    #[tokio::test]
    async fn orphans_are_reported_and_plain_triggers_ignored() {
        let (mut mgr, doc, bus) = setup();
        let mut rx = bus.subscribe();
        let cfg = Config::default();
        let lonely = doc.append(doc.root(), &[("sse-swap", "update")]);
        let _button = doc.append(doc.root(), &[("hx-trigger", "click")]);

        register_swap_subscriptions(&mut mgr, &cfg, doc.root(), None);
        register_trigger_subscriptions(&mut mgr, &cfg, doc.root(), None);

        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.kind, EventKind::SubscriptionOrphaned);
        assert_eq!(ev.node, Some(lonely));
        assert_eq!(ev.event_name.as_deref(), Some("update"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn nearest_owner_wins() {
        let (mut mgr, doc, _bus) = setup();
        let cfg = Config::default();
        let outer = doc.append(doc.root(), &[("sse-connect", "/outer")]);
        let inner = doc.append(outer, &[("sse-connect", "/inner")]);
        doc.append(inner, &[("sse-swap", "update")]);
        mgr.ensure_connection(outer, "/outer", 0);
        mgr.ensure_connection(inner, "/inner", 0);

        register_swap_subscriptions(&mut mgr, &cfg, outer, Some(outer));
        assert_eq!(listeners(&mgr), 0);
        register_swap_subscriptions(&mut mgr, &cfg, outer, None);

        let snap = mgr.snapshot();
        let inner_info = snap.iter().find(|c| c.owner == inner).unwrap();
        assert_eq!(inner_info.listeners, 1);
    }
}

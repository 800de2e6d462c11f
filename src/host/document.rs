//! # Document tree access.
//!
//! The runtime never walks a concrete DOM. It sees the tree through [`Document`]
//! and identifies nodes by an opaque [`NodeId`] the host hands out.
//!
//! The helpers in this module implement the lookups the runtime needs on top of
//! the four trait methods:
//! - [`closest`] inclusive upward search used to find the nearest connection owner;
//! - [`attribute_value`] attribute read that falls back to the `data-` variant;
//! - [`query_inclusive`] the root plus every descendant carrying an attribute.

use std::fmt;

/// Opaque handle to a node of the host document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u64);

impl NodeId {
    /// Wraps a host-chosen identifier.
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the host-chosen identifier.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Read access to the live document tree.
///
/// All methods are called from the supervisor loop and must not block.
pub trait Document: Send + Sync + 'static {
    /// True while `node` is part of the live document.
    fn is_attached(&self, node: NodeId) -> bool;

    /// Parent of `node`, `None` for the root or a detached subtree root.
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Raw attribute value, `None` if the attribute is absent.
    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    /// Descendants of `root` (excluding `root`) carrying attribute `name`, in document order.
    fn select(&self, root: NodeId, name: &str) -> Vec<NodeId>;
}

/// Nearest node, starting at `node` itself and walking up, satisfying `pred`.
pub fn closest<D, P>(doc: &D, node: NodeId, mut pred: P) -> Option<NodeId>
where
    D: Document + ?Sized,
    P: FnMut(NodeId) -> bool,
{
    let mut current = Some(node);
    while let Some(n) = current {
        if pred(n) {
            return Some(n);
        }
        current = doc.parent(n);
    }
    None
}

/// Reads `name`, falling back to `data-{name}`.
pub fn attribute_value<D: Document + ?Sized>(doc: &D, node: NodeId, name: &str) -> Option<String> {
    doc.attribute(node, name)
        .or_else(|| doc.attribute(node, &data_attribute(name)))
}

/// True if `node` carries `name` or `data-{name}`.
pub fn has_attribute<D: Document + ?Sized>(doc: &D, node: NodeId, name: &str) -> bool {
    attribute_value(doc, node, name).is_some()
}

/// Every node under and including `root` that carries `name` or `data-{name}`.
///
/// The root comes first; duplicates (a node carrying both spellings) are removed.
pub fn query_inclusive<D: Document + ?Sized>(doc: &D, root: NodeId, name: &str) -> Vec<NodeId> {
    let mut out = Vec::new();
    if has_attribute(doc, root, name) {
        out.push(root);
    }
    let prefixed = data_attribute(name);
    for node in doc
        .select(root, name)
        .into_iter()
        .chain(doc.select(root, &prefixed))
    {
        if !out.contains(&node) {
            out.push(node);
        }
    }
    out
}

fn data_attribute(name: &str) -> String {
    format!("data-{name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryDocument;

    #[test]
    fn closest_includes_start_node() {
        let doc = MemoryDocument::new();
        let a = doc.append(doc.root(), &[("sse-connect", "/a")]);
        let found = closest(&doc, a, |n| doc.attribute(n, "sse-connect").is_some());
        assert_eq!(found, Some(a));
    }

    #[test]
    fn closest_walks_to_ancestor() {
        let doc = MemoryDocument::new();
        let a = doc.append(doc.root(), &[("sse-connect", "/a")]);
        let b = doc.append(a, &[]);
        let c = doc.append(b, &[("sse-swap", "x")]);
        let found = closest(&doc, c, |n| doc.attribute(n, "sse-connect").is_some());
        assert_eq!(found, Some(a));
        assert_eq!(closest(&doc, c, |_| false), None);
    }

    #[test]
    fn query_inclusive_accepts_data_prefix() {
        let doc = MemoryDocument::new();
        let root = doc.append(doc.root(), &[("sse-swap", "a")]);
        let plain = doc.append(root, &[("sse-swap", "b")]);
        let prefixed = doc.append(root, &[("data-sse-swap", "c")]);
        let both = doc.append(root, &[("sse-swap", "d"), ("data-sse-swap", "d")]);
        doc.append(root, &[("hx-get", "/nope")]);

        let found = query_inclusive(&doc, root, "sse-swap");
        assert_eq!(found, vec![root, plain, both, prefixed]);
        assert_eq!(attribute_value(&doc, prefixed, "sse-swap").as_deref(), Some("c"));
    }
}

//! # Content swap pipeline of the host framework.

use std::time::Duration;

use super::document::NodeId;

/// Where swapped content lands relative to the target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SwapStyle {
    /// Replace the children of the target.
    #[default]
    InnerHtml,
    /// Replace the target itself.
    OuterHtml,
    /// Insert before the target.
    BeforeBegin,
    /// Insert before the first child.
    AfterBegin,
    /// Insert after the last child.
    BeforeEnd,
    /// Insert after the target.
    AfterEnd,
    /// Remove the target.
    Delete,
    /// Leave the document untouched.
    None,
}

/// Resolved swap specification for one subscriber.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwapSpec {
    /// Placement of the new content.
    pub style: SwapStyle,
    /// Delay before the swap is applied.
    pub swap_delay: Duration,
    /// Delay between swap and settle.
    pub settle_delay: Duration,
}

impl Default for SwapSpec {
    fn default() -> Self {
        Self {
            style: SwapStyle::InnerHtml,
            swap_delay: Duration::ZERO,
            settle_delay: Duration::from_millis(20),
        }
    }
}

/// Applies message payloads to the document.
///
/// Only [`Swap::apply`] is mandatory; the resolvers default to "the subscriber
/// itself, innerHTML, untransformed".
pub trait Swap: Send + Sync + 'static {
    /// Transform hook run on the raw payload before it is swapped.
    fn transform(&self, _node: NodeId, content: String) -> String {
        content
    }

    /// Node that receives the content of a message delivered to `node`.
    fn swap_target(&self, node: NodeId) -> NodeId {
        node
    }

    /// Swap specification for `node`.
    fn swap_spec(&self, _node: NodeId) -> SwapSpec {
        SwapSpec::default()
    }

    /// Applies `content` to `target`, including any settle work.
    fn apply(&self, target: NodeId, content: &str, spec: &SwapSpec);
}

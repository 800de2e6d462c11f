//! Host-side collaborators.
//!
//! The runtime is embedded in a host framework that owns the document. The host
//! implements three traits and hands them over as one `Arc<dyn Host>`:
//!
//! ```text
//!            ┌──────────────────────── Host ────────────────────────┐
//!            │  Document             Notify              Swap       │
//!            │  is_attached()        trigger() -> bool   transform()│
//!            │  parent()                                 swap_target│
//!            │  attribute()                              swap_spec()│
//!            │  select()                                 apply()    │
//!            └──────────────────────────────────────────────────────┘
//!                 ▲                      ▲                   ▲
//!      discovery/liveness         sseOpen/sseError     payload hand-off
//!        (core::dispatch)         sseBeforeMessage     (listeners::SwapListener)
//!                                 sseMessage
//! ```
//!
//! Any type implementing all three traits is a [`Host`] (blanket impl).

mod document;
mod notify;
mod swap;

pub use document::{attribute_value, closest, has_attribute, query_inclusive, Document, NodeId};
pub use notify::{Detail, Notify, SSE_BEFORE_MESSAGE, SSE_ERROR, SSE_MESSAGE, SSE_OPEN};
pub use swap::{Swap, SwapSpec, SwapStyle};

/// Everything the runtime needs from the host framework.
pub trait Host: Document + Notify + Swap {}

impl<T> Host for T where T: Document + Notify + Swap {}

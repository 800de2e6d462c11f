//! # Event subscribers for the ssevisor runtime.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out and
//! the optional built-in [`LogWriter`].
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   supervisor loop ── publish(Event) ──► Bus ──► subscriber_listener
//!                                                        │
//!                                                 SubscriberSet::emit
//!                                                        │
//!                                           ┌────────────┼────────────┐
//!                                           ▼            ▼            ▼
//!                                       LogWriter     Metrics      Custom
//! ```
//!
//! Subscribers observe the runtime; they cannot influence delivery. Host-facing
//! notifications (`sseOpen`, `sseMessage`, ...) go through [`Notify`](crate::host::Notify)
//! instead.

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;

//! Runtime core: connections, discovery and the supervisor loop.
//!
//! The only public API from this module is [`Supervisor`] (with its builder),
//! [`Handle`], [`Config`] and the connection identifiers.
//!
//! ```text
//!   Handle ──commands──► Supervisor::run (one task)
//!                           │
//!                           ▼
//!                       Dispatcher ── process_subtree / element_removed / deliver
//!                           │
//!          ┌────────────────┼──────────────────┐
//!          ▼                ▼                  ▼
//!   registry (discovery)  ConnectionManager   Bus ──► SubscriberSet
//!                           │   bindings: owner → Connection
//!                           │   streams (SelectAll), timers (FuturesUnordered)
//!                           ▼
//!                       Connection ── listeners by event name
//! ```
//!
//! Internal modules:
//! - [`connection`]: one stream, its state and its listener table;
//! - [`manager`]: owner bindings, error recovery, reconnect timers;
//! - [`registry`]: discovery of `sse-swap` / `hx-trigger="sse:*"` subscribers;
//! - [`dispatch`]: lifecycle hooks and message delivery;
//! - [`supervisor`]: the loop, fed by [`handle`] commands.

mod builder;
mod config;
mod connection;
mod dispatch;
mod handle;
mod manager;
mod registry;
mod supervisor;

pub use builder::SupervisorBuilder;
pub use config::Config;
pub use connection::{ConnectionId, ConnectionInfo, ListenerId};
pub use handle::Handle;
pub use supervisor::Supervisor;

//! # Global runtime configuration.
//!
//! Provides [`Config`], the centralized settings for the supervisor runtime.
//!
//! Config is used in two ways:
//! 1. **Supervisor creation**: `Supervisor::builder(config, host, transport)`
//! 2. **Transport defaults**: `HttpTransport::from_config(&config)`
//!
//! ## Attribute names
//! Every attribute is also read with a `data-` prefix (`data-sse-connect`, ...).

use crate::policies::BackoffPolicy;

/// Global configuration for the supervisor runtime.
///
/// ## Field semantics
/// - `connect_attr`: attribute whose value is the stream URL of its element
/// - `swap_attr`: comma-separated event names whose payload is swapped into the element
/// - `trigger_attr` / `trigger_prefix`: `hx-trigger="sse:name"` re-raises `name` on the element
/// - `backoff`: reconnect delay policy for closed streams
/// - `with_credentials`: default transport keeps cookies
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
///
/// ## Notes
/// All fields are public for flexibility.
#[derive(Clone, Debug)]
pub struct Config {
    /// Attribute declaring a stream URL (`sse-connect`).
    pub connect_attr: String,

    /// Attribute declaring swap subscriptions (`sse-swap`).
    pub swap_attr: String,

    /// Generic trigger attribute scanned for stream subscriptions (`hx-trigger`).
    pub trigger_attr: String,

    /// Marker a trigger value must start with to be a stream subscription (`sse:`).
    ///
    /// Values without it are ignored entirely.
    pub trigger_prefix: String,

    /// Reconnect policy.
    ///
    /// Applied only when the transport reports an error *and* a `Closed` ready state.
    pub backoff: BackoffPolicy,

    /// Whether the default transport sends credentials (keeps a cookie store).
    pub with_credentials: bool,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` messages will
    /// receive `Lagged` and skip older items. Minimum value is 1 (enforced by Bus).
    pub bus_capacity: usize,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    ///
    /// The `Bus` should use this value to avoid constructing an invalid channel.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Strips the trigger prefix from a trigger attribute value.
    ///
    /// Returns `None` when the value is not a stream subscription or names no event.
    pub fn trigger_event<'a>(&self, value: &'a str) -> Option<&'a str> {
        let name = value.trim().strip_prefix(self.trigger_prefix.as_str())?.trim();
        (!name.is_empty()).then_some(name)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - htmx attribute names (`sse-connect`, `sse-swap`, `hx-trigger`, `sse:`)
    /// - `backoff = BackoffPolicy::default()` (500 ms base, capped at attempt 7, full jitter)
    /// - `with_credentials = true`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            connect_attr: "sse-connect".to_string(),
            swap_attr: "sse-swap".to_string(),
            trigger_attr: "hx-trigger".to_string(),
            trigger_prefix: "sse:".to_string(),
            backoff: BackoffPolicy::default(),
            with_credentials: true,
            bus_capacity: 1024,
        }
    }
}

/// Splits a swap attribute value into event names (trimmed, empty names skipped).
pub(crate) fn swap_events(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

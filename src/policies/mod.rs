//! Reconnect policies.
//!
//! This module groups the knobs that control **how long** the manager waits before
//! replacing a stream the transport reported as closed.
//!
//! ## Contents
//! - [`BackoffPolicy`] capped exponential ceiling (`base × 2^attempt`, attempt ≤ 7)
//! - [`JitterPolicy`]  randomization applied to the ceiling
//! - [`BASE_DELAY`], [`MAX_ATTEMPT`] the defaults behind `BackoffPolicy::default()`
//!
//! ## Quick wiring
//! ```text
//! Config { backoff: BackoffPolicy, .. }
//!      └─► core::manager::ConnectionManager uses:
//!           - backoff.delay(conn.attempt) to schedule the replacement
//!           - backoff.next_attempt(conn.attempt) for the replacement's counter
//! ```
//!
//! ## Defaults
//! - `BackoffPolicy::default()` → base=500ms, max_attempt=7, jitter=Full.

mod backoff;
mod jitter;

pub use backoff::{BackoffPolicy, BASE_DELAY, MAX_ATTEMPT};
pub use jitter::JitterPolicy;

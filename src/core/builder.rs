use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::dispatch::Dispatcher;
use super::supervisor::Supervisor;
use crate::{
    core::Config,
    events::Bus,
    host::Host,
    subscribers::{Subscribe, SubscriberSet},
    transport::Transport,
};

/// Builder for constructing a Supervisor with optional features.
pub struct SupervisorBuilder {
    cfg: Config,
    host: Arc<dyn Host>,
    transport: Arc<dyn Transport>,
    subscribers: Vec<Arc<dyn Subscribe>>,
    runtime_token: Option<CancellationToken>,
}

impl SupervisorBuilder {
    /// Creates a new builder with the given configuration and collaborators.
    pub fn new(cfg: Config, host: Arc<dyn Host>, transport: Arc<dyn Transport>) -> Self {
        Self {
            cfg,
            host,
            transport,
            subscribers: Vec::new(),
            runtime_token: None,
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (connection lifecycle, reconnects, deliveries)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Ties the supervisor to an outer shutdown token (e.g. the application's).
    ///
    /// Cancelling it has the same effect as [`Handle::shutdown`](crate::Handle::shutdown).
    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.runtime_token = Some(token);
        self
    }

    /// Builds and returns the Supervisor instance.
    ///
    /// This consumes the builder and initializes all runtime components:
    /// - Event bus for broadcasting
    /// - Subscriber workers
    /// - Dispatcher with its connection manager
    pub fn build(self) -> Supervisor {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));
        let runtime_token = self.runtime_token.unwrap_or_default();
        let dispatcher = Dispatcher::new(self.cfg, self.host, self.transport, bus.clone());

        Supervisor::new_internal(dispatcher, bus, subs, runtime_token)
    }
}

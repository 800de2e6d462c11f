//! # Supervisor: the single cooperative loop.
//!
//! The [`Supervisor`] owns the event bus, a [`SubscriberSet`], and the dispatcher
//! (which owns every connection, stream and timer). [`Supervisor::run`] drives all of
//! them from one task, so no state is ever shared or locked.
//!
//! ## Key responsibilities
//! - subscribe to the [`Bus`] and **fan-out** events via [`SubscriberSet`]
//! - serve [`Handle`] commands (process, cleanup, listeners, snapshots)
//! - poll transport streams and backoff timers
//! - close every connection on shutdown
//!
//! ## High-level architecture
//! ```text
//! run():
//!   subscriber_listener(): Bus.subscribe() ─► SubscriberSet::emit(&Event)   (fire-and-forget)
//!
//!   loop select! (biased)
//!     ├─ runtime token cancelled ─► publish ShutdownRequested, break
//!     ├─ Command from a Handle    ─► Dispatcher (ack through oneshot)
//!     └─ Dispatcher::next_input() ─► transport event | reconnect timer
//!
//!   on exit: Dispatcher::close_all("shutdown")   (ConnectionClosed per connection)
//! ```
//!
//! Events reach subscribers asynchronously; the loop never waits for them.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use ssevisor::testing::{MemoryDocument, MockTransport};
//! use ssevisor::{Config, Supervisor};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let doc = Arc::new(MemoryDocument::new());
//!     let owner = doc.append(doc.root(), &[("sse-connect", "/events")]);
//!     doc.append(owner, &[("sse-swap", "update")]);
//!     let (transport, server) = MockTransport::new();
//!
//!     let sup = Supervisor::builder(Config::default(), doc.clone(), Arc::new(transport)).build();
//!     let handle = sup.handle();
//!     let run = tokio::spawn(sup.run());
//!
//!     handle.process(doc.root()).await?;
//!     let conn = server.wait_for(1).await;
//!     assert_eq!(conn.url(), "/events");
//!
//!     handle.shutdown();
//!     run.await??;
//!     assert!(conn.is_closed());
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::builder::SupervisorBuilder;
use super::dispatch::Dispatcher;
use super::handle::{Command, Handle};
use super::manager::Input;
use crate::core::Config;
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::host::Host;
use crate::subscribers::SubscriberSet;
use crate::transport::Transport;

/// Capacity of the command channel between handles and the loop.
pub(crate) const COMMAND_CAPACITY: usize = 256;

enum Step {
    Shutdown,
    Command(Command),
    HandlesGone,
    Input(Input),
}

/// Owns the connection runtime; consumed by [`run`](Self::run).
pub struct Supervisor {
    /// Event bus shared with every handle.
    pub bus: Bus,
    subs: Arc<SubscriberSet>,
    dispatcher: Dispatcher,
    tx: mpsc::Sender<Command>,
    rx: mpsc::Receiver<Command>,
    runtime_token: CancellationToken,
}

impl Supervisor {
    /// Starts building a supervisor.
    pub fn builder(
        cfg: Config,
        host: Arc<dyn Host>,
        transport: Arc<dyn Transport>,
    ) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg, host, transport)
    }

    pub(crate) fn new_internal(
        dispatcher: Dispatcher,
        bus: Bus,
        subs: Arc<SubscriberSet>,
        runtime_token: CancellationToken,
    ) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
        Self {
            bus,
            subs,
            dispatcher,
            tx,
            rx,
            runtime_token,
        }
    }

    /// A new handle to this supervisor. Take handles before calling [`run`](Self::run).
    pub fn handle(&self) -> Handle {
        Handle::new(self.tx.clone(), self.bus.clone(), self.runtime_token.clone())
    }

    /// Runs the loop until [`Handle::shutdown`] (or the runtime token) stops it.
    ///
    /// Dropping every handle does not stop the loop: streams keep being served.
    pub async fn run(self) -> Result<(), RuntimeError> {
        let Supervisor {
            bus,
            subs,
            mut dispatcher,
            tx,
            mut rx,
            runtime_token,
        } = self;
        drop(tx);
        Self::subscriber_listener(&bus, subs);

        let mut commands_open = true;
        loop {
            let step = tokio::select! {
                biased;
                _ = runtime_token.cancelled() => Step::Shutdown,
                cmd = rx.recv(), if commands_open => match cmd {
                    Some(cmd) => Step::Command(cmd),
                    None => Step::HandlesGone,
                },
                input = dispatcher.next_input() => Step::Input(input),
            };

            match step {
                Step::Shutdown => {
                    bus.publish(Event::new(EventKind::ShutdownRequested));
                    break;
                }
                Step::HandlesGone => commands_open = false,
                Step::Command(cmd) => Self::apply(&mut dispatcher, cmd),
                Step::Input(input) => dispatcher.handle_input(input),
            }
        }

        dispatcher.close_all("shutdown");
        Ok(())
    }

    fn apply(dispatcher: &mut Dispatcher, cmd: Command) {
        match cmd {
            Command::Process { root, ack } => {
                dispatcher.process_subtree(root);
                let _ = ack.send(());
            }
            Command::Cleanup { node, ack } => {
                let _ = ack.send(dispatcher.element_removed(node));
            }
            Command::Ensure { owner, url, ack } => {
                let _ = ack.send(dispatcher.ensure_connection(owner, &url));
            }
            Command::AddListener {
                owner,
                event,
                listener,
                ack,
            } => {
                let _ = ack.send(dispatcher.add_listener(owner, &event, listener));
            }
            Command::RemoveListener {
                owner,
                event,
                id,
                ack,
            } => {
                let _ = ack.send(dispatcher.remove_listener(owner, &event, id));
            }
            Command::Snapshot { ack } => {
                let _ = ack.send(dispatcher.snapshot());
            }
        }
    }

    /// Subscribes to the bus and forwards events to the subscriber set (fire-and-forget).
    fn subscriber_listener(bus: &Bus, set: Arc<SubscriberSet>) {
        if set.is_empty() {
            return;
        }
        let mut rx = bus.subscribe();
        tokio::spawn(async move {
            use tokio::sync::broadcast::error::RecvError;
            loop {
                match rx.recv().await {
                    Ok(ev) => set.emit(&ev),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }
}

//! # Handle: talking to a running supervisor.
//!
//! [`Handle`] is the cloneable front door of the supervisor loop. Every operation is
//! a [`Command`] sent over a bounded `mpsc` channel; the loop answers through a
//! `oneshot`, so a returned `Ok` means the loop has already applied the change.
//!
//! ```text
//! Handle::process(root) ──► Command::Process { root, ack } ──► loop ──► Dispatcher
//!        ▲                                                        │
//!        └──────────────────────── ack (oneshot) ◄────────────────┘
//! ```
//!
//! Every method fails with [`RuntimeError::Stopped`] once the loop has exited.

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::connection::{ConnectionId, ConnectionInfo, ListenerId};
use crate::error::RuntimeError;
use crate::events::{Bus, Event};
use crate::host::NodeId;
use crate::listeners::Listener;

pub(crate) enum Command {
    Process {
        root: NodeId,
        ack: oneshot::Sender<()>,
    },
    Cleanup {
        node: NodeId,
        ack: oneshot::Sender<usize>,
    },
    Ensure {
        owner: NodeId,
        url: String,
        ack: oneshot::Sender<ConnectionId>,
    },
    AddListener {
        owner: NodeId,
        event: String,
        listener: Box<dyn Listener>,
        ack: oneshot::Sender<Option<ListenerId>>,
    },
    RemoveListener {
        owner: NodeId,
        event: String,
        id: ListenerId,
        ack: oneshot::Sender<bool>,
    },
    Snapshot {
        ack: oneshot::Sender<Vec<ConnectionInfo>>,
    },
}

/// Cloneable handle to a supervisor loop.
#[derive(Clone)]
pub struct Handle {
    tx: mpsc::Sender<Command>,
    bus: Bus,
    cancel: CancellationToken,
}

impl Handle {
    pub(crate) fn new(tx: mpsc::Sender<Command>, bus: Bus, cancel: CancellationToken) -> Self {
        Self { tx, bus, cancel }
    }

    async fn call<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, RuntimeError> {
        let (ack, rx) = oneshot::channel();
        self.tx
            .send(build(ack))
            .await
            .map_err(|_| RuntimeError::Stopped)?;
        rx.await.map_err(|_| RuntimeError::Stopped)
    }

    /// Subtree `root` was inserted: opens its connections and registers its subscriptions.
    ///
    /// Calling it again for the same subtree is harmless.
    pub async fn process(&self, root: NodeId) -> Result<(), RuntimeError> {
        self.call(|ack| Command::Process { root, ack }).await
    }

    /// `node` is being removed: closes the connections it (or a descendant) owns.
    ///
    /// Returns the number of connections closed.
    pub async fn cleanup(&self, node: NodeId) -> Result<usize, RuntimeError> {
        self.call(|ack| Command::Cleanup { node, ack }).await
    }

    /// Binds a connection to `url` to `owner` (no attribute needed).
    ///
    /// Returns the existing connection if `owner` already has a usable one for `url`.
    pub async fn ensure_connection(
        &self,
        owner: NodeId,
        url: impl Into<String>,
    ) -> Result<ConnectionId, RuntimeError> {
        let url = url.into();
        self.call(|ack| Command::Ensure { owner, url, ack }).await
    }

    /// Adds a custom listener for `event` on the connection of `owner`.
    ///
    /// Returns `None` if `owner` holds no connection. The listener survives reconnects.
    pub async fn add_listener(
        &self,
        owner: NodeId,
        event: impl Into<String>,
        listener: impl Listener,
    ) -> Result<Option<ListenerId>, RuntimeError> {
        let event = event.into();
        let listener: Box<dyn Listener> = Box::new(listener);
        self.call(|ack| Command::AddListener {
            owner,
            event,
            listener,
            ack,
        })
        .await
    }

    /// Removes a listener added with [`add_listener`](Self::add_listener). Idempotent.
    pub async fn remove_listener(
        &self,
        owner: NodeId,
        event: impl Into<String>,
        id: ListenerId,
    ) -> Result<bool, RuntimeError> {
        let event = event.into();
        self.call(|ack| Command::RemoveListener {
            owner,
            event,
            id,
            ack,
        })
        .await
    }

    /// Snapshot of every live connection, ordered by id.
    pub async fn connections(&self) -> Result<Vec<ConnectionInfo>, RuntimeError> {
        self.call(|ack| Command::Snapshot { ack }).await
    }

    /// New receiver of runtime events published from now on.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Asks the loop to close every connection and exit.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use ssevisor::testing::{MemoryDocument, MockServer, MockTransport};
use ssevisor::{BackoffPolicy, Config, Event, EventKind, Handle, JitterPolicy, Supervisor};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

pub const WAIT: Duration = Duration::from_secs(5);

pub struct Harness {
    pub doc: Arc<MemoryDocument>,
    pub server: MockServer,
    pub handle: Handle,
    pub events: broadcast::Receiver<Event>,
    pub run: JoinHandle<Result<(), ssevisor::RuntimeError>>,
}

/// Deterministic, short backoff so absence checks stay fast.
pub fn fast_config() -> Config {
    Config {
        backoff: BackoffPolicy {
            base: Duration::from_millis(20),
            jitter: JitterPolicy::None,
            ..BackoffPolicy::default()
        },
        ..Config::default()
    }
}

pub fn start(cfg: Config) -> Harness {
    let doc = Arc::new(MemoryDocument::new());
    let (transport, server) = MockTransport::new();
    let sup = Supervisor::builder(cfg, doc.clone(), Arc::new(transport)).build();
    let handle = sup.handle();
    let events = handle.events();
    let run = tokio::spawn(sup.run());
    Harness {
        doc,
        server,
        handle,
        events,
        run,
    }
}

/// Waits for the next event of `kind`, skipping everything else.
pub async fn next_of(rx: &mut broadcast::Receiver<Event>, kind: EventKind) -> Event {
    let wait = async {
        loop {
            match rx.recv().await {
                Ok(ev) if ev.kind == kind => return ev,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("bus closed waiting for {kind:?}"),
            }
        }
    };
    tokio::time::timeout(WAIT, wait)
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {kind:?}"))
}

/// Everything already published, without waiting.
pub fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

pub fn count(events: &[Event], kind: EventKind) -> usize {
    events.iter().filter(|e| e.kind == kind).count()
}

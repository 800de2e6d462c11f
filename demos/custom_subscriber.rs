//! # Example: custom_subscriber
//!
//! Demonstrates how to observe the connection lifecycle with a custom subscriber.
//!
//! Shows how to:
//! - Implement the [`Subscribe`] trait.
//! - Inspect [`Event`] / [`EventKind`] for open, failure, backoff and delivery.
//! - Drive a stream by hand with the in-memory [`MockTransport`].
//!
//! ## Flow
//! ```text
//! <div sse-connect="/ticks"><span sse-swap="tick"></span></div>
//!
//! Handle::process(root)
//!   ├─► publish(ConnectionOpening, attempt=0)
//!   ├─► server: open, tick ×3        → ConnectionOpened, MessageDelivered ×3
//!   ├─► server: fail(Closed)         → ConnectionFailed, BackoffScheduled
//!   ├─► timer fires                  → ConnectionClosed(replaced), ConnectionOpening(attempt=1)
//!   ├─► server: open, tick           → MessageDelivered (listener carried over)
//!   └─► Handle::shutdown()           → ShutdownRequested, ConnectionClosed(shutdown)
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example custom_subscriber
//! ```

use std::{sync::Arc, time::Duration};

use ssevisor::testing::{MemoryDocument, MockTransport};
use ssevisor::{
    BackoffPolicy, Config, Event, EventKind, JitterPolicy, ReadyState, Subscribe, Supervisor,
};

/// Prints the lifecycle events; everything else is ignored.
struct ConsoleSubscriber;

#[async_trait::async_trait]
impl Subscribe for ConsoleSubscriber {
    async fn on_event(&self, ev: &Event) {
        let url = ev.url.as_deref().unwrap_or("<none>");
        match ev.kind {
            EventKind::ConnectionOpening => {
                println!("[sub] opening:  url={url} attempt={}", ev.attempt.unwrap_or(0));
            }
            EventKind::ConnectionOpened => println!("[sub] opened:   url={url}"),
            EventKind::ConnectionFailed => {
                println!(
                    "[sub] failed:   url={url} reason={}",
                    ev.reason.as_deref().unwrap_or("<none>")
                );
            }
            EventKind::BackoffScheduled => {
                let delay = ev.delay_ms.map(|v| format!("{v}ms")).unwrap_or_default();
                println!("[sub] backoff:  url={url} delay={delay}");
            }
            EventKind::ConnectionClosed => {
                println!(
                    "[sub] closed:   url={url} reason={}",
                    ev.reason.as_deref().unwrap_or("<none>")
                );
            }
            EventKind::MessageDelivered => {
                println!(
                    "[sub] message:  event={}",
                    ev.event_name.as_deref().unwrap_or("<unknown>")
                );
            }
            EventKind::ShutdownRequested => println!("[sub] shutdown requested"),
            _ => {}
        }
    }

    fn name(&self) -> &'static str {
        "console"
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Document: one stream owner with one swap subscriber
    let doc = Arc::new(MemoryDocument::new());
    let owner = doc.append(doc.root(), &[("sse-connect", "/ticks")]);
    let clock = doc.append(owner, &[("sse-swap", "tick")]);

    // 2. Short, deterministic backoff so the demo does not wait long
    let cfg = Config {
        backoff: BackoffPolicy {
            base: Duration::from_millis(200),
            jitter: JitterPolicy::None,
            ..BackoffPolicy::default()
        },
        ..Config::default()
    };

    // 3. Supervisor with the console subscriber
    let (transport, server) = MockTransport::new();
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(ConsoleSubscriber)];
    let sup = Supervisor::builder(cfg, doc.clone(), Arc::new(transport))
        .with_subscribers(subs)
        .build();
    let handle = sup.handle();
    let mut events = handle.events();
    let run = tokio::spawn(sup.run());

    // 4. Subtree inserted: the connection opens
    handle.process(doc.root()).await?;
    let first = server.wait_for(1).await;
    first.open();
    for n in 1..=3 {
        first.send("tick", &format!("<b>{n}</b>"));
    }

    // 5. The server drops the stream; the manager schedules a replacement
    first.fail(ReadyState::Closed);
    let second = server.wait_for(2).await;
    second.open();
    second.send("tick", "<b>4</b>");

    let mut delivered = 0;
    while delivered < 4 {
        if events.recv().await?.kind == EventKind::MessageDelivered {
            delivered += 1;
        }
    }
    let info = handle.connections().await?;
    println!("[main] content={} attempt={}", doc.content(clock), info[0].attempt);

    // 6. Shut down: every connection is closed
    handle.shutdown();
    run.await??;

    // give the subscriber worker a moment to drain its queue
    tokio::time::sleep(Duration::from_millis(50)).await;
    println!("[main] done.");
    Ok(())
}

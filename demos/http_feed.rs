//! # Example: http_feed
//!
//! Follows a real `text/event-stream` endpoint with the [`HttpTransport`] and logs
//! the runtime through the built-in [`LogWriter`].
//!
//! Every event named on the command line is swapped into its own in-memory element;
//! the content is printed on each delivery. Stop with `Ctrl+C`.
//!
//! ## Flow
//! ```text
//! <div sse-connect=URL>
//!   <p sse-swap=EVENT_1></p> ... <p sse-swap=EVENT_N></p>
//! </div>
//!
//! HttpTransport::connect(URL)
//!   ├─► 2xx text/event-stream → sseOpen, messages swapped into <p>
//!   └─► error / EOF           → backoff (500ms × 2^attempt, full jitter), reconnect
//!                               with Last-Event-ID
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example http_feed --features logging -- http://localhost:8080/events message
//! ```

use std::sync::Arc;

use ssevisor::testing::MemoryDocument;
use ssevisor::{Config, EventKind, HttpTransport, LogWriter, Subscribe, Supervisor};
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ssevisor=info".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let url = args
        .next()
        .unwrap_or_else(|| "http://localhost:8080/events".to_string());
    let mut names: Vec<String> = args.collect();
    if names.is_empty() {
        names.push("message".to_string());
    }

    // 1. Document: one owner, one swap target per event name
    let doc = Arc::new(MemoryDocument::new());
    let owner = doc.append(doc.root(), &[("sse-connect", url.as_str())]);
    for name in &names {
        doc.append(owner, &[("sse-swap", name.as_str())]);
    }

    // 2. Runtime with the reqwest transport and the tracing subscriber
    let cfg = Config::default();
    let transport = HttpTransport::from_config(&cfg)?;
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let sup = Supervisor::builder(cfg, doc.clone(), Arc::new(transport))
        .with_subscribers(subs)
        .build();
    let handle = sup.handle();
    let mut events = handle.events();
    let run = tokio::spawn(sup.run());

    handle.process(doc.root()).await?;

    // 3. Print every swapped payload until Ctrl+C
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            ev = events.recv() => match ev {
                Ok(ev) if ev.kind == EventKind::MessageDelivered => {
                    if let Some(node) = ev.node {
                        println!(
                            "[{}] {}",
                            ev.event_name.as_deref().unwrap_or("?"),
                            doc.content(node)
                        );
                    }
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
        }
    }

    handle.shutdown();
    run.await??;
    Ok(())
}

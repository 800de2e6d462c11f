//! # `reqwest`-backed transport.
//!
//! [`HttpTransport`] issues a `GET` with `Accept: text/event-stream` and decodes the
//! body with [`Decoder`]. It never reconnects on its own: every failure is reported
//! once with `ReadyState::Closed` and the stream ends, leaving retries to the
//! connection manager's backoff policy.
//!
//! ## Event flow
//! ```text
//! connect() ──► spawn reader ──► send()
//!                                 ├─ Err            → Error(Connect, Closed)
//!                                 ├─ status !2xx    → Error(Status, Closed)
//!                                 ├─ not SSE        → Error(ContentType, Closed)
//!                                 └─ ok             → Open
//!                                       └─ body chunks → Decoder → Message*
//!                                             ├─ read error → Error(Interrupted, Closed)
//!                                             └─ EOF        → Error(Ended, Closed)
//! cancel token ──► reader task exits, body dropped
//! ```

use futures::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::wire::Decoder;
use super::{ConnectRequest, EventStream, ReadyState, Transport, TransportEvent};
use crate::core::Config;
use crate::error::StreamError;

const EVENT_STREAM: &str = "text/event-stream";
const LAST_EVENT_ID: &str = "Last-Event-ID";

/// Default transport: server-sent events over HTTP.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Wraps an existing client.
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Builds a client from `cfg`.
    ///
    /// With `with_credentials` the client keeps a cookie store, so cookies set by the
    /// host's other requests travel with the stream requests.
    pub fn from_config(cfg: &Config) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .cookie_store(cfg.with_credentials)
            .build()?;
        Ok(Self::new(client))
    }
}

impl Transport for HttpTransport {
    fn connect(&self, request: ConnectRequest, cancel: CancellationToken) -> EventStream {
        let (tx, mut rx) = mpsc::unbounded_channel::<TransportEvent>();
        let client = self.client.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = read_stream(client, request, &tx) => {}
            }
        });

        Box::pin(futures::stream::poll_fn(move |cx| rx.poll_recv(cx)))
    }
}

async fn read_stream(
    client: reqwest::Client,
    request: ConnectRequest,
    tx: &mpsc::UnboundedSender<TransportEvent>,
) {
    let url = request.url;
    let mut req = client
        .get(url.as_ref())
        .header(ACCEPT, EVENT_STREAM)
        .header(CACHE_CONTROL, "no-cache");
    if let Some(id) = request.last_event_id.as_deref().filter(|id| !id.is_empty()) {
        req = req.header(LAST_EVENT_ID, id);
    }

    let resp = match req.send().await {
        Ok(resp) => resp,
        Err(e) => {
            closed(tx, StreamError::Connect { url, error: e.to_string() });
            return;
        }
    };

    let status = resp.status();
    if !status.is_success() {
        closed(tx, StreamError::Status { url, status: status.as_u16() });
        return;
    }

    let content_type = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if !content_type.starts_with(EVENT_STREAM) {
        closed(tx, StreamError::ContentType { url, content_type });
        return;
    }

    if tx.send(TransportEvent::Open).is_err() {
        return;
    }

    let mut decoder = Decoder::new(url);
    let mut body = resp.bytes_stream();
    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(bytes) => {
                for message in decoder.feed(&bytes) {
                    if tx.send(TransportEvent::Message(message)).is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                closed(tx, StreamError::Interrupted { error: e.to_string() });
                return;
            }
        }
    }

    for message in decoder.finish() {
        let _ = tx.send(TransportEvent::Message(message));
    }
    closed(tx, StreamError::Ended);
}

fn closed(tx: &mpsc::UnboundedSender<TransportEvent>, error: StreamError) {
    let _ = tx.send(TransportEvent::Error {
        error,
        ready_state: ReadyState::Closed,
    });
}

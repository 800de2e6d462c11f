//! # Incremental `text/event-stream` decoder.
//!
//! [`Decoder`] accepts arbitrary byte chunks as they come off the socket and yields
//! complete [`MessageEvent`]s.
//!
//! ## Rules
//! - Lines end with `\n`, `\r\n` or `\r`; a trailing `\r` waits for the next chunk.
//! - UTF-8 sequences split across chunks are reassembled; invalid bytes become U+FFFD.
//! - A leading byte-order mark is dropped.
//! - `:` lines are comments. Unknown fields are ignored.
//! - `data` lines accumulate, joined with `\n`; a blank line dispatches.
//! - Blocks without any `data` line are not dispatched (but still reset `event`).
//! - `id` persists across events until changed; values containing NUL are ignored
//!   and an empty value clears it.
//! - `retry` is accepted only when it is all ASCII digits.
//!
//! ## Buffering
//! ```text
//! buf:  [ consumed lines | partial line ........ | new chunk ]
//!                        ^ read                  ^ scan_from
//! ```
//! Each `feed` searches for terminators from `scan_from` only, hands out lines as
//! slices of `buf`, and drops the consumed prefix once at the end of the call.

use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use super::{MessageEvent, DEFAULT_EVENT};

/// Streaming decoder for one connection.
#[derive(Debug)]
pub struct Decoder {
    pending: Vec<u8>,
    buf: String,
    read: usize,
    scan_from: usize,
    started: bool,
    block: Block,
}

/// Field state of the block being assembled.
#[derive(Debug)]
struct Block {
    origin: Arc<str>,
    event: String,
    data: String,
    has_data: bool,
    last_id: Option<String>,
    retry: Option<Duration>,
}

impl Decoder {
    /// Creates a decoder for the stream at `origin`.
    pub fn new(origin: impl Into<Arc<str>>) -> Self {
        Self {
            pending: Vec::new(),
            buf: String::new(),
            read: 0,
            scan_from: 0,
            started: false,
            block: Block {
                origin: origin.into(),
                event: String::new(),
                data: String::new(),
                has_data: false,
                last_id: None,
                retry: None,
            },
        }
    }

    /// Feeds a chunk and returns every event completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<MessageEvent> {
        self.decode(chunk);
        self.drain_lines(false)
    }

    /// Flushes at end of stream. A block without its terminating blank line is dropped.
    pub fn finish(&mut self) -> Vec<MessageEvent> {
        let out = self.drain_lines(true);
        self.block.event.clear();
        self.block.data.clear();
        self.block.has_data = false;
        out
    }

    /// Id of the last event, as set by the most recent `id` field.
    pub fn last_event_id(&self) -> Option<&str> {
        self.block.last_id.as_deref()
    }

    /// Reconnection time requested by the server, if any.
    pub fn retry(&self) -> Option<Duration> {
        self.block.retry
    }

    fn drain_lines(&mut self, eof: bool) -> Vec<MessageEvent> {
        let mut out = Vec::new();
        while let Some(line) = self.next_line(eof) {
            if let Some(ev) = self.block.process_line(&self.buf[line]) {
                out.push(ev);
            }
        }
        self.compact();
        out
    }

    fn decode(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
        let mut at = 0;
        while at < self.pending.len() {
            match std::str::from_utf8(&self.pending[at..]) {
                Ok(s) => {
                    self.buf.push_str(s);
                    at = self.pending.len();
                }
                Err(e) => {
                    let valid = at + e.valid_up_to();
                    self.buf
                        .push_str(std::str::from_utf8(&self.pending[at..valid]).unwrap_or_default());
                    match e.error_len() {
                        // incomplete sequence at the end, wait for more bytes
                        None => {
                            at = valid;
                            break;
                        }
                        Some(len) => {
                            self.buf.push(char::REPLACEMENT_CHARACTER);
                            at = valid + len;
                        }
                    }
                }
            }
        }
        self.pending.drain(..at);

        if !self.started && !self.buf.is_empty() {
            self.started = true;
            if self.buf.starts_with('\u{feff}') {
                self.buf.drain(..'\u{feff}'.len_utf8());
            }
        }
    }

    /// Next complete line as a range of `buf`. Only bytes from `scan_from` on are searched.
    fn next_line(&mut self, eof: bool) -> Option<Range<usize>> {
        let start = self.read;
        let from = self.scan_from.max(start);
        let len = self.buf.len();
        let found = self.buf.as_bytes()[from..]
            .iter()
            .position(|&b| b == b'\r' || b == b'\n');

        let pos = match found {
            Some(i) => from + i,
            None => {
                self.scan_from = len;
                if eof && start < len {
                    self.read = len;
                    return Some(start..len);
                }
                return None;
            }
        };

        let bytes = self.buf.as_bytes();
        let term = if bytes[pos] == b'\r' {
            match bytes.get(pos + 1) {
                Some(b'\n') => 2,
                Some(_) => 1,
                None if eof => 1,
                None => {
                    self.scan_from = pos;
                    return None;
                }
            }
        } else {
            1
        };

        self.read = pos + term;
        self.scan_from = self.read;
        Some(start..pos)
    }

    fn compact(&mut self) {
        if self.read > 0 {
            self.buf.drain(..self.read);
            self.scan_from = self.scan_from.saturating_sub(self.read);
            self.read = 0;
        }
    }
}

impl Block {
    fn process_line(&mut self, line: &str) -> Option<MessageEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.find(':') {
            Some(i) => {
                let value = &line[i + 1..];
                (&line[..i], value.strip_prefix(' ').unwrap_or(value))
            }
            None => (line, ""),
        };

        match field {
            "event" => self.event = value.to_string(),
            "data" => {
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            "id" => {
                if value.is_empty() {
                    self.last_id = None;
                } else if !value.contains('\0') {
                    self.last_id = Some(value.to_string());
                }
            }
            "retry" => {
                if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
                    if let Ok(ms) = value.parse::<u64>() {
                        self.retry = Some(Duration::from_millis(ms));
                    }
                }
            }
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<MessageEvent> {
        let event = std::mem::take(&mut self.event);
        if !self.has_data {
            return None;
        }
        self.has_data = false;

        Some(MessageEvent {
            event: if event.is_empty() {
                DEFAULT_EVENT.to_string()
            } else {
                event
            },
            data: std::mem::take(&mut self.data),
            id: self.last_id.clone(),
            origin: Arc::clone(&self.origin),
        })
    }
}

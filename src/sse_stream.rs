//! Stream adapter for parsing SSE (Server-Sent Events) from byte chunks.

use crate::error::StreamError;
use futures_util::{Stream, StreamExt};
use memchr::memmem;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

/// Largest amount of unframed data held before the stream gives up.
pub const MAX_BUFFER_BYTES: usize = 1_000_000;

/// A Server-Sent Events (SSE) event.
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    /// Event type (optional).
    pub event_type: Option<String>,
    /// Event data.
    pub data: String,
    /// Event ID (optional).
    pub id: Option<String>,
}

impl SseEvent {
    /// Create a new SSE event with just data.
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            event_type: None,
            data: data.into(),
            id: None,
        }
    }

    /// Create a new SSE event with event type and data.
    pub fn with_type(event_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event_type: Some(event_type.into()),
            data: data.into(),
            id: None,
        }
    }

    /// Check if this is a "done" event (used by OpenAI-compatible APIs to signal end of stream).
    pub fn is_done(&self) -> bool {
        self.data.trim() == "[DONE]"
    }
}

/// A stream adapter that parses SSE events from a byte stream.
/// Maintains internal state to handle events split across chunks.
pub struct SseStream<S> {
    /// The underlying byte stream
    inner: S,
    /// Buffer for incomplete raw bytes from previous chunks
    buffer: Vec<u8>,
    /// Parsed events ready to be yielded
    events: VecDeque<SseEvent>,
    /// Set once the inner stream has ended or failed
    finished: bool,
    /// Reported after the queued events drain
    overflowed: bool,
}

impl<S> SseStream<S> {
    /// Create a new SSE stream from a byte stream.
    pub fn new(stream: S) -> Self {
        Self {
            inner: stream,
            buffer: Vec::new(),
            events: VecDeque::new(),
            finished: false,
            overflowed: false,
        }
    }

    /// Append a chunk, dropping carriage returns so CRLF framing reads as LF.
    fn push_chunk(&mut self, chunk: &[u8]) {
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));
    }

    /// Parse complete SSE events from the buffer into the event queue.
    fn parse_buffer(&mut self) {
        // SSE event separator is "\n\n" (two consecutive newlines)
        let separator = b"\n\n";
        let finder = memmem::Finder::new(separator);
        let mut start = 0;

        while let Some(pos) = finder.find(&self.buffer[start..]) {
            let event_end = start + pos;
            match std::str::from_utf8(&self.buffer[start..event_end]) {
                Ok(event_text) => {
                    if let Some(event) = Self::parse_single_event(event_text) {
                        self.events.push_back(event);
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "skipping SSE event with invalid UTF-8");
                }
            }

            // Move past this event (including the separator)
            start = event_end + separator.len();
        }

        if start > 0 {
            self.buffer.drain(..start);
        }
    }

    /// Parse a single complete SSE event from its text representation.
    fn parse_single_event(event_text: &str) -> Option<SseEvent> {
        let mut event_type = None;
        let mut data_lines = Vec::new();
        let mut id = None;

        for line in event_text.lines() {
            let line = line.trim_start_matches('\u{feff}').trim_end();

            // Skip empty lines and comments
            if line.is_empty() || line.starts_with(':') {
                continue;
            }

            if let Some((field, value)) = line.split_once(':') {
                let value = value.strip_prefix(' ').unwrap_or(value);

                match field {
                    "event" => event_type = Some(value.to_string()),
                    "data" => data_lines.push(value.to_string()),
                    "id" => id = Some(value.to_string()),
                    _ => {} // Ignore unknown fields, including retry
                }
            }
        }

        // No data means no event
        if data_lines.is_empty() {
            return None;
        }

        Some(SseEvent {
            event_type,
            data: data_lines.join("\n"),
            id,
        })
    }
}

impl<S, E> Stream for SseStream<S>
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    type Item = Result<SseEvent, StreamError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            // First, yield any already-parsed events (FIFO order)
            if let Some(event) = self.events.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }

            if self.finished {
                if std::mem::take(&mut self.overflowed) {
                    return Poll::Ready(Some(Err(StreamError::Overflow(MAX_BUFFER_BYTES))));
                }
                return Poll::Ready(None);
            }

            let chunk = match ready!(self.inner.poll_next_unpin(cx)) {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => {
                    self.finished = true;
                    self.buffer.clear();
                    return Poll::Ready(Some(Err(StreamError::Transport(e.to_string()))));
                }
                None => {
                    // Stream ended - the last event may lack its trailing blank line
                    self.finished = true;
                    let remaining = std::mem::take(&mut self.buffer);
                    if let Ok(text) = std::str::from_utf8(&remaining) {
                        if let Some(event) = Self::parse_single_event(text.trim()) {
                            return Poll::Ready(Some(Ok(event)));
                        }
                    }
                    return Poll::Ready(None);
                }
            };

            self.push_chunk(&chunk);
            self.parse_buffer();

            // Only an unterminated event counts against the limit
            if self.buffer.len() > MAX_BUFFER_BYTES {
                self.finished = true;
                self.overflowed = true;
                self.buffer.clear();
            }
        }
    }
}

/// Extension trait to add SSE parsing to byte streams.
pub trait SseStreamExt: Stream {
    /// Parse this byte stream as SSE events.
    fn sse_events(self) -> SseStream<Self>
    where
        Self: Sized,
    {
        SseStream::new(self)
    }
}

impl<S: Stream> SseStreamExt for S {}

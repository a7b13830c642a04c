//! Stream adapter splitting newline-delimited JSON bodies into lines.
//!
//! Only framing happens here; callers decide how to parse each line.

use crate::error::StreamError;
use crate::sse_stream::MAX_BUFFER_BYTES;
use futures_util::{Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

/// A stream of non-empty text lines cut from a byte stream.
pub struct NdjsonStream<S> {
    inner: S,
    buffer: Vec<u8>,
    lines: VecDeque<String>,
    finished: bool,
    overflowed: bool,
}

impl<S> NdjsonStream<S> {
    pub fn new(stream: S) -> Self {
        Self {
            inner: stream,
            buffer: Vec::new(),
            lines: VecDeque::new(),
            finished: false,
            overflowed: false,
        }
    }

    fn queue_line(&mut self, raw: &[u8]) {
        match std::str::from_utf8(raw) {
            Ok(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    self.lines.push_back(text.to_string());
                }
            }
            Err(e) => tracing::warn!(error = %e, "skipping NDJSON line with invalid UTF-8"),
        }
    }

    fn parse_buffer(&mut self) {
        let mut start = 0;
        while let Some(pos) = memchr::memchr(b'\n', &self.buffer[start..]) {
            let end = start + pos;
            let line = self.buffer[start..end].to_vec();
            self.queue_line(&line);
            start = end + 1;
        }
        if start > 0 {
            self.buffer.drain(..start);
        }
    }
}

impl<S, E> Stream for NdjsonStream<S>
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    type Item = Result<String, StreamError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(line) = self.lines.pop_front() {
                return Poll::Ready(Some(Ok(line)));
            }

            if self.finished {
                if std::mem::take(&mut self.overflowed) {
                    return Poll::Ready(Some(Err(StreamError::Overflow(MAX_BUFFER_BYTES))));
                }
                return Poll::Ready(None);
            }

            match ready!(self.inner.poll_next_unpin(cx)) {
                Some(Ok(chunk)) => {
                    self.buffer.extend_from_slice(&chunk);
                    self.parse_buffer();
                    if self.buffer.len() > MAX_BUFFER_BYTES {
                        self.finished = true;
                        self.overflowed = true;
                        self.buffer.clear();
                    }
                }
                Some(Err(e)) => {
                    self.finished = true;
                    self.buffer.clear();
                    return Poll::Ready(Some(Err(StreamError::Transport(e.to_string()))));
                }
                None => {
                    // A final object without a trailing newline is still a line
                    self.finished = true;
                    let remaining = std::mem::take(&mut self.buffer);
                    self.queue_line(&remaining);
                }
            }
        }
    }
}

/// Extension trait to add NDJSON line splitting to byte streams.
pub trait NdjsonStreamExt: Stream {
    fn ndjson_lines(self) -> NdjsonStream<Self>
    where
        Self: Sized,
    {
        NdjsonStream::new(self)
    }
}

impl<S: Stream> NdjsonStreamExt for S {}

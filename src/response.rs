//! Streamed chat responses.

use crate::Error;
use futures::future;
use futures_util::stream::Stream;
use futures_util::StreamExt;
use std::pin::Pin;
use std::task::{Context, Poll};

/// What one decoded stream event contributes to a [`ChatStream`].
#[derive(Debug)]
pub(crate) enum Frame {
    /// Generated text.
    Text(String),
    /// Events carrying no text: pings, metadata, malformed payloads.
    Skip,
    /// The provider signalled the end of the reply.
    Done,
    /// The stream broke; nothing more will be read.
    Fail(Error),
}

/// A single-pass, forward-only sequence of text fragments.
///
/// Fragments arrive in order as the provider produces them and are never
/// empty. A failure after streaming has begun is yielded once as the final
/// item; nothing follows it. Dropping the stream releases the connection.
pub struct ChatStream {
    stream: Pin<Box<dyn Stream<Item = Result<String, Error>> + Send>>,
}

impl ChatStream {
    /// Create a new response from a stream of fragments.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<String, Error>> + Send + 'static,
    {
        let fused = stream
            .filter(|item| future::ready(!matches!(item, Ok(text) if text.is_empty())))
            .scan(false, |failed, item| {
                if *failed {
                    return future::ready(None);
                }
                *failed = item.is_err();
                future::ready(Some(item))
            });

        Self {
            stream: Box::pin(fused),
        }
    }

    /// Create a response from decoded provider events. Reading stops at
    /// [`Frame::Done`].
    pub(crate) fn from_frames<S>(frames: S) -> Self
    where
        S: Stream<Item = Frame> + Send + 'static,
    {
        let fragments = frames
            .take_while(|frame| future::ready(!matches!(frame, Frame::Done)))
            .filter_map(|frame| {
                future::ready(match frame {
                    Frame::Text(text) => Some(Ok(text)),
                    Frame::Fail(error) => Some(Err(error)),
                    Frame::Skip | Frame::Done => None,
                })
            });
        Self::from_stream(fragments)
    }

    /// Buffer the whole response into one string.
    pub async fn text(mut self) -> Result<String, Error> {
        let mut text = String::new();
        while let Some(fragment) = self.stream.next().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }
}

impl Stream for ChatStream {
    type Item = Result<String, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.stream.as_mut().poll_next(cx)
    }
}

impl std::fmt::Debug for ChatStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatStream").finish_non_exhaustive()
    }
}

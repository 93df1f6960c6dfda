//! Channel-backed writer feeding a streamed response body

use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::lifecycle::StreamLifecycle;
use crate::multipart::{encode_error, encode_fragment};
use crate::TransportError;

/// Create a writer and the body stream it feeds.
///
/// The stream ends once the writer and every probe taken from it are dropped.
pub fn frame_channel(capacity: usize) -> (FrameWriter, FrameStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        FrameWriter {
            tx,
            lifecycle: StreamLifecycle::new(),
            fragments_sent: 0,
        },
        FrameStream {
            inner: ReceiverStream::new(rx),
        },
    )
}

/// Writes framed fragments for one response, enforcing its lifecycle
pub struct FrameWriter {
    tx: mpsc::Sender<Vec<u8>>,
    lifecycle: StreamLifecycle,
    fragments_sent: usize,
}

impl FrameWriter {
    pub fn begin_segmenting(&mut self) -> Result<(), TransportError> {
        self.lifecycle.begin_segmenting()
    }

    pub fn begin_streaming(&mut self) -> Result<(), TransportError> {
        self.lifecycle.begin_streaming()
    }

    /// Audio fragments written so far (error fragments excluded)
    pub fn fragments_sent(&self) -> usize {
        self.fragments_sent
    }

    /// Cloneable handle for polling client disconnection from another task
    pub fn probe(&self) -> DisconnectProbe {
        DisconnectProbe {
            tx: self.tx.clone(),
        }
    }

    pub async fn send_fragment(&mut self, content_type: &str, payload: &[u8]) -> Result<(), TransportError> {
        if self.lifecycle.is_terminated() {
            return Err(TransportError::Terminated);
        }
        self.send(encode_fragment(content_type, payload)).await?;
        self.fragments_sent += 1;
        Ok(())
    }

    pub async fn send_error(&mut self, message: &str) -> Result<(), TransportError> {
        if self.lifecycle.is_terminated() {
            return Err(TransportError::Terminated);
        }
        self.send(encode_error(message)).await
    }

    /// Write the terminator. Only the first call writes anything.
    pub async fn finish(&mut self) -> Result<(), TransportError> {
        match self.lifecycle.terminate() {
            Some(terminator) => {
                tracing::trace!(fragments = self.fragments_sent, "Writing terminator");
                self.send(terminator).await
            }
            None => Ok(()),
        }
    }

    async fn send(&self, frame: Vec<u8>) -> Result<(), TransportError> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| TransportError::ClientDisconnected)
    }
}

/// Reports whether the response body is still being consumed
#[derive(Clone)]
pub struct DisconnectProbe {
    tx: mpsc::Sender<Vec<u8>>,
}

impl DisconnectProbe {
    pub fn is_disconnected(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Body stream of encoded frames
pub struct FrameStream {
    inner: ReceiverStream<Vec<u8>>,
}

impl Stream for FrameStream {
    type Item = Result<Vec<u8>, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx).map(|frame| frame.map(Ok))
    }
}

//! Streamed body produced by the encoder.
//!
//! [`EncodedBody`] is the read end of a bounded channel whose write end is
//! owned by the producer task spawned in [`Encoder::to_parts`](crate::Encoder::to_parts).
//! Dropping the body closes the channel; the producer's next send then fails
//! and it stops.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use http_body::{Body, Frame};
use tokio::sync::mpsc;
use wrphttp_core::Error;

/// Number of in-flight chunks between the producer and the reader.
pub(crate) const PIPE_CAPACITY: usize = 8;

/// An encoded HTTP body, produced lazily as it is read.
///
/// Yields `Ok` chunks until the producer finishes, or a single `Err` if
/// encoding failed part way through.
pub struct EncodedBody {
    rx: mpsc::Receiver<Result<Bytes, Error>>,
    done: bool,
}

impl EncodedBody {
    /// Create a body and the sender that feeds it.
    pub(crate) fn channel() -> (mpsc::Sender<Result<Bytes, Error>>, Self) {
        let (tx, rx) = mpsc::channel(PIPE_CAPACITY);
        (tx, Self { rx, done: false })
    }
}

impl Stream for EncodedBody {
    type Item = Result<Bytes, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }
        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(Ok(data))) => Poll::Ready(Some(Ok(data))),
            Poll::Ready(Some(Err(e))) => {
                self.done = true;
                self.rx.close();
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                self.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Body for EncodedBody {
    type Data = Bytes;
    type Error = Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        self.poll_next(cx).map(|item| item.map(|res| res.map(Frame::data)))
    }

    fn is_end_stream(&self) -> bool {
        self.done
    }
}

impl std::fmt::Debug for EncodedBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedBody")
            .field("done", &self.done)
            .finish()
    }
}

//! Output channel of a live bar subscription.
//!
//! [`channel`] creates a connected [`LiveBarSink`] / [`LiveBarStream`] pair.
//! The sink lives in the subscriber registry and is fed by the tick router;
//! the stream is handed to the caller. A stream ends either because it was
//! completed (unsubscribe, client shutdown) or because a newer subscription
//! for the same symbol and period superseded it; [`LiveBarStream::end_reason`]
//! tells the two apart once the stream has returned `None`.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::models::LiveBar;

/// Why a live bar stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The subscription was closed normally.
    Completed,
    /// A newer subscription for the same symbol and period replaced this one.
    Superseded,
}

enum Signal {
    Bar(LiveBar),
    End(StreamEnd),
}

/// Creates a connected sink/stream pair.
pub fn channel() -> (LiveBarSink, LiveBarStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        LiveBarSink {
            tx: Mutex::new(Some(tx)),
        },
        LiveBarStream { rx, end: None },
    )
}

/// Producer half, owned by the registry.
pub struct LiveBarSink {
    tx: Mutex<Option<mpsc::UnboundedSender<Signal>>>,
}

impl LiveBarSink {
    /// Delivers a bar. Returns `false` if the sink is completed or the
    /// stream was dropped.
    pub fn push(&self, bar: LiveBar) -> bool {
        match self.tx.lock().as_ref() {
            Some(tx) => tx.send(Signal::Bar(bar)).is_ok(),
            None => false,
        }
    }

    /// Ends the stream with `end`. Only the first call has an effect.
    pub fn complete(&self, end: StreamEnd) {
        if let Some(tx) = self.tx.lock().take() {
            let _ = tx.send(Signal::End(end));
        }
    }

    /// Returns `true` once completed or once the stream has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.lock().as_ref().is_none_or(|tx| tx.is_closed())
    }
}

impl std::fmt::Debug for LiveBarSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveBarSink")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Consumer half: a stream of candle updates, never replayed.
#[derive(Debug)]
pub struct LiveBarStream {
    rx: mpsc::UnboundedReceiver<Signal>,
    end: Option<StreamEnd>,
}

impl LiveBarStream {
    /// Receives the next bar, or `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<LiveBar> {
        std::future::poll_fn(|cx| self.poll_signal(cx)).await
    }

    /// Why the stream ended, once it has.
    pub fn end_reason(&self) -> Option<StreamEnd> {
        self.end
    }

    fn poll_signal(&mut self, cx: &mut Context<'_>) -> Poll<Option<LiveBar>> {
        if self.end.is_some() {
            return Poll::Ready(None);
        }
        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(Signal::Bar(bar))) => Poll::Ready(Some(bar)),
            Poll::Ready(Some(Signal::End(end))) => {
                self.end = Some(end);
                Poll::Ready(None)
            }
            // Sender dropped without a terminal signal
            Poll::Ready(None) => {
                self.end = Some(StreamEnd::Completed);
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Stream for LiveBarStream {
    type Item = LiveBar;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().poll_signal(cx)
    }
}

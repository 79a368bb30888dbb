//! Repeating tick scheduling
//!
//! A `Ticker` hands out `TickHandle`s that deliver one message per period.
//! Ticks are queued, never applied by the ticker itself: the owner of the
//! handle drains them on its own thread (`try_tick`) or awaits them
//! (`tick`), so state is only ever mutated by its owner. Cancelling or
//! dropping the handle stops delivery.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::{Error, Result};

/// Default tick period for session and rest clocks
pub const ONE_SECOND: Duration = Duration::from_secs(1);

/// Scheduler of repeating ticks
pub trait Ticker: Send + Sync + fmt::Debug {
    fn schedule(&self, period: Duration) -> TickHandle;
}

/// Receiving end of a scheduled tick stream
#[derive(Debug)]
pub struct TickHandle {
    token: CancellationToken,
    rx: mpsc::UnboundedReceiver<()>,
}

impl TickHandle {
    fn new(token: CancellationToken, rx: mpsc::UnboundedReceiver<()>) -> Self {
        Self { token, rx }
    }

    /// Take one pending tick without waiting
    pub fn try_tick(&mut self) -> bool {
        !self.token.is_cancelled() && self.rx.try_recv().is_ok()
    }

    /// Wait for the next tick; `false` once the handle is cancelled or the source is gone
    pub async fn tick(&mut self) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        tokio::select! {
            _ = self.token.cancelled() => false,
            tick = self.rx.recv() => tick.is_some(),
        }
    }

    /// Stop delivery; pending ticks are discarded
    pub fn cancel(&mut self) {
        self.token.cancel();
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for TickHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Ticker backed by `tokio::time::interval`
#[derive(Debug, Clone)]
pub struct TokioTicker {
    runtime: Handle,
}

impl TokioTicker {
    /// Bind to the runtime the caller is running on
    pub fn current() -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::Runtime(format!("TokioTicker needs a tokio runtime: {}", e)))?;
        Ok(Self { runtime })
    }

    pub fn with_handle(runtime: Handle) -> Self {
        Self { runtime }
    }
}

impl Ticker for TokioTicker {
    fn schedule(&self, period: Duration) -> TickHandle {
        let token = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let task_token = token.clone();

        self.runtime.spawn(async move {
            // First tick lands one full period after scheduling
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = interval.tick() => {
                        if tx.send(()).is_err() {
                            break;
                        }
                    }
                }
            }
            trace!("Tick task stopped");
        });

        TickHandle::new(token, rx)
    }
}

/// Ticker that only fires when told to; clones share the same schedule
#[derive(Debug, Clone, Default)]
pub struct ManualTicker {
    streams: Arc<Mutex<Vec<ManualStream>>>,
}

#[derive(Debug)]
struct ManualStream {
    token: CancellationToken,
    tx: mpsc::UnboundedSender<()>,
}

impl ManualTicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `ticks` ticks to every live handle
    pub fn advance(&self, ticks: usize) {
        let mut streams = self.streams.lock().unwrap_or_else(|e| e.into_inner());
        streams.retain(|stream| !stream.token.is_cancelled() && !stream.tx.is_closed());
        for stream in streams.iter() {
            for _ in 0..ticks {
                let _ = stream.tx.send(());
            }
        }
    }

    /// Number of handles that are still receiving ticks
    pub fn live_handles(&self) -> usize {
        let streams = self.streams.lock().unwrap_or_else(|e| e.into_inner());
        streams
            .iter()
            .filter(|stream| !stream.token.is_cancelled() && !stream.tx.is_closed())
            .count()
    }
}

impl Ticker for ManualTicker {
    fn schedule(&self, _period: Duration) -> TickHandle {
        let token = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded_channel();
        self.streams
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(ManualStream {
                token: token.clone(),
                tx,
            });
        TickHandle::new(token, rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_ticker_delivers_on_advance() {
        let ticker = ManualTicker::new();
        let mut handle = ticker.schedule(ONE_SECOND);

        assert!(!handle.try_tick());
        ticker.advance(2);
        assert!(handle.try_tick());
        assert!(handle.try_tick());
        assert!(!handle.try_tick());
    }

    #[test]
    fn test_cancel_discards_pending_ticks() {
        let ticker = ManualTicker::new();
        let mut handle = ticker.schedule(ONE_SECOND);
        ticker.advance(3);

        handle.cancel();
        assert!(handle.is_cancelled());
        assert!(!handle.try_tick());
        assert_eq!(ticker.live_handles(), 0);
    }

    #[test]
    fn test_dropped_handle_stops_receiving() {
        let ticker = ManualTicker::new();
        let handle = ticker.schedule(ONE_SECOND);
        assert_eq!(ticker.live_handles(), 1);
        drop(handle);
        assert_eq!(ticker.live_handles(), 0);
        ticker.advance(1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_ticker_fires_each_period() {
        let ticker = TokioTicker::current().unwrap();
        let mut handle = ticker.schedule(ONE_SECOND);

        let started = Instant::now();
        assert!(handle.tick().await);
        assert!(handle.tick().await);
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_ticker_cancel_ends_stream() {
        let ticker = TokioTicker::current().unwrap();
        let mut handle = ticker.schedule(ONE_SECOND);
        handle.cancel();
        assert!(!handle.tick().await);
    }

    #[test]
    fn test_tokio_ticker_requires_runtime() {
        let err = TokioTicker::current().unwrap_err();
        assert_eq!(err.code(), "E900");
    }
}

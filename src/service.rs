//! background maintenance tasks

use crate::eth::pool::Pool;
use std::{
    fmt,
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicBool, Ordering::Relaxed},
        Arc,
    },
    task::{Context, Poll},
    time::Duration,
};
use tokio::time::Interval;
use tracing::{trace, warn};

/// Flag that stops a recurring task before its next run.
///
/// The flag is checked at the start of every tick; a run that is already in
/// flight is never interrupted.
#[derive(Clone, Debug, Default)]
pub struct Cancellation(Arc<AtomicBool>);

// === impl Cancellation ===

impl Cancellation {
    pub fn cancel(&self) {
        self.0.store(true, Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Relaxed)
    }
}

/// Runs a fallible job at a fixed delay until cancelled.
///
/// Errors are handed to the supplied handler instead of tearing the task
/// down, so one failed run does not end the schedule.
#[must_use = "futures do nothing unless polled"]
pub struct FixedDelayTask<E> {
    job: Box<dyn FnMut() -> Result<(), E> + Send>,
    on_error: Box<dyn FnMut(E) + Send>,
    interval: Interval,
    cancellation: Cancellation,
}

// === impl FixedDelayTask ===

impl<E> FixedDelayTask<E> {
    pub fn new(
        period: Duration,
        job: impl FnMut() -> Result<(), E> + Send + 'static,
        on_error: impl FnMut(E) + Send + 'static,
    ) -> Self {
        Self {
            job: Box::new(job),
            on_error: Box::new(on_error),
            interval: tokio::time::interval(period),
            cancellation: Cancellation::default(),
        }
    }

    /// The handle that stops this task
    pub fn cancellation(&self) -> Cancellation {
        self.cancellation.clone()
    }
}

impl<E> Future for FixedDelayTask<E> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let pin = self.get_mut();
        while pin.interval.poll_tick(cx).is_ready() {
            if pin.cancellation.is_cancelled() {
                return Poll::Ready(())
            }
            if let Err(err) = (pin.job)() {
                (pin.on_error)(err);
            }
        }
        if pin.cancellation.is_cancelled() {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}

impl<E> fmt::Debug for FixedDelayTask<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedDelayTask").field("cancellation", &self.cancellation).finish_non_exhaustive()
    }
}

/// Endless future that periodically ages out pooled transactions that have
/// exceeded the retention period.
#[must_use = "futures do nothing unless polled"]
pub struct PoolMaintenance {
    pool: Arc<Pool>,
    interval: Interval,
    cancellation: Cancellation,
}

// === impl PoolMaintenance ===

impl PoolMaintenance {
    pub fn new(pool: Arc<Pool>, period: Duration) -> Self {
        Self {
            pool,
            interval: tokio::time::interval(period),
            cancellation: Cancellation::default(),
        }
    }

    /// The handle that stops this task
    pub fn cancellation(&self) -> Cancellation {
        self.cancellation.clone()
    }
}

impl Future for PoolMaintenance {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let pin = self.get_mut();
        while pin.interval.poll_tick(cx).is_ready() {
            if pin.cancellation.is_cancelled() {
                warn!(target: "node", "pool maintenance cancelled");
                return Poll::Ready(())
            }
            trace!(target: "node", "aging out stale transactions");
            pin.pool.evict_old();
        }
        if pin.cancellation.is_cancelled() {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}

//! Timers and clocks
//!
//! Cancellable scheduled actions behind a trait so session logic can be
//! driven by hand in tests instead of waiting on the wall clock.

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

/// Action run when a timer fires
pub type TimerAction = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Identifier of a scheduled timer
pub type TimerId = u64;

/// Handle to a scheduled timer.
///
/// Dropping the handle cancels the timer.
#[derive(Debug)]
pub struct TimerHandle {
    id: TimerId,
    stop: Option<oneshot::Sender<()>>,
}

impl TimerHandle {
    /// Handle without a cancellation channel (for schedulers that track
    /// cancellation themselves)
    pub fn new(id: TimerId) -> Self {
        Self { id, stop: None }
    }

    fn with_stop(id: TimerId, stop: oneshot::Sender<()>) -> Self {
        Self {
            id,
            stop: Some(stop),
        }
    }

    pub fn id(&self) -> TimerId {
        self.id
    }

    /// Signal the timer task to stop
    pub fn release(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

/// Schedules cancellable actions
pub trait TaskScheduler: Send + Sync {
    /// Run `action` every `period`, first after one full period
    fn schedule_repeating(&self, period: Duration, action: TimerAction) -> TimerHandle;

    /// Run `action` once after `delay`
    fn schedule_once(&self, delay: Duration, action: TimerAction) -> TimerHandle;

    /// Cancel a timer. No further runs start after this returns.
    fn cancel(&self, handle: TimerHandle) {
        handle.release();
    }
}

/// Timers backed by tokio tasks.
///
/// A repeating timer awaits its action before waiting for the next tick, so
/// runs of one timer never overlap. A run already in progress when the timer
/// is cancelled is allowed to finish.
#[derive(Debug, Default)]
pub struct TokioTimers {
    next_id: AtomicU64,
}

impl TokioTimers {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> TimerId {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl TaskScheduler for TokioTimers {
    fn schedule_repeating(&self, period: Duration, action: TimerAction) -> TimerHandle {
        let id = self.next_id();
        let (tx, mut rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = &mut rx => break,
                    _ = ticker.tick() => action().await,
                }
            }
            debug!("Repeating timer {} stopped", id);
        });

        TimerHandle::with_stop(id, tx)
    }

    fn schedule_once(&self, delay: Duration, action: TimerAction) -> TimerHandle {
        let id = self.next_id();
        let (tx, rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = rx => debug!("One-shot timer {} cancelled", id),
                _ = tokio::time::sleep(delay) => action().await,
            }
        });

        TimerHandle::with_stop(id, tx)
    }
}

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

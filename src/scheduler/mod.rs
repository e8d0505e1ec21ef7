//! Live-location session scheduling
//!
//! - `session`: session records and the per-chat store
//! - `timer`: cancellable timers and clocks
//! - `live`: the scheduler that owns the store and drives refresh ticks

pub mod live;
pub mod session;
pub mod timer;

pub use live::{LiveSessionScheduler, SchedulerConfig, SessionError, TickOutcome};
pub use session::{LiveSession, SessionInfo, SessionStore};
pub use timer::{Clock, SystemClock, TaskScheduler, TimerAction, TimerHandle, TimerId, TokioTimers};

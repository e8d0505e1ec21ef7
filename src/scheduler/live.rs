//! Live Session Scheduler
//!
//! Keeps at most one live-location session per chat. Each session has a
//! repeating refresh timer that sends a new fact about the session's origin
//! and, when the live period is bounded, a one-shot expiry timer.
//!
//! Starting a session for a chat that already has one stops the old session
//! (timers released, record removed) before anything new is armed. Timer
//! actions carry the generation of the session that armed them and do nothing
//! once that session is gone.

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::session::{LiveSession, SessionInfo, SessionStore};
use super::timer::{Clock, SystemClock, TaskScheduler, TimerAction, TokioTimers};
use crate::channels::{Notifier, ParseMode};
use crate::facts::{FactProvider, FactRequest, DEFAULT_RADIUS_METERS, RETRY_RADIUS_METERS};
use crate::location::Location;
use crate::messages;

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Time between refresh ticks (default: 10 min)
    pub refresh_interval: Duration,
    /// Radius for regular lookups
    pub radius: u32,
    /// Radius for the single retry after a duplicate
    pub retry_radius: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(messages::REFRESH_MINUTES * 60),
            radius: DEFAULT_RADIUS_METERS,
            retry_radius: RETRY_RADIUS_METERS,
        }
    }
}

/// Rejected session starts
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Session end {end} is not after its start {start}")]
    InvalidWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Session already expired at {0}")]
    AlreadyExpired(DateTime<Utc>),
}

/// What a refresh tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No session for the chat
    NoSession,
    /// Session was replaced or changed while the tick ran
    Superseded,
    /// Session was past its end time and has been stopped
    Expired,
    /// Fact lookup failed; session stays active
    FetchFailed,
    /// Both lookups repeated the last fact; nothing sent
    DuplicateSuppressed,
    /// Sending the fact failed; session stays active
    SendFailed,
    /// A new fact was sent
    Relayed,
}

struct Inner {
    store: Mutex<SessionStore>,
    facts: Arc<dyn FactProvider>,
    notifier: Arc<dyn Notifier>,
    timers: Arc<dyn TaskScheduler>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    next_generation: AtomicU64,
}

impl Inner {
    /// Cancel both timers of a removed session
    fn release(&self, session: &mut LiveSession) {
        let (refresh, expiry) = session.take_timers();
        if let Some(handle) = refresh {
            self.timers.cancel(handle);
        }
        if let Some(handle) = expiry {
            self.timers.cancel(handle);
        }
    }

    /// Remove the session only if it is still the given generation
    fn remove_current(&self, chat_id: i64, generation: u64) -> bool {
        let removed = {
            let mut store = self.store.lock();
            match store.get(chat_id) {
                Some(s) if s.generation == generation => store.remove(chat_id),
                _ => None,
            }
        };

        match removed {
            Some(mut session) => {
                self.release(&mut session);
                true
            }
            None => false,
        }
    }
}

/// Owner of all live sessions
#[derive(Clone)]
pub struct LiveSessionScheduler {
    inner: Arc<Inner>,
}

impl LiveSessionScheduler {
    /// Scheduler on tokio timers and the wall clock
    pub fn new(facts: Arc<dyn FactProvider>, notifier: Arc<dyn Notifier>) -> Self {
        Self::with_parts(
            facts,
            notifier,
            Arc::new(TokioTimers::new()),
            Arc::new(SystemClock),
            SchedulerConfig::default(),
        )
    }

    /// Scheduler with explicit timers, clock and config
    pub fn with_parts(
        facts: Arc<dyn FactProvider>,
        notifier: Arc<dyn Notifier>,
        timers: Arc<dyn TaskScheduler>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store: Mutex::new(SessionStore::new()),
                facts,
                notifier,
                timers,
                clock,
                config,
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    fn from_inner(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    /// Current time as seen by the scheduler
    pub fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Start (or replace) the live session for a chat.
    ///
    /// An end time that is not after `start_time`, or already in the past,
    /// is refused and leaves any existing session untouched.
    pub fn start_session(
        &self,
        chat_id: i64,
        location: Location,
        initial_fact: Option<String>,
        start_time: DateTime<Utc>,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<(), SessionError> {
        let now = self.now();

        if let Some(end) = end_time {
            if end <= start_time {
                return Err(SessionError::InvalidWindow {
                    start: start_time,
                    end,
                });
            }
            if end <= now {
                return Err(SessionError::AlreadyExpired(end));
            }
        }

        // Old timers must be gone before new ones are armed
        self.stop_session(chat_id);

        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let mut session = LiveSession::new(
            chat_id,
            location,
            initial_fact,
            start_time,
            end_time,
            generation,
        );

        session.refresh_timer = Some(self.inner.timers.schedule_repeating(
            self.inner.config.refresh_interval,
            self.refresh_action(chat_id, generation),
        ));

        if let Some(end) = end_time {
            let delay = (end - now).to_std().unwrap_or_default();
            session.expiry_timer = Some(
                self.inner
                    .timers
                    .schedule_once(delay, self.expiry_action(chat_id, generation)),
            );
        }

        let replaced = self.inner.store.lock().insert(session);
        if let Some(mut stray) = replaced {
            // A concurrent start won the race between stop and insert
            warn!("Live session for chat {} replaced concurrently", chat_id);
            self.inner.release(&mut stray);
        }

        info!(
            "Live session started for chat {} (generation {}), interval {:?}, ends {:?}",
            chat_id, generation, self.inner.config.refresh_interval, end_time
        );
        Ok(())
    }

    /// Stop the chat's session, if any. Returns whether one existed.
    pub fn stop_session(&self, chat_id: i64) -> bool {
        let removed = self.inner.store.lock().remove(chat_id);

        match removed {
            Some(mut session) => {
                self.inner.release(&mut session);
                info!("Live session stopped for chat {}", chat_id);
                true
            }
            None => {
                debug!("No live session to stop for chat {}", chat_id);
                false
            }
        }
    }

    /// Stop every session. Returns how many were stopped.
    pub fn stop_all_sessions(&self) -> usize {
        let sessions: Vec<LiveSession> = {
            let mut store = self.inner.store.lock();
            store
                .chat_ids()
                .into_iter()
                .filter_map(|chat_id| store.remove(chat_id))
                .collect()
        };

        info!("Stopping all live sessions ({})", sessions.len());

        let count = sessions.len();
        for mut session in sessions {
            self.inner.release(&mut session);
        }
        count
    }

    pub fn has_session(&self, chat_id: i64) -> bool {
        self.inner.store.lock().get(chat_id).is_some()
    }

    pub fn session_count(&self) -> usize {
        self.inner.store.lock().len()
    }

    /// Last fact delivered to the chat's session
    pub fn last_fact(&self, chat_id: i64) -> Option<String> {
        self.inner
            .store
            .lock()
            .get(chat_id)
            .and_then(|s| s.last_fact.clone())
    }

    /// Snapshot of active sessions
    pub fn sessions_info(&self) -> Vec<SessionInfo> {
        self.inner.store.lock().infos()
    }

    /// Run one refresh tick for the chat's current session
    pub async fn run_tick(&self, chat_id: i64) -> TickOutcome {
        self.tick(chat_id, None).await
    }

    async fn tick(&self, chat_id: i64, expected_generation: Option<u64>) -> TickOutcome {
        let now = self.now();

        let (generation, location, last_fact, expired) = {
            let store = self.inner.store.lock();
            let Some(session) = store.get(chat_id) else {
                return TickOutcome::NoSession;
            };
            if expected_generation.is_some_and(|g| g != session.generation) {
                return TickOutcome::Superseded;
            }
            (
                session.generation,
                session.location.clone(),
                session.last_fact.clone(),
                session.is_expired(now),
            )
        };

        if expired {
            self.finish(chat_id, generation, messages::LIVE_ENDED).await;
            return TickOutcome::Expired;
        }

        let request = FactRequest::new(location.latitude, location.longitude)
            .with_radius(self.inner.config.radius);
        let first = self.inner.facts.get_fact(request).await;

        let Some(found) = first.fact() else {
            warn!(
                "Fact lookup failed for chat {}: {}",
                chat_id,
                first.error.as_ref().map(ToString::to_string).unwrap_or_default()
            );
            return TickOutcome::FetchFailed;
        };

        let fact = if last_fact.as_deref() == Some(found) {
            info!("Repeated fact for chat {}, retrying with wider radius", chat_id);

            let retry = self
                .inner
                .facts
                .get_fact(request.with_radius(self.inner.config.retry_radius))
                .await;

            match retry.fact() {
                Some(fresh) if last_fact.as_deref() != Some(fresh) => fresh.to_string(),
                _ => {
                    info!("No new fact for chat {}, skipping this tick", chat_id);
                    return TickOutcome::DuplicateSuppressed;
                }
            }
        } else {
            found.to_string()
        };

        // The session may have been replaced, or another tick may have sent
        // a fact, while the lookups were in flight
        {
            let store = self.inner.store.lock();
            match store.get(chat_id) {
                Some(s) if s.generation == generation && s.last_fact == last_fact => {}
                _ => return TickOutcome::Superseded,
            }
        }

        match self
            .inner
            .notifier
            .send_text(chat_id, &messages::scheduled_fact(&fact), ParseMode::Markdown)
            .await
        {
            Ok(_) => {
                self.inner
                    .store
                    .lock()
                    .update_last_fact(chat_id, generation, &fact);
                TickOutcome::Relayed
            }
            Err(e) => {
                error!("Failed to send scheduled fact to chat {}: {}", chat_id, e);
                TickOutcome::SendFailed
            }
        }
    }

    /// Stop the given session generation and notify the chat once
    async fn finish(&self, chat_id: i64, generation: u64, notice: &str) -> bool {
        if !self.inner.remove_current(chat_id, generation) {
            return false;
        }

        info!("Live session for chat {} ended", chat_id);

        if let Err(e) = self
            .inner
            .notifier
            .send_text(chat_id, notice, ParseMode::Plain)
            .await
        {
            error!("Failed to send end notice to chat {}: {}", chat_id, e);
        }
        true
    }

    fn refresh_action(&self, chat_id: i64, generation: u64) -> TimerAction {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        Arc::new(move || {
            let weak = weak.clone();
            async move {
                if let Some(inner) = weak.upgrade() {
                    let outcome = Self::from_inner(inner).tick(chat_id, Some(generation)).await;
                    debug!("Tick for chat {}: {:?}", chat_id, outcome);
                }
            }
            .boxed()
        })
    }

    fn expiry_action(&self, chat_id: i64, generation: u64) -> TimerAction {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        Arc::new(move || {
            let weak = weak.clone();
            async move {
                if let Some(inner) = weak.upgrade() {
                    Self::from_inner(inner)
                        .finish(chat_id, generation, messages::LIVE_EXPIRED)
                        .await;
                }
            }
            .boxed()
        })
    }
}

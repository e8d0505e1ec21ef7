//! Test doubles for the bot's collaborators

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use easyway_bot::{
    ChannelError, Clock, FactError, FactProvider, FactRequest, FactResponse, LiveSessionScheduler,
    LocationIntake, MessageRef, Notifier, ParseMode, SchedulerConfig, TaskScheduler, TimerAction,
    TimerHandle,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Fact provider that replays scripted responses
#[derive(Default)]
pub struct ScriptedFacts {
    responses: Mutex<VecDeque<FactResponse>>,
    requests: Mutex<Vec<FactRequest>>,
}

impl ScriptedFacts {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, response: FactResponse) {
        self.responses.lock().push_back(response);
    }

    pub fn push_fact(&self, fact: &str) {
        self.push(FactResponse::found(fact));
    }

    pub fn requests(&self) -> Vec<FactRequest> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl FactProvider for ScriptedFacts {
    async fn get_fact(&self, request: FactRequest) -> FactResponse {
        self.requests.lock().push(request);
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| FactResponse::failed(FactError::Provider("no scripted response".into())))
    }
}

/// A message recorded by `RecordingNotifier`
#[derive(Debug, Clone, PartialEq)]
pub struct Sent {
    pub chat_id: i64,
    pub text: String,
    pub parse_mode: ParseMode,
}

/// Notifier that records sends and deletes
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Sent>>,
    deleted: Mutex<Vec<MessageRef>>,
    next_id: AtomicI32,
    fail_sends: AtomicBool,
    fail_deletes: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent.lock().iter().map(|s| s.text.clone()).collect()
    }

    pub fn deleted(&self) -> Vec<MessageRef> {
        self.deleted.lock().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
        self.deleted.lock().clear();
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: ParseMode,
    ) -> Result<MessageRef, ChannelError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(ChannelError::SendFailed("transport down".into()));
        }
        self.sent.lock().push(Sent {
            chat_id,
            text: text.to_string(),
            parse_mode,
        });
        Ok(MessageRef {
            chat_id,
            message_id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
        })
    }

    async fn delete_message(&self, message: MessageRef) -> Result<(), ChannelError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(ChannelError::DeleteFailed("message too old".into()));
        }
        self.deleted.lock().push(message);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Repeating,
    Once,
}

struct ManualTimer {
    kind: TimerKind,
    period: Duration,
    action: TimerAction,
    cancelled: bool,
}

/// Timers that only fire when the test says so
#[derive(Default)]
pub struct ManualTimers {
    timers: Mutex<HashMap<u64, ManualTimer>>,
    cancelled: Mutex<Vec<(u64, TimerKind)>>,
    next_id: AtomicU64,
}

impl ManualTimers {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn add(&self, kind: TimerKind, period: Duration, action: TimerAction) -> TimerHandle {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.timers.lock().insert(
            id,
            ManualTimer {
                kind,
                period,
                action,
                cancelled: false,
            },
        );
        TimerHandle::new(id)
    }

    /// Ids of live (not cancelled) timers of a kind
    pub fn live(&self, kind: TimerKind) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .timers
            .lock()
            .iter()
            .filter(|(_, t)| t.kind == kind && !t.cancelled)
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    pub fn period(&self, id: u64) -> Option<Duration> {
        self.timers.lock().get(&id).map(|t| t.period)
    }

    /// Cancellations seen so far
    pub fn cancellations(&self) -> Vec<(u64, TimerKind)> {
        self.cancelled.lock().clone()
    }

    pub fn cancellations_of(&self, kind: TimerKind) -> usize {
        self.cancelled.lock().iter().filter(|(_, k)| *k == kind).count()
    }

    /// Run a timer's action as if it fired; cancelled timers do nothing
    pub async fn fire(&self, id: u64) -> bool {
        let action = {
            let timers = self.timers.lock();
            match timers.get(&id) {
                Some(t) if !t.cancelled => Arc::clone(&t.action),
                _ => return false,
            }
        };
        action().await;
        true
    }

    /// Run an action even if the timer was cancelled (a run already in flight)
    pub async fn fire_stale(&self, id: u64) {
        let action = self.timers.lock().get(&id).map(|t| Arc::clone(&t.action));
        if let Some(action) = action {
            action().await;
        }
    }
}

impl TaskScheduler for ManualTimers {
    fn schedule_repeating(&self, period: Duration, action: TimerAction) -> TimerHandle {
        self.add(TimerKind::Repeating, period, action)
    }

    fn schedule_once(&self, delay: Duration, action: TimerAction) -> TimerHandle {
        self.add(TimerKind::Once, delay, action)
    }

    fn cancel(&self, handle: TimerHandle) {
        let id = handle.id();
        let mut timers = self.timers.lock();
        if let Some(timer) = timers.get_mut(&id) {
            timer.cancelled = true;
            self.cancelled.lock().push((id, timer.kind));
        }
    }
}

/// Clock moved by hand
pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn new() -> Arc<Self> {
        let start = Utc
            .with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
            .single()
            .expect("valid start time");
        Arc::new(Self(Mutex::new(start)))
    }

    pub fn advance_secs(&self, secs: i64) {
        *self.0.lock() += ChronoDuration::seconds(secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock()
    }
}

/// Scheduler and intake wired to test doubles
pub struct Harness {
    pub facts: Arc<ScriptedFacts>,
    pub notifier: Arc<RecordingNotifier>,
    pub timers: Arc<ManualTimers>,
    pub clock: Arc<ManualClock>,
    pub scheduler: LiveSessionScheduler,
    pub intake: LocationIntake,
}

impl Harness {
    pub fn new() -> Self {
        let facts = ScriptedFacts::new();
        let notifier = RecordingNotifier::new();
        let timers = ManualTimers::new();
        let clock = ManualClock::new();

        let scheduler = LiveSessionScheduler::with_parts(
            facts.clone(),
            notifier.clone(),
            timers.clone(),
            clock.clone(),
            SchedulerConfig::default(),
        );
        let intake = LocationIntake::new(facts.clone(), notifier.clone(), scheduler.clone());

        Self {
            facts,
            notifier,
            timers,
            clock,
            scheduler,
            intake,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// The only live repeating timer
    pub fn refresh_timer(&self) -> u64 {
        let live = self.timers.live(TimerKind::Repeating);
        assert_eq!(live.len(), 1, "expected exactly one refresh timer, got {:?}", live);
        live[0]
    }

    /// The only live one-shot timer
    pub fn expiry_timer(&self) -> u64 {
        let live = self.timers.live(TimerKind::Once);
        assert_eq!(live.len(), 1, "expected exactly one expiry timer, got {:?}", live);
        live[0]
    }
}

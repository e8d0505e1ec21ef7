//! Live session records and their store

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::timer::TimerHandle;
use crate::location::Location;

/// One chat's active live-location session
#[derive(Debug)]
pub struct LiveSession {
    pub chat_id: i64,
    /// Origin location; later edits do not move it
    pub location: Location,
    /// Most recently delivered fact
    pub last_fact: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Distinguishes successive sessions of the same chat
    pub generation: u64,
    pub(crate) refresh_timer: Option<TimerHandle>,
    pub(crate) expiry_timer: Option<TimerHandle>,
}

impl LiveSession {
    pub fn new(
        chat_id: i64,
        location: Location,
        last_fact: Option<String>,
        start_time: DateTime<Utc>,
        end_time: Option<DateTime<Utc>>,
        generation: u64,
    ) -> Self {
        Self {
            chat_id,
            location,
            last_fact,
            start_time,
            end_time,
            generation,
            refresh_timer: None,
            expiry_timer: None,
        }
    }

    /// Whether `now` is past the end time
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.end_time.is_some_and(|end| now > end)
    }

    /// Take both timer handles out of the record
    pub(crate) fn take_timers(&mut self) -> (Option<TimerHandle>, Option<TimerHandle>) {
        (self.refresh_timer.take(), self.expiry_timer.take())
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            chat_id: self.chat_id,
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }
}

/// Read-only view of a session for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub chat_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

/// In-memory map of chat id to its single live session
#[derive(Debug, Default)]
pub struct SessionStore(HashMap<i64, LiveSession>);

impl SessionStore {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    /// Insert a session, returning the one it replaced
    pub fn insert(&mut self, session: LiveSession) -> Option<LiveSession> {
        self.0.insert(session.chat_id, session)
    }

    pub fn get(&self, chat_id: i64) -> Option<&LiveSession> {
        self.0.get(&chat_id)
    }

    /// Record a delivered fact if the session of that generation is still active
    pub fn update_last_fact(&mut self, chat_id: i64, generation: u64, fact: &str) -> bool {
        match self.0.get_mut(&chat_id) {
            Some(session) if session.generation == generation => {
                session.last_fact = Some(fact.to_string());
                true
            }
            _ => false,
        }
    }

    pub fn remove(&mut self, chat_id: i64) -> Option<LiveSession> {
        self.0.remove(&chat_id)
    }

    pub fn chat_ids(&self) -> Vec<i64> {
        self.0.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn infos(&self) -> Vec<SessionInfo> {
        self.0.values().map(LiveSession::info).collect()
    }
}

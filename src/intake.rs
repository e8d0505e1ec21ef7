//! Location Intake
//!
//! Classifies inbound location events and dispatches them:
//!
//! ```text
//! new message                ──► one fact lookup, reply
//! edited, live period > 0    ──► fact lookup, reply, start/replace session
//! edited, not live           ──► stop session, acknowledge
//! ```

use anyhow::Result;
use chrono::Duration;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::channels::{delete_quietly, Notifier, ParseMode};
use crate::facts::{FactProvider, FactRequest, FactResponse};
use crate::location::{Location, LocationEvent};
use crate::messages;
use crate::scheduler::LiveSessionScheduler;

/// Malformed inbound events
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntakeError {
    #[error("Event has no chat id")]
    MissingChat,

    #[error("Event has no location")]
    MissingLocation,
}

impl IntakeError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::MissingChat => messages::MISSING_CHAT,
            Self::MissingLocation => messages::MISSING_LOCATION,
        }
    }
}

/// What an event asks for
#[derive(Debug, Clone, PartialEq)]
pub enum LocationIntent {
    /// One-shot fact about a static location
    Static(Location),
    /// Start or replace the live session
    LiveStart { location: Location, live_seconds: i64 },
    /// The live location was stopped by the sender
    LiveStop,
}

/// Classify an event into its chat id and intent
pub fn classify(event: &LocationEvent) -> Result<(i64, LocationIntent), IntakeError> {
    let chat_id = event.chat_id.ok_or(IntakeError::MissingChat)?;
    let location = event.location.as_ref().ok_or(IntakeError::MissingLocation)?;

    // Only edits drive live sessions; the first message of a live share is
    // answered like a static location
    let intent = match (location.live_seconds(), event.edited) {
        (Some(live_seconds), true) => LocationIntent::LiveStart {
            location: location.clone(),
            live_seconds,
        },
        (None, true) => LocationIntent::LiveStop,
        (_, false) => LocationIntent::Static(location.clone()),
    };

    Ok((chat_id, intent))
}

/// Dispatches location events to lookups and the session scheduler
#[derive(Clone)]
pub struct LocationIntake {
    facts: Arc<dyn FactProvider>,
    notifier: Arc<dyn Notifier>,
    scheduler: LiveSessionScheduler,
}

impl LocationIntake {
    pub fn new(
        facts: Arc<dyn FactProvider>,
        notifier: Arc<dyn Notifier>,
        scheduler: LiveSessionScheduler,
    ) -> Self {
        Self {
            facts,
            notifier,
            scheduler,
        }
    }

    pub fn scheduler(&self) -> &LiveSessionScheduler {
        &self.scheduler
    }

    /// Handle an event; failures are logged and answered with an apology
    pub async fn handle_event(&self, event: LocationEvent) {
        let chat_id = event.chat_id;

        if let Err(e) = self.handle(event).await {
            error!("Error handling location event: {:#}", e);

            let Some(chat_id) = chat_id else {
                return;
            };
            let reply = match e.downcast_ref::<IntakeError>() {
                Some(intake) => intake.user_message(),
                None => messages::GENERIC_FAILURE,
            };
            if let Err(e) = self
                .notifier
                .send_text(chat_id, reply, ParseMode::Plain)
                .await
            {
                warn!("Failed to send error reply to chat {}: {}", chat_id, e);
            }
        }
    }

    /// Handle an event, propagating transport errors
    pub async fn handle(&self, event: LocationEvent) -> Result<()> {
        let (chat_id, intent) = classify(&event)?;

        if let Some(location) = event.location.as_ref().filter(|l| !l.is_valid()) {
            warn!(
                "Out-of-range coordinates from chat {}: {}, {}",
                chat_id, location.latitude, location.longitude
            );
        }

        match intent {
            LocationIntent::Static(location) => self.handle_static(chat_id, &location).await,
            LocationIntent::LiveStart {
                location,
                live_seconds,
            } => self.handle_live_start(chat_id, location, live_seconds).await,
            LocationIntent::LiveStop => self.handle_live_stop(chat_id).await,
        }
    }

    async fn handle_static(&self, chat_id: i64, location: &Location) -> Result<()> {
        let response = self.lookup(chat_id, location, messages::SEARCHING).await?;

        match response.fact() {
            Some(fact) => {
                self.notifier
                    .send_text(chat_id, &messages::static_fact(fact), ParseMode::Markdown)
                    .await?;
            }
            None => {
                if let Some(e) = &response.error {
                    warn!("No fact for chat {}: {}", chat_id, e);
                }
                self.notifier
                    .send_text(chat_id, messages::NOTHING_FOUND, ParseMode::Plain)
                    .await?;
            }
        }
        Ok(())
    }

    async fn handle_live_start(
        &self,
        chat_id: i64,
        location: Location,
        live_seconds: i64,
    ) -> Result<()> {
        info!(
            "Live location from chat {}, period {}s",
            chat_id, live_seconds
        );

        let response = self.lookup(chat_id, &location, messages::SEARCHING_LIVE).await?;

        let Some(fact) = response.fact() else {
            if let Some(e) = &response.error {
                warn!("No live fact for chat {}: {}", chat_id, e);
            }
            self.notifier
                .send_text(chat_id, messages::NOTHING_FOUND_LIVE, ParseMode::Plain)
                .await?;
            return Ok(());
        };

        self.notifier
            .send_text(chat_id, &messages::live_started(fact), ParseMode::Markdown)
            .await?;

        let start = self.scheduler.now();
        let end = start + Duration::seconds(live_seconds);
        self.scheduler
            .start_session(chat_id, location, Some(fact.to_string()), start, Some(end))?;

        Ok(())
    }

    async fn handle_live_stop(&self, chat_id: i64) -> Result<()> {
        info!("Live location stopped by chat {}", chat_id);

        self.scheduler.stop_session(chat_id);
        self.notifier
            .send_text(chat_id, messages::LIVE_STOPPED, ParseMode::Plain)
            .await?;
        Ok(())
    }

    /// Post a status message, look up a fact, then remove the status message
    async fn lookup(&self, chat_id: i64, location: &Location, status: &str) -> Result<FactResponse> {
        let status_message = self
            .notifier
            .send_text(chat_id, status, ParseMode::Plain)
            .await?;

        let response = self
            .facts
            .get_fact(FactRequest::new(location.latitude, location.longitude))
            .await;

        delete_quietly(self.notifier.as_ref(), status_message).await;
        Ok(response)
    }
}

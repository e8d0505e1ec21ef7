//! EasyWay Bot
//!
//! Telegram bot that answers a shared location with a short trivia fact
//! about the place, and keeps sending fresh facts while a live location is
//! being shared.
//!
//! # Architecture
//!
//! ```text
//! Telegram ──► telegram (Dispatcher) ──► intake ──► facts (OpenAI)
//!                                          │
//!                                          └──► scheduler (one live session per chat)
//!                                                  ├── session store
//!                                                  ├── refresh timer (10 min)
//!                                                  └── expiry timer (live period)
//! ```

pub mod channels;
pub mod config;
pub mod facts;
pub mod health;
pub mod intake;
pub mod location;
pub mod messages;
pub mod scheduler;
pub mod telegram;

pub use channels::{ChannelError, MessageRef, Notifier, ParseMode};
pub use config::Config;
pub use facts::{FactError, FactProvider, FactRequest, FactResponse, OpenAiFacts};
pub use intake::{classify, IntakeError, LocationIntake, LocationIntent};
pub use location::{Location, LocationEvent};
pub use scheduler::{
    Clock, LiveSessionScheduler, SchedulerConfig, SessionError, SessionInfo, SystemClock,
    TaskScheduler, TickOutcome, TimerAction, TimerHandle, TokioTimers,
};

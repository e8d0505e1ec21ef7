//! Telegram Bot integration
//!
//! Wires Telegram updates to the location intake:
//! - new messages with a location → one-shot fact or live session start
//! - edited messages with a location → live session update or stop
//! - `/start`, `/help` and a hint for any other text
//!
//! Uses explicit Dispatcher pattern for reliable message polling.

use anyhow::Result;
use async_trait::async_trait;
use teloxide::{
    dispatching::{Dispatcher, HandlerExt, UpdateFilterExt},
    dptree,
    error_handlers::LoggingErrorHandler,
    prelude::*,
    types::{MessageId, ParseMode as TgParseMode, Update},
    utils::command::BotCommands,
    ApiError, RequestError,
};

use crate::channels::{ChannelError, MessageRef, Notifier, ParseMode};
use crate::intake::LocationIntake;
use crate::location::{Location, LocationEvent};
use crate::messages;

/// Supported bot commands
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "start the bot")]
    Start,
    #[command(description = "how to use the bot")]
    Help,
}

/// Legacy Markdown, which accepts `*bold*` and `_italic_` without escaping
#[allow(deprecated)]
fn legacy_markdown() -> TgParseMode {
    TgParseMode::Markdown
}

/// Drop emphasis characters for the plain-text fallback
fn strip_markup(text: &str) -> String {
    text.replace(['*', '_'], "")
}

fn channel_error(e: RequestError) -> ChannelError {
    match e {
        RequestError::RetryAfter(seconds) => ChannelError::RateLimited(u64::from(seconds.seconds())),
        RequestError::Api(
            e @ (ApiError::BotBlocked | ApiError::ChatNotFound | ApiError::UserDeactivated),
        ) => ChannelError::InvalidRecipient(e.to_string()),
        other => ChannelError::SendFailed(other.to_string()),
    }
}

/// Outbound replies through the Telegram Bot API
#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: ParseMode,
    ) -> Result<MessageRef, ChannelError> {
        let chat = ChatId(chat_id);

        let sent = match parse_mode {
            ParseMode::Plain => self.bot.send_message(chat, text).await,
            ParseMode::Markdown => {
                // Try formatted first, fall back to plain text if the markup is rejected
                match self
                    .bot
                    .send_message(chat, text)
                    .parse_mode(legacy_markdown())
                    .await
                {
                    Ok(message) => Ok(message),
                    Err(RequestError::Api(e)) => {
                        tracing::debug!("Markdown rejected for chat {}: {}", chat_id, e);
                        self.bot.send_message(chat, strip_markup(text)).await
                    }
                    Err(e) => Err(e),
                }
            }
        }
        .map_err(channel_error)?;

        Ok(MessageRef {
            chat_id,
            message_id: sent.id.0,
        })
    }

    async fn delete_message(&self, message: MessageRef) -> Result<(), ChannelError> {
        self.bot
            .delete_message(ChatId(message.chat_id), MessageId(message.message_id))
            .await
            .map(|_| ())
            .map_err(|e| ChannelError::DeleteFailed(e.to_string()))
    }
}

/// Convert a Telegram message into a location event
pub fn location_event(msg: &Message, edited: bool) -> LocationEvent {
    LocationEvent {
        chat_id: Some(msg.chat.id.0),
        location: msg.location().map(Location::from),
        edited,
    }
}

/// Run the Telegram dispatcher until a shutdown signal arrives, then stop
/// all live sessions
pub async fn run_telegram_bot(bot: Bot, intake: LocationIntake) -> Result<()> {
    let scheduler = intake.scheduler().clone();

    let me = bot
        .get_me()
        .await
        .map_err(|e| anyhow::anyhow!("Bot authentication failed: {}", e))?;
    tracing::info!(
        "Bot authenticated: @{} (ID: {})",
        me.username.as_deref().unwrap_or("unknown"),
        me.id
    );

    // Polling does not work while a webhook is set
    if let Err(e) = bot.delete_webhook().await {
        tracing::warn!("Failed to delete webhook: {} (continuing anyway)", e);
    }

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(command_handler),
                )
                .branch(
                    dptree::filter(|msg: Message| msg.location().is_some())
                        .endpoint(location_handler),
                )
                .branch(
                    dptree::filter(|msg: Message| msg.text().is_some())
                        .endpoint(text_handler),
                ),
        )
        .branch(
            Update::filter_edited_message()
                .filter(|msg: Message| msg.location().is_some())
                .endpoint(edited_location_handler),
        );

    let mut dispatcher = Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![intake])
        .default_handler(|upd| async move {
            tracing::debug!("Unhandled update: {:?}", upd.kind);
        })
        .error_handler(LoggingErrorHandler::with_custom_text(
            "Error in update handler",
        ))
        .build();

    let token = dispatcher.shutdown_token();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, stopping dispatcher...");
        if let Ok(stopped) = token.shutdown() {
            stopped.await;
        }
    });

    tracing::info!("Starting dispatcher with long polling...");
    dispatcher.dispatch().await;

    let stopped = scheduler.stop_all_sessions();
    tracing::info!("Dispatcher stopped, {} live sessions stopped", stopped);
    Ok(())
}

/// Wait for Ctrl-C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}

async fn command_handler(bot: Bot, msg: Message, cmd: Command) -> ResponseResult<()> {
    tracing::info!("Command {:?} from chat {}", cmd, msg.chat.id);

    match cmd {
        Command::Start => {
            bot.send_message(msg.chat.id, messages::WELCOME).await?;
        }
        Command::Help => {
            bot.send_message(msg.chat.id, messages::HELP)
                .parse_mode(legacy_markdown())
                .await?;
        }
    }
    Ok(())
}

async fn location_handler(msg: Message, intake: LocationIntake) -> ResponseResult<()> {
    tracing::info!(">>> Location received: chat={}", msg.chat.id);
    intake.handle_event(location_event(&msg, false)).await;
    Ok(())
}

async fn edited_location_handler(msg: Message, intake: LocationIntake) -> ResponseResult<()> {
    tracing::info!(">>> Edited location received: chat={}", msg.chat.id);
    intake.handle_event(location_event(&msg, true)).await;
    Ok(())
}

async fn text_handler(bot: Bot, msg: Message) -> ResponseResult<()> {
    bot.send_message(msg.chat.id, messages::ONLY_LOCATIONS).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/start", "easyway_bot").ok(), Some(Command::Start));
        assert_eq!(Command::parse("/help", "easyway_bot").ok(), Some(Command::Help));
        assert!(Command::parse("/unknown", "easyway_bot").is_err());
    }

    #[test]
    fn test_strip_markup() {
        assert_eq!(
            strip_markup(&messages::scheduled_fact("A fact")),
            "📍 New fact about your location:\n\nA fact"
        );
    }
}

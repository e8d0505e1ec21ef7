//! EasyWay Bot - Entry Point
//!
//! Starts the health endpoint first, then the Telegram bot when both the bot
//! token and the OpenAI key are configured. Without them, or after the bot
//! fails, the process stays up in healthcheck-only mode.

use easyway_bot::{
    health::{self, HealthState},
    telegram::{self, TelegramNotifier},
    Config, LiveSessionScheduler, LocationIntake, OpenAiFacts, SchedulerConfig, SystemClock,
    TokioTimers,
};
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;

    let log_level = std::env::var("RUST_LOG")
        .map(|s| match s.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO);

    if config.is_production() {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_ansi(false)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_ansi(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    info!("EasyWay Bot v{}", env!("CARGO_PKG_VERSION"));
    config.log_summary();

    let mut health_state = HealthState::new(config.port, &config.environment);

    let Some(token) = config.telegram_bot_token.clone().filter(|_| config.bot_enabled()) else {
        info!("Bot not started - credentials missing, serving health checks only");
        tokio::select! {
            result = health::serve(health_state) => result?,
            _ = telegram::shutdown_signal() => info!("Shutting down"),
        }
        return Ok(());
    };

    let bot = teloxide::Bot::new(token);
    let notifier = Arc::new(TelegramNotifier::new(bot.clone()));
    let facts = Arc::new(OpenAiFacts::from_config(&config));

    let scheduler = LiveSessionScheduler::with_parts(
        facts.clone(),
        notifier.clone(),
        Arc::new(TokioTimers::new()),
        Arc::new(SystemClock),
        SchedulerConfig {
            refresh_interval: config.fact_interval,
            ..SchedulerConfig::default()
        },
    );
    health_state = health_state.with_scheduler(scheduler.clone());

    let health_task = tokio::spawn(async move {
        if let Err(e) = health::serve(health_state).await {
            error!("Health server failed: {}", e);
        }
    });

    let intake = LocationIntake::new(facts, notifier, scheduler);
    health::outlive_bot(
        telegram::run_telegram_bot(bot, intake),
        telegram::shutdown_signal(),
    )
    .await;

    health_task.abort();
    info!("Bye");
    Ok(())
}

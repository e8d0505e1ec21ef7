//! Health Check API
//!
//! Liveness endpoint for the hosting platform. Runs even when the bot itself
//! is disabled for lack of credentials.

use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::scheduler::LiveSessionScheduler;

/// State shared across health handlers
#[derive(Clone)]
pub struct HealthState {
    /// Server start time for uptime calculation
    pub start_time: Instant,
    pub version: &'static str,
    pub port: u16,
    pub environment: String,
    /// Session scheduler, when the bot is running
    pub scheduler: Option<LiveSessionScheduler>,
}

impl HealthState {
    pub fn new(port: u16, environment: &str) -> Self {
        Self {
            start_time: Instant::now(),
            version: env!("CARGO_PKG_VERSION"),
            port,
            environment: environment.to_string(),
            scheduler: None,
        }
    }

    pub fn with_scheduler(mut self, scheduler: LiveSessionScheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Timestamp (RFC 3339)
    pub timestamp: String,
    pub port: u16,
    pub env: String,
    pub uptime_secs: u64,
    pub active_sessions: usize,
}

/// Health check handler
pub async fn health_check(State(state): State<Arc<HealthState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: state.version,
        timestamp: chrono::Utc::now().to_rfc3339(),
        port: state.port,
        env: state.environment.clone(),
        uptime_secs: state.uptime_secs(),
        active_sessions: state
            .scheduler
            .as_ref()
            .map(LiveSessionScheduler::session_count)
            .unwrap_or(0),
    })
}

/// Liveness probe (minimal response)
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Create health check router
pub fn health_router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(liveness))
        .fallback(|| async { (StatusCode::NOT_FOUND, "Not Found") })
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the health endpoint on 0.0.0.0:{port} until the process exits
pub async fn serve(state: HealthState) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], state.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Health server listening on {}", addr);

    axum::serve(listener, health_router(Arc::new(state))).await?;
    Ok(())
}

/// Wait for the bot to finish. A bot that stops with an error does not take
/// the process down: health checks keep being served until `shutdown`.
pub async fn outlive_bot<B, S>(bot: B, shutdown: S)
where
    B: Future<Output = anyhow::Result<()>>,
    S: Future<Output = ()>,
{
    if let Err(e) = bot.await {
        error!("Telegram bot stopped: {:#}", e);
        info!("Serving health checks only until shutdown");
        shutdown.await;
    }
}

//! Web control panel for Loopcast.
//!
//! Edits the stored bot token and restarts the bot process. It never
//! touches the bot's settings file.

pub mod process;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{Html, Json},
    routing::{get, post},
};
use loopcast_config::{AppConfig, CredentialStore};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

pub use process::{BotProcess, ProcessError};

const INDEX_HTML: &str = include_str!("../assets/index.html");

/// Request bodies larger than this are rejected.
const BODY_LIMIT: usize = 64 * 1024;

/// Shared state for panel handlers.
pub struct PanelState {
    pub credentials: CredentialStore,
    pub bot: BotProcess,
    pub restart_grace: Duration,
}

type SharedState = Arc<PanelState>;

type ApiError = (StatusCode, Json<serde_json::Value>);

fn internal(message: impl std::fmt::Display) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "success": false, "error": message.to_string() })),
    )
}

/// Build the panel router.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/api/token", get(get_token_handler).post(set_token_handler))
        .route("/api/restart", post(restart_handler))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the bot process and serve the panel until Ctrl-C.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.panel.host, config.panel.port);

    let state = Arc::new(PanelState {
        credentials: CredentialStore::new(config.credentials_path(), &config.discord.token_env),
        bot: BotProcess::current_exe(Duration::from_secs(config.panel.stop_timeout_secs))?,
        restart_grace: Duration::from_secs(config.panel.restart_grace_secs),
    });

    if let Err(e) = state.bot.start().await {
        error!(error = %e, "Bot did not start; set a token and restart from the panel");
    }

    let app = build_router(state.clone());

    info!(addr = %addr, "Control panel listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    state.bot.stop().await?;
    info!("Control panel stopped");
    Ok(())
}

// --- Handlers ---

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    bot_running: bool,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        bot_running: state.bot.is_running().await,
    })
}

#[derive(Serialize)]
struct TokenResponse {
    token: String,
}

async fn get_token_handler(
    State(state): State<SharedState>,
) -> Result<Json<TokenResponse>, ApiError> {
    let token = state.credentials.get().map_err(internal)?.unwrap_or_default();
    Ok(Json(TokenResponse { token }))
}

#[derive(Deserialize)]
struct SetTokenRequest {
    #[serde(default)]
    token: String,
}

#[derive(Serialize)]
struct SetTokenResponse {
    success: bool,
    token: String,
}

async fn set_token_handler(
    State(state): State<SharedState>,
    Json(payload): Json<SetTokenRequest>,
) -> Result<Json<SetTokenResponse>, ApiError> {
    state.credentials.set(&payload.token).map_err(|e| {
        error!(error = %e, "Failed to store token");
        internal(e)
    })?;
    info!(path = %state.credentials.path().display(), "Token updated");
    Ok(Json(SetTokenResponse {
        success: true,
        token: payload.token,
    }))
}

async fn restart_handler(
    State(state): State<SharedState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.bot.restart(state.restart_grace).await.map_err(|e| {
        error!(error = %e, "Bot restart failed");
        internal(e)
    })?;
    info!("Bot restarted from panel");
    Ok(Json(json!({ "success": true })))
}

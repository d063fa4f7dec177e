//! HTTP and WebSocket handlers for the Ephemera server.
//!
//! The WebSocket route hands each upgraded socket to the session driver;
//! the remaining routes are thin HTML pages around it.

use crate::config::Config;
use crate::metrics::{self, ConnectionMetricsGuard};
use crate::pages;
use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        ConnectInfo, Path, Query, State,
    },
    response::{Html, IntoResponse},
    routing::get,
    Form, Json, Router,
};
use ephemera_core::{current_room_key, ConnectParams, Relay};
use ephemera_transport::{drive, DriverConfig, WebSocketConnection};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Shared server state.
pub struct AppState {
    /// The relay every connection joins through.
    pub relay: Relay,
    /// Server configuration.
    pub config: Config,
    /// Session driver settings.
    pub driver_config: DriverConfig,
}

impl AppState {
    /// Create new app state.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            relay: Relay::with_config(config.relay_config()),
            driver_config: config.driver_config(),
            config,
        }
    }
}

/// Form posted when joining a room.
#[derive(Debug, Deserialize)]
pub struct JoinForm {
    #[serde(default)]
    username: String,
}

/// Form posted to send a message without a WebSocket.
#[derive(Debug, Deserialize)]
pub struct MessageForm {
    #[serde(default)]
    user: String,
    #[serde(default)]
    message: String,
}

/// Build the application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(landing_handler))
        .route("/chat/:id", get(join_handler).post(chat_handler))
        .route("/chat/:id/message", axum::routing::post(message_handler))
        .route(&state.config.transport.websocket_path, get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Run the HTTP/WebSocket server.
///
/// # Errors
///
/// Returns an error if the server fails to bind or serve.
pub async fn run_server(config: Config) -> Result<()> {
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {:#}", e);
        }
    }

    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("Ephemera server listening on {}", addr);
    info!(
        "WebSocket endpoint: ws://{}{}",
        addr, config.transport.websocket_path
    );

    serve(listener, Arc::new(AppState::new(config))).await
}

/// Serve the application on an already bound listener.
///
/// # Errors
///
/// Returns an error if serving fails.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<()> {
    let app = build_router(state);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.relay.stats();
    metrics::set_active_rooms(stats.room_count);

    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "rooms": stats.room_count,
        "subscribers": stats.subscriber_count,
    }))
}

/// Landing page with a fresh room key.
async fn landing_handler() -> Html<String> {
    Html(pages::landing(&current_room_key()))
}

/// Join form for an existing room.
async fn join_handler(Path(room): Path<String>) -> Html<String> {
    Html(pages::join_form(&room))
}

/// Chat page for a room.
async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Path(room): Path<String>,
    Form(form): Form<JoinForm>,
) -> Html<String> {
    Html(pages::chat_page(
        &room,
        &form.username,
        &state.config.transport.websocket_path,
        &state.driver_config.stream_target,
    ))
}

/// Publish a posted message into a room and return a fresh message form.
async fn message_handler(
    State(state): State<Arc<AppState>>,
    Path(room): Path<String>,
    Form(form): Form<MessageForm>,
) -> Html<String> {
    let report = state
        .relay
        .publish_user_message(&room, &form.user, &form.message);
    metrics::record_messages(1, form.message.len() as u64, "form");
    metrics::record_dropped(report.dropped);
    debug!(room = %room, delivered = report.delivered, "Form message published");

    Html(pages::message_form(&room, &form.user))
}

/// WebSocket upgrade handler.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let max_message_size = state.config.limits.max_message_size;
    ws.max_message_size(max_message_size)
        .on_upgrade(move |socket| handle_websocket(socket, addr, params, state))
}

/// Handle a WebSocket connection.
async fn handle_websocket(
    socket: WebSocket,
    addr: SocketAddr,
    params: ConnectParams,
    state: Arc<AppState>,
) {
    let _metrics_guard = ConnectionMetricsGuard::new();

    let (session, outbound) = state.relay.connect(params);
    debug!(connection = %session.id(), room = %session.room(), remote = %addr, "WebSocket connected");

    let conn = WebSocketConnection::new(socket, state.config.limits.max_message_size)
        .with_remote_addr(addr);
    let summary = drive(conn, session, outbound, &state.driver_config).await;

    metrics::record_session(&summary);
    metrics::set_active_rooms(state.relay.stats().room_count);
}

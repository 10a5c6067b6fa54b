use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Utc};
use relay_core::{AuthFieldExtractor, ConnectionRegistry, Credentials};
use relay_telemetry::RelayStats;
use tokio::sync::oneshot;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::connection::{self, ConnectionTable};
use crate::coordinator::SessionCoordinator;
use crate::error::RelayError;

/// Header consulted when the identity field is absent from the query string.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<SessionCoordinator>,
    pub connections: Arc<ConnectionTable>,
    pub identity_field: String,
    pub heartbeat_interval: Duration,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Wire up a fresh registry, coordinator and connection table from config.
    pub fn from_config(config: &ServerConfig) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let extractor = Arc::new(AuthFieldExtractor::new(config.identity_field.clone()));
        let coordinator = Arc::new(SessionCoordinator::new(
            registry,
            extractor,
            config.policy.clone(),
            Arc::new(RelayStats::new()),
        ));
        Self {
            coordinator,
            connections: Arc::new(ConnectionTable::new(config.max_send_queue)),
            identity_field: config.identity_field.clone(),
            heartbeat_interval: config.heartbeat_interval(),
            started_at: Utc::now(),
        }
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Create and start the server. Returns a handle to shut it down.
pub async fn start(config: ServerConfig) -> Result<ServerHandle, RelayError> {
    let state = AppState::from_config(&config);

    let cleanup = connection::start_cleanup_task(
        Arc::clone(&state.connections),
        Arc::clone(state.coordinator.registry()),
        config.cleanup_interval(),
        config.client_timeout(),
    );

    let router = build_router(state.clone());
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| RelayError::Bind { addr, source })?;
    let local_addr = listener.local_addr()?;

    tracing::info!(addr = %local_addr, policy = ?config.policy, "Relay server started");

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await;
        if let Err(e) = result {
            tracing::error!(error = %e, "Server exited with error");
        }
    });

    Ok(ServerHandle {
        addr: local_addr,
        state,
        shutdown_tx: Some(shutdown_tx),
        server,
        cleanup,
    })
}

/// Handle returned by `start()`. Keeps the background tasks alive.
pub struct ServerHandle {
    addr: SocketAddr,
    state: AppState,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server: tokio::task::JoinHandle<()>,
    cleanup: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Stop accepting connections and wait for the listener to wind down.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.cleanup.abort();
        let _ = (&mut self.server).await;
        tracing::info!("Relay server stopped");
    }
}

/// WebSocket upgrade handler.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let credentials = credentials_from_request(query, &headers, &state.identity_field);
    ws.on_upgrade(move |socket| handle_socket(socket, state, credentials))
}

/// Collect the handshake credential bundle: query parameters, with the
/// identity header as a fallback for the identity field.
pub fn credentials_from_request(
    query: HashMap<String, String>,
    headers: &HeaderMap,
    identity_field: &str,
) -> Credentials {
    let mut credentials: Credentials = query.into_iter().collect();
    if !credentials.contains(identity_field) {
        if let Some(value) = headers.get(USER_ID_HEADER).and_then(|v| v.to_str().ok()) {
            credentials.insert(identity_field, value);
        }
    }
    credentials
}

/// Handle a new WebSocket connection.
async fn handle_socket(socket: WebSocket, state: AppState, credentials: Credentials) {
    let (conn, rx) = state.connections.register(credentials);

    connection::handle_ws_connection(
        socket,
        conn,
        rx,
        state.connections,
        state.coordinator,
        state.heartbeat_interval,
    )
    .await;
}

/// Health check HTTP endpoint.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let now = Utc::now();
    let uptime = (now - state.started_at).num_seconds().max(0);
    axum::Json(serde_json::json!({
        "status": "healthy",
        "connections": state.connections.count(),
        "identities": state.coordinator.registry().len(),
        "started_at": state.started_at.to_rfc3339(),
        "uptime_secs": uptime,
        "stats": state.coordinator.stats().snapshot(),
        "policy": state.coordinator.policy(),
    }))
}

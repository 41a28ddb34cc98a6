//! `TandemServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tandem_core::clock::{Clock, SystemClock};
use tandem_core::ids::ConnectionId;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::registry::SessionRegistry;
use crate::shutdown::{ServerHandle, ShutdownCoordinator};
use crate::ticker;
use crate::websocket::broadcast::BroadcastManager;
use crate::websocket::session::run_ws_session;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Live sessions.
    pub registry: Arc<SessionRegistry>,
    /// Open connections, and the registry's event sink.
    pub broadcast: Arc<BroadcastManager>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Renders `/metrics`.
    pub metrics: PrometheusHandle,
    /// When the server started.
    pub start_time: Instant,
}

/// The Tandem server.
pub struct TandemServer {
    config: Arc<ServerConfig>,
    registry: Arc<SessionRegistry>,
    broadcast: Arc<BroadcastManager>,
    shutdown: Arc<ShutdownCoordinator>,
    metrics: PrometheusHandle,
    start_time: Instant,
}

impl TandemServer {
    /// Create a server backed by the system wall clock.
    pub fn new(config: ServerConfig, metrics: PrometheusHandle) -> Self {
        Self::with_clock(config, metrics, Arc::new(SystemClock))
    }

    /// Create a server reading time from `clock`.
    pub fn with_clock(config: ServerConfig, metrics: PrometheusHandle, clock: Arc<dyn Clock>) -> Self {
        let broadcast = Arc::new(BroadcastManager::new());
        let registry = Arc::new(SessionRegistry::new(broadcast.clone(), clock));
        Self {
            config: Arc::new(config),
            registry,
            broadcast,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            metrics,
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            registry: self.registry.clone(),
            broadcast: self.broadcast.clone(),
            shutdown: self.shutdown.clone(),
            config: self.config.clone(),
            metrics: self.metrics.clone(),
            start_time: self.start_time,
        };

        Router::new()
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind, then serve HTTP and run the ticker until shutdown.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, ServerHandle)> {
        let bind = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&bind).await?;
        let addr = listener.local_addr()?;

        let ticker = ticker::spawn_ticker(
            self.registry.clone(),
            self.config.tick_interval(),
            self.shutdown.token(),
        );

        let router = self.router();
        let token = self.shutdown.token();
        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                warn!(error = %e, "http server exited with error");
            }
        });

        info!(%addr, "tandem server listening");
        Ok((addr, ServerHandle::new(server, ticker)))
    }

    /// Get the session registry.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Get the broadcast manager.
    pub fn broadcast(&self) -> &Arc<BroadcastManager> {
        &self.broadcast
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /ws
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let connections = state.broadcast.connection_count();
    if connections >= state.config.max_connections {
        warn!(connections, max = state.config.max_connections, "rejecting websocket upgrade");
        return (StatusCode::SERVICE_UNAVAILABLE, "too many connections").into_response();
    }

    let max_message_size = state.config.max_message_size;
    ws.max_message_size(max_message_size)
        .on_upgrade(move |socket| run_ws_session(socket, ConnectionId::new(), state))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.broadcast.connection_count(),
        state.registry.session_count(),
        state.registry.running_count(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics.render()
}

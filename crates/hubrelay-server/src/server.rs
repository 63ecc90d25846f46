//! `RelayServer`: the axum router and listener.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{DefaultBodyLimit, FromRef, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use hubrelay_core::{SharedSecret, SignatureVerifier, TokenVerifier};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::ingress::{self, EventIngress};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::SubscriberRegistry;
use crate::websocket::session::{self, SessionContext};

/// Shared state accessible from axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Live subscribers.
    pub registry: Arc<SubscriberRegistry>,
    /// Webhook handling.
    pub ingress: Arc<EventIngress>,
    /// Subscriber admission and session settings.
    pub sessions: Arc<SessionContext>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

impl FromRef<AppState> for Arc<EventIngress> {
    fn from_ref(state: &AppState) -> Self {
        state.ingress.clone()
    }
}

/// The relay server.
pub struct RelayServer {
    config: ServerConfig,
    registry: Arc<SubscriberRegistry>,
    ingress: Arc<EventIngress>,
    sessions: Arc<SessionContext>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics: Option<PrometheusHandle>,
}

impl RelayServer {
    /// Create a server; both verifiers share `secret`.
    pub fn new(config: ServerConfig, secret: SharedSecret) -> Self {
        let registry = Arc::new(SubscriberRegistry::new(config.max_subscribers));
        let shutdown = Arc::new(ShutdownCoordinator::new());
        let ingress = Arc::new(EventIngress::new(
            SignatureVerifier::new(secret.clone()),
            registry.clone(),
        ));
        let sessions = Arc::new(SessionContext::new(
            &config,
            registry.clone(),
            TokenVerifier::new(secret),
            shutdown.token(),
            shutdown.tasks(),
        ));
        Self {
            config,
            registry,
            ingress,
            sessions,
            shutdown,
            start_time: Instant::now(),
            metrics: None,
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            registry: self.registry.clone(),
            ingress: self.ingress.clone(),
            sessions: self.sessions.clone(),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        };

        let mut router = Router::new()
            .route(
                "/v1/stream/{user_id}",
                post(ingress::ingest).get(ingress::challenge),
            )
            .route(&self.config.ws_path, get(ws_handler))
            .route("/health", get(health_handler));
        if self.metrics.is_some() {
            router = router.route("/metrics", get(metrics_handler));
        }

        router
            .with_state(state)
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(self.config.max_body_bytes))
            .layer(TraceLayer::new_for_http())
    }

    /// Bind and serve in a background task.
    ///
    /// Returns the bound address and the server task, which finishes once
    /// [`ShutdownCoordinator::shutdown`] fires and in-flight requests drain.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.token();

        info!(%addr, ws_path = %self.config.ws_path, "relay listening");
        let handle = tokio::spawn(async move {
            let shutdown = async move { token.cancelled().await };
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!(error = %e, "server exited with error");
            }
        });
        Ok((addr, handle))
    }

    /// Live subscribers.
    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

async fn ws_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    session::handle_upgrade(state.sessions, &headers, ws).await
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let subscribers = state.registry.len().await;
    Json(health::health_check(state.start_time, subscribers))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

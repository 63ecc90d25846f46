//! Subscriber session lifecycle, from upgrade request to disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use hubrelay_core::{AUTHORIZATION_HEADER, TokenVerifier};
use metrics::counter;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument, warn};

use super::registry::{AdmissionError, SubscriberRegistry};
use super::subscriber::{Subscriber, SubscriberId};
use crate::config::ServerConfig;
use crate::metrics::{WS_CONNECTIONS_TOTAL, WS_REJECTIONS_TOTAL};

/// Upper bound on delivering the final close frame.
const CLOSE_FRAME_TIMEOUT: Duration = Duration::from_secs(1);

type WsSink = SplitSink<WebSocket, Message>;

/// Lifecycle of one subscriber connection.
///
/// `Connecting → Authenticating → Open → Closed`; `Authenticating` may also
/// go straight to `Closed`. `Closed` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Upgrade request received.
    Connecting,
    /// Checking the `X-Authorization` credential.
    Authenticating,
    /// Registered and receiving broadcasts.
    Open,
    /// Terminal.
    Closed,
}

/// A transition the session state machine does not allow.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("illegal session transition {from:?} -> {to:?}")]
pub struct IllegalTransition {
    /// State the session was in.
    pub from: SessionState,
    /// Requested state.
    pub to: SessionState,
}

impl SessionState {
    /// Whether moving from `self` to `next` is allowed.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Connecting, Self::Authenticating)
                | (Self::Authenticating, Self::Open | Self::Closed)
                | (Self::Open, Self::Closed)
        )
    }

    /// Move to `next`, or report why that is not allowed.
    pub fn transition(self, next: Self) -> Result<Self, IllegalTransition> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(IllegalTransition {
                from: self,
                to: next,
            })
        }
    }

    fn advance(&mut self, next: Self) {
        match self.transition(next) {
            Ok(state) => *self = state,
            Err(e) => {
                warn!(error = %e, "forcing session closed");
                *self = Self::Closed;
            }
        }
    }
}

/// Why an open session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CloseReason {
    ClientClosed,
    TransportError,
    Evicted,
    IdleTimeout,
    Shutdown,
}

impl CloseReason {
    fn as_str(self) -> &'static str {
        match self {
            Self::ClientClosed => "client_closed",
            Self::TransportError => "transport_error",
            Self::Evicted => "evicted",
            Self::IdleTimeout => "idle_timeout",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Everything a session needs besides its socket.
pub struct SessionContext {
    registry: Arc<SubscriberRegistry>,
    tokens: TokenVerifier,
    queue_capacity: usize,
    ping_interval: Duration,
    idle_timeout: Duration,
    shutdown: CancellationToken,
    tasks: TaskTracker,
}

impl SessionContext {
    /// Build from server configuration.
    pub fn new(
        config: &ServerConfig,
        registry: Arc<SubscriberRegistry>,
        tokens: TokenVerifier,
        shutdown: CancellationToken,
        tasks: TaskTracker,
    ) -> Self {
        Self {
            registry,
            tokens,
            queue_capacity: config.queue_capacity,
            ping_interval: config.ping_interval,
            idle_timeout: config.idle_timeout,
            shutdown,
            tasks,
        }
    }
}

/// Admit or refuse a WebSocket upgrade.
///
/// A bad credential gets `403` with an empty body and a full registry gets
/// `503`; neither sends a WebSocket frame. An admitted subscriber is
/// registered before the upgrade response goes out.
pub async fn handle_upgrade(
    ctx: Arc<SessionContext>,
    headers: &HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let mut state = SessionState::Connecting;
    state.advance(SessionState::Authenticating);

    let credential = headers
        .get(AUTHORIZATION_HEADER)
        .and_then(|value| value.to_str().ok());
    if !ctx.tokens.verify(credential) {
        state.advance(SessionState::Closed);
        counter!(WS_REJECTIONS_TOTAL, "reason" => "unauthorized").increment(1);
        info!("websocket upgrade refused");
        return StatusCode::FORBIDDEN.into_response();
    }

    let (subscriber, rx) = Subscriber::channel(ctx.queue_capacity);
    let id = subscriber.id().clone();
    if let Err(e) = ctx.registry.add(subscriber).await {
        state.advance(SessionState::Closed);
        let reason = match &e {
            AdmissionError::AtCapacity { .. } => "capacity",
            AdmissionError::Duplicate(_) => "duplicate",
        };
        counter!(WS_REJECTIONS_TOTAL, "reason" => reason).increment(1);
        warn!(error = %e, "websocket upgrade refused");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let failed_registry = ctx.registry.clone();
    let failed_id = id.clone();
    let failed_tasks = ctx.tasks.clone();
    let tasks = ctx.tasks.clone();
    ws.on_failed_upgrade(move |error| {
        warn!(subscriber_id = %failed_id, %error, "websocket upgrade failed");
        let _ = failed_tasks.spawn(async move {
            let _ = failed_registry.remove(&failed_id).await;
        });
    })
    .on_upgrade(move |socket| tasks.track_future(run_session(socket, id, rx, ctx, state)))
}

/// Drive an admitted subscriber until it disconnects, is evicted, goes
/// idle, or the server shuts down. Deregisters exactly once on exit.
#[instrument(skip_all, fields(subscriber_id = %id))]
async fn run_session(
    socket: WebSocket,
    id: SubscriberId,
    mut rx: mpsc::Receiver<Utf8Bytes>,
    ctx: Arc<SessionContext>,
    mut state: SessionState,
) {
    state.advance(SessionState::Open);
    info!(subscriber_id = %id, "subscriber connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);

    let (mut sink, mut stream) = socket.split();
    let mut ping = tokio::time::interval(ctx.ping_interval);
    // first tick fires immediately
    let _ = ping.tick().await;
    let connected = Instant::now();
    let mut last_seen = connected;
    let mut frames_sent: u64 = 0;

    let reason = loop {
        tokio::select! {
            () = ctx.shutdown.cancelled() => break CloseReason::Shutdown,
            frame = rx.recv() => match frame {
                Some(text) => {
                    if let Err(reason) = send_frame(&mut sink, Message::Text(text), &ctx).await {
                        break reason;
                    }
                    frames_sent += 1;
                }
                None => break CloseReason::Evicted,
            },
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Close(_))) | None => break CloseReason::ClientClosed,
                // payloads are ignored; any frame counts as liveness
                Some(Ok(_)) => last_seen = Instant::now(),
                Some(Err(e)) => {
                    debug!(error = %e, "websocket receive failed");
                    break CloseReason::TransportError;
                }
            },
            () = tokio::time::sleep_until(last_seen + ctx.idle_timeout) => break CloseReason::IdleTimeout,
            _ = ping.tick() => {
                if let Err(reason) = send_frame(&mut sink, Message::Ping(Bytes::new()), &ctx).await {
                    break reason;
                }
            }
        }
    };

    let close = match reason {
        CloseReason::Shutdown => Some((close_code::AWAY, "server shutting down")),
        CloseReason::IdleTimeout => Some((close_code::POLICY, "idle timeout")),
        CloseReason::Evicted => Some((close_code::POLICY, "subscriber too slow")),
        CloseReason::ClientClosed | CloseReason::TransportError => None,
    };
    if let Some((code, text)) = close {
        let frame = CloseFrame {
            code,
            reason: Utf8Bytes::from_static(text),
        };
        let close = sink.send(Message::Close(Some(frame)));
        if tokio::time::timeout(CLOSE_FRAME_TIMEOUT, close).await.is_err() {
            debug!("close frame not delivered in time");
        }
    }

    let removed = ctx.registry.remove(&id).await;
    state.advance(SessionState::Closed);
    info!(
        subscriber_id = %id,
        reason = reason.as_str(),
        removed,
        frames_sent,
        connected_secs = connected.elapsed().as_secs(),
        "subscriber disconnected"
    );
}

/// Send one frame to the client.
///
/// Gives up after the idle timeout, so a client that stops reading cannot
/// hold the session past it, and returns at once when the server shuts
/// down.
async fn send_frame(sink: &mut WsSink, frame: Message, ctx: &SessionContext) -> Result<(), CloseReason> {
    tokio::select! {
        () = ctx.shutdown.cancelled() => Err(CloseReason::Shutdown),
        sent = tokio::time::timeout(ctx.idle_timeout, sink.send(frame)) => match sent {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                debug!(error = %e, "websocket send failed");
                Err(CloseReason::TransportError)
            }
            Err(_) => {
                warn!("websocket send stalled past idle timeout");
                Err(CloseReason::TransportError)
            }
        },
    }
}

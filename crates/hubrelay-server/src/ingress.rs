//! Webhook ingress: signature check, normalization, fan-out, and the
//! endpoint-ownership challenge.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use hubrelay_core::{InboundEvent, OutboundMessage, RelayError, SIGNATURE_HEADER, SignatureVerifier};
use metrics::counter;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::metrics::WEBHOOK_REQUESTS_TOTAL;
use crate::websocket::{BroadcastReport, SubscriberRegistry};

/// Rejection of a webhook request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IngressError {
    /// Signature missing or wrong. Carries no detail.
    #[error("forbidden")]
    Forbidden,
    /// Body is not a JSON object with a `data` field.
    #[error("malformed payload: {0}")]
    Malformed(String),
    /// Challenge request without `hub.challenge`.
    #[error("missing hub.challenge")]
    MissingChallenge,
    /// A relay failure that is not the caller's fault.
    #[error("internal error")]
    Internal,
}

impl IngressError {
    fn outcome(&self) -> &'static str {
        match self {
            Self::Forbidden => "forbidden",
            Self::Malformed(_) => "malformed",
            Self::MissingChallenge => "missing_challenge",
            Self::Internal => "internal",
        }
    }
}

impl From<RelayError> for IngressError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::MalformedPayload { reason } => Self::Malformed(reason),
            RelayError::Unauthorized => Self::Forbidden,
            RelayError::SubscriberSendFailure { .. } | RelayError::ConfigurationMissing { .. } => {
                Self::Internal
            }
        }
    }
}

impl IntoResponse for IngressError {
    fn into_response(self) -> Response {
        match self {
            Self::Forbidden => StatusCode::FORBIDDEN.into_response(),
            Self::Malformed(reason) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": reason }))).into_response()
            }
            Self::MissingChallenge => {
                (StatusCode::BAD_REQUEST, "missing hub.challenge").into_response()
            }
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

/// Verifies, normalizes, and broadcasts webhook deliveries.
pub struct EventIngress {
    verifier: SignatureVerifier,
    registry: Arc<SubscriberRegistry>,
}

impl EventIngress {
    /// Create an ingress broadcasting into `registry`.
    pub fn new(verifier: SignatureVerifier, registry: Arc<SubscriberRegistry>) -> Self {
        Self { verifier, registry }
    }

    /// Handle one delivery.
    ///
    /// The signature is checked against the raw bytes before the body is
    /// parsed. Nothing is broadcast unless both checks pass.
    pub async fn handle(
        &self,
        source_user_id: &str,
        signature: Option<&str>,
        raw_body: &[u8],
    ) -> Result<BroadcastReport, IngressError> {
        if !self.verifier.verify(signature, raw_body) {
            return Err(IngressError::Forbidden);
        }
        let event = InboundEvent::from_body(source_user_id, raw_body)?;
        let message = OutboundMessage::from(event);
        Ok(self.registry.broadcast(&message).await)
    }
}

/// `POST /v1/stream/{user_id}`
#[instrument(skip_all, fields(user = %user_id))]
pub async fn ingest(
    State(ingress): State<Arc<EventIngress>>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, IngressError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    match ingress.handle(&user_id, signature, &body).await {
        Ok(report) => {
            counter!(WEBHOOK_REQUESTS_TOTAL, "outcome" => "accepted").increment(1);
            info!(
                user = %user_id,
                recipients = report.delivered,
                evicted = report.evicted,
                "event relayed"
            );
            Ok(StatusCode::ACCEPTED)
        }
        Err(e) => {
            counter!(WEBHOOK_REQUESTS_TOTAL, "outcome" => e.outcome()).increment(1);
            warn!(user = %user_id, outcome = e.outcome(), "webhook rejected");
            Err(e)
        }
    }
}

/// Query of the endpoint-ownership challenge.
#[derive(Debug, Deserialize)]
pub struct ChallengeQuery {
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.topic")]
    topic: Option<String>,
}

/// `GET /v1/stream/{user_id}?hub.challenge=…`
///
/// Echoes the challenge verbatim. Unauthenticated.
pub async fn challenge(
    Path(user_id): Path<String>,
    Query(query): Query<ChallengeQuery>,
) -> Result<String, IngressError> {
    debug!(
        user = %user_id,
        mode = query.mode.as_deref(),
        topic = query.topic.as_deref(),
        "challenge received"
    );
    query.challenge.ok_or(IngressError::MissingChallenge)
}

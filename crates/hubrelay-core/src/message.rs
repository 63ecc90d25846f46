//! Webhook events and the frames fanned out to subscribers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{RelayError, Result};

/// A decoded webhook delivery.
#[derive(Clone, Debug, PartialEq)]
pub struct InboundEvent {
    /// User the event source attributes the event to (from the URL path).
    pub source_user_id: String,
    /// The `data` field of the body, passed through untouched.
    pub payload: Value,
}

impl InboundEvent {
    /// Decode a raw webhook body.
    ///
    /// The body must be a JSON object with a `data` field; the field may hold
    /// any JSON value, `null` included.
    pub fn from_body(source_user_id: impl Into<String>, raw_body: &[u8]) -> Result<Self> {
        let decoded: Value = serde_json::from_slice(raw_body)
            .map_err(|e| RelayError::malformed(format!("body is not valid JSON: {e}")))?;
        let Value::Object(mut fields) = decoded else {
            return Err(RelayError::malformed("body is not a JSON object"));
        };
        let payload = fields
            .remove("data")
            .ok_or_else(|| RelayError::malformed("body has no `data` field"))?;
        Ok(Self {
            source_user_id: source_user_id.into(),
            payload,
        })
    }
}

/// Discriminator of an outbound frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// A relayed webhook event.
    Stream,
}

/// Frame pushed to every subscriber: `{"type":"stream","user":…,"payload":…}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    #[serde(rename = "type")]
    kind: MessageKind,
    user: String,
    payload: Value,
}

impl OutboundMessage {
    /// Build a `stream` frame.
    pub fn stream(user: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: MessageKind::Stream,
            user: user.into(),
            payload,
        }
    }

    /// User the event belongs to.
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Opaque event payload.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Serialize to the wire format.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl From<InboundEvent> for OutboundMessage {
    fn from(event: InboundEvent) -> Self {
        Self::stream(event.source_user_id, event.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_object_payload() {
        let event = InboundEvent::from_body("alice", br#"{"data":{"x":1}}"#).unwrap();
        assert_eq!(event.source_user_id, "alice");
        assert_eq!(event.payload, json!({"x": 1}));
    }

    #[test]
    fn passes_through_any_json_value() {
        for (body, expected) in [
            (&br#"{"data":[1,2,3]}"#[..], json!([1, 2, 3])),
            (&br#"{"data":"live"}"#[..], json!("live")),
            (&br#"{"data":42}"#[..], json!(42)),
            (&br#"{"data":null}"#[..], Value::Null),
        ] {
            let event = InboundEvent::from_body("u", body).unwrap();
            assert_eq!(event.payload, expected);
        }
    }

    #[test]
    fn extra_fields_are_ignored() {
        let event =
            InboundEvent::from_body("u", br#"{"data":{"id":"1"},"pagination":{}}"#).unwrap();
        assert_eq!(event.payload, json!({"id": "1"}));
    }

    #[test]
    fn invalid_json_is_malformed() {
        let err = InboundEvent::from_body("u", b"{not json").unwrap_err();
        assert!(matches!(err, RelayError::MalformedPayload { .. }));
        assert!(err.to_string().contains("not valid JSON"));
    }

    #[test]
    fn empty_body_is_malformed() {
        let err = InboundEvent::from_body("u", b"").unwrap_err();
        assert!(matches!(err, RelayError::MalformedPayload { .. }));
    }

    #[test]
    fn missing_data_is_malformed() {
        let err = InboundEvent::from_body("u", br#"{"other":1}"#).unwrap_err();
        assert!(err.to_string().contains("no `data` field"));
    }

    #[test]
    fn non_object_body_is_malformed() {
        let err = InboundEvent::from_body("u", b"[1,2]").unwrap_err();
        assert!(err.to_string().contains("not a JSON object"));
    }

    #[test]
    fn outbound_wire_format() {
        let msg = OutboundMessage::stream("alice", json!({"x": 1}));
        let parsed: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(parsed, json!({"type": "stream", "user": "alice", "payload": {"x": 1}}));
    }

    #[test]
    fn outbound_from_inbound() {
        let event = InboundEvent::from_body("bob", br#"{"data":true}"#).unwrap();
        let msg = OutboundMessage::from(event);
        assert_eq!(msg.user(), "bob");
        assert_eq!(msg.payload(), &json!(true));
    }

    #[test]
    fn outbound_deserializes() {
        let msg: OutboundMessage =
            serde_json::from_str(r#"{"type":"stream","user":"a","payload":null}"#).unwrap();
        assert_eq!(msg.user(), "a");
        assert!(msg.payload().is_null());
    }

    #[test]
    fn unknown_kind_rejected() {
        let res = serde_json::from_str::<OutboundMessage>(
            r#"{"type":"other","user":"a","payload":null}"#,
        );
        assert!(res.is_err());
    }
}

//! Relay error taxonomy.

use thiserror::Error;

/// Errors produced across the relay.
///
/// None of the variants carry secret material or the reason an
/// authentication check failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// Bad or missing webhook signature or bearer token.
    #[error("unauthorized")]
    Unauthorized,

    /// Webhook body is not valid JSON or lacks the expected `data` field.
    #[error("malformed payload: {reason}")]
    MalformedPayload {
        /// Short description of what was wrong with the body.
        reason: String,
    },

    /// Enqueueing a frame for one subscriber failed during a broadcast.
    ///
    /// Recovered locally by evicting that subscriber; never surfaced to the
    /// webhook caller.
    #[error("failed to deliver to subscriber {subscriber_id}")]
    SubscriberSendFailure {
        /// Id of the subscriber that was evicted.
        subscriber_id: String,
    },

    /// A required configuration value was absent or empty at startup.
    #[error("missing required configuration: {key}")]
    ConfigurationMissing {
        /// Name of the missing value.
        key: String,
    },
}

impl RelayError {
    /// Build a [`RelayError::MalformedPayload`].
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            reason: reason.into(),
        }
    }
}

/// Result alias for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_display_is_generic() {
        assert_eq!(RelayError::Unauthorized.to_string(), "unauthorized");
    }

    #[test]
    fn malformed_display_includes_reason() {
        let err = RelayError::malformed("body has no `data` field");
        assert_eq!(
            err.to_string(),
            "malformed payload: body has no `data` field"
        );
    }

    #[test]
    fn send_failure_display() {
        let err = RelayError::SubscriberSendFailure {
            subscriber_id: "sub_1".into(),
        };
        assert!(err.to_string().contains("sub_1"));
    }

    #[test]
    fn configuration_missing_display() {
        let err = RelayError::ConfigurationMissing {
            key: "HUBRELAY_SECRET".into(),
        };
        assert_eq!(
            err.to_string(),
            "missing required configuration: HUBRELAY_SECRET"
        );
    }
}

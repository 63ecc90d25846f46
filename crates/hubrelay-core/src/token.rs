//! `X-Authorization` verification for WebSocket admission.
//!
//! The header value is `Basic <urlsafe-base64(secret)>`. Despite the prefix
//! this is not HTTP Basic auth: there is no `user:password` pair, the decoded
//! text must equal the shared secret exactly.

use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::{self, GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;

use crate::secret::SharedSecret;

/// Header carrying the subscriber credential.
pub const AUTHORIZATION_HEADER: &str = "x-authorization";

const BASIC_PREFIX: &str = "Basic ";

/// URL-safe alphabet, padding optional on decode.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Verifies subscriber credentials against the shared secret.
#[derive(Clone, Debug)]
pub struct TokenVerifier {
    secret: SharedSecret,
}

impl TokenVerifier {
    /// Create a verifier bound to `secret`.
    pub fn new(secret: SharedSecret) -> Self {
        Self { secret }
    }

    /// Build a header value a subscriber would send for `secret`.
    pub fn encode(secret: &str) -> String {
        format!("{BASIC_PREFIX}{}", general_purpose::URL_SAFE.encode(secret))
    }

    /// Check an authorization header. Never errors: anything that does not
    /// decode to the secret is `false`.
    pub fn verify(&self, authorization_header: Option<&str>) -> bool {
        let Some(header) = authorization_header else {
            return false;
        };
        let encoded = header.strip_prefix(BASIC_PREFIX).unwrap_or(header);
        let Ok(decoded) = URL_SAFE_LENIENT.decode(encoded) else {
            return false;
        };
        let Ok(text) = std::str::from_utf8(&decoded) else {
            return false;
        };
        self.secret.matches(text.as_bytes())
    }
}

//! `X-Hub-Signature` verification for inbound webhooks.
//!
//! The expected digest is `SHA256(raw_body ++ secret)` rendered as lowercase
//! hex. The header carries it as `sha256=<hex>`; a bare hex value is accepted
//! too. The digest must be computed over the bytes exactly as received,
//! before any JSON decoding.

use sha2::{Digest, Sha256};

use crate::secret::{SharedSecret, constant_time_eq};

/// Header carrying the webhook signature.
pub const SIGNATURE_HEADER: &str = "x-hub-signature";

const SIGNATURE_PREFIX: &str = "sha256=";

/// Verifies webhook bodies against the shared secret.
#[derive(Clone, Debug)]
pub struct SignatureVerifier {
    secret: SharedSecret,
}

impl SignatureVerifier {
    /// Create a verifier bound to `secret`.
    pub fn new(secret: SharedSecret) -> Self {
        Self { secret }
    }

    /// Lowercase hex digest of `raw_body ++ secret`.
    pub fn digest_hex(&self, raw_body: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(raw_body);
        hasher.update(self.secret.expose_bytes());
        hex::encode(hasher.finalize())
    }

    /// Full header value (`sha256=<hex>`) for `raw_body`.
    pub fn sign(&self, raw_body: &[u8]) -> String {
        format!("{SIGNATURE_PREFIX}{}", self.digest_hex(raw_body))
    }

    /// Check a signature header against the raw request body.
    ///
    /// A missing header, a malformed value, or a mismatch all yield `false`.
    pub fn verify(&self, signature_header: Option<&str>, raw_body: &[u8]) -> bool {
        let Some(header) = signature_header else {
            return false;
        };
        let provided = header.strip_prefix(SIGNATURE_PREFIX).unwrap_or(header);
        let expected = self.digest_hex(raw_body);
        constant_time_eq(provided.as_bytes(), expected.as_bytes())
    }
}

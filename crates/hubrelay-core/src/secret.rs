//! The process-wide shared secret.

use std::fmt;
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

use crate::errors::{RelayError, Result};

/// Immutable shared secret used by both verifiers.
///
/// Cloning is cheap and shares the same allocation. `Debug` never prints the
/// value, and there is no public accessor for it.
#[derive(Clone)]
pub struct SharedSecret {
    inner: Arc<SecretString>,
}

impl SharedSecret {
    /// Name used when reporting a missing secret.
    pub const NAME: &'static str = "shared secret";

    /// Wrap a secret value. Empty values are rejected.
    pub fn new(value: &str) -> Result<Self> {
        if value.is_empty() {
            return Err(RelayError::ConfigurationMissing {
                key: Self::NAME.into(),
            });
        }
        Ok(Self {
            inner: Arc::new(SecretString::from(value)),
        })
    }

    pub(crate) fn expose_bytes(&self) -> &[u8] {
        self.inner.expose_secret().as_bytes()
    }

    /// Constant-time equality against a candidate credential.
    pub(crate) fn matches(&self, candidate: &[u8]) -> bool {
        constant_time_eq(self.expose_bytes(), candidate)
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret([REDACTED])")
    }
}

/// Compare two byte strings without short-circuiting on the first mismatch.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

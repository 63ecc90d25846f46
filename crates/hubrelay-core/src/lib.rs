//! # hubrelay-core
//!
//! Foundation types for the relay:
//!
//! - [`SharedSecret`]: the process-wide credential, redacted in `Debug`
//! - [`SignatureVerifier`]: `X-Hub-Signature` check over the raw webhook body
//! - [`TokenVerifier`]: `X-Authorization` check for WebSocket admission
//! - [`InboundEvent`] / [`OutboundMessage`]: the webhook payload and the
//!   frame fanned out to subscribers
//! - [`RelayError`]: the error taxonomy shared by every crate

#![deny(unsafe_code)]

pub mod errors;
pub mod message;
pub mod secret;
pub mod signature;
pub mod token;

pub use errors::{RelayError, Result};
pub use message::{InboundEvent, MessageKind, OutboundMessage};
pub use secret::SharedSecret;
pub use signature::{SIGNATURE_HEADER, SignatureVerifier};
pub use token::{AUTHORIZATION_HEADER, TokenVerifier};

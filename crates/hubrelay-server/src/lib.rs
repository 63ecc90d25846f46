//! # hubrelay-server
//!
//! Axum HTTP + `WebSocket` server for the relay.
//!
//! - Webhook ingress: `POST /v1/stream/{user_id}` verified with
//!   `X-Hub-Signature`, and the `hub.challenge` echo on `GET`
//! - `WebSocket` gateway: `X-Authorization` admission, per-subscriber
//!   bounded queues, ping and idle timeout
//! - Fan-out through [`SubscriberRegistry`](websocket::SubscriberRegistry),
//!   evicting subscribers whose queue is full or closed
//! - `/health`, optional `/metrics`, and graceful shutdown via
//!   `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod ingress;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use server::RelayServer;

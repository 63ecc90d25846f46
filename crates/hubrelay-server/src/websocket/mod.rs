//! Subscriber admission, sessions, and fan-out.

pub mod registry;
pub mod session;
pub mod subscriber;

pub use registry::{AdmissionError, BroadcastReport, SubscriberRegistry};
pub use session::{SessionContext, SessionState};
pub use subscriber::{Subscriber, SubscriberId};

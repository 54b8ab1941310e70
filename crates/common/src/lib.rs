//! Common types for the API Gateway WebSocket session system
//!
//! This crate provides the session and gateway models, the framework-neutral
//! request/response types, and the header validation predicates shared by the
//! Lambda handler and the operator CLI.

pub mod constants;
pub mod error;
pub mod models;
pub mod protocol;
pub mod utils;
pub mod validation;

// Re-export commonly used types for convenience
pub use error::{Result, WsError};
pub use models::{AdditionalRoute, GatewayConfig, Session};
pub use protocol::{HttpResponse, WebSocketRequest};
pub use utils::current_timestamp_secs;
pub use validation::HeaderRequirements;

//! Session and gateway persistence
//!
//! The dispatcher only talks to these traits. `dynamodb` backs them with
//! DynamoDB tables, `memory` with in-process maps for tests and local runs.

use apigw_ws_common::{GatewayConfig, Result, Session};
use async_trait::async_trait;

mod dynamodb;
mod memory;

pub use dynamodb::{DynamoGatewayRegistry, DynamoSessionStore};
pub use memory::{MemoryGatewayRegistry, MemorySessionStore};

/// Persisted WebSocket sessions keyed by connection ID
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a new session; fails with `DuplicateSession` if the ID exists
    async fn create(&self, session: &Session) -> Result<()>;

    /// Fails with `SessionNotFound` if the ID is unknown
    async fn get(&self, connection_id: &str) -> Result<Session>;

    /// Atomically bump the request counter and return the updated session
    async fn record_request(&self, connection_id: &str) -> Result<Session>;

    /// Flag the session as no longer connected
    async fn mark_disconnected(&self, connection_id: &str) -> Result<()>;

    /// Connected sessions, optionally restricted to one channel
    async fn list_connected(&self, channel: Option<&str>) -> Result<Vec<Session>>;

    /// Delete every disconnected session, returning how many were removed
    async fn purge_disconnected(&self) -> Result<u32>;
}

/// Registered gateways keyed by name, searchable by provider API ID
#[async_trait]
pub trait GatewayRegistry: Send + Sync {
    async fn find_by_api_id(&self, api_id: &str) -> Result<Option<GatewayConfig>>;

    async fn get(&self, api_name: &str) -> Result<Option<GatewayConfig>>;

    /// Insert or replace a gateway
    async fn save(&self, gateway: &GatewayConfig) -> Result<()>;
}

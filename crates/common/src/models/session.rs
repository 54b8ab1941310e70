use serde::{Deserialize, Serialize};

use crate::models::GatewayConfig;
use crate::utils::current_timestamp_secs;

/// One logical WebSocket connection, keyed by the API Gateway connection ID
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// API Gateway WebSocket connection ID
    pub connection_id: String,

    /// Grouping label used to fan out server-pushed messages
    #[serde(default)]
    pub channel_name: String,

    /// Principal that opened the connection, if authenticated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// False once the connection has gone away
    pub connected: bool,

    /// Number of authenticated events seen, starting at 1 for the connect
    pub request_count: u64,

    /// Unix epoch seconds
    pub created_on: i64,

    /// Unix epoch seconds
    pub updated_on: i64,

    /// ID of the gateway the connection arrived through
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_id: Option<String>,
}

impl Session {
    /// Create a fresh, connected session
    pub fn new(connection_id: impl Into<String>) -> Self {
        let now = current_timestamp_secs();
        Self {
            connection_id: connection_id.into(),
            channel_name: String::new(),
            user_id: None,
            connected: true,
            request_count: 1,
            created_on: now,
            updated_on: now,
            api_id: None,
        }
    }

    pub fn with_channel(mut self, channel_name: impl Into<String>) -> Self {
        self.channel_name = channel_name.into();
        self
    }

    pub fn with_user(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    /// Attach the session to the gateway it arrived through
    pub fn with_gateway(mut self, gateway: Option<&GatewayConfig>) -> Self {
        self.api_id = gateway.and_then(|g| g.api_id.clone());
        self
    }
}

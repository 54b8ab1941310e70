use apigw_ws_common::{GatewayConfig, Result, Session, WsError, current_timestamp_secs};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{GatewayRegistry, SessionStore};

/// In-process session store
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, session: &Session) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.connection_id) {
            return Err(WsError::DuplicateSession(session.connection_id.clone()));
        }
        sessions.insert(session.connection_id.clone(), session.clone());
        Ok(())
    }

    async fn get(&self, connection_id: &str) -> Result<Session> {
        self.sessions
            .read()
            .await
            .get(connection_id)
            .cloned()
            .ok_or_else(|| WsError::SessionNotFound(connection_id.to_string()))
    }

    async fn record_request(&self, connection_id: &str) -> Result<Session> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(connection_id)
            .ok_or_else(|| WsError::SessionNotFound(connection_id.to_string()))?;
        session.request_count += 1;
        session.updated_on = current_timestamp_secs();
        Ok(session.clone())
    }

    async fn mark_disconnected(&self, connection_id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(connection_id)
            .ok_or_else(|| WsError::SessionNotFound(connection_id.to_string()))?;
        session.connected = false;
        session.updated_on = current_timestamp_secs();
        Ok(())
    }

    async fn list_connected(&self, channel: Option<&str>) -> Result<Vec<Session>> {
        let sessions = self.sessions.read().await;
        let mut found: Vec<Session> = sessions
            .values()
            .filter(|s| s.connected)
            .filter(|s| channel.is_none_or(|c| s.channel_name == c))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.connection_id.cmp(&b.connection_id));
        Ok(found)
    }

    async fn purge_disconnected(&self) -> Result<u32> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.connected);
        Ok((before - sessions.len()) as u32)
    }
}

/// In-process gateway registry
#[derive(Debug, Default)]
pub struct MemoryGatewayRegistry {
    gateways: RwLock<HashMap<String, GatewayConfig>>,
}

impl MemoryGatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry pre-populated with gateways
    pub fn with_gateways(gateways: impl IntoIterator<Item = GatewayConfig>) -> Self {
        let gateways = gateways
            .into_iter()
            .map(|g| (g.api_name.clone(), g))
            .collect();
        Self {
            gateways: RwLock::new(gateways),
        }
    }
}

#[async_trait]
impl GatewayRegistry for MemoryGatewayRegistry {
    async fn find_by_api_id(&self, api_id: &str) -> Result<Option<GatewayConfig>> {
        Ok(self
            .gateways
            .read()
            .await
            .values()
            .find(|g| g.api_id.as_deref() == Some(api_id))
            .cloned())
    }

    async fn get(&self, api_name: &str) -> Result<Option<GatewayConfig>> {
        Ok(self.gateways.read().await.get(api_name).cloned())
    }

    async fn save(&self, gateway: &GatewayConfig) -> Result<()> {
        self.gateways
            .write()
            .await
            .insert(gateway.api_name.clone(), gateway.clone());
        Ok(())
    }
}

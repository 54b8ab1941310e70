//! Server-push delivery through the API Gateway Management API
//!
//! `ManagementClient` is the raw `PostToConnection` call. `MessageSender`
//! layers session bookkeeping on top: a peer the gateway reports as gone is
//! flagged disconnected instead of failing the send.

use apigw_ws_common::{GatewayConfig, Result, Session, WsError};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_apigatewaymanagement::Client as ApiGatewayManagementClient;
use aws_sdk_apigatewaymanagement::primitives::Blob;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::store::{GatewayRegistry, SessionStore};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The peer connection no longer exists on the gateway
    #[error("connection is gone")]
    Gone,

    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait ManagementClient: Send + Sync {
    async fn post_to_connection(
        &self,
        gateway: &GatewayConfig,
        connection_id: &str,
        payload: &[u8],
    ) -> std::result::Result<(), DeliveryError>;
}

/// `ManagementClient` backed by the AWS SDK
///
/// Each gateway stage has its own management endpoint, so one SDK client is
/// built and cached per endpoint.
pub struct ApiGatewayManagement {
    sdk_config: SdkConfig,
    region: String,
    clients: RwLock<HashMap<String, ApiGatewayManagementClient>>,
}

impl ApiGatewayManagement {
    pub fn new(sdk_config: SdkConfig) -> Result<Self> {
        let region = sdk_config
            .region()
            .map(|r| r.to_string())
            .ok_or_else(|| WsError::Config("AWS region is not configured".to_string()))?;

        Ok(Self {
            sdk_config,
            region,
            clients: RwLock::new(HashMap::new()),
        })
    }

    async fn client_for(&self, endpoint: &str) -> ApiGatewayManagementClient {
        if let Some(client) = self.clients.read().await.get(endpoint) {
            return client.clone();
        }

        info!(
            "Initializing API Gateway Management client with endpoint: {}",
            endpoint
        );
        let config = aws_sdk_apigatewaymanagement::config::Builder::from(&self.sdk_config)
            .endpoint_url(endpoint)
            .build();
        let client = ApiGatewayManagementClient::from_conf(config);

        self.clients
            .write()
            .await
            .insert(endpoint.to_string(), client.clone());
        client
    }
}

#[async_trait]
impl ManagementClient for ApiGatewayManagement {
    async fn post_to_connection(
        &self,
        gateway: &GatewayConfig,
        connection_id: &str,
        payload: &[u8],
    ) -> std::result::Result<(), DeliveryError> {
        let endpoint = gateway.management_endpoint(&self.region).ok_or_else(|| {
            DeliveryError::Other(format!("gateway {} has no API ID", gateway.api_name))
        })?;
        let client = self.client_for(&endpoint).await;

        client
            .post_to_connection()
            .connection_id(connection_id)
            .data(Blob::new(payload))
            .send()
            .await
            .map(|_| ())
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_gone_exception()) {
                    DeliveryError::Gone
                } else {
                    DeliveryError::Other(format!(
                        "Failed to send message to WebSocket connection: {}",
                        e
                    ))
                }
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// Peer was gone; the session is now flagged disconnected
    Gone,
}

pub struct MessageSender {
    client: Arc<dyn ManagementClient>,
    sessions: Arc<dyn SessionStore>,
    gateways: Arc<dyn GatewayRegistry>,
}

impl MessageSender {
    pub fn new(
        client: Arc<dyn ManagementClient>,
        sessions: Arc<dyn SessionStore>,
        gateways: Arc<dyn GatewayRegistry>,
    ) -> Self {
        Self {
            client,
            sessions,
            gateways,
        }
    }

    async fn gateway_for(&self, session: &Session) -> Result<GatewayConfig> {
        let api_id = session.api_id.as_deref().ok_or_else(|| {
            WsError::InvalidState(format!(
                "session {} is not bound to a gateway",
                session.connection_id
            ))
        })?;

        self.gateways
            .find_by_api_id(api_id)
            .await?
            .ok_or_else(|| WsError::InvalidState(format!("gateway {} is not registered", api_id)))
    }

    /// Push `data` as JSON to one session
    pub async fn send_message(&self, session: &Session, data: &Value) -> Result<DeliveryOutcome> {
        let gateway = self.gateway_for(session).await?;
        self.deliver(&gateway, session, &serde_json::to_vec(data)?)
            .await
    }

    async fn deliver(
        &self,
        gateway: &GatewayConfig,
        session: &Session,
        payload: &[u8],
    ) -> Result<DeliveryOutcome> {
        match self
            .client
            .post_to_connection(gateway, &session.connection_id, payload)
            .await
        {
            Ok(()) => {
                debug!("Delivered message to {}", session.connection_id);
                Ok(DeliveryOutcome::Delivered)
            }
            Err(DeliveryError::Gone) => {
                warn!(
                    "Connection {} is gone, marking session disconnected",
                    session.connection_id
                );
                match self.sessions.mark_disconnected(&session.connection_id).await {
                    Ok(()) | Err(WsError::SessionNotFound(_)) => Ok(DeliveryOutcome::Gone),
                    Err(e) => Err(e),
                }
            }
            Err(DeliveryError::Other(msg)) => Err(WsError::Delivery(msg)),
        }
    }

    /// Push `data` to every connected session on `channel`
    ///
    /// A failure for one session does not stop delivery to the rest.
    pub async fn send_to_channel(
        &self,
        channel: &str,
        data: &Value,
    ) -> Result<Vec<(String, Result<DeliveryOutcome>)>> {
        let payload = serde_json::to_vec(data)?;
        let sessions = self.sessions.list_connected(Some(channel)).await?;
        let mut gateways: HashMap<String, GatewayConfig> = HashMap::new();
        let mut outcomes = Vec::with_capacity(sessions.len());

        for session in sessions {
            let key = session.api_id.clone().unwrap_or_default();
            if !gateways.contains_key(&key) {
                match self.gateway_for(&session).await {
                    Ok(gateway) => {
                        gateways.insert(key.clone(), gateway);
                    }
                    Err(e) => {
                        warn!("Skipping {}: {}", session.connection_id, e);
                        outcomes.push((session.connection_id, Err(e)));
                        continue;
                    }
                }
            }

            let outcome = match gateways.get(&key) {
                Some(gateway) => self.deliver(gateway, &session, &payload).await,
                None => Err(WsError::InvalidState(format!("gateway {} is not registered", key))),
            };
            outcomes.push((session.connection_id, outcome));
        }

        info!(
            "Channel {} broadcast reached {} sessions",
            channel,
            outcomes
                .iter()
                .filter(|(_, o)| matches!(o, Ok(DeliveryOutcome::Delivered)))
                .count()
        );
        Ok(outcomes)
    }
}

use apigw_ws_common::{GatewayConfig, Result, Session, WsError, current_timestamp_secs};
use async_trait::async_trait;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use std::collections::HashMap;
use tracing::{debug, error, info};

use super::{GatewayRegistry, SessionStore};

/// GSI on the gateways table, partition key `apiId`
const API_ID_INDEX: &str = "api-id-index";

type Item = HashMap<String, AttributeValue>;

fn store_error(context: &str, e: impl std::fmt::Display) -> WsError {
    WsError::Store(format!("{}: {}", context, e))
}

fn from_item<T: serde::de::DeserializeOwned>(item: Item) -> Result<T> {
    serde_dynamo::from_item(item).map_err(|e| store_error("Failed to decode DynamoDB item", e))
}

fn to_item<T: serde::Serialize>(value: &T) -> Result<Item> {
    serde_dynamo::to_item(value).map_err(|e| store_error("Failed to encode DynamoDB item", e))
}

/// Sessions table, partition key `connectionId`
#[derive(Debug, Clone)]
pub struct DynamoSessionStore {
    client: DynamoDbClient,
    table_name: String,
}

impl DynamoSessionStore {
    pub fn new(client: DynamoDbClient, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    fn key(connection_id: &str) -> AttributeValue {
        AttributeValue::S(connection_id.to_string())
    }

    /// Scan with a filter, following pagination
    async fn scan_sessions(
        &self,
        filter: &str,
        values: Vec<(&str, AttributeValue)>,
    ) -> Result<Vec<Session>> {
        let mut sessions = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let mut request = self
                .client
                .scan()
                .table_name(&self.table_name)
                .filter_expression(filter)
                .set_exclusive_start_key(start_key.take());
            for (name, value) in &values {
                request = request.expression_attribute_values(*name, value.clone());
            }

            let result = request
                .send()
                .await
                .map_err(|e| store_error("Failed to scan sessions", e))?;

            for item in result.items.unwrap_or_default() {
                sessions.push(from_item(item)?);
            }

            match result.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        Ok(sessions)
    }
}

#[async_trait]
impl SessionStore for DynamoSessionStore {
    async fn create(&self, session: &Session) -> Result<()> {
        let item = to_item(session)?;

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(connectionId)")
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error()
                    .is_some_and(|se| se.is_conditional_check_failed_exception())
                {
                    WsError::DuplicateSession(session.connection_id.clone())
                } else {
                    store_error("Failed to save session to DynamoDB", e)
                }
            })?;

        debug!("Saved session: {}", session.connection_id);
        Ok(())
    }

    async fn get(&self, connection_id: &str) -> Result<Session> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("connectionId", Self::key(connection_id))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| store_error("Failed to get session from DynamoDB", e))?;

        let item = result
            .item
            .ok_or_else(|| WsError::SessionNotFound(connection_id.to_string()))?;
        from_item(item)
    }

    async fn record_request(&self, connection_id: &str) -> Result<Session> {
        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("connectionId", Self::key(connection_id))
            .update_expression("ADD requestCount :one SET updatedOn = :now")
            .condition_expression("attribute_exists(connectionId)")
            .expression_attribute_values(":one", AttributeValue::N("1".to_string()))
            .expression_attribute_values(
                ":now",
                AttributeValue::N(current_timestamp_secs().to_string()),
            )
            .return_values(ReturnValue::AllNew)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error()
                    .is_some_and(|se| se.is_conditional_check_failed_exception())
                {
                    WsError::SessionNotFound(connection_id.to_string())
                } else {
                    store_error("Failed to update session request count", e)
                }
            })?;

        let item = result
            .attributes
            .ok_or_else(|| WsError::Store("Update returned no attributes".to_string()))?;
        from_item(item)
    }

    async fn mark_disconnected(&self, connection_id: &str) -> Result<()> {
        self.client
            .update_item()
            .table_name(&self.table_name)
            .key("connectionId", Self::key(connection_id))
            .update_expression("SET connected = :connected, updatedOn = :now")
            .condition_expression("attribute_exists(connectionId)")
            .expression_attribute_values(":connected", AttributeValue::Bool(false))
            .expression_attribute_values(
                ":now",
                AttributeValue::N(current_timestamp_secs().to_string()),
            )
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error()
                    .is_some_and(|se| se.is_conditional_check_failed_exception())
                {
                    WsError::SessionNotFound(connection_id.to_string())
                } else {
                    store_error("Failed to mark session disconnected", e)
                }
            })?;

        Ok(())
    }

    async fn list_connected(&self, channel: Option<&str>) -> Result<Vec<Session>> {
        let mut values = vec![(":connected", AttributeValue::Bool(true))];
        let filter = match channel {
            Some(channel) => {
                values.push((":channel", AttributeValue::S(channel.to_string())));
                "connected = :connected AND channelName = :channel"
            }
            None => "connected = :connected",
        };

        self.scan_sessions(filter, values).await
    }

    async fn purge_disconnected(&self) -> Result<u32> {
        let stale = self
            .scan_sessions(
                "connected = :connected",
                vec![(":connected", AttributeValue::Bool(false))],
            )
            .await?;

        let mut deleted = 0;
        for session in stale {
            match self
                .client
                .delete_item()
                .table_name(&self.table_name)
                .key("connectionId", Self::key(&session.connection_id))
                .send()
                .await
            {
                Ok(_) => deleted += 1,
                Err(e) => {
                    error!(
                        "Failed to delete session {} from {}: {}",
                        session.connection_id, self.table_name, e
                    );
                }
            }
        }

        info!("Purged {} disconnected sessions", deleted);
        Ok(deleted)
    }
}

/// Gateways table, partition key `apiName`
#[derive(Debug, Clone)]
pub struct DynamoGatewayRegistry {
    client: DynamoDbClient,
    table_name: String,
}

impl DynamoGatewayRegistry {
    pub fn new(client: DynamoDbClient, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }
}

#[async_trait]
impl GatewayRegistry for DynamoGatewayRegistry {
    async fn find_by_api_id(&self, api_id: &str) -> Result<Option<GatewayConfig>> {
        let result = self
            .client
            .query()
            .table_name(&self.table_name)
            .index_name(API_ID_INDEX)
            .key_condition_expression("apiId = :api_id")
            .expression_attribute_values(":api_id", AttributeValue::S(api_id.to_string()))
            .limit(1)
            .send()
            .await
            .map_err(|e| store_error("Failed to query gateway by API ID", e))?;

        match result.items.unwrap_or_default().into_iter().next() {
            Some(item) => Ok(Some(from_item(item)?)),
            None => Ok(None),
        }
    }

    async fn get(&self, api_name: &str) -> Result<Option<GatewayConfig>> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("apiName", AttributeValue::S(api_name.to_string()))
            .send()
            .await
            .map_err(|e| store_error("Failed to get gateway from DynamoDB", e))?;

        result.item.map(from_item).transpose()
    }

    async fn save(&self, gateway: &GatewayConfig) -> Result<()> {
        let item = to_item(gateway)?;

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|e| store_error("Failed to save gateway to DynamoDB", e))?;

        debug!("Saved gateway: {}", gateway.api_name);
        Ok(())
    }
}

use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::constants::{API_ID_HEADER, CONNECTION_ID_HEADER};
use crate::error::{Result, WsError};
use crate::utils::header_value;

/// An inbound lifecycle or data event, as proxied by API Gateway over HTTP
#[derive(Debug, Clone)]
pub struct WebSocketRequest {
    pub method: Method,

    /// Route slug from the path: `connect`, `disconnect` or a custom action
    pub route: String,

    pub headers: HeaderMap,

    pub query: HashMap<String, String>,

    /// Raw UTF-8 body
    pub body: String,

    /// Authenticated principal resolved by the hosting layer
    pub principal: Option<String>,
}

impl WebSocketRequest {
    pub fn new(method: Method, route: impl Into<String>) -> Self {
        Self {
            method,
            route: route.into(),
            headers: HeaderMap::new(),
            query: HashMap::new(),
            body: String::new(),
            principal: None,
        }
    }

    /// Add a header; invalid names or values are skipped
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_principal(mut self, principal: Option<String>) -> Self {
        self.principal = principal;
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        header_value(&self.headers, name)
    }

    pub fn connection_id(&self) -> Option<&str> {
        self.header(CONNECTION_ID_HEADER)
    }

    pub fn api_id(&self) -> Option<&str> {
        self.header(API_ID_HEADER)
    }

    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    /// Parse the body as a JSON object; an empty body is an empty object
    pub fn json_body(&self) -> Result<Map<String, Value>> {
        if self.body.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str(&self.body)? {
            Value::Object(map) => Ok(map),
            _ => Err(WsError::InvalidState(
                "request body is not a JSON object".to_string(),
            )),
        }
    }
}

//! API Gateway WebSocket callback handler
//!
//! API Gateway proxies each WebSocket lifecycle event and data frame to this
//! service as an HTTP POST. This crate validates those callbacks, tracks the
//! resulting sessions, pushes messages back through the management API and
//! provisions the gateways themselves.

use apigw_ws_common::{HttpResponse, WebSocketRequest};
use aws_lambda_events::apigw::{ApiGatewayProxyRequest, ApiGatewayProxyResponse};
use aws_lambda_events::encodings::Body;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::warn;

pub mod auth;
pub mod authorizer;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error_handling;
pub mod handlers;
pub mod lifecycle;
pub mod management;
pub mod provisioning;
pub mod store;

use crate::config::HandlerConfig;

/// Path parameter carrying the route slug, e.g. `/ws/{route}`
const ROUTE_PATH_PARAM: &str = "route";

/// Last non-empty path segment
/// Example: "/ws/connect/" -> "connect"
pub fn extract_route_from_path(path: &str) -> String {
    path.split('/')
        .rev()
        .find(|segment| !segment.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Convert a proxied API Gateway request into a callback
pub fn build_websocket_request(
    request: &ApiGatewayProxyRequest,
    config: &HandlerConfig,
) -> WebSocketRequest {
    let route = request
        .path_parameters
        .get(ROUTE_PATH_PARAM)
        .cloned()
        .unwrap_or_else(|| extract_route_from_path(request.path.as_deref().unwrap_or("/")));

    let query = request
        .query_string_parameters
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    let body = match request.body.as_deref() {
        Some(b) if request.is_base64_encoded => match STANDARD.decode(b) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                warn!("Failed to decode base64 body: {}", e);
                b.to_string()
            }
        },
        Some(b) => b.to_string(),
        None => String::new(),
    };

    let mut ws_request = WebSocketRequest::new(request.http_method.clone(), route);
    ws_request.headers = request.headers.clone();
    ws_request.query = query;
    ws_request.body = body;
    ws_request.principal = auth::resolve_principal(
        &ws_request.headers,
        &ws_request.query,
        config.jwt_secret.as_deref(),
    );
    ws_request
}

/// Build API Gateway response from a dispatch response
pub fn build_api_gateway_response(response: HttpResponse) -> ApiGatewayProxyResponse {
    let body = if !response.body.is_empty() {
        Some(Body::Text(response.body))
    } else {
        None
    };

    ApiGatewayProxyResponse {
        status_code: response.status_code as i64,
        headers: response.headers,
        multi_value_headers: Default::default(),
        body,
        is_base64_encoded: false,
    }
}

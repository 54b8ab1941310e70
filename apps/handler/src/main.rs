//! WebSocket callback Lambda
//!
//! Handles two kinds of event by inspecting the incoming payload:
//! - API Gateway proxy requests (connect, disconnect and custom routes) - dispatched
//! - EventBridge scheduled events - disconnected session cleanup

use apigw_ws_handler::config::HandlerConfig;
use apigw_ws_handler::dispatcher::Dispatcher;
use apigw_ws_handler::error_handling::error_response;
use apigw_ws_handler::handlers::handle_cleanup;
use apigw_ws_handler::store::{DynamoGatewayRegistry, DynamoSessionStore};
use apigw_ws_handler::{build_api_gateway_response, build_websocket_request};
use aws_lambda_events::apigw::ApiGatewayProxyRequest;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use lambda_runtime::{Error, LambdaEvent, run, service_fn};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Event types the handler can process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventType {
    HttpProxy,
    ScheduledCleanup,
}

/// Detect event type by inspecting the JSON structure
fn detect_event_type(value: &Value) -> Result<EventType, Error> {
    if value.get("source").and_then(Value::as_str) == Some("aws.events") {
        return Ok(EventType::ScheduledCleanup);
    }

    // API Gateway proxy format 1.0
    if value.get("httpMethod").is_some() {
        return Ok(EventType::HttpProxy);
    }

    Err("Unable to determine event type from payload".into())
}

async fn function_handler(event: LambdaEvent<Value>, dispatcher: &Dispatcher) -> Result<Value, Error> {
    let event_type = detect_event_type(&event.payload)?;

    info!("Processing event type: {:?}", event_type);

    match event_type {
        EventType::HttpProxy => {
            let proxy_request: ApiGatewayProxyRequest = serde_json::from_value(event.payload)
                .map_err(|e| format!("Failed to parse API Gateway proxy event: {}", e))?;
            let request = build_websocket_request(&proxy_request, dispatcher.config());

            let response = match dispatcher.dispatch(&request).await {
                Ok(response) => response,
                Err(e) => error_response(&e),
            };
            if response.is_success() {
                info!(route = %request.route, status = response.status_code, "Callback handled");
            } else {
                warn!(route = %request.route, status = response.status_code, "Callback rejected");
            }

            serde_json::to_value(build_api_gateway_response(response))
                .map_err(|e| format!("Failed to serialize response: {}", e).into())
        }
        EventType::ScheduledCleanup => {
            handle_cleanup(event.payload, dispatcher.sessions().as_ref()).await
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize tracing subscriber for CloudWatch Logs
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .without_time()
        .init();

    info!("WebSocket callback handler starting");

    let config = Arc::new(HandlerConfig::from_env()?);
    if config.debug {
        info!("Per-request debug log enabled");
    }

    // Initialize AWS SDK
    let sdk_config = aws_config::load_from_env().await;
    let dynamodb = DynamoDbClient::new(&sdk_config);

    let sessions = Arc::new(DynamoSessionStore::new(
        dynamodb.clone(),
        config.sessions_table.clone(),
    ));
    let gateways = Arc::new(DynamoGatewayRegistry::new(
        dynamodb,
        config.gateways_table.clone(),
    ));
    let dispatcher = Dispatcher::new(config, sessions, gateways);

    // Run the Lambda runtime
    run(service_fn(|event: LambdaEvent<Value>| {
        function_handler(event, &dispatcher)
    }))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_detect_proxy_event() {
        let event = json!({
            "httpMethod": "POST",
            "path": "/ws/connect",
            "headers": {"Connectionid": "abc="},
            "requestContext": {"stage": "production"}
        });

        assert_eq!(detect_event_type(&event).unwrap(), EventType::HttpProxy);
    }

    #[test]
    fn test_detect_scheduled_cleanup() {
        let event = json!({
            "source": "aws.events",
            "detail-type": "Scheduled Event",
            "detail": {}
        });

        assert_eq!(
            detect_event_type(&event).unwrap(),
            EventType::ScheduledCleanup
        );
    }

    #[test]
    fn test_detect_unknown_event() {
        let event = json!({"Records": []});

        assert!(detect_event_type(&event).is_err());
    }
}

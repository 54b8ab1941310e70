/// Headers every proxied callback must carry
pub const REQUIRED_HEADERS: &[&str] = &[
    "Host",
    "X-Forwarded-For",
    "X-Forwarded-Proto",
    "Content-Length",
    "Connectionid",
    "User-Agent",
    "X-Amzn-Apigateway-Api-Id",
];

/// Extra headers API Gateway adds to every integration request
pub const ADDITIONAL_REQUIRED_HEADERS: &[&str] = &[
    "Connection",
    "X-Amzn-Trace-Id",
    "X-Forwarded-Port",
    "X-Real-Ip",
];

/// Handshake headers, only present on the `connect` route
pub const CONNECTION_HEADERS: &[&str] = &[
    "Cookie",
    "Origin",
    "Sec-Websocket-Extensions",
    "Sec-Websocket-Key",
    "Sec-Websocket-Version",
];

/// User-Agent prefix API Gateway uses for its own integration calls
pub const EXPECTED_USERAGENT_PREFIX: &str = "AmazonAPIGateway_";

/// Header carrying the API Gateway connection ID
pub const CONNECTION_ID_HEADER: &str = "Connectionid";

/// Header carrying the calling API Gateway's ID
pub const API_ID_HEADER: &str = "X-Amzn-Apigateway-Api-Id";

/// Default body key naming the custom action
pub const DEFAULT_ACTION_KEY: &str = "action";

/// Query parameter selecting the channel at connect time
pub const CHANNEL_QUERY_PARAM: &str = "channel";

/// Route slugs with lifecycle meaning
pub const CONNECT_ROUTE: &str = "connect";
pub const DISCONNECT_ROUTE: &str = "disconnect";

/// Routes created on every gateway
pub const BUILTIN_ROUTE_KEYS: &[&str] = &["$connect", "$disconnect", "$default"];

/// Integration timeout (API Gateway maximum is 29 seconds)
pub const INTEGRATION_TIMEOUT_MILLIS: i32 = 29_000;
const _: () = assert!(INTEGRATION_TIMEOUT_MILLIS <= 29_000);

/// Default stage for new gateways
pub const DEFAULT_STAGE_NAME: &str = "production";

/// Default route selection expression for new gateways
pub const DEFAULT_ROUTE_SELECTION_EXPRESSION: &str = "$request.body.action";

/// Default API key selection expression for new gateways
pub const DEFAULT_API_KEY_SELECTION_EXPRESSION: &str = "$request.header.x-api-key";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lists_are_disjoint() {
        for name in ADDITIONAL_REQUIRED_HEADERS.iter().chain(CONNECTION_HEADERS) {
            assert!(
                !REQUIRED_HEADERS
                    .iter()
                    .any(|h| h.eq_ignore_ascii_case(name)),
                "{name} listed twice"
            );
        }
    }

    #[test]
    fn test_identity_headers_are_required() {
        assert!(REQUIRED_HEADERS.contains(&CONNECTION_ID_HEADER));
        assert!(REQUIRED_HEADERS.contains(&API_ID_HEADER));
        assert!(REQUIRED_HEADERS.contains(&"User-Agent"));
    }
}

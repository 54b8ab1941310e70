//! Error handling and sanitization
//!
//! Maps dispatch errors to HTTP responses. Caller-caused errors get a short
//! fixed message; everything else is logged in full and returned as a generic
//! 500 so store or SDK details never reach the gateway.

use apigw_ws_common::{HttpResponse, WsError};
use tracing::{error, warn};

/// Sanitize error messages for client responses
///
/// Logs the full error internally but returns a generic message to the client.
///
/// # Examples
///
/// ```
/// use apigw_ws_common::WsError;
/// use apigw_ws_handler::error_handling::sanitize_error;
///
/// let err = WsError::Store("AccessDeniedException on websocket-sessions".to_string());
/// assert_eq!(sanitize_error(&err), "Internal server error");
/// ```
pub fn sanitize_error(e: &WsError) -> String {
    error!("Internal error: {}", e);
    "Internal server error".to_string()
}

/// Convert a dispatch error into the response sent back to API Gateway
pub fn error_response(e: &WsError) -> HttpResponse {
    if !e.is_client_error() {
        return HttpResponse::text(500, sanitize_error(e));
    }

    let (status, message) = match e {
        WsError::SessionNotFound(_) => (404, "Session not found"),
        WsError::DuplicateSession(_) => (409, "Session already exists"),
        _ => (501, "Not implemented"),
    };
    warn!("Client error ({}): {}", status, e);
    HttpResponse::text(status, message)
}

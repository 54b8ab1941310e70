//! Rejection responses
//!
//! Every validation failure becomes a 400 with a short plain-text reason. The
//! detail goes to the logs and the request debug log, never to the caller.

use apigw_ws_common::utils::header_names;
use apigw_ws_common::{HttpResponse, WebSocketRequest};
use tracing::warn;

use crate::config::HandlerConfig;
use crate::context::RequestContext;

/// Shared by header validation and gateway authorization failures, so a
/// prober cannot tell which one tripped
pub fn missing_headers(
    request: &WebSocketRequest,
    config: &HandlerConfig,
    ctx: &mut RequestContext,
) -> HttpResponse {
    ctx.note(format!(
        "Some of the required headers are missing; Expected {:?} + {:?}, Received {:?}",
        config.headers.required,
        config.headers.additional,
        header_names(&request.headers)
    ));
    warn!(route = %request.route, "Rejected callback: headers or gateway");
    HttpResponse::bad_request("Some of the required headers are missing")
}

pub fn invalid_useragent(
    request: &WebSocketRequest,
    config: &HandlerConfig,
    ctx: &mut RequestContext,
) -> HttpResponse {
    ctx.note(format!(
        "Unexpected Useragent; Expected {}{}, Received {:?}",
        config.useragent_prefix,
        config.expected_api_id.as_deref().unwrap_or_default(),
        request.header("User-Agent")
    ));
    warn!(route = %request.route, "Rejected callback: unexpected user agent");
    HttpResponse::bad_request("Unexpected Useragent")
}

pub fn selection_key_missing(key: &str, ctx: &mut RequestContext) -> HttpResponse {
    let msg = format!("Action key {} missing from request body.", key);
    ctx.note(msg.clone());
    warn!("{}", msg);
    HttpResponse::bad_request(msg)
}

pub fn malformed_body(ctx: &mut RequestContext) -> HttpResponse {
    ctx.note("Request body is not a JSON object");
    warn!("Rejected callback: malformed body");
    HttpResponse::bad_request("Malformed request body")
}

//! ConnectHandler - Handles the `connect` route
//!
//! Runs the handshake checks and records the new session.

use apigw_ws_common::validation::{
    has_connection_headers, host_allowed, host_in_origin, missing_headers,
};
use apigw_ws_common::{HttpResponse, Result, WebSocketRequest};
use tracing::warn;

use crate::config::HandlerConfig;
use crate::context::RequestContext;
use crate::dispatcher::ConnectionPolicy;
use crate::lifecycle::open_session;
use crate::store::SessionStore;

/// Handler for the `connect` route
///
/// Checks, in order: handshake headers, Host allow-list, Host within Origin,
/// then the connection policy. Each failure is a 400 naming the check.
pub async fn handle_connect(
    config: &HandlerConfig,
    policy: &dyn ConnectionPolicy,
    store: &dyn SessionStore,
    request: &WebSocketRequest,
    ctx: &mut RequestContext,
) -> Result<Option<HttpResponse>> {
    if !has_connection_headers(&request.headers, &config.headers) {
        let missing = missing_headers(&request.headers, &config.headers.connection);
        ctx.note(format!(
            "Missing headers; Expected {:?}, Missing {:?}",
            config.headers.connection, missing
        ));
        warn!("Connect rejected: {} handshake headers missing", missing.len());
        return Ok(Some(HttpResponse::bad_request(format!(
            "Missing {} headers",
            missing.len()
        ))));
    }

    if !host_allowed(&request.headers, &config.allowed_hosts) {
        ctx.note(format!(
            "Host {:?} is not in allowed hosts {:?}",
            request.header("Host"),
            config.allowed_hosts
        ));
        warn!("Connect rejected: host not allowed");
        return Ok(Some(HttpResponse::bad_request(
            "Host is not in AllowedHosts",
        )));
    }

    if !host_in_origin(&request.headers) {
        ctx.note("Host is not in Origin");
        warn!("Connect rejected: host not in origin");
        return Ok(Some(HttpResponse::bad_request("Host is not in Origin")));
    }

    if let Err(reason) = policy.check(request, ctx).await {
        ctx.note(format!("Connection policy rejected: {}", reason));
        warn!("Connect rejected by policy: {}", reason);
        return Ok(Some(HttpResponse::bad_request(reason)));
    }

    open_session(store, request, ctx).await?;

    Ok(Some(HttpResponse::empty_json()))
}

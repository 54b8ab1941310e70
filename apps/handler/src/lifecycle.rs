//! Session lifecycle
//!
//! A session is created on a validated `connect`, has its request counter
//! bumped on every later authenticated event, and is flagged disconnected on
//! `disconnect` or when delivery finds the peer gone.

use apigw_ws_common::constants::CHANNEL_QUERY_PARAM;
use apigw_ws_common::validation::validate_connection_id;
use apigw_ws_common::{GatewayConfig, Result, Session, WebSocketRequest, WsError};
use tracing::info;

use crate::context::RequestContext;
use crate::store::SessionStore;

/// Pick the channel for a new session
///
/// A non-empty `channel` query parameter wins, then the gateway default, then "".
pub fn resolve_channel_name(request: &WebSocketRequest, gateway: Option<&GatewayConfig>) -> String {
    if let Some(channel) = request
        .query_param(CHANNEL_QUERY_PARAM)
        .filter(|c| !c.is_empty())
    {
        return channel.to_string();
    }

    gateway
        .map(|g| g.default_channel_name.clone())
        .unwrap_or_default()
}

fn connection_id(request: &WebSocketRequest) -> Result<&str> {
    let id = request
        .connection_id()
        .ok_or_else(|| WsError::InvalidState("missing Connectionid header".to_string()))?;
    validate_connection_id(id).map_err(|e| WsError::InvalidState(e.to_string()))?;
    Ok(id)
}

/// Persist a new session for a validated connect
pub async fn open_session(
    store: &dyn SessionStore,
    request: &WebSocketRequest,
    ctx: &mut RequestContext,
) -> Result<Session> {
    let session = Session::new(connection_id(request)?)
        .with_channel(resolve_channel_name(request, ctx.gateway.as_ref()))
        .with_user(request.principal.clone())
        .with_gateway(ctx.gateway.as_ref());

    store.create(&session).await?;

    info!(
        connection_id = %session.connection_id,
        channel = %session.channel_name,
        "WebSocket session opened"
    );
    ctx.user = session.user_id.clone();
    ctx.session = Some(session.clone());
    Ok(session)
}

/// Load the caller's session into the context
pub async fn load_session(
    store: &dyn SessionStore,
    request: &WebSocketRequest,
    ctx: &mut RequestContext,
) -> Result<()> {
    let session = store.get(connection_id(request)?).await?;
    ctx.note(format!("loaded session {}", session.connection_id));
    ctx.session = Some(session);
    Ok(())
}

/// Count the event against the session and attach its user to the context
pub async fn record_request(
    store: &dyn SessionStore,
    request: &WebSocketRequest,
    ctx: &mut RequestContext,
) -> Result<()> {
    let session = store.record_request(connection_id(request)?).await?;
    if session.user_id.is_some() {
        ctx.user = session.user_id.clone();
    }
    ctx.note(format!(
        "session {} request count now {}",
        session.connection_id, session.request_count
    ));
    ctx.session = Some(session);
    Ok(())
}

/// Flag the caller's session as disconnected
pub async fn close_session(
    store: &dyn SessionStore,
    request: &WebSocketRequest,
    ctx: &mut RequestContext,
) -> Result<()> {
    let connection_id = connection_id(request)?;
    store.mark_disconnected(connection_id).await?;

    if let Some(session) = ctx.session.as_mut() {
        session.connected = false;
    }
    info!(connection_id = %connection_id, "WebSocket session closed");
    Ok(())
}

//! DisconnectHandler - Handles the `disconnect` route

use apigw_ws_common::{HttpResponse, Result, WebSocketRequest};

use crate::context::RequestContext;
use crate::lifecycle::close_session;
use crate::store::SessionStore;

/// Handler for the `disconnect` route
///
/// The session was already loaded and counted by the dispatcher; this only
/// flips it to disconnected. The caller gets an empty success.
pub async fn handle_disconnect(
    store: &dyn SessionStore,
    request: &WebSocketRequest,
    ctx: &mut RequestContext,
) -> Result<Option<HttpResponse>> {
    close_session(store, request, ctx).await?;
    Ok(None)
}

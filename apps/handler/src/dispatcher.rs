//! Inbound callback dispatch
//!
//! Every API Gateway callback passes the same gates in a fixed order:
//! body parse, required headers, gateway authorization, method, then the
//! route branch. Nothing touches the session store before the header and
//! gateway gates pass.

use apigw_ws_common::constants::{CONNECT_ROUTE, DISCONNECT_ROUTE};
use apigw_ws_common::validation::{has_required_headers, useragent_expected};
use apigw_ws_common::{HttpResponse, Result, WebSocketRequest, WsError};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::authorizer::GatewayAuthorizer;
use crate::config::HandlerConfig;
use crate::context::RequestContext;
use crate::handlers::{self, reject};
use crate::lifecycle;
use crate::store::{GatewayRegistry, SessionStore};

/// A custom action invocation
pub struct ActionCall<'a> {
    /// Action name taken from the body
    ///
    /// When the body names no action the default handler runs and this
    /// carries the route, for diagnostics only.
    pub action: &'a str,
    pub request: &'a WebSocketRequest,
    pub body: &'a Map<String, Value>,
}

/// Handler for a custom (non connect/disconnect) route
///
/// Returning `Ok(None)` answers the caller with an empty JSON object.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn handle(
        &self,
        call: ActionCall<'_>,
        ctx: &mut RequestContext,
    ) -> Result<Option<HttpResponse>>;
}

/// Fallback for actions with no registered handler
pub struct NotImplementedHandler;

#[async_trait]
impl ActionHandler for NotImplementedHandler {
    async fn handle(
        &self,
        call: ActionCall<'_>,
        _ctx: &mut RequestContext,
    ) -> Result<Option<HttpResponse>> {
        Err(WsError::NotImplemented(call.action.to_string()))
    }
}

/// Extra acceptance check run last during `connect`
///
/// An `Err` carries the reason returned to the caller with a 400.
#[async_trait]
pub trait ConnectionPolicy: Send + Sync {
    async fn check(
        &self,
        request: &WebSocketRequest,
        ctx: &RequestContext,
    ) -> std::result::Result<(), String>;
}

/// Accepts every connection that passed the handshake checks
pub struct AllowAll;

#[async_trait]
impl ConnectionPolicy for AllowAll {
    async fn check(
        &self,
        _request: &WebSocketRequest,
        _ctx: &RequestContext,
    ) -> std::result::Result<(), String> {
        Ok(())
    }
}

pub struct Dispatcher {
    config: Arc<HandlerConfig>,
    sessions: Arc<dyn SessionStore>,
    authorizer: GatewayAuthorizer,
    policy: Arc<dyn ConnectionPolicy>,
    actions: HashMap<String, Arc<dyn ActionHandler>>,
    default_handler: Arc<dyn ActionHandler>,
}

impl Dispatcher {
    pub fn new(
        config: Arc<HandlerConfig>,
        sessions: Arc<dyn SessionStore>,
        registry: Arc<dyn GatewayRegistry>,
    ) -> Self {
        let authorizer = GatewayAuthorizer::new(registry, config.expected_api_id.clone());
        Self {
            config,
            sessions,
            authorizer,
            policy: Arc::new(AllowAll),
            actions: HashMap::new(),
            default_handler: Arc::new(NotImplementedHandler),
        }
    }

    pub fn with_policy(mut self, policy: Arc<dyn ConnectionPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_default_handler(mut self, handler: Arc<dyn ActionHandler>) -> Self {
        self.default_handler = handler;
        self
    }

    /// Register a handler for an action name
    pub fn register(mut self, action: impl Into<String>, handler: Arc<dyn ActionHandler>) -> Self {
        self.actions.insert(action.into(), handler);
        self
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// Dispatch one callback with a fresh context
    pub async fn dispatch(&self, request: &WebSocketRequest) -> Result<HttpResponse> {
        let mut ctx = RequestContext::new(self.config.debug);
        self.dispatch_with_context(request, &mut ctx).await
    }

    /// Dispatch one callback, leaving what was learned in `ctx`
    pub async fn dispatch_with_context(
        &self,
        request: &WebSocketRequest,
        ctx: &mut RequestContext,
    ) -> Result<HttpResponse> {
        ctx.note("Within setup");
        debug!(route = %request.route, method = %request.method, "Dispatching callback");

        let body = match request.json_body() {
            Ok(body) => body,
            Err(e) => {
                ctx.note(format!("body parse failed: {}", e));
                return Ok(reject::malformed_body(ctx));
            }
        };

        let headers_ok = has_required_headers(&request.headers, &self.config.headers);
        ctx.note(format!("required headers present: {}", headers_ok));
        if !headers_ok {
            return Ok(reject::missing_headers(request, &self.config, ctx));
        }

        if !self.authorizer.authorize(request.api_id(), ctx).await {
            return Ok(reject::missing_headers(request, &self.config, ctx));
        }

        if !self.config.allowed_methods.contains(&request.method) {
            ctx.note(format!("method {} not allowed", request.method));
            return Ok(HttpResponse::method_not_allowed(&self.config.allowed_methods));
        }

        let response = match request.route.as_str() {
            CONNECT_ROUTE => {
                handlers::handle_connect(
                    &self.config,
                    self.policy.as_ref(),
                    self.sessions.as_ref(),
                    request,
                    ctx,
                )
                .await?
            }
            DISCONNECT_ROUTE => {
                if !self.useragent_ok(request, ctx) {
                    return Ok(reject::invalid_useragent(request, &self.config, ctx));
                }
                lifecycle::record_request(self.sessions.as_ref(), request, ctx).await?;
                handlers::handle_disconnect(self.sessions.as_ref(), request, ctx).await?
            }
            _ => {
                if !self.has_selection_key(&body) {
                    return Ok(reject::selection_key_missing(&self.config.action_key, ctx));
                }
                lifecycle::load_session(self.sessions.as_ref(), request, ctx).await?;
                if !self.useragent_ok(request, ctx) {
                    return Ok(reject::invalid_useragent(request, &self.config, ctx));
                }
                lifecycle::record_request(self.sessions.as_ref(), request, ctx).await?;

                let (action, handler) = match self.action_name(&body) {
                    Some(name) => (
                        name,
                        self.actions
                            .get(name)
                            .cloned()
                            .unwrap_or_else(|| self.default_handler.clone()),
                    ),
                    None => (request.route.as_str(), self.default_handler.clone()),
                };
                info!(route = %request.route, action = %action, "Invoking action handler");

                let call = ActionCall {
                    action,
                    request,
                    body: &body,
                };
                handler.handle(call, ctx).await?
            }
        };

        Ok(response.unwrap_or_else(HttpResponse::empty_json))
    }

    /// Selection keys in lookup order: handler key first, then action key
    fn selection_keys(&self) -> impl Iterator<Item = &str> {
        self.config
            .handler_key
            .as_deref()
            .into_iter()
            .chain(std::iter::once(self.config.action_key.as_str()))
    }

    fn has_selection_key(&self, body: &Map<String, Value>) -> bool {
        self.selection_keys().any(|key| body.contains_key(key))
    }

    /// First non-empty string value among the selection keys
    fn action_name<'b>(&self, body: &'b Map<String, Value>) -> Option<&'b str> {
        self.selection_keys()
            .filter_map(|key| body.get(key).and_then(Value::as_str))
            .find(|name| !name.is_empty())
    }

    fn useragent_ok(&self, request: &WebSocketRequest, ctx: &mut RequestContext) -> bool {
        let ok = useragent_expected(
            &request.headers,
            self.config.expected_api_id.as_deref(),
            &self.config.useragent_prefix,
        );
        ctx.note(format!("useragent check returned {}", ok));
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryGatewayRegistry, MemorySessionStore};
    use http::Method;
    use serde_json::json;

    fn dispatcher(config: HandlerConfig) -> Dispatcher {
        Dispatcher::new(
            Arc::new(config),
            Arc::new(MemorySessionStore::new()),
            Arc::new(MemoryGatewayRegistry::new()),
        )
    }

    fn body(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_action_name_prefers_handler_key() {
        let mut config = HandlerConfig::default();
        config.handler_key = Some("handler".to_string());
        let d = dispatcher(config);

        let b = body(json!({"handler": "echo", "action": "chat"}));
        assert_eq!(d.action_name(&b), Some("echo"));

        let b = body(json!({"handler": "", "action": "chat"}));
        assert_eq!(d.action_name(&b), Some("chat"));
    }

    #[test]
    fn test_selection_key_presence() {
        let mut config = HandlerConfig::default();
        config.handler_key = Some("handler".to_string());
        let d = dispatcher(config);

        assert!(d.has_selection_key(&body(json!({"handler": 1}))));
        assert!(d.has_selection_key(&body(json!({"action": null}))));
        assert!(!d.has_selection_key(&body(json!({"message": "hi"}))));
    }

    #[test]
    fn test_action_name_ignores_non_strings() {
        let d = dispatcher(HandlerConfig::default());
        assert_eq!(d.action_name(&body(json!({"action": 7}))), None);
    }

    #[tokio::test]
    async fn test_not_implemented_handler() {
        let request = WebSocketRequest::new(Method::POST, "chat");
        let b = Map::new();
        let mut ctx = RequestContext::new(false);

        let result = NotImplementedHandler
            .handle(
                ActionCall {
                    action: "chat",
                    request: &request,
                    body: &b,
                },
                &mut ctx,
            )
            .await;

        assert!(matches!(result, Err(WsError::NotImplemented(a)) if a == "chat"));
    }

    #[tokio::test]
    async fn test_allow_all_policy() {
        let request = WebSocketRequest::new(Method::POST, "connect");
        let ctx = RequestContext::new(false);
        assert!(AllowAll.check(&request, &ctx).await.is_ok());
    }
}

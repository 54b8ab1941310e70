//! Dispatch scenarios across the handler modules
//!
//! These drive full callbacks through the `Dispatcher` against in-memory stores.

#[cfg(test)]
mod dispatch_tests {
    use crate::config::HandlerConfig;
    use crate::context::RequestContext;
    use crate::dispatcher::{ActionCall, ActionHandler, ConnectionPolicy, Dispatcher};
    use crate::store::{GatewayRegistry, MemoryGatewayRegistry, MemorySessionStore, SessionStore};
    use apigw_ws_common::constants::{
        ADDITIONAL_REQUIRED_HEADERS, CONNECTION_HEADERS, REQUIRED_HEADERS,
    };
    use apigw_ws_common::{GatewayConfig, HttpResponse, Result, Session, WebSocketRequest, WsError};
    use async_trait::async_trait;
    use http::Method;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const API_ID: &str = "api-1";
    const CONN_ID: &str = "conn-1=";

    /// Session store that counts calls and fails every one of them
    #[derive(Default)]
    struct CountingStore {
        calls: AtomicUsize,
    }

    impl CountingStore {
        fn hit(&self) -> WsError {
            self.calls.fetch_add(1, Ordering::SeqCst);
            WsError::Store("unexpected store access".to_string())
        }
    }

    #[async_trait]
    impl SessionStore for CountingStore {
        async fn create(&self, _session: &Session) -> Result<()> {
            Err(self.hit())
        }
        async fn get(&self, _connection_id: &str) -> Result<Session> {
            Err(self.hit())
        }
        async fn record_request(&self, _connection_id: &str) -> Result<Session> {
            Err(self.hit())
        }
        async fn mark_disconnected(&self, _connection_id: &str) -> Result<()> {
            Err(self.hit())
        }
        async fn list_connected(&self, _channel: Option<&str>) -> Result<Vec<Session>> {
            Err(self.hit())
        }
        async fn purge_disconnected(&self) -> Result<u32> {
            Err(self.hit())
        }
    }

    struct Echo;

    #[async_trait]
    impl ActionHandler for Echo {
        async fn handle(
            &self,
            call: ActionCall<'_>,
            ctx: &mut RequestContext,
        ) -> Result<Option<HttpResponse>> {
            let value = serde_json::json!({
                "action": call.action,
                "text": call.body.get("text"),
                "user": ctx.user,
                "count": ctx.session.as_ref().map(|s| s.request_count),
            });
            Ok(Some(HttpResponse::json(200, &value)))
        }
    }

    struct DenyAll;

    #[async_trait]
    impl ConnectionPolicy for DenyAll {
        async fn check(
            &self,
            _request: &WebSocketRequest,
            _ctx: &RequestContext,
        ) -> std::result::Result<(), String> {
            Err("Connections are closed".to_string())
        }
    }

    fn registry() -> Arc<MemoryGatewayRegistry> {
        Arc::new(MemoryGatewayRegistry::with_gateways([GatewayConfig::new(
            "chat",
        )
        .with_api_id(API_ID)
        .with_default_channel("xyz")]))
    }

    fn setup(config: HandlerConfig) -> (Dispatcher, Arc<MemorySessionStore>) {
        let store = Arc::new(MemorySessionStore::new());
        let dispatcher = Dispatcher::new(Arc::new(config), store.clone(), registry());
        (dispatcher, store)
    }

    /// Replace any existing value of a header
    fn set(mut request: WebSocketRequest, name: &str, value: &str) -> WebSocketRequest {
        request.headers.remove(name);
        request.with_header(name, value)
    }

    fn callback(route: &str) -> WebSocketRequest {
        let mut request = WebSocketRequest::new(Method::POST, route);
        for name in REQUIRED_HEADERS.iter().chain(ADDITIONAL_REQUIRED_HEADERS) {
            request = request.with_header(name, "x");
        }
        let request = set(request, "Host", "ws.example.com");
        let request = set(request, "Connectionid", CONN_ID);
        let request = set(request, "X-Amzn-Apigateway-Api-Id", API_ID);
        set(request, "User-Agent", "AmazonAPIGateway_proxy")
    }

    fn connect_callback() -> WebSocketRequest {
        let mut request = callback("connect");
        for name in CONNECTION_HEADERS {
            request = request.with_header(name, "x");
        }
        set(request, "Origin", "https://ws.example.com")
    }

    async fn connected(store: &MemorySessionStore) {
        store
            .create(&Session::new(CONN_ID).with_user(Some("user-1".to_string())))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_header_rejected_before_store_access() {
        let store = Arc::new(CountingStore::default());
        let dispatcher = Dispatcher::new(
            Arc::new(HandlerConfig::default()),
            store.clone(),
            registry(),
        );

        for name in REQUIRED_HEADERS.iter().chain(ADDITIONAL_REQUIRED_HEADERS) {
            let mut request = callback("chat").with_body(r#"{"action":"chat"}"#);
            request.headers.remove(*name);

            let res = dispatcher.dispatch(&request).await.unwrap();

            assert_eq!(res.status_code, 400, "header {}", name);
            assert_eq!(res.body, "Some of the required headers are missing");
        }
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_gateway_looks_like_missing_headers() {
        let (dispatcher, store) = setup(HandlerConfig::default());
        connected(&store).await;

        let mut request = callback("chat").with_body(r#"{"action":"chat"}"#);
        request.headers.remove("X-Amzn-Apigateway-Api-Id");
        let missing = dispatcher.dispatch(&request).await.unwrap();

        let request = set(callback("chat"), "X-Amzn-Apigateway-Api-Id", "intruder")
            .with_body(r#"{"action":"chat"}"#);
        let unknown = dispatcher.dispatch(&request).await.unwrap();

        assert_eq!(unknown.status_code, missing.status_code);
        assert_eq!(unknown.body, missing.body);
        assert_eq!(store.get(CONN_ID).await.unwrap().request_count, 1);
    }

    #[tokio::test]
    async fn test_method_not_allowed() {
        let (dispatcher, _) = setup(HandlerConfig::default());
        let mut request = callback("chat");
        request.method = Method::GET;

        let res = dispatcher.dispatch(&request).await.unwrap();

        assert_eq!(res.status_code, 405);
        assert_eq!(res.headers.get("allow").unwrap(), "POST");
    }

    #[tokio::test]
    async fn test_connect_creates_session() {
        let (dispatcher, store) = setup(HandlerConfig::default().with_allowed_hosts(&["ws.example.com"]));
        let request = connect_callback()
            .with_query("channel", "lobby")
            .with_principal(Some("user-9".to_string()));

        let res = dispatcher.dispatch(&request).await.unwrap();

        assert_eq!(res.status_code, 200);
        assert_eq!(res.body, "{}");
        let session = store.get(CONN_ID).await.unwrap();
        assert_eq!(session.channel_name, "lobby");
        assert!(session.connected);
        assert_eq!(session.request_count, 1);
        assert_eq!(session.user_id.as_deref(), Some("user-9"));
        assert_eq!(session.api_id.as_deref(), Some(API_ID));
    }

    #[tokio::test]
    async fn test_connect_uses_gateway_default_channel() {
        let (dispatcher, store) = setup(HandlerConfig::default());

        dispatcher.dispatch(&connect_callback()).await.unwrap();

        assert_eq!(store.get(CONN_ID).await.unwrap().channel_name, "xyz");
    }

    #[tokio::test]
    async fn test_connect_twice_fails() {
        let (dispatcher, _) = setup(HandlerConfig::default());

        dispatcher.dispatch(&connect_callback()).await.unwrap();
        let result = dispatcher.dispatch(&connect_callback()).await;

        assert!(matches!(result, Err(WsError::DuplicateSession(_))));
    }

    #[tokio::test]
    async fn test_connect_missing_handshake_headers() {
        let (dispatcher, store) = setup(HandlerConfig::default());
        let mut request = connect_callback();
        request.headers.remove("Cookie");
        request.headers.remove("Sec-Websocket-Key");

        let res = dispatcher.dispatch(&request).await.unwrap();

        assert_eq!(res.status_code, 400);
        assert_eq!(res.body, "Missing 2 headers");
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_connect_host_not_allowed() {
        let (dispatcher, store) = setup(HandlerConfig::default().with_allowed_hosts(&["other.example.com"]));

        let res = dispatcher.dispatch(&connect_callback()).await.unwrap();

        assert_eq!(res.status_code, 400);
        assert_eq!(res.body, "Host is not in AllowedHosts");
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_connect_host_not_in_origin() {
        let (dispatcher, store) = setup(HandlerConfig::default());
        let request = set(connect_callback(), "Origin", "https://evil.example.net");

        let res = dispatcher.dispatch(&request).await.unwrap();

        assert_eq!(res.status_code, 400);
        assert_eq!(res.body, "Host is not in Origin");
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_connect_policy_rejection() {
        let (dispatcher, store) = setup(HandlerConfig::default());
        let dispatcher = dispatcher.with_policy(Arc::new(DenyAll));

        let res = dispatcher.dispatch(&connect_callback()).await.unwrap();

        assert_eq!(res.status_code, 400);
        assert_eq!(res.body, "Connections are closed");
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_disconnect_marks_session() {
        let (dispatcher, store) = setup(HandlerConfig::default().with_expected_api_id(API_ID));
        connected(&store).await;

        let res = dispatcher.dispatch(&callback("disconnect")).await.unwrap();

        assert_eq!(res.status_code, 200);
        assert_eq!(res.body, "{}");
        let session = store.get(CONN_ID).await.unwrap();
        assert!(!session.connected);
        assert_eq!(session.request_count, 2);
    }

    #[tokio::test]
    async fn test_disconnect_twice_stays_disconnected() {
        let (dispatcher, store) = setup(HandlerConfig::default());
        connected(&store).await;

        dispatcher.dispatch(&callback("disconnect")).await.unwrap();
        dispatcher.dispatch(&callback("disconnect")).await.unwrap();

        assert!(!store.get(CONN_ID).await.unwrap().connected);
    }

    #[tokio::test]
    async fn test_disconnect_unknown_session() {
        let (dispatcher, _) = setup(HandlerConfig::default());

        let result = dispatcher.dispatch(&callback("disconnect")).await;

        assert!(matches!(result, Err(WsError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn test_spoofed_useragent_rejected() {
        let (dispatcher, store) = setup(HandlerConfig::default().with_expected_api_id(API_ID));
        connected(&store).await;
        let dispatcher = dispatcher.register("chat", Arc::new(Echo));

        for (route, body) in [("disconnect", ""), ("chat", r#"{"action":"chat"}"#)] {
            let request = set(callback(route), "User-Agent", "AmazonAPIGateway_api-1").with_body(body);

            let res = dispatcher.dispatch(&request).await.unwrap();

            assert_eq!(res.status_code, 400, "route {}", route);
            assert_eq!(res.body, "Unexpected Useragent");
        }
        let session = store.get(CONN_ID).await.unwrap();
        assert!(session.connected);
        assert_eq!(session.request_count, 1);
    }

    #[tokio::test]
    async fn test_foreign_useragent_rejected_without_fixed_id() {
        let (dispatcher, store) = setup(HandlerConfig::default());
        connected(&store).await;
        let request = set(callback("disconnect"), "User-Agent", "curl/8.0");

        let res = dispatcher.dispatch(&request).await.unwrap();

        assert_eq!(res.body, "Unexpected Useragent");
        assert!(store.get(CONN_ID).await.unwrap().connected);
    }

    #[tokio::test]
    async fn test_unregistered_action_not_implemented() {
        let (dispatcher, store) = setup(HandlerConfig::default());
        connected(&store).await;
        let request = callback("chat").with_body(r#"{"action":"chat","text":"hi"}"#);

        let result = dispatcher.dispatch(&request).await;

        assert!(matches!(result, Err(WsError::NotImplemented(a)) if a == "chat"));
        // The request was still counted before the handler ran
        assert_eq!(store.get(CONN_ID).await.unwrap().request_count, 2);
    }

    #[tokio::test]
    async fn test_unnamed_action_uses_default_handler() {
        let (dispatcher, store) = setup(HandlerConfig::default());
        connected(&store).await;
        let dispatcher = dispatcher.register("chat", Arc::new(Echo));

        for body in [r#"{"action":""}"#, r#"{"action":7}"#, r#"{"action":null}"#] {
            let request = callback("chat").with_body(body);

            let result = dispatcher.dispatch(&request).await;

            assert!(
                matches!(result, Err(WsError::NotImplemented(ref a)) if a == "chat"),
                "{body} reached a registered handler"
            );
        }
    }

    #[tokio::test]
    async fn test_registered_action_invoked() {
        let (dispatcher, store) = setup(HandlerConfig::default());
        connected(&store).await;
        let dispatcher = dispatcher.register("chat", Arc::new(Echo));
        let request = callback("chat").with_body(r#"{"action":"chat","text":"hi"}"#);

        let res = dispatcher.dispatch(&request).await.unwrap();

        assert_eq!(res.status_code, 200);
        let value: serde_json::Value = serde_json::from_str(&res.body).unwrap();
        assert_eq!(value["action"], "chat");
        assert_eq!(value["text"], "hi");
        assert_eq!(value["user"], "user-1");
        assert_eq!(value["count"], 2);
    }

    #[tokio::test]
    async fn test_handler_key_takes_precedence() {
        let mut config = HandlerConfig::default();
        config.handler_key = Some("handler".to_string());
        let (dispatcher, store) = setup(config);
        connected(&store).await;
        let dispatcher = dispatcher.register("echo", Arc::new(Echo));

        let request = callback("chat").with_body(r#"{"handler":"echo","action":"chat"}"#);
        let res = dispatcher.dispatch(&request).await.unwrap();
        assert_eq!(res.status_code, 200);

        // Presence of the handler key alone satisfies the requirement
        let request = callback("chat").with_body(r#"{"handler":"echo"}"#);
        let res = dispatcher.dispatch(&request).await.unwrap();
        assert_eq!(res.status_code, 200);
    }

    #[tokio::test]
    async fn test_missing_action_key() {
        let (dispatcher, store) = setup(HandlerConfig::default());
        connected(&store).await;
        let request = callback("chat").with_body(r#"{"text":"hi"}"#);

        let res = dispatcher.dispatch(&request).await.unwrap();

        assert_eq!(res.status_code, 400);
        assert_eq!(res.body, "Action key action missing from request body.");
        assert_eq!(store.get(CONN_ID).await.unwrap().request_count, 1);
    }

    #[tokio::test]
    async fn test_action_on_unknown_session() {
        let (dispatcher, _) = setup(HandlerConfig::default());
        let request = callback("chat").with_body(r#"{"action":"chat"}"#);

        let result = dispatcher.dispatch(&request).await;

        assert!(matches!(result, Err(WsError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let (dispatcher, _) = setup(HandlerConfig::default());

        for body in ["{not json", "[1,2,3]"] {
            let request = callback("chat").with_body(body);
            let res = dispatcher.dispatch(&request).await.unwrap();

            assert_eq!(res.status_code, 400);
            assert_eq!(res.body, "Malformed request body");
        }
    }

    #[tokio::test]
    async fn test_debug_log_collected_per_request() {
        let (dispatcher, store) = setup(HandlerConfig::default().with_debug(true));
        connected(&store).await;
        let dispatcher = dispatcher.register("chat", Arc::new(Echo));
        let request = callback("chat").with_body(r#"{"action":"chat"}"#);

        let mut first = RequestContext::new(true);
        dispatcher
            .dispatch_with_context(&request, &mut first)
            .await
            .unwrap();
        let mut second = RequestContext::new(true);
        dispatcher
            .dispatch_with_context(&request, &mut second)
            .await
            .unwrap();

        assert_eq!(first.debug_log()[0], "Within setup");
        assert_eq!(first.debug_log().len(), second.debug_log().len());
        assert_eq!(second.gateway.unwrap().api_name, "chat");
    }

    #[tokio::test]
    async fn test_fixed_gateway_id_without_registration() {
        let store = Arc::new(MemorySessionStore::new());
        let registry: Arc<dyn GatewayRegistry> = Arc::new(MemoryGatewayRegistry::new());
        let dispatcher = Dispatcher::new(
            Arc::new(HandlerConfig::default().with_expected_api_id(API_ID)),
            store.clone(),
            registry,
        );

        let res = dispatcher.dispatch(&connect_callback()).await.unwrap();

        assert_eq!(res.status_code, 200);
        let session = store.get(CONN_ID).await.unwrap();
        assert_eq!(session.channel_name, "");
        assert!(session.api_id.is_none());
    }
}

//! Handler configuration
//!
//! Loaded once at start-up from environment variables.

use apigw_ws_common::constants::{DEFAULT_ACTION_KEY, EXPECTED_USERAGENT_PREFIX};
use apigw_ws_common::utils::parse_name_list;
use apigw_ws_common::{HeaderRequirements, Result, WsError};
use http::Method;

pub const DEFAULT_SESSIONS_TABLE: &str = "websocket-sessions";
pub const DEFAULT_GATEWAYS_TABLE: &str = "websocket-gateways";

#[derive(Debug, Clone)]
pub struct HandlerConfig {
    /// Permitted `Host` values; empty allows all
    pub allowed_hosts: Vec<String>,
    /// Body key naming the custom action
    pub action_key: String,
    /// Optional body key checked before `action_key`
    pub handler_key: Option<String>,
    /// Fixed gateway ID every callback must come from
    pub expected_api_id: Option<String>,
    pub useragent_prefix: String,
    pub headers: HeaderRequirements,
    pub allowed_methods: Vec<Method>,
    /// Collect a per-request debug log
    pub debug: bool,
    pub sessions_table: String,
    pub gateways_table: String,
    /// HS256 secret used to resolve the request principal
    pub jwt_secret: Option<String>,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            allowed_hosts: Vec::new(),
            action_key: DEFAULT_ACTION_KEY.to_string(),
            handler_key: None,
            expected_api_id: None,
            useragent_prefix: EXPECTED_USERAGENT_PREFIX.to_string(),
            headers: HeaderRequirements::default(),
            allowed_methods: vec![Method::POST],
            debug: false,
            sessions_table: DEFAULT_SESSIONS_TABLE.to_string(),
            gateways_table: DEFAULT_GATEWAYS_TABLE.to_string(),
            jwt_secret: None,
        }
    }
}

impl HandlerConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(hosts) = lookup("ALLOWED_HOSTS") {
            config.allowed_hosts = parse_name_list(&hosts);
        }
        if let Some(key) = non_empty("WS_ACTION_KEY") {
            config.action_key = key.trim().to_string();
        }
        config.handler_key = non_empty("WS_HANDLER_KEY").map(|k| k.trim().to_string());
        config.expected_api_id = non_empty("AWS_API_GATEWAY_ID").map(|k| k.trim().to_string());

        if let Some(names) = lookup("WS_REQUIRED_HEADERS") {
            let names = parse_name_list(&names);
            if names.is_empty() {
                return Err(WsError::Config(
                    "WS_REQUIRED_HEADERS must list at least one header".to_string(),
                ));
            }
            config.headers.required = names;
        }
        // An empty value clears the additional list
        if let Some(names) = lookup("WS_ADDITIONAL_REQUIRED_HEADERS") {
            config.headers.additional = parse_name_list(&names);
        }

        if let Some(debug) = lookup("WS_DEBUG") {
            config.debug = debug.trim().eq_ignore_ascii_case("true");
        }
        if let Some(table) = non_empty("SESSIONS_TABLE_NAME") {
            config.sessions_table = table;
        }
        if let Some(table) = non_empty("GATEWAYS_TABLE_NAME") {
            config.gateways_table = table;
        }
        config.jwt_secret = non_empty("JWT_SECRET");

        Ok(config)
    }

    pub fn with_expected_api_id(mut self, api_id: impl Into<String>) -> Self {
        self.expected_api_id = Some(api_id.into());
        self
    }

    pub fn with_allowed_hosts(mut self, hosts: &[&str]) -> Self {
        self.allowed_hosts = hosts.iter().map(|h| h.to_string()).collect();
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

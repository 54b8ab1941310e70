//! Per-request dispatch context
//!
//! Everything a dispatch learns about the caller lives here and is dropped
//! with the request; nothing is shared between concurrent callbacks.

use apigw_ws_common::{GatewayConfig, Session};
use tracing::debug;

#[derive(Debug, Default)]
pub struct RequestContext {
    /// Gateway resolved from the `X-Amzn-Apigateway-Api-Id` header
    pub gateway: Option<GatewayConfig>,
    /// Session loaded by connection ID (not set on `connect`)
    pub session: Option<Session>,
    /// User attached from the stored session
    pub user: Option<String>,
    debug: bool,
    debug_log: Vec<String>,
}

impl RequestContext {
    pub fn new(debug: bool) -> Self {
        Self {
            debug,
            ..Default::default()
        }
    }

    /// Record a step of the dispatch
    pub fn note(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        debug!("{}", msg);
        if self.debug {
            self.debug_log.push(msg);
        }
    }

    pub fn debug_log(&self) -> &[String] {
        &self.debug_log
    }
}

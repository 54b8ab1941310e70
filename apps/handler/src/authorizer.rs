//! Gateway authorization
//!
//! Decides whether the API Gateway named in `X-Amzn-Apigateway-Api-Id` may
//! call us, and binds the matching registered gateway to the request context.

use std::sync::Arc;
use tracing::{error, warn};

use crate::context::RequestContext;
use crate::store::GatewayRegistry;

pub struct GatewayAuthorizer {
    registry: Arc<dyn GatewayRegistry>,
    expected_api_id: Option<String>,
}

impl GatewayAuthorizer {
    pub fn new(registry: Arc<dyn GatewayRegistry>, expected_api_id: Option<String>) -> Self {
        Self {
            registry,
            expected_api_id: expected_api_id.filter(|id| !id.is_empty()),
        }
    }

    /// Authorize the claimed gateway ID
    ///
    /// The registry lookup always runs so the gateway is bound for later
    /// handlers. With a fixed expected ID configured, only an exact match
    /// authorizes; otherwise a registered gateway is enough. Registry failures
    /// count as an unknown gateway.
    pub async fn authorize(&self, api_id: Option<&str>, ctx: &mut RequestContext) -> bool {
        let Some(api_id) = api_id else {
            ctx.note("authorize() returned false: no gateway ID header");
            return false;
        };

        ctx.gateway = match self.registry.find_by_api_id(api_id).await {
            Ok(gateway) => gateway,
            Err(e) => {
                error!("Gateway lookup failed for {}: {}", api_id, e);
                None
            }
        };
        let registered = ctx.gateway.is_some();
        ctx.note(format!("registered gateway lookup returned {}", registered));

        let authorized = match &self.expected_api_id {
            Some(expected) => {
                let matches = expected == api_id;
                ctx.note(format!("expected gateway ID check returned {}", matches));
                matches
            }
            None => registered,
        };

        if !authorized {
            warn!("Rejected callback from gateway: {}", api_id);
        }
        ctx.note(format!("authorize() returned {}", authorized));
        authorized
    }
}

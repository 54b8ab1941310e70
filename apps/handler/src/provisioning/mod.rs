//! Gateway provisioning
//!
//! Drives the cloud control plane to create a WebSocket API, its built-in
//! routes and stage, an optional custom domain, and additional routes. The
//! `api_created` and `custom_domain_created` flags only ever go from false to
//! true, and are persisted even when a later step fails.

use apigw_ws_common::constants::{BUILTIN_ROUTE_KEYS, INTEGRATION_TIMEOUT_MILLIS};
use apigw_ws_common::validation::validate_route_key;
use apigw_ws_common::{AdditionalRoute, GatewayConfig, Result, WsError};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};

use crate::store::GatewayRegistry;

mod aws;

pub use aws::AwsControlPlane;

/// Route that answers clients with the integration response
const RESPONSE_ROUTE: &str = "$default";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedApi {
    pub api_id: String,
    pub api_endpoint: String,
}

/// HTTP_PROXY integration forwarding a route to this service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpProxyIntegration {
    pub uri: String,
    pub method: String,
    pub payload_format_version: String,
    /// `(integration header, context variable)` pairs
    pub request_parameters: Vec<(String, String)>,
    pub timeout_millis: i32,
}

impl HttpProxyIntegration {
    pub fn for_uri(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            method: "POST".to_string(),
            payload_format_version: "1.0".to_string(),
            request_parameters: vec![(
                "integration.request.header.connectionId".to_string(),
                "context.connectionId".to_string(),
            )],
            timeout_millis: INTEGRATION_TIMEOUT_MILLIS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSpec {
    pub route_key: String,
    pub integration_id: String,
    pub route_response_selection_expression: Option<String>,
}

impl RouteSpec {
    pub fn target(&self) -> String {
        format!("integrations/{}", self.integration_id)
    }
}

/// The cloud control plane calls used by provisioning
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn create_api(&self, gateway: &GatewayConfig) -> Result<CreatedApi>;

    /// Returns the integration ID
    async fn create_integration(
        &self,
        api_id: &str,
        integration: &HttpProxyIntegration,
    ) -> Result<String>;

    async fn create_route(&self, api_id: &str, route: &RouteSpec) -> Result<()>;

    async fn create_stage(&self, api_id: &str, stage_name: &str) -> Result<()>;

    /// Returns the deployment ID
    async fn create_deployment(
        &self,
        api_id: &str,
        stage_name: &str,
        description: &str,
    ) -> Result<String>;

    /// Returns the provider's target domain name for DNS
    async fn create_domain_name(&self, gateway: &GatewayConfig) -> Result<String>;

    /// Returns the API mapping ID
    async fn create_api_mapping(
        &self,
        api_id: &str,
        domain_name: &str,
        stage_name: &str,
    ) -> Result<String>;
}

pub struct Provisioner {
    control: Arc<dyn ControlPlane>,
    registry: Arc<dyn GatewayRegistry>,
}

fn require_api_id(gateway: &GatewayConfig) -> Result<String> {
    gateway
        .api_id
        .clone()
        .ok_or_else(|| WsError::InvalidState(format!("gateway {} has no API ID", gateway.api_name)))
}

impl Provisioner {
    pub fn new(control: Arc<dyn ControlPlane>, registry: Arc<dyn GatewayRegistry>) -> Self {
        Self { control, registry }
    }

    /// Create the API, built-in routes, undeployed additional routes, stage
    /// and deployment. No-op once `api_created` is set.
    pub async fn create_gateway(&self, gateway: &mut GatewayConfig) -> Result<()> {
        if gateway.api_created {
            return Ok(());
        }
        if gateway.target_base_endpoint.is_none() {
            return Err(WsError::InvalidState(
                "A target base endpoint is required".to_string(),
            ));
        }

        let created = self.control.create_api(gateway).await?;
        info!(api_id = %created.api_id, "Created WebSocket API {}", gateway.api_name);
        gateway.api_id = Some(created.api_id);
        gateway.api_endpoint = created.api_endpoint;

        let result = self.create_routes_and_deploy(gateway).await;
        if let Err(e) = &result {
            error!("Provisioning {} failed after API creation: {}", gateway.api_name, e);
        }

        gateway.mark_api_created();
        let saved = self.registry.save(gateway).await;
        result?;
        saved
    }

    async fn create_routes_and_deploy(&self, gateway: &mut GatewayConfig) -> Result<()> {
        let api_id = require_api_id(gateway)?;

        for route_key in BUILTIN_ROUTE_KEYS {
            let uri = gateway.integration_uri(route_key).ok_or_else(|| {
                WsError::InvalidState("A target base endpoint is required".to_string())
            })?;
            let response_selection = (*route_key == RESPONSE_ROUTE).then(|| route_key.to_string());
            self.create_proxy_route(&api_id, route_key, uri, response_selection)
                .await?;
        }

        for route in gateway.additional_routes.iter_mut().filter(|r| !r.deployed) {
            self.create_proxy_route(&api_id, &route.route_key, route.integration_url.clone(), None)
                .await?;
            route.deployed = true;
        }

        self.control
            .create_stage(&api_id, &gateway.stage_name)
            .await?;
        gateway.deployment_id = self
            .control
            .create_deployment(&api_id, &gateway.stage_name, &gateway.stage_description)
            .await?;
        info!(
            deployment_id = %gateway.deployment_id,
            "Deployed {} to stage {}", gateway.api_name, gateway.stage_name
        );
        Ok(())
    }

    async fn create_proxy_route(
        &self,
        api_id: &str,
        route_key: &str,
        uri: String,
        route_response_selection_expression: Option<String>,
    ) -> Result<()> {
        let integration_id = self
            .control
            .create_integration(api_id, &HttpProxyIntegration::for_uri(uri))
            .await?;
        self.control
            .create_route(
                api_id,
                &RouteSpec {
                    route_key: route_key.to_string(),
                    integration_id,
                    route_response_selection_expression,
                },
            )
            .await
    }

    /// Create the custom domain and map it to the gateway's stage
    pub async fn create_custom_domain(&self, gateway: &mut GatewayConfig) -> Result<()> {
        if !gateway.api_created {
            return Err(WsError::InvalidState(
                "The API needs to be created before calling this method".to_string(),
            ));
        }
        if gateway.certificate_arn.is_empty() {
            return Err(WsError::InvalidState(
                "A Certificate ARN is required".to_string(),
            ));
        }
        let api_id = require_api_id(gateway)?;

        gateway.api_gateway_domain_name = self.control.create_domain_name(gateway).await?;

        let mapping = self
            .control
            .create_api_mapping(&api_id, &gateway.domain_name, &gateway.stage_name)
            .await;
        let result = match mapping {
            Ok(mapping_id) => {
                gateway.api_mapping_id = mapping_id;
                Ok(())
            }
            Err(e) => {
                error!("API mapping for {} failed: {}", gateway.domain_name, e);
                Err(e)
            }
        };

        gateway.mark_custom_domain_created();
        let saved = self.registry.save(gateway).await;
        result?;
        saved?;
        info!("Custom domain {} mapped to {}", gateway.domain_name, gateway.api_name);
        Ok(())
    }

    /// Record an additional route on a gateway, deploying it straight away
    /// when the gateway already has a deployment
    pub async fn add_route(&self, api_name: &str, mut route: AdditionalRoute) -> Result<GatewayConfig> {
        validate_route_key(&route.route_key).map_err(|e| WsError::InvalidState(e.to_string()))?;

        let mut gateway = self
            .registry
            .get(api_name)
            .await?
            .ok_or_else(|| WsError::InvalidState(format!("gateway {} is not registered", api_name)))?;

        if gateway
            .additional_routes
            .iter()
            .any(|r| r.route_key == route.route_key)
        {
            return Err(WsError::InvalidState(format!(
                "route {} already exists on {}",
                route.route_key, api_name
            )));
        }

        if gateway.is_deployed() && !route.deployed {
            let api_id = require_api_id(&gateway)?;
            self.create_proxy_route(&api_id, &route.route_key, route.integration_url.clone(), None)
                .await?;
            gateway.deployment_id = self
                .control
                .create_deployment(&api_id, &gateway.stage_name, &gateway.stage_description)
                .await?;
            route.deployed = true;
            info!("Deployed route {} on {}", route.route_key, api_name);
        }

        gateway.additional_routes.push(route);
        gateway.touch();
        self.registry.save(&gateway).await?;
        Ok(gateway)
    }
}

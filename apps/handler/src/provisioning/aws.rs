use apigw_ws_common::{GatewayConfig, Result, WsError};
use async_trait::async_trait;
use aws_sdk_apigatewayv2::Client as ApiGatewayV2Client;
use aws_sdk_apigatewayv2::types::{
    AuthorizationType, ConnectionType, DomainNameConfiguration, EndpointType, IntegrationType,
    PassthroughBehavior, ProtocolType, SecurityPolicy,
};
use tracing::debug;

use super::{ControlPlane, CreatedApi, HttpProxyIntegration, RouteSpec};

fn provisioning_error(context: &str, e: impl std::fmt::Display) -> WsError {
    WsError::Provisioning(format!("{}: {}", context, e))
}

fn missing(field: &str) -> WsError {
    WsError::Provisioning(format!("response did not include {}", field))
}

/// `ControlPlane` backed by the API Gateway V2 API
#[derive(Debug, Clone)]
pub struct AwsControlPlane {
    client: ApiGatewayV2Client,
}

impl AwsControlPlane {
    pub fn new(client: ApiGatewayV2Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ControlPlane for AwsControlPlane {
    async fn create_api(&self, gateway: &GatewayConfig) -> Result<CreatedApi> {
        let target = gateway
            .integration_uri("default")
            .ok_or_else(|| WsError::InvalidState("A target base endpoint is required".to_string()))?;

        let res = self
            .client
            .create_api()
            .name(&gateway.api_name)
            .description(&gateway.api_description)
            .protocol_type(ProtocolType::Websocket)
            .api_key_selection_expression(&gateway.api_key_selection_expression)
            .route_selection_expression(&gateway.route_selection_expression)
            .route_key(&gateway.route_key)
            .target(target)
            .disable_schema_validation(true)
            .set_tags(Some(gateway.tags.clone()))
            .send()
            .await
            .map_err(|e| provisioning_error("Failed to create API", e))?;

        Ok(CreatedApi {
            api_id: res.api_id().ok_or_else(|| missing("ApiId"))?.to_string(),
            api_endpoint: res.api_endpoint().unwrap_or_default().to_string(),
        })
    }

    async fn create_integration(
        &self,
        api_id: &str,
        integration: &HttpProxyIntegration,
    ) -> Result<String> {
        let mut req = self
            .client
            .create_integration()
            .api_id(api_id)
            .connection_type(ConnectionType::Internet)
            .integration_method(&integration.method)
            .integration_type(IntegrationType::HttpProxy)
            .integration_uri(&integration.uri)
            .passthrough_behavior(PassthroughBehavior::WhenNoMatch)
            .payload_format_version(&integration.payload_format_version)
            .timeout_in_millis(integration.timeout_millis);
        for (name, value) in &integration.request_parameters {
            req = req.request_parameters(name, value);
        }

        let res = req
            .send()
            .await
            .map_err(|e| provisioning_error("Failed to create integration", e))?;
        let id = res.integration_id().ok_or_else(|| missing("IntegrationId"))?;
        debug!("Created integration {} for {}", id, integration.uri);
        Ok(id.to_string())
    }

    async fn create_route(&self, api_id: &str, route: &RouteSpec) -> Result<()> {
        self.client
            .create_route()
            .api_id(api_id)
            .api_key_required(false)
            .authorization_type(AuthorizationType::None)
            .route_key(&route.route_key)
            .target(route.target())
            .set_route_response_selection_expression(
                route.route_response_selection_expression.clone(),
            )
            .send()
            .await
            .map_err(|e| provisioning_error("Failed to create route", e))?;

        debug!("Created route {}", route.route_key);
        Ok(())
    }

    async fn create_stage(&self, api_id: &str, stage_name: &str) -> Result<()> {
        self.client
            .create_stage()
            .api_id(api_id)
            .stage_name(stage_name)
            .send()
            .await
            .map_err(|e| provisioning_error("Failed to create stage", e))?;
        Ok(())
    }

    async fn create_deployment(
        &self,
        api_id: &str,
        stage_name: &str,
        description: &str,
    ) -> Result<String> {
        let res = self
            .client
            .create_deployment()
            .api_id(api_id)
            .stage_name(stage_name)
            .description(description)
            .send()
            .await
            .map_err(|e| provisioning_error("Failed to create deployment", e))?;

        Ok(res
            .deployment_id()
            .ok_or_else(|| missing("DeploymentId"))?
            .to_string())
    }

    async fn create_domain_name(&self, gateway: &GatewayConfig) -> Result<String> {
        let hosted_zone_id = Some(gateway.hosted_zone_id.clone()).filter(|id| !id.is_empty());
        let configuration = DomainNameConfiguration::builder()
            .certificate_arn(&gateway.certificate_arn)
            .endpoint_type(EndpointType::Regional)
            .security_policy(SecurityPolicy::Tls12)
            .set_hosted_zone_id(hosted_zone_id)
            .build();

        let res = self
            .client
            .create_domain_name()
            .domain_name(&gateway.domain_name)
            .domain_name_configurations(configuration)
            .send()
            .await
            .map_err(|e| provisioning_error("Failed to create domain name", e))?;

        res.domain_name_configurations()
            .first()
            .and_then(|c| c.api_gateway_domain_name())
            .map(str::to_string)
            .ok_or_else(|| missing("ApiGatewayDomainName"))
    }

    async fn create_api_mapping(
        &self,
        api_id: &str,
        domain_name: &str,
        stage_name: &str,
    ) -> Result<String> {
        let res = self
            .client
            .create_api_mapping()
            .api_id(api_id)
            .domain_name(domain_name)
            .stage(stage_name)
            .send()
            .await
            .map_err(|e| provisioning_error("Failed to create API mapping", e))?;

        Ok(res
            .api_mapping_id()
            .ok_or_else(|| missing("ApiMappingId"))?
            .to_string())
    }
}

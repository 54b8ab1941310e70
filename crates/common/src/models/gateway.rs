use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::constants::{
    DEFAULT_API_KEY_SELECTION_EXPRESSION, DEFAULT_ROUTE_SELECTION_EXPRESSION, DEFAULT_STAGE_NAME,
};
use crate::utils::current_timestamp_secs;

/// A registered API Gateway WebSocket API and its provisioning state
///
/// `api_created` and `custom_domain_created` only ever move from false to true.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Unique human readable name
    pub api_name: String,
    #[serde(default)]
    pub api_description: String,
    /// Channel given to sessions that connect without a `channel` query parameter
    #[serde(default)]
    pub default_channel_name: String,
    /// Custom domain, e.g. ws.example.com
    #[serde(default)]
    pub domain_name: String,
    /// Base URL the routes integrate with, always ending in `/`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_base_endpoint: Option<String>,
    #[serde(default)]
    pub certificate_arn: String,
    #[serde(default)]
    pub hosted_zone_id: String,
    pub api_key_selection_expression: String,
    pub route_selection_expression: String,
    pub route_key: String,
    pub stage_name: String,
    #[serde(default)]
    pub stage_description: String,
    #[serde(default)]
    pub tags: HashMap<String, String>,

    // Values returned by the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_id: Option<String>,
    #[serde(default)]
    pub api_endpoint: String,
    #[serde(default)]
    pub api_gateway_domain_name: String,
    #[serde(default)]
    pub api_mapping_id: String,
    #[serde(default)]
    pub deployment_id: String,
    #[serde(default)]
    pub api_created: bool,
    #[serde(default)]
    pub custom_domain_created: bool,

    #[serde(default)]
    pub additional_routes: Vec<AdditionalRoute>,

    pub created_on: i64,
    pub updated_on: i64,
}

impl GatewayConfig {
    pub fn new(api_name: impl Into<String>) -> Self {
        let now = current_timestamp_secs();
        Self {
            api_name: api_name.into(),
            api_description: String::new(),
            default_channel_name: String::new(),
            domain_name: String::new(),
            target_base_endpoint: None,
            certificate_arn: String::new(),
            hosted_zone_id: String::new(),
            api_key_selection_expression: DEFAULT_API_KEY_SELECTION_EXPRESSION.to_string(),
            route_selection_expression: DEFAULT_ROUTE_SELECTION_EXPRESSION.to_string(),
            route_key: "$default".to_string(),
            stage_name: DEFAULT_STAGE_NAME.to_string(),
            stage_description: String::new(),
            tags: HashMap::new(),
            api_id: None,
            api_endpoint: String::new(),
            api_gateway_domain_name: String::new(),
            api_mapping_id: String::new(),
            deployment_id: String::new(),
            api_created: false,
            custom_domain_created: false,
            additional_routes: Vec::new(),
            created_on: now,
            updated_on: now,
        }
    }

    pub fn with_api_id(mut self, api_id: impl Into<String>) -> Self {
        self.api_id = Some(api_id.into());
        self
    }

    pub fn with_default_channel(mut self, channel: impl Into<String>) -> Self {
        self.default_channel_name = channel.into();
        self
    }

    pub fn with_domain(mut self, domain_name: impl Into<String>, certificate_arn: impl Into<String>) -> Self {
        self.domain_name = domain_name.into();
        self.certificate_arn = certificate_arn.into();
        self
    }

    /// Set the integration base URL, normalised to end with `/`
    pub fn with_target_base_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        let mut endpoint = endpoint.into();
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }
        self.target_base_endpoint = Some(endpoint);
        self
    }

    /// Integration URI for a route key, e.g. `$connect` -> `{base}connect`
    pub fn integration_uri(&self, route_key: &str) -> Option<String> {
        self.target_base_endpoint
            .as_ref()
            .map(|base| format!("{}{}", base, route_key.trim_start_matches('$')))
    }

    /// Management API endpoint used to push messages to connections
    pub fn management_endpoint(&self, region: &str) -> Option<String> {
        self.api_id.as_ref().map(|api_id| {
            format!(
                "https://{}.execute-api.{}.amazonaws.com/{}",
                api_id, region, self.stage_name
            )
        })
    }

    pub fn is_deployed(&self) -> bool {
        !self.deployment_id.is_empty()
    }

    pub fn mark_api_created(&mut self) {
        self.api_created = true;
        self.touch();
    }

    pub fn mark_custom_domain_created(&mut self) {
        self.custom_domain_created = true;
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_on = current_timestamp_secs();
    }
}

/// An extra custom route deployed on a gateway besides the built-in ones
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalRoute {
    /// Descriptive name
    pub name: String,
    /// Unique route key, e.g. `chat`
    pub route_key: String,
    pub integration_url: String,
    #[serde(default)]
    pub deployed: bool,
}

impl AdditionalRoute {
    pub fn new(
        name: impl Into<String>,
        route_key: impl Into<String>,
        integration_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            route_key: route_key.into(),
            integration_url: integration_url.into(),
            deployed: false,
        }
    }
}

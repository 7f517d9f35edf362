pub mod api;
pub mod config;
pub mod provider_data;
pub mod resources;

pub use provider_data::GrafanaProviderData;
pub use resources::data_source::{upgrade_data_source_state_v0, UpgradeError};

use api::{ApiError, DataSourceApi};
use async_trait::async_trait;
use config::ProviderConfig;
use resources::DataSourceResource;
use std::sync::Arc;
use tfplug::context::Context;
use tfplug::provider::{ConfigureProviderRequest, ConfigureProviderResponse, Provider};
use tfplug::resource::{ConfigureResourceRequest, ResourceWithConfigure};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{has_errors, Diagnostic};
use tfplug::TfplugError;

/// Builds the Grafana client from the resolved url, auth and org
pub type ClientFactory =
    Arc<dyn Fn(&ProviderConfig) -> Result<Arc<dyn DataSourceApi>, ApiError> + Send + Sync>;

pub struct GrafanaProvider {
    client_factory: ClientFactory,
    provider_data: Option<GrafanaProviderData>,
}

impl GrafanaProvider {
    /// `client_factory` is called once per `configure` with the final
    /// provider configuration
    pub fn new<F>(client_factory: F) -> Self
    where
        F: Fn(&ProviderConfig) -> Result<Arc<dyn DataSourceApi>, ApiError> + Send + Sync + 'static,
    {
        Self {
            client_factory: Arc::new(client_factory),
            provider_data: None,
        }
    }

    pub fn config(&self) -> Option<&ProviderConfig> {
        self.provider_data.as_ref().map(|data| &data.config)
    }

    /// Creates a configured resource instance
    pub async fn create_resource(
        &self,
        ctx: Context,
        name: &str,
    ) -> tfplug::Result<DataSourceResource> {
        let provider_data = self
            .provider_data
            .as_ref()
            .ok_or(TfplugError::ProviderNotConfigured)?;

        let mut resource = match name {
            "grafana_data_source" => DataSourceResource::new(),
            _ => return Err(TfplugError::ResourceNotFound(name.to_string())),
        };

        let response = resource
            .configure(
                ctx,
                ConfigureResourceRequest {
                    provider_data: Some(Arc::new(provider_data.clone())),
                },
            )
            .await;
        if has_errors(&response.diagnostics) {
            let details: Vec<String> = response
                .diagnostics
                .iter()
                .map(|d| format!("{}: {}", d.summary, d.detail))
                .collect();
            return Err(TfplugError::InvalidConfiguration(details.join("; ")));
        }

        Ok(resource)
    }
}

#[async_trait]
impl Provider for GrafanaProvider {
    fn type_name(&self) -> &str {
        "grafana"
    }

    async fn schema(&self, _ctx: Context) -> Schema {
        SchemaBuilder::new()
            .description("Manages Grafana resources")
            .attribute(
                AttributeBuilder::new("url", AttributeType::String)
                    .description("The root URL of a Grafana server. May also be set with GRAFANA_URL.")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("auth", AttributeType::String)
                    .description(
                        "API token or basic auth username:password. May also be set with GRAFANA_AUTH.",
                    )
                    .optional()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("org_id", AttributeType::Number)
                    .description("The Grafana organization id to manage resources in")
                    .optional()
                    .build(),
            )
            .build()
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        let config = match ProviderConfig::from_config(&request.config) {
            Ok(config) => config,
            Err(e) => {
                return ConfigureProviderResponse {
                    diagnostics: vec![Diagnostic::error(
                        e.to_string(),
                        "The Grafana provider could not be configured",
                    )],
                    provider_data: None,
                }
            }
        };

        match (self.client_factory)(&config) {
            Ok(api) => {
                tracing::debug!(url = %config.url, org_id = ?config.org_id, "Configured Grafana provider");
                let data = GrafanaProviderData::new(config, api);
                self.provider_data = Some(data.clone());
                ConfigureProviderResponse {
                    diagnostics: vec![],
                    provider_data: Some(Arc::new(data)),
                }
            }
            Err(e) => {
                tracing::error!("Failed to create API client: {}", e);
                ConfigureProviderResponse {
                    diagnostics: vec![Diagnostic::error(
                        format!("Failed to create API client: {}", e),
                        "The Grafana provider could not be configured",
                    )],
                    provider_data: None,
                }
            }
        }
    }

    fn resource_types(&self) -> Vec<String> {
        vec!["grafana_data_source".to_string()]
    }
}

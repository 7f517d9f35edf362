//! Provider trait
//!
//! A provider is configured once per Terraform run. The data it produces
//! during configuration is handed to every resource it creates through
//! [`crate::resource::ResourceWithConfigure`].

use crate::context::Context;
use crate::schema::Schema;
use crate::types::{Diagnostic, DynamicValue};
use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;

#[async_trait]
pub trait Provider: Send + Sync {
    /// Prefix shared by all resource type names (e.g., "grafana")
    fn type_name(&self) -> &str;

    /// Schema of the provider configuration block
    async fn schema(&self, ctx: Context) -> Schema;

    /// Called with the provider block. Store whatever resources need in
    /// the response's provider_data.
    async fn configure(
        &mut self,
        ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse;

    /// Resource type names served by this provider
    fn resource_types(&self) -> Vec<String>;
}

pub struct ConfigureProviderRequest {
    pub config: DynamicValue,
}

pub struct ConfigureProviderResponse {
    pub diagnostics: Vec<Diagnostic>,
    /// Passed to ResourceWithConfigure::configure
    pub provider_data: Option<Arc<dyn Any + Send + Sync>>,
}

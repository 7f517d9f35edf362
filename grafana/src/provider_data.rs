//! Provider data structure passed to resources

use crate::api::DataSourceApi;
use crate::config::ProviderConfig;
use std::sync::Arc;

#[derive(Clone)]
pub struct GrafanaProviderData {
    pub config: ProviderConfig,
    pub api: Arc<dyn DataSourceApi>,
}

impl GrafanaProviderData {
    pub fn new(config: ProviderConfig, api: Arc<dyn DataSourceApi>) -> Self {
        Self { config, api }
    }
}

//! Grafana data source API
//!
//! The data source model mirrors the JSON Grafana serves under
//! `/api/datasources`. Transport is supplied by the embedding program through
//! [`DataSourceApi`].

pub mod error;

pub use error::ApiError;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A Grafana data source as returned by the API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSource {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<i64>,
    pub name: String,
    #[serde(rename = "type")]
    pub ds_type: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub access: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub basic_auth: bool,
    #[serde(default)]
    pub basic_auth_user: String,
    #[serde(default)]
    pub json_data: Map<String, Value>,
    /// Write-only; Grafana never returns secure values
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub secure_json_data: Map<String, Value>,
}

/// Control-plane operations on data sources
#[async_trait]
pub trait DataSourceApi: Send + Sync {
    /// Creates a data source. Grafana assigns `id`, and `uid` when empty.
    async fn create(&self, data_source: &DataSource) -> Result<DataSource, ApiError>;

    async fn get_by_id(&self, id: i64) -> Result<DataSource, ApiError>;

    async fn get_by_uid(&self, uid: &str) -> Result<DataSource, ApiError>;

    /// Replaces the data source identified by `data_source.id`
    async fn update(&self, data_source: &DataSource) -> Result<DataSource, ApiError>;

    async fn delete(&self, id: i64) -> Result<(), ApiError>;
}

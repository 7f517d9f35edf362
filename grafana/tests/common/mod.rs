#![allow(dead_code)]

use async_trait::async_trait;
use grafana::api::{ApiError, DataSource, DataSourceApi};
use grafana::config::ProviderConfig;
use grafana::GrafanaProvider;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, Once};
use tfplug::context::Context;
use tfplug::provider::{ConfigureProviderRequest, Provider};
use tfplug::resource::{
    CreateResourceRequest, CreateResourceResponse, ReadResourceRequest, ReadResourceResponse,
};
use tfplug::types::{AttributePath, Dynamic, DynamicValue};

pub const TYPE_NAME: &str = "grafana_data_source";

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

#[derive(Default)]
struct Store {
    next_id: i64,
    data_sources: BTreeMap<i64, DataSource>,
}

/// In-memory stand-in for the Grafana data source API
#[derive(Default, Clone)]
pub struct InMemoryGrafana {
    store: Arc<Mutex<Store>>,
    clients: Arc<Mutex<Vec<ProviderConfig>>>,
}

impl InMemoryGrafana {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: i64) -> Option<DataSource> {
        self.store.lock().unwrap().data_sources.get(&id).cloned()
    }

    /// Changes a data source behind the provider's back
    pub fn modify(&self, id: i64, change: impl FnOnce(&mut DataSource)) {
        let mut store = self.store.lock().unwrap();
        if let Some(data_source) = store.data_sources.get_mut(&id) {
            change(data_source);
        }
    }

    pub fn remove(&self, id: i64) {
        self.store.lock().unwrap().data_sources.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.store.lock().unwrap().data_sources.len()
    }

    /// Hands out a client, remembering the configuration it was built for
    pub fn client(&self, config: &ProviderConfig) -> Arc<dyn DataSourceApi> {
        self.clients.lock().unwrap().push(config.clone());
        Arc::new(self.clone())
    }

    /// Configurations of every client handed out so far
    pub fn client_configs(&self) -> Vec<ProviderConfig> {
        self.clients.lock().unwrap().clone()
    }
}

/// What Grafana returns: everything except secure values
fn served(data_source: &DataSource) -> DataSource {
    DataSource {
        secure_json_data: Default::default(),
        ..data_source.clone()
    }
}

#[async_trait]
impl DataSourceApi for InMemoryGrafana {
    async fn create(&self, data_source: &DataSource) -> Result<DataSource, ApiError> {
        let mut store = self.store.lock().unwrap();
        if store
            .data_sources
            .values()
            .any(|ds| ds.name == data_source.name)
        {
            return Err(ApiError::ApiError {
                status: 409,
                message: "data source with the same name already exists".to_string(),
            });
        }

        store.next_id += 1;
        let id = store.next_id;
        let mut created = data_source.clone();
        created.id = id;
        if created.uid.is_empty() {
            created.uid = format!("generated-{id}");
        }
        store.data_sources.insert(id, created.clone());
        Ok(served(&created))
    }

    async fn get_by_id(&self, id: i64) -> Result<DataSource, ApiError> {
        self.store
            .lock()
            .unwrap()
            .data_sources
            .get(&id)
            .map(served)
            .ok_or_else(|| ApiError::NotFound(id.to_string()))
    }

    async fn get_by_uid(&self, uid: &str) -> Result<DataSource, ApiError> {
        self.store
            .lock()
            .unwrap()
            .data_sources
            .values()
            .find(|ds| ds.uid == uid)
            .map(served)
            .ok_or_else(|| ApiError::ApiError {
                status: 404,
                message: "Data source not found".to_string(),
            })
    }

    async fn update(&self, data_source: &DataSource) -> Result<DataSource, ApiError> {
        let mut store = self.store.lock().unwrap();
        let existing = store
            .data_sources
            .get_mut(&data_source.id)
            .ok_or_else(|| ApiError::NotFound(data_source.id.to_string()))?;
        *existing = data_source.clone();
        if existing.uid.is_empty() {
            existing.uid = format!("generated-{}", data_source.id);
        }
        Ok(served(existing))
    }

    async fn delete(&self, id: i64) -> Result<(), ApiError> {
        self.store
            .lock()
            .unwrap()
            .data_sources
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| ApiError::NotFound(id.to_string()))
    }
}

pub async fn configured_provider(api: &InMemoryGrafana) -> GrafanaProvider {
    configured_provider_for_org(api, None).await
}

pub async fn configured_provider_for_org(
    api: &InMemoryGrafana,
    org_id: Option<i64>,
) -> GrafanaProvider {
    init_tracing();
    let api = api.clone();
    let mut provider =
        GrafanaProvider::new(move |config: &ProviderConfig| Ok(api.client(config)));

    let mut config = DynamicValue::object();
    config
        .set_string(&AttributePath::new("url"), "http://localhost:3000".to_string())
        .unwrap();
    config
        .set_string(&AttributePath::new("auth"), "admin:admin".to_string())
        .unwrap();
    if let Some(org_id) = org_id {
        config
            .set_number(&AttributePath::new("org_id"), org_id as f64)
            .unwrap();
    }

    let response = provider
        .configure(Context::new(), ConfigureProviderRequest { config })
        .await;
    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    provider
}

pub fn state(value: serde_json::Value) -> DynamicValue {
    DynamicValue::new(Dynamic::from(value))
}

pub fn create_request(config: &DynamicValue) -> CreateResourceRequest {
    CreateResourceRequest {
        type_name: TYPE_NAME.to_string(),
        planned_state: config.clone(),
        config: config.clone(),
    }
}

pub fn read_request(current: &DynamicValue) -> ReadResourceRequest {
    ReadResourceRequest {
        type_name: TYPE_NAME.to_string(),
        current_state: current.clone(),
    }
}

pub fn assert_ok_create(response: &CreateResourceResponse) {
    assert!(
        response.diagnostics.is_empty(),
        "create failed: {:?}",
        response.diagnostics
    );
}

pub fn assert_ok_read(response: &ReadResourceResponse) {
    assert!(
        response.diagnostics.is_empty(),
        "read failed: {:?}",
        response.diagnostics
    );
}

pub fn id_of(state: &DynamicValue) -> i64 {
    state
        .get_string(&AttributePath::new("id"))
        .unwrap()
        .parse()
        .unwrap()
}

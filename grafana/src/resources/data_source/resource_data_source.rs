//! Data source resource implementation

use super::json_data::{self, JSON_DATA_FIELDS, SECURE_JSON_DATA_FIELDS};
use super::upgrade_v0::DataSourceV0Upgrader;
use crate::api::{ApiError, DataSource};
use crate::GrafanaProviderData;
use async_trait::async_trait;
use serde_json::Map;
use std::collections::HashMap;
use tfplug::context::Context;
use tfplug::import::{import_state_passthrough_id, push_imported};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceMetadataRequest, ResourceMetadataResponse,
    ResourceSchemaRequest, ResourceSchemaResponse, ResourceWithConfigure,
    ResourceWithImportState, ResourceWithUpgradeState, UpdateResourceRequest,
    UpdateResourceResponse, UpgradeResourceStateRequest, UpgradeResourceStateResponse,
    ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{
    AttributeBuilder, AttributeType, NestedBlockBuilder, NestingMode, Schema, SchemaBuilder,
};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::upgrade::upgrade_resource_state;

pub const SCHEMA_VERSION: i64 = 1;

const TYPE_NAME: &str = "grafana_data_source";
const ACCESS_MODES: [&str; 2] = ["proxy", "direct"];
const DEFAULT_ACCESS_MODE: &str = "proxy";

#[derive(Default)]
pub struct DataSourceResource {
    provider_data: Option<GrafanaProviderData>,
}

impl DataSourceResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_static() -> Schema {
        let json_data = JSON_DATA_FIELDS.iter().fold(
            NestedBlockBuilder::new("json_data", NestingMode::List)
                .description("Type-specific settings. Conflicts with json_data_encoded.")
                .max_items(1),
            |block, field| block.attribute(field.schema_attribute()),
        );
        let secure_json_data = SECURE_JSON_DATA_FIELDS.iter().fold(
            NestedBlockBuilder::new("secure_json_data", NestingMode::List)
                .description(
                    "Write-only secrets sent to Grafana as secureJsonData. \
                     Conflicts with secure_json_data_encoded.",
                )
                .max_items(1),
            |block, field| block.attribute(field.schema_attribute()),
        );

        SchemaBuilder::new()
            .version(SCHEMA_VERSION)
            .description("Manages Grafana data sources")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("Numeric id assigned by Grafana")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("uid", AttributeType::String)
                    .description("Unique identifier. Generated by Grafana when not set.")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("A unique name for the data source")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("type", AttributeType::String)
                    .description("The data source type (e.g., prometheus, loki, influxdb)")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("url", AttributeType::String)
                    .description("The URL of the data source")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("access_mode", AttributeType::String)
                    .description("How Grafana reaches the data source: proxy or direct")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("is_default", AttributeType::Bool)
                    .description("Whether this is the default data source")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("database_name", AttributeType::String)
                    .description("Database name, for data sources that have one")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("username", AttributeType::String)
                    .description("Username for the data source")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("basic_auth_enabled", AttributeType::Bool)
                    .description("Whether to send basic auth credentials")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("basic_auth_username", AttributeType::String)
                    .description("Basic auth username")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(
                    "http_headers",
                    AttributeType::Map(Box::new(AttributeType::String)),
                )
                .description("Custom HTTP headers sent to the data source")
                .optional()
                .sensitive()
                .build(),
            )
            .attribute(
                AttributeBuilder::new("json_data_encoded", AttributeType::String)
                    .description("Serialized JSON string for jsonData. Conflicts with json_data.")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("secure_json_data_encoded", AttributeType::String)
                    .description(
                        "Serialized JSON string for secureJsonData. Write-only. \
                         Conflicts with secure_json_data.",
                    )
                    .optional()
                    .sensitive()
                    .build(),
            )
            .block(json_data.build())
            .block(secure_json_data.build())
            .build()
    }

    fn provider_data(&self) -> Result<&GrafanaProviderData, Diagnostic> {
        self.provider_data.as_ref().ok_or_else(|| {
            Diagnostic::error(
                "Provider not configured",
                "Provider data was not properly configured",
            )
        })
    }

    async fn create_data_source(
        &self,
        ctx: &Context,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, Diagnostic> {
        check_cancelled(ctx, "create")?;
        let provider_data = self.provider_data()?;

        let mut data_source = data_source_from_config(planned)?;
        data_source.org_id = provider_data.config.org_id;

        tracing::debug!(name = %data_source.name, ds_type = %data_source.ds_type, "Creating data source");
        let created = provider_data
            .api
            .create(&data_source)
            .await
            .map_err(|e| api_diagnostic("Failed to create data source", e))?;
        tracing::debug!(id = created.id, uid = %created.uid, "Created data source");

        state_from_data_source(planned, &created)
    }

    async fn read_data_source(
        &self,
        ctx: &Context,
        current: &DynamicValue,
    ) -> Result<Option<DynamicValue>, Diagnostic> {
        check_cancelled(ctx, "read")?;
        let provider_data = self.provider_data()?;

        let Some(id) = id_from_state(current)? else {
            return Ok(None);
        };

        match provider_data.api.get_by_id(id).await {
            Ok(data_source) => state_from_data_source(current, &data_source).map(Some),
            Err(e) if e.is_not_found() => {
                tracing::warn!(id, "Data source no longer exists, removing from state");
                Ok(None)
            }
            Err(e) => Err(api_diagnostic("Failed to read data source", e)),
        }
    }

    async fn update_data_source(
        &self,
        ctx: &Context,
        prior: &DynamicValue,
        planned: &DynamicValue,
    ) -> Result<DynamicValue, Diagnostic> {
        check_cancelled(ctx, "update")?;
        let provider_data = self.provider_data()?;

        let id = require_id(prior)?;
        let mut data_source = data_source_from_config(planned)?;
        data_source.id = id;
        data_source.org_id = provider_data.config.org_id;

        tracing::debug!(id, uid = %data_source.uid, "Updating data source");
        let updated = provider_data
            .api
            .update(&data_source)
            .await
            .map_err(|e| api_diagnostic("Failed to update data source", e))?;

        state_from_data_source(planned, &updated)
    }

    async fn delete_data_source(
        &self,
        ctx: &Context,
        prior: &DynamicValue,
    ) -> Result<(), Diagnostic> {
        check_cancelled(ctx, "delete")?;
        let provider_data = self.provider_data()?;
        let id = require_id(prior)?;

        tracing::debug!(id, "Deleting data source");
        match provider_data.api.delete(id).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => {
                tracing::debug!(id, "Data source already deleted");
                Ok(())
            }
            Err(e) => Err(api_diagnostic("Failed to delete data source", e)),
        }
    }

    async fn import_by_uid(&self, uid: &str) -> Result<DynamicValue, Diagnostic> {
        let provider_data = self.provider_data()?;

        let data_source = provider_data.api.get_by_uid(uid).await.map_err(|e| {
            if e.is_not_found() {
                Diagnostic::error(
                    "Cannot import non-existent data source",
                    format!("No data source with uid {:?} exists", uid),
                )
            } else {
                api_diagnostic("Failed to look up data source", e)
            }
        })?;

        let mut attributes = HashMap::new();
        attributes.insert(
            "id".to_string(),
            Dynamic::String(data_source.id.to_string()),
        );
        Ok(DynamicValue::new(Dynamic::Map(attributes)))
    }
}

#[async_trait]
impl Resource for DataSourceResource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ResourceMetadataRequest,
    ) -> ResourceMetadataResponse {
        ResourceMetadataResponse {
            type_name: self.type_name().to_string(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: Self::schema_static(),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        let mut diagnostics = vec![];
        let config = &request.config;

        validate_json_pair(
            config,
            "json_data",
            "json_data_encoded",
            json_data::decode_json_data,
            &mut diagnostics,
        );
        validate_json_pair(
            config,
            "secure_json_data",
            "secure_json_data_encoded",
            json_data::decode_secure_json_data,
            &mut diagnostics,
        );

        if let Ok(mode) = config.get_string(&AttributePath::new("access_mode")) {
            if !ACCESS_MODES.contains(&mode.as_str()) {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid access mode",
                        format!("Access mode must be one of: {:?}", ACCESS_MODES),
                    )
                    .with_attribute(AttributePath::new("access_mode")),
                );
            }
        }

        ValidateResourceConfigResponse { diagnostics }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        match self.create_data_source(&ctx, &request.planned_state).await {
            Ok(new_state) => CreateResourceResponse {
                new_state,
                diagnostics: vec![],
            },
            Err(diag) => CreateResourceResponse {
                new_state: request.planned_state,
                diagnostics: vec![diag],
            },
        }
    }

    async fn read(&self, ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        match self.read_data_source(&ctx, &request.current_state).await {
            Ok(new_state) => ReadResourceResponse {
                new_state,
                diagnostics: vec![],
            },
            Err(diag) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![diag],
            },
        }
    }

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        match self
            .update_data_source(&ctx, &request.prior_state, &request.planned_state)
            .await
        {
            Ok(new_state) => UpdateResourceResponse {
                new_state,
                diagnostics: vec![],
            },
            Err(diag) => UpdateResourceResponse {
                new_state: request.prior_state,
                diagnostics: vec![diag],
            },
        }
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let diagnostics = match self.delete_data_source(&ctx, &request.prior_state).await {
            Ok(()) => vec![],
            Err(diag) => vec![diag],
        };
        DeleteResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithConfigure for DataSourceResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        let mut diagnostics = vec![];

        if let Some(data) = request.provider_data {
            if let Some(provider_data) = data.downcast_ref::<GrafanaProviderData>() {
                self.provider_data = Some(provider_data.clone());
            } else {
                diagnostics.push(Diagnostic::error(
                    "Invalid provider data",
                    "Failed to extract GrafanaProviderData from provider data",
                ));
            }
        } else {
            diagnostics.push(Diagnostic::error(
                "No provider data",
                "No provider data was provided to the resource",
            ));
        }

        ConfigureResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithImportState for DataSourceResource {
    /// Numeric ids are imported as-is; anything else is treated as a uid
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse::default();

        if let Err(diag) = check_cancelled(&ctx, "import") {
            response.diagnostics.push(diag);
            return response;
        }

        if is_numeric_id(&request.id) {
            import_state_passthrough_id(AttributePath::new("id"), &request, &mut response);
            return response;
        }

        match self.import_by_uid(&request.id).await {
            Ok(state) => push_imported(&request, &mut response, state),
            Err(diag) => response.diagnostics.push(diag),
        }
        response
    }
}

#[async_trait]
impl ResourceWithUpgradeState for DataSourceResource {
    async fn upgrade_state(
        &self,
        ctx: Context,
        request: UpgradeResourceStateRequest,
    ) -> UpgradeResourceStateResponse {
        if let Err(diag) = check_cancelled(&ctx, "upgrade") {
            return UpgradeResourceStateResponse {
                upgraded_state: DynamicValue::null(),
                diagnostics: vec![diag],
            };
        }

        upgrade_resource_state(SCHEMA_VERSION, request, &[&DataSourceV0Upgrader])
    }
}

fn check_cancelled(ctx: &Context, operation: &str) -> Result<(), Diagnostic> {
    if ctx.is_cancelled() {
        return Err(Diagnostic::error(
            "Operation cancelled",
            format!("{} of {} was cancelled", operation, TYPE_NAME),
        ));
    }
    Ok(())
}

fn api_diagnostic(summary: &str, err: ApiError) -> Diagnostic {
    tracing::error!("{}: {}", summary, err);
    Diagnostic::error(summary, format!("API error: {}", err))
}

fn is_numeric_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_digit())
}

fn id_from_state(state: &DynamicValue) -> Result<Option<i64>, Diagnostic> {
    let Ok(id) = state.get_string(&AttributePath::new("id")) else {
        return Ok(None);
    };
    id.parse::<i64>().map(Some).map_err(|_| {
        Diagnostic::error(
            "Invalid data source id",
            format!("Expected a numeric id, got {:?}", id),
        )
        .with_attribute(AttributePath::new("id"))
    })
}

fn require_id(state: &DynamicValue) -> Result<i64, Diagnostic> {
    id_from_state(state)?.ok_or_else(|| {
        Diagnostic::error("Missing data source id", "The state has no 'id' attribute")
            .with_attribute(AttributePath::new("id"))
    })
}

/// Checks a block and its `_encoded` string counterpart: at most one block,
/// not both forms, and the string must decode to an object.
fn validate_json_pair(
    config: &DynamicValue,
    block_name: &str,
    encoded_name: &str,
    decode: fn(&str) -> Result<Map<String, serde_json::Value>, String>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let blocks = config
        .get_list(&AttributePath::new(block_name))
        .unwrap_or_default();
    if blocks.len() > 1 {
        diagnostics.push(
            Diagnostic::error(
                format!("Too many {} blocks", block_name),
                format!(
                    "At most one {} block is allowed, found {}",
                    block_name,
                    blocks.len()
                ),
            )
            .with_attribute(AttributePath::new(block_name)),
        );
    }

    if let Ok(encoded) = config.get_string(&AttributePath::new(encoded_name)) {
        if !blocks.is_empty() {
            diagnostics.push(
                Diagnostic::error(
                    "Conflicting configuration arguments",
                    format!("{} and {} cannot both be set", block_name, encoded_name),
                )
                .with_attribute(AttributePath::new(encoded_name)),
            );
        }
        if let Err(e) = decode(&encoded) {
            diagnostics.push(
                Diagnostic::error(format!("Invalid {}", encoded_name), e)
                    .with_attribute(AttributePath::new(encoded_name)),
            );
        }
    }
}

/// The first element of a list block, when it is an object
fn single_block(config: &DynamicValue, name: &str) -> Option<HashMap<String, Dynamic>> {
    config
        .get_list(&AttributePath::new(name))
        .ok()?
        .first()?
        .as_map()
        .cloned()
}

/// Builds the API payload from configuration or planned state
fn data_source_from_config(config: &DynamicValue) -> Result<DataSource, Diagnostic> {
    let name = config
        .get_string(&AttributePath::new("name"))
        .map_err(|_| Diagnostic::error("Missing name", "The 'name' attribute is required"))?;
    let ds_type = config
        .get_string(&AttributePath::new("type"))
        .map_err(|_| Diagnostic::error("Missing type", "The 'type' attribute is required"))?;

    let string = |name: &str| {
        config
            .get_string(&AttributePath::new(name))
            .unwrap_or_default()
    };
    let flag = |name: &str| config.get_bool(&AttributePath::new(name)).unwrap_or(false);

    let mut json_data = match single_block(config, "json_data") {
        Some(block) => json_data::block_to_api(&block),
        None => match config.get_string(&AttributePath::new("json_data_encoded")) {
            Ok(encoded) => json_data::decode_json_data(&encoded).map_err(|e| {
                Diagnostic::error("Invalid json_data_encoded", e)
                    .with_attribute(AttributePath::new("json_data_encoded"))
            })?,
            Err(_) => Map::new(),
        },
    };

    let mut secure_json_data = match single_block(config, "secure_json_data") {
        Some(block) => json_data::secure_block_to_api(&block),
        None => match config.get_string(&AttributePath::new("secure_json_data_encoded")) {
            Ok(encoded) => json_data::decode_secure_json_data(&encoded).map_err(|e| {
                Diagnostic::error("Invalid secure_json_data_encoded", e)
                    .with_attribute(AttributePath::new("secure_json_data_encoded"))
            })?,
            Err(_) => Map::new(),
        },
    };
    if let Ok(headers) = config.get_map(&AttributePath::new("http_headers")) {
        json_data::encode_http_headers(&headers, &mut json_data, &mut secure_json_data);
    }

    let access = config
        .get_string(&AttributePath::new("access_mode"))
        .unwrap_or_else(|_| DEFAULT_ACCESS_MODE.to_string());

    Ok(DataSource {
        id: 0,
        uid: string("uid"),
        org_id: None,
        name,
        ds_type,
        url: string("url"),
        access,
        is_default: flag("is_default"),
        database: string("database_name"),
        user: string("username"),
        basic_auth: flag("basic_auth_enabled"),
        basic_auth_user: string("basic_auth_username"),
        json_data,
        secure_json_data,
    })
}

/// Which of the two `json_data` representations a state uses
#[derive(Debug, Clone, Copy, PartialEq)]
enum JsonDataForm {
    Block,
    Encoded,
    Unset,
}

impl JsonDataForm {
    fn of(state: &DynamicValue) -> Self {
        let has_block = state
            .get_list(&AttributePath::new("json_data"))
            .is_ok_and(|blocks| !blocks.is_empty());
        if has_block {
            JsonDataForm::Block
        } else if state
            .get_string(&AttributePath::new("json_data_encoded"))
            .is_ok()
        {
            JsonDataForm::Encoded
        } else {
            JsonDataForm::Unset
        }
    }
}

/// Empty API values stay null unless the prior state held a value
fn optional_string(prior: &DynamicValue, name: &str, value: &str) -> Dynamic {
    let was_set = matches!(prior.get(&AttributePath::new(name)), Ok(Dynamic::String(_)));
    if value.is_empty() && !was_set {
        Dynamic::Null
    } else {
        Dynamic::String(value.to_string())
    }
}

fn optional_bool(prior: &DynamicValue, name: &str, value: bool) -> Dynamic {
    let was_set = matches!(prior.get(&AttributePath::new(name)), Ok(Dynamic::Bool(_)));
    if !value && !was_set {
        Dynamic::Null
    } else {
        Dynamic::Bool(value)
    }
}

/// Header values are write-only, so they are carried over from prior state
fn http_headers_state(prior: &DynamicValue, data_source: &DataSource) -> Dynamic {
    let names = json_data::http_header_names(&data_source.json_data);
    if names.is_empty() {
        return Dynamic::Null;
    }

    let prior_headers = prior
        .get_map(&AttributePath::new("http_headers"))
        .unwrap_or_default();
    Dynamic::Map(
        names
            .into_iter()
            .map(|name| {
                let value = prior_headers
                    .get(&name)
                    .cloned()
                    .unwrap_or_else(|| Dynamic::String(String::new()));
                (name, value)
            })
            .collect(),
    )
}

/// Grafana never returns `secureJsonData`, so both secure forms keep
/// whatever the prior state held.
fn secure_json_data_state(prior: &DynamicValue) -> (Dynamic, Dynamic) {
    let block = match prior.get(&AttributePath::new("secure_json_data")) {
        Ok(Dynamic::List(blocks)) => Dynamic::List(blocks.clone()),
        _ => Dynamic::List(vec![]),
    };
    let encoded = match prior.get(&AttributePath::new("secure_json_data_encoded")) {
        Ok(Dynamic::String(encoded)) => Dynamic::String(encoded.clone()),
        _ => Dynamic::Null,
    };
    (block, encoded)
}

/// Configured text that means the same as what Grafana holds is kept as
/// written; otherwise the canonical encoding is stored.
fn json_data_encoded_state(
    prior: &DynamicValue,
    data_source: &DataSource,
) -> Result<String, Diagnostic> {
    if let Ok(configured) = prior.get_string(&AttributePath::new("json_data_encoded")) {
        let remote = json_data::strip_http_header_names(&data_source.json_data);
        if json_data::decode_json_data(&configured).is_ok_and(|parsed| parsed == remote) {
            return Ok(configured);
        }
    }

    json_data::encode_json_data(&data_source.json_data).map_err(|e| {
        Diagnostic::error(
            "Failed to encode json_data",
            format!("Could not serialize jsonData: {}", e),
        )
    })
}

/// Builds resource state from what Grafana returned. `prior` decides which
/// `json_data` form is used and supplies write-only values.
fn state_from_data_source(
    prior: &DynamicValue,
    data_source: &DataSource,
) -> Result<DynamicValue, Diagnostic> {
    let access = if data_source.access.is_empty() {
        DEFAULT_ACCESS_MODE
    } else {
        data_source.access.as_str()
    };

    let mut attributes: HashMap<String, Dynamic> = [
        ("id", Dynamic::String(data_source.id.to_string())),
        ("uid", Dynamic::String(data_source.uid.clone())),
        ("name", Dynamic::String(data_source.name.clone())),
        ("type", Dynamic::String(data_source.ds_type.clone())),
        ("url", optional_string(prior, "url", &data_source.url)),
        ("access_mode", Dynamic::String(access.to_string())),
        (
            "is_default",
            optional_bool(prior, "is_default", data_source.is_default),
        ),
        (
            "database_name",
            optional_string(prior, "database_name", &data_source.database),
        ),
        (
            "username",
            optional_string(prior, "username", &data_source.user),
        ),
        (
            "basic_auth_enabled",
            optional_bool(prior, "basic_auth_enabled", data_source.basic_auth),
        ),
        (
            "basic_auth_username",
            optional_string(prior, "basic_auth_username", &data_source.basic_auth_user),
        ),
        ("http_headers", http_headers_state(prior, data_source)),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_string(), value))
    .collect();

    let form = match JsonDataForm::of(prior) {
        JsonDataForm::Unset if json_data::is_effectively_empty(&data_source.json_data) => {
            JsonDataForm::Unset
        }
        JsonDataForm::Unset => JsonDataForm::Encoded,
        form => form,
    };

    let (block, encoded) = match form {
        JsonDataForm::Block => (
            Dynamic::List(vec![Dynamic::Map(json_data::api_to_block(
                &data_source.json_data,
            ))]),
            Dynamic::Null,
        ),
        JsonDataForm::Encoded => (
            Dynamic::List(vec![]),
            Dynamic::String(json_data_encoded_state(prior, data_source)?),
        ),
        JsonDataForm::Unset => (Dynamic::List(vec![]), Dynamic::Null),
    };
    attributes.insert("json_data".to_string(), block);
    attributes.insert("json_data_encoded".to_string(), encoded);

    let (secure_block, secure_encoded) = secure_json_data_state(prior);
    attributes.insert("secure_json_data".to_string(), secure_block);
    attributes.insert("secure_json_data_encoded".to_string(), secure_encoded);

    Ok(DynamicValue::new(Dynamic::Map(attributes)))
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: serde_json::Value) -> DynamicValue {
        DynamicValue::new(Dynamic::from(value))
    }

    async fn validate(value: serde_json::Value) -> Vec<Diagnostic> {
        DataSourceResource::new()
            .validate(
                Context::new(),
                ValidateResourceConfigRequest {
                    type_name: TYPE_NAME.to_string(),
                    config: config(value),
                },
            )
            .await
            .diagnostics
    }

    #[test]
    fn schema_is_version_one_with_json_data_block() {
        let schema = DataSourceResource::schema_static();

        assert_eq!(schema.version, SCHEMA_VERSION);
        assert!(schema.attribute("name").is_some_and(|a| a.required));
        assert!(schema.attribute("id").is_some_and(|a| a.computed));
        assert!(schema.attribute("http_headers").is_some_and(|a| a.sensitive));

        let block = schema.block_type("json_data").unwrap();
        assert_eq!(block.max_items, 1);
        assert_eq!(block.block.attributes.len(), JSON_DATA_FIELDS.len());
        let tsdb_version = block
            .block
            .attributes
            .iter()
            .find(|a| a.name == "tsdb_version")
            .unwrap();
        assert_eq!(tsdb_version.r#type, AttributeType::Number);
    }

    #[test]
    fn secure_values_are_sensitive_in_schema() {
        let schema = DataSourceResource::schema_static();

        assert!(schema
            .attribute("secure_json_data_encoded")
            .is_some_and(|a| a.sensitive && a.optional));

        let block = schema.block_type("secure_json_data").unwrap();
        assert_eq!(block.max_items, 1);
        assert_eq!(block.block.attributes.len(), SECURE_JSON_DATA_FIELDS.len());
        assert!(block.block.attributes.iter().all(|a| a.sensitive));
    }

    #[tokio::test]
    async fn validate_accepts_minimal_config() {
        let diags = validate(json!({"name": "prom", "type": "prometheus"})).await;
        assert!(diags.is_empty());
    }

    #[tokio::test]
    async fn validate_rejects_both_json_data_forms() {
        let diags = validate(json!({
            "name": "prom",
            "type": "prometheus",
            "json_data": [{"http_method": "GET"}],
            "json_data_encoded": "{\"httpMethod\":\"GET\"}",
        }))
        .await;

        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, "Conflicting configuration arguments");
    }

    #[tokio::test]
    async fn validate_rejects_bad_encoded_json_and_access_mode() {
        let diags = validate(json!({
            "name": "prom",
            "type": "prometheus",
            "access_mode": "server",
            "json_data_encoded": "[1, 2]",
        }))
        .await;

        let summaries: Vec<&str> = diags.iter().map(|d| d.summary.as_str()).collect();
        assert_eq!(summaries, ["Invalid json_data_encoded", "Invalid access mode"]);
    }

    #[tokio::test]
    async fn validate_checks_secure_json_data_forms() {
        let diags = validate(json!({
            "name": "prom",
            "type": "prometheus",
            "secure_json_data": [{"password": "pass"}],
            "secure_json_data_encoded": "{\"password\":\"pass\"}",
        }))
        .await;
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, "Conflicting configuration arguments");
        assert_eq!(
            diags[0].detail,
            "secure_json_data and secure_json_data_encoded cannot both be set"
        );

        let diags = validate(json!({
            "name": "prom",
            "type": "prometheus",
            "secure_json_data_encoded": "pass",
        }))
        .await;
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, "Invalid secure_json_data_encoded");
    }

    #[tokio::test]
    async fn validate_rejects_more_than_one_block() {
        let diags = validate(json!({
            "name": "prom",
            "type": "prometheus",
            "json_data": [{"http_method": "GET"}, {"http_method": "POST"}],
        }))
        .await;

        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, "Too many json_data blocks");
    }

    #[test]
    fn config_maps_to_api_payload() {
        let ds = data_source_from_config(&config(json!({
            "name": "opentsdb",
            "type": "opentsdb",
            "url": "http://acc-test.invalid/",
            "is_default": true,
            "http_headers": {"Authorization": "Token abc"},
            "json_data": [{"tsdb_version": 1, "tsdb_resolution": 2, "http_method": null}],
        })))
        .unwrap();

        assert_eq!(ds.name, "opentsdb");
        assert_eq!(ds.access, "proxy");
        assert!(ds.is_default);
        assert_eq!(
            serde_json::Value::Object(ds.json_data),
            json!({"tsdbResolution": 2, "tsdbVersion": 1, "httpHeaderName1": "Authorization"})
        );
        assert_eq!(ds.secure_json_data["httpHeaderValue1"], json!("Token abc"));
    }

    #[test]
    fn secure_values_merge_with_header_values() {
        let ds = data_source_from_config(&config(json!({
            "name": "cloudwatch",
            "type": "cloudwatch",
            "http_headers": {"X-Org": "1"},
            "secure_json_data_encoded": "{\"accessKey\":\"AKIA\",\"secretKey\":\"s3cret\"}",
        })))
        .unwrap();
        assert_eq!(
            serde_json::Value::Object(ds.secure_json_data),
            json!({"accessKey": "AKIA", "secretKey": "s3cret", "httpHeaderValue1": "1"})
        );

        let ds = data_source_from_config(&config(json!({
            "name": "postgres",
            "type": "postgres",
            "secure_json_data": [{"password": "pass", "private_key": null}],
        })))
        .unwrap();
        assert_eq!(
            serde_json::Value::Object(ds.secure_json_data),
            json!({"password": "pass"})
        );
    }

    #[test]
    fn config_requires_name_and_type() {
        let err = data_source_from_config(&config(json!({"type": "loki"}))).unwrap_err();
        assert_eq!(err.summary, "Missing name");

        let err = data_source_from_config(&config(json!({"name": "loki"}))).unwrap_err();
        assert_eq!(err.summary, "Missing type");
    }

    fn remote(json_data: serde_json::Value) -> DataSource {
        DataSource {
            id: 12,
            uid: "abc".to_string(),
            name: "influx".to_string(),
            ds_type: "influxdb".to_string(),
            access: "proxy".to_string(),
            json_data: json_data.as_object().cloned().unwrap_or_default(),
            ..Default::default()
        }
    }

    #[test]
    fn block_form_refreshes_block() {
        let prior = config(json!({"json_data": [{"default_bucket": "old"}]}));

        let state =
            state_from_data_source(&prior, &remote(json!({"defaultBucket": "new"}))).unwrap();

        let path = AttributePath::new("json_data").index(0).attribute("default_bucket");
        assert_eq!(state.get_string(&path).unwrap(), "new");
        assert!(state
            .get(&AttributePath::new("json_data_encoded"))
            .unwrap()
            .is_null());
        assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "12");
    }

    #[test]
    fn encoded_form_keeps_equivalent_text() {
        let written = "{ \"organization\": \"org\", \"defaultBucket\": \"b\" }";
        let prior = config(json!({"json_data_encoded": written}));

        let state = state_from_data_source(
            &prior,
            &remote(json!({"defaultBucket": "b", "organization": "org"})),
        )
        .unwrap();

        assert_eq!(
            state
                .get_string(&AttributePath::new("json_data_encoded"))
                .unwrap(),
            written
        );
    }

    #[test]
    fn encoded_form_reports_drift_canonically() {
        let prior = config(json!({"json_data_encoded": "{\"defaultBucket\":\"b\"}"}));

        let state = state_from_data_source(
            &prior,
            &remote(json!({"organization": "org", "defaultBucket": "c"})),
        )
        .unwrap();

        assert_eq!(
            state
                .get_string(&AttributePath::new("json_data_encoded"))
                .unwrap(),
            r#"{"defaultBucket":"c","organization":"org"}"#
        );
        assert!(state
            .get_list(&AttributePath::new("json_data"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn unset_form_picks_encoded_only_when_needed() {
        let prior = config(json!({"id": "12"}));

        let state = state_from_data_source(&prior, &remote(json!({}))).unwrap();
        assert!(state
            .get(&AttributePath::new("json_data_encoded"))
            .unwrap()
            .is_null());

        let state =
            state_from_data_source(&prior, &remote(json!({"tlsSkipVerify": true}))).unwrap();
        assert_eq!(
            state
                .get_string(&AttributePath::new("json_data_encoded"))
                .unwrap(),
            r#"{"tlsSkipVerify":true}"#
        );
    }

    #[test]
    fn header_values_come_from_prior_state() {
        let prior = config(json!({"http_headers": {"Authorization": "Token abc"}}));

        let state = state_from_data_source(
            &prior,
            &remote(json!({"httpHeaderName1": "Authorization", "httpHeaderName2": "X-Org"})),
        )
        .unwrap();

        let headers = state.get_map(&AttributePath::new("http_headers")).unwrap();
        assert_eq!(headers["Authorization"], Dynamic::String("Token abc".to_string()));
        assert_eq!(headers["X-Org"], Dynamic::String(String::new()));
        assert!(state
            .get(&AttributePath::new("json_data_encoded"))
            .unwrap()
            .is_null());
    }

    #[test]
    fn secure_values_come_from_prior_state() {
        let prior = config(json!({
            "secure_json_data": [{"password": "pass"}],
            "secure_json_data_encoded": "{\"authToken\":\"t\"}",
        }));

        let state = state_from_data_source(&prior, &remote(json!({}))).unwrap();
        assert_eq!(
            state
                .get_string(&AttributePath::new("secure_json_data").index(0).attribute("password"))
                .unwrap(),
            "pass"
        );
        assert_eq!(
            state
                .get_string(&AttributePath::new("secure_json_data_encoded"))
                .unwrap(),
            "{\"authToken\":\"t\"}"
        );

        let imported = state_from_data_source(&config(json!({"id": "12"})), &remote(json!({})))
            .unwrap();
        assert!(imported
            .get_list(&AttributePath::new("secure_json_data"))
            .unwrap()
            .is_empty());
        assert!(imported
            .get(&AttributePath::new("secure_json_data_encoded"))
            .unwrap()
            .is_null());
    }

    #[test]
    fn empty_remote_values_stay_null() {
        let prior = config(json!({"username": "", "is_default": false}));

        let state = state_from_data_source(&prior, &remote(json!({}))).unwrap();

        assert!(state.get(&AttributePath::new("url")).unwrap().is_null());
        assert!(state
            .get(&AttributePath::new("basic_auth_enabled"))
            .unwrap()
            .is_null());
        assert_eq!(state.get_string(&AttributePath::new("username")).unwrap(), "");
        assert!(!state.get_bool(&AttributePath::new("is_default")).unwrap());
    }

    #[test]
    fn ids_must_be_numeric() {
        assert!(is_numeric_id("42"));
        assert!(!is_numeric_id("P1809F7CD0C75ACF3"));
        assert!(!is_numeric_id(""));
        assert!(!is_numeric_id("-1"));

        let err = require_id(&config(json!({"id": "abc"}))).unwrap_err();
        assert_eq!(err.summary, "Invalid data source id");
        let err = require_id(&config(json!({}))).unwrap_err();
        assert_eq!(err.summary, "Missing data source id");
    }

    #[tokio::test]
    async fn operations_fail_without_provider_data() {
        let resource = DataSourceResource::new();

        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    planned_state: config(json!({"name": "a", "type": "loki"})),
                    config: config(json!({"name": "a", "type": "loki"})),
                },
            )
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].summary, "Provider not configured");
    }

    #[tokio::test]
    async fn cancelled_context_stops_before_api_calls() {
        let resource = DataSourceResource::new();
        let ctx = Context::new();
        ctx.cancel();

        let response = resource
            .read(
                ctx,
                ReadResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    current_state: config(json!({"id": "1"})),
                },
            )
            .await;

        assert_eq!(response.diagnostics[0].summary, "Operation cancelled");
        assert!(response.new_state.is_some());
    }

    #[tokio::test]
    async fn configure_rejects_foreign_provider_data() {
        let mut resource = DataSourceResource::new();

        let response = resource
            .configure(
                Context::new(),
                ConfigureResourceRequest {
                    provider_data: Some(std::sync::Arc::new("not provider data")),
                },
            )
            .await;
        assert_eq!(response.diagnostics[0].summary, "Invalid provider data");

        let response = resource
            .configure(
                Context::new(),
                ConfigureResourceRequest {
                    provider_data: None,
                },
            )
            .await;
        assert_eq!(response.diagnostics[0].summary, "No provider data");
    }
}

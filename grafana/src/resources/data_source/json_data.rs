//! Mapping between the `json_data` block and Grafana's `jsonData`
//!
//! The block uses snake_case attribute names, the API camelCase keys. HTTP
//! headers travel as numbered `httpHeaderName<N>` / `httpHeaderValue<N>`
//! pairs split across `jsonData` and `secureJsonData`. The
//! `secure_json_data` block maps onto `secureJsonData` the same way.

use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType};
use tfplug::Dynamic;

const HEADER_NAME_PREFIX: &str = "httpHeaderName";
const HEADER_VALUE_PREFIX: &str = "httpHeaderValue";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    String,
    Number,
    Bool,
}

#[derive(Debug)]
pub struct JsonDataField {
    pub attribute: &'static str,
    pub api_key: &'static str,
    pub kind: FieldKind,
    pub description: &'static str,
    pub sensitive: bool,
}

impl JsonDataField {
    const fn new(
        attribute: &'static str,
        api_key: &'static str,
        kind: FieldKind,
        description: &'static str,
    ) -> Self {
        Self {
            attribute,
            api_key,
            kind,
            description,
            sensitive: false,
        }
    }

    /// A write-only string sent in `secureJsonData`
    const fn secret(
        attribute: &'static str,
        api_key: &'static str,
        description: &'static str,
    ) -> Self {
        Self {
            attribute,
            api_key,
            kind: FieldKind::String,
            description,
            sensitive: true,
        }
    }

    pub fn schema_attribute(&self) -> Attribute {
        let type_ = match self.kind {
            FieldKind::String => AttributeType::String,
            FieldKind::Number => AttributeType::Number,
            FieldKind::Bool => AttributeType::Bool,
        };
        let builder = AttributeBuilder::new(self.attribute, type_)
            .description(self.description)
            .optional();
        if self.sensitive {
            builder.sensitive().build()
        } else {
            builder.build()
        }
    }

    /// Reads the API value back into the attribute's type. Grafana keeps
    /// whatever JSON it was given, so numbers and booleans may come back as
    /// strings.
    fn decode(&self, value: &Value) -> Dynamic {
        match (self.kind, value) {
            (FieldKind::Number, Value::String(s)) => s
                .parse::<f64>()
                .map(Dynamic::Number)
                .unwrap_or(Dynamic::Null),
            (FieldKind::Bool, Value::String(s)) => s
                .parse::<bool>()
                .map(Dynamic::Bool)
                .unwrap_or(Dynamic::Null),
            _ => Dynamic::from(value.clone()),
        }
    }
}

pub const JSON_DATA_FIELDS: &[JsonDataField] = &[
    JsonDataField::new(
        "alertmanager_uid",
        "alertmanagerUid",
        FieldKind::String,
        "(Prometheus) UID of the Alertmanager that manages alerts for this data source",
    ),
    JsonDataField::new(
        "default_bucket",
        "defaultBucket",
        FieldKind::String,
        "(InfluxDB) Default bucket for Flux queries",
    ),
    JsonDataField::new(
        "es_version",
        "esVersion",
        FieldKind::String,
        "(Elasticsearch) Elasticsearch version",
    ),
    JsonDataField::new(
        "graphite_version",
        "graphiteVersion",
        FieldKind::String,
        "(Graphite) Graphite version",
    ),
    JsonDataField::new(
        "http_method",
        "httpMethod",
        FieldKind::String,
        "(Prometheus) HTTP method used for queries",
    ),
    JsonDataField::new(
        "manage_alerts",
        "manageAlerts",
        FieldKind::Bool,
        "(Prometheus) Manage alerts from the alerting UI",
    ),
    JsonDataField::new(
        "max_lines",
        "maxLines",
        FieldKind::Number,
        "(Loki) Upper limit for the number of log lines returned",
    ),
    JsonDataField::new(
        "organization",
        "organization",
        FieldKind::String,
        "(InfluxDB) Organization for Flux queries",
    ),
    JsonDataField::new(
        "query_timeout",
        "queryTimeout",
        FieldKind::String,
        "(Prometheus) Timeout for queries",
    ),
    JsonDataField::new(
        "time_field",
        "timeField",
        FieldKind::String,
        "(Elasticsearch) Name of the time field",
    ),
    JsonDataField::new(
        "time_interval",
        "timeInterval",
        FieldKind::String,
        "Lowest interval for group by time",
    ),
    JsonDataField::new(
        "tsdb_resolution",
        "tsdbResolution",
        FieldKind::Number,
        "(OpenTSDB) Resolution",
    ),
    JsonDataField::new(
        "tsdb_version",
        "tsdbVersion",
        FieldKind::Number,
        "(OpenTSDB) Version",
    ),
    JsonDataField::new(
        "xpack_enabled",
        "xpack",
        FieldKind::Bool,
        "(Elasticsearch) Enable X-Pack support",
    ),
];

pub const SECURE_JSON_DATA_FIELDS: &[JsonDataField] = &[
    JsonDataField::secret("access_key", "accessKey", "(CloudWatch, Athena) Access key"),
    JsonDataField::secret("access_token", "accessToken", "Access token"),
    JsonDataField::secret("auth_token", "authToken", "(Cloud Monitoring) Auth token"),
    JsonDataField::secret("client_secret", "clientSecret", "(Azure Monitor) Client secret"),
    JsonDataField::secret("password", "password", "Password for the data source"),
    JsonDataField::secret("private_key", "privateKey", "(Cloud Monitoring) Private key"),
    JsonDataField::secret("secret_key", "secretKey", "(CloudWatch, Athena) Secret key"),
];

fn fields_to_api(
    fields: &[JsonDataField],
    block: &HashMap<String, Dynamic>,
) -> Map<String, Value> {
    let mut api = Map::new();
    for field in fields {
        match block.get(field.attribute) {
            None | Some(Dynamic::Null) | Some(Dynamic::Unknown) => {}
            Some(value) => {
                api.insert(field.api_key.to_string(), value.to_json());
            }
        }
    }
    api
}

/// Converts one `json_data` block into API `jsonData`. Unset attributes are
/// not sent.
pub fn block_to_api(block: &HashMap<String, Dynamic>) -> Map<String, Value> {
    fields_to_api(JSON_DATA_FIELDS, block)
}

/// Converts one `secure_json_data` block into API `secureJsonData`
pub fn secure_block_to_api(block: &HashMap<String, Dynamic>) -> Map<String, Value> {
    fields_to_api(SECURE_JSON_DATA_FIELDS, block)
}

/// Converts API `jsonData` into a `json_data` block. Every attribute is
/// present; keys Grafana did not return are null.
pub fn api_to_block(json_data: &Map<String, Value>) -> HashMap<String, Dynamic> {
    JSON_DATA_FIELDS
        .iter()
        .map(|field| {
            let value = json_data
                .get(field.api_key)
                .map_or(Dynamic::Null, |v| field.decode(v));
            (field.attribute.to_string(), value)
        })
        .collect()
}

/// Writes headers as numbered name/value pairs, numbered from 1 in name order
pub fn encode_http_headers(
    headers: &HashMap<String, Dynamic>,
    json_data: &mut Map<String, Value>,
    secure_json_data: &mut Map<String, Value>,
) {
    let mut names: Vec<&String> = headers.keys().collect();
    names.sort();

    for (idx, name) in names.into_iter().enumerate() {
        let n = idx + 1;
        json_data.insert(format!("{HEADER_NAME_PREFIX}{n}"), Value::String(name.clone()));
        if let Some(value) = headers[name].as_str() {
            secure_json_data.insert(
                format!("{HEADER_VALUE_PREFIX}{n}"),
                Value::String(value.to_string()),
            );
        }
    }
}

/// Header names present in API `jsonData`, in header number order
pub fn http_header_names(json_data: &Map<String, Value>) -> Vec<String> {
    let mut numbered: Vec<(u32, String)> = json_data
        .iter()
        .filter_map(|(key, value)| {
            let n = key.strip_prefix(HEADER_NAME_PREFIX)?.parse::<u32>().ok()?;
            Some((n, value.as_str()?.to_string()))
        })
        .collect();
    numbered.sort();
    numbered.into_iter().map(|(_, name)| name).collect()
}

fn is_header_name_key(key: &str) -> bool {
    key.strip_prefix(HEADER_NAME_PREFIX)
        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}

/// API `jsonData` without the `httpHeaderName<N>` keys
pub fn strip_http_header_names(json_data: &Map<String, Value>) -> Map<String, Value> {
    json_data
        .iter()
        .filter(|(key, _)| !is_header_name_key(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Canonical `json_data_encoded` form of API `jsonData`: compact JSON with
/// keys sorted at every level and header names left out.
pub fn encode_json_data(json_data: &Map<String, Value>) -> serde_json::Result<String> {
    let filtered: BTreeMap<&String, Value> = json_data
        .iter()
        .filter(|(key, _)| !is_header_name_key(key))
        .map(|(key, value)| (key, sorted(value)))
        .collect();
    serde_json::to_string(&filtered)
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(object) => {
            let ordered: BTreeMap<&String, Value> =
                object.iter().map(|(k, v)| (k, sorted(v))).collect();
            Value::Object(
                ordered
                    .into_iter()
                    .map(|(k, v)| (k.clone(), v))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

fn decode_object(attribute: &str, encoded: &str) -> Result<Map<String, Value>, String> {
    match serde_json::from_str::<Value>(encoded) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(_) => Err(format!("{} must be a JSON object", attribute)),
        Err(e) => Err(format!("{} is not valid JSON: {}", attribute, e)),
    }
}

/// Parses `json_data_encoded`, which must hold a JSON object
pub fn decode_json_data(encoded: &str) -> Result<Map<String, Value>, String> {
    decode_object("json_data_encoded", encoded)
}

/// Parses `secure_json_data_encoded`, which must hold a JSON object
pub fn decode_secure_json_data(encoded: &str) -> Result<Map<String, Value>, String> {
    decode_object("secure_json_data_encoded", encoded)
}

/// True when API `jsonData` has nothing besides header names
pub fn is_effectively_empty(json_data: &Map<String, Value>) -> bool {
    json_data.keys().all(|key| is_header_name_key(key))
}

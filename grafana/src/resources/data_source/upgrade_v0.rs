//! Schema version 0 -> 1 upgrade of `grafana_data_source` state
//!
//! Version 0 stored `json_data.0.tsdb_version` and `json_data.0.tsdb_resolution`
//! as strings, including the empty string. Version 1 types both as numbers.

use serde_json::{Map, Value};
use tfplug::upgrade::{StateRecord, StateUpgrader};
use tfplug::TfplugError;

const JSON_DATA: &str = "json_data";
const INTEGER_FIELDS: [&str; 2] = ["tsdb_resolution", "tsdb_version"];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UpgradeError {
    #[error("json_data.0.{field}: {value:?} is not an integer")]
    MalformedNumericField { field: String, value: String },

    #[error("json_data: {0}")]
    UnexpectedShape(String),
}

impl From<UpgradeError> for TfplugError {
    fn from(err: UpgradeError) -> Self {
        TfplugError::UpgradeFailed(err.to_string())
    }
}

/// What a version 0 record holds in one of the integer fields
#[derive(Debug, PartialEq)]
enum StoredValue<'a> {
    Null,
    String(&'a str),
    Integer(i64),
    Other(&'a Value),
}

impl<'a> From<&'a Value> for StoredValue<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Null => StoredValue::Null,
            Value::String(s) => StoredValue::String(s),
            Value::Number(n) => n
                .as_i64()
                .map_or(StoredValue::Other(value), StoredValue::Integer),
            other => StoredValue::Other(other),
        }
    }
}

fn normalize_integer(field: &str, value: &Value) -> Result<Value, UpgradeError> {
    match StoredValue::from(value) {
        StoredValue::Null | StoredValue::String("") => Ok(Value::from(0)),
        StoredValue::String(s) => {
            s.parse::<i64>()
                .map(Value::from)
                .map_err(|_| UpgradeError::MalformedNumericField {
                    field: field.to_string(),
                    value: s.to_string(),
                })
        }
        StoredValue::Integer(_) | StoredValue::Other(_) => Ok(value.clone()),
    }
}

/// Upgrades a version 0 record. The prior record is left untouched; a new
/// record is returned with the same keys in the same order.
pub fn upgrade_data_source_state_v0(prior: &StateRecord) -> Result<StateRecord, UpgradeError> {
    let blocks = match prior.get(JSON_DATA) {
        None | Some(Value::Null) => return Ok(prior.clone()),
        Some(Value::Array(blocks)) => blocks,
        Some(_) => {
            return Err(UpgradeError::UnexpectedShape(
                "expected a list of blocks".to_string(),
            ))
        }
    };

    let block = match blocks.as_slice() {
        [] => return Ok(prior.clone()),
        [Value::Object(block)] => block,
        [_] => {
            return Err(UpgradeError::UnexpectedShape(
                "block is not an object".to_string(),
            ))
        }
        many => {
            return Err(UpgradeError::UnexpectedShape(format!(
                "expected at most one block, found {}",
                many.len()
            )))
        }
    };

    let mut upgraded_block = Map::with_capacity(block.len());
    for (key, value) in block {
        let value = if INTEGER_FIELDS.contains(&key.as_str()) {
            normalize_integer(key, value)?
        } else {
            value.clone()
        };
        upgraded_block.insert(key.clone(), value);
    }

    // Replacing an existing key keeps its position
    let mut upgraded = prior.clone();
    upgraded.insert(
        JSON_DATA.to_string(),
        Value::Array(vec![Value::Object(upgraded_block)]),
    );
    Ok(upgraded)
}

/// Registers [`upgrade_data_source_state_v0`] for schema version 0
pub struct DataSourceV0Upgrader;

impl StateUpgrader for DataSourceV0Upgrader {
    fn version(&self) -> i64 {
        0
    }

    fn upgrade(&self, prior: &StateRecord) -> tfplug::Result<StateRecord> {
        Ok(upgrade_data_source_state_v0(prior)?)
    }
}

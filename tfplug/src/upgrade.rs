//! Schema version upgrades for stored resource state
//!
//! When Terraform loads state written under an older schema version it asks
//! the provider to upgrade it. Resources register one [`StateUpgrader`] per
//! historical version; [`upgrade_resource_state`] decodes the raw state and
//! runs the upgraders in order until the record matches the current schema.

use crate::error::{Result, TfplugError};
use crate::resource::{UpgradeResourceStateRequest, UpgradeResourceStateResponse};
use crate::types::{Diagnostic, DynamicValue, RawState};
use serde_json::{Map, Value};

/// Stored state as a JSON object. Key order is preserved.
pub type StateRecord = Map<String, Value>;

/// Transforms state written with schema `version()` into the shape of
/// `version() + 1`.
///
/// Upgraders are pure: they receive the prior record by reference and
/// return a new one, so a failed upgrade never leaves a half-written record
/// behind.
pub trait StateUpgrader: Send + Sync {
    /// Schema version this upgrader accepts
    fn version(&self) -> i64;

    fn upgrade(&self, prior: &StateRecord) -> Result<StateRecord>;
}

/// Decodes the JSON form of raw state into a record
pub fn decode_raw_state(raw_state: &RawState) -> Result<StateRecord> {
    let Some(json) = raw_state.json.as_deref() else {
        return Err(if raw_state.flatmap.is_some() {
            TfplugError::InvalidState(
                "flatmap state is not supported, refresh the state with Terraform 0.12 or later"
                    .to_string(),
            )
        } else {
            TfplugError::InvalidState("raw state is empty".to_string())
        });
    };

    match serde_json::from_slice::<Value>(json)? {
        Value::Object(record) => Ok(record),
        other => Err(TfplugError::InvalidState(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

/// Runs the upgraders needed to bring `record` from `stored_version` to
/// `current_version`
pub fn run_upgraders(
    record: StateRecord,
    stored_version: i64,
    current_version: i64,
    upgraders: &[&dyn StateUpgrader],
) -> Result<StateRecord> {
    if stored_version > current_version {
        return Err(TfplugError::UpgradeFailed(format!(
            "stored state has schema version {} but this provider only knows up to {}",
            stored_version, current_version
        )));
    }

    let mut record = record;
    for version in stored_version..current_version {
        let upgrader = upgraders
            .iter()
            .find(|u| u.version() == version)
            .ok_or(TfplugError::MissingUpgrader(version))?;

        tracing::debug!(from = version, to = version + 1, "Upgrading resource state");
        record = upgrader.upgrade(&record)?;
    }

    Ok(record)
}

/// Implements the upgrade-state protocol for a resource
///
/// On failure the response carries a null state and an error diagnostic so
/// the host keeps the previously stored state untouched.
pub fn upgrade_resource_state(
    current_version: i64,
    request: UpgradeResourceStateRequest,
    upgraders: &[&dyn StateUpgrader],
) -> UpgradeResourceStateResponse {
    let result = decode_raw_state(&request.raw_state).and_then(|record| {
        run_upgraders(record, request.version, current_version, upgraders)
    });

    match result {
        Ok(record) => UpgradeResourceStateResponse {
            upgraded_state: DynamicValue::from_record(record),
            diagnostics: vec![],
        },
        Err(e) => {
            tracing::error!(
                type_name = %request.type_name,
                version = request.version,
                "State upgrade failed: {}",
                e
            );
            UpgradeResourceStateResponse {
                upgraded_state: DynamicValue::null(),
                diagnostics: vec![Diagnostic::error(
                    "Failed to upgrade resource state",
                    format!(
                        "Could not upgrade {} state from schema version {} to {}: {}",
                        request.type_name, request.version, current_version, e
                    ),
                )],
            }
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

//! Import helpers for simplifying resource import implementations

use crate::resource::{ImportResourceStateRequest, ImportResourceStateResponse, ImportedResource};
use crate::types::{AttributePath, Diagnostic, DynamicValue};

/// Sets the import ID to a specific attribute in state
///
/// This is useful for simple resources where the import ID maps directly to
/// a single attribute in the resource state. The following read fills in
/// the rest.
///
/// Example: ID "42" -> state.id = "42"
pub fn import_state_passthrough_id(
    attr_path: AttributePath,
    request: &ImportResourceStateRequest,
    response: &mut ImportResourceStateResponse,
) {
    let mut state = DynamicValue::object();

    if let Err(e) = state.set_string(&attr_path, request.id.clone()) {
        response.diagnostics.push(
            Diagnostic::error(
                format!("Failed to set import ID: {}", e),
                format!(
                    "Could not set attribute '{:?}' to value '{}'",
                    attr_path, request.id
                ),
            )
            .with_attribute(attr_path),
        );
        return;
    }

    push_imported(request, response, state);
}

/// Records a fully populated state as the result of an import
pub fn push_imported(
    request: &ImportResourceStateRequest,
    response: &mut ImportResourceStateResponse,
    state: DynamicValue,
) {
    response.imported_resources.push(ImportedResource {
        type_name: request.type_name.clone(),
        state,
    });
}

//! tfplug - Terraform Plugin Framework for Rust
//!
//! Provider-side building blocks for Terraform providers written in Rust:
//! dynamic values, schemas, resource traits, import helpers and schema
//! version upgrades of stored state.

// Core modules
pub mod context;
pub mod error;
pub mod schema;
pub mod types;

// Provider API modules
pub mod provider;
pub mod resource;

// Helper modules
pub mod import;
pub mod upgrade;

// Re-exports for convenience
pub use context::Context;
pub use error::{Result, TfplugError};
pub use import::import_state_passthrough_id;
pub use provider::{ConfigureProviderRequest, ConfigureProviderResponse, Provider};
pub use resource::{
    Resource, ResourceWithConfigure, ResourceWithImportState, ResourceWithUpgradeState,
};
pub use schema::{AttributeBuilder, AttributeType, NestedBlockBuilder, Schema, SchemaBuilder};
pub use types::{Config, Diagnostic, Dynamic, DynamicValue, RawState, State};
pub use upgrade::{upgrade_resource_state, StateRecord, StateUpgrader};

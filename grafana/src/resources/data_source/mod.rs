pub mod json_data;
pub mod resource_data_source;
pub mod upgrade_v0;

pub use resource_data_source::{DataSourceResource, SCHEMA_VERSION};
pub use upgrade_v0::{upgrade_data_source_state_v0, DataSourceV0Upgrader, UpgradeError};

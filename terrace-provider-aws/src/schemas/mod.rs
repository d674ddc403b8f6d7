//! AWS resource schema definitions

pub mod appconfig;
pub mod evidently;
pub mod mq;
pub mod types;

use terrace_core::schema::ResourceSchema;

/// Returns all AWS schemas, resources and data sources
pub fn all_schemas() -> Vec<ResourceSchema> {
    let mut schemas = Vec::new();
    schemas.extend(appconfig::schemas());
    schemas.extend(evidently::schemas());
    schemas.extend(mq::schemas());
    schemas
}

/// Find the schema of a resource type, or of a data source when `data_source` is set
pub fn find_schema(resource_type: &str, data_source: bool) -> Option<ResourceSchema> {
    all_schemas()
        .into_iter()
        .find(|s| s.resource_type == resource_type && s.data_source == data_source)
}

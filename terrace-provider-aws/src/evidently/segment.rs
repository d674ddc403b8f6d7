//! Evidently segment
//!
//! Identified by its ARN. Everything but tags forces replacement.

use std::collections::HashMap;

use aws_sdk_evidently::types::Segment;
use terrace_core::provider::ProviderResult;
use terrace_core::resource::{Resource, ResourceId, State, Value};
use terrace_core::tags::KeyValueTags;

use crate::{AwsProvider, read_created};
use crate::attrs::{Attrs, put, put_timestamp, string_of};
use crate::error::{deleted, found, missing, sdk_error};
use crate::tags::tags_request;

/// Compact form of a JSON pattern, so formatting differences do not show as changes
pub(crate) fn normalize_pattern(pattern: &str) -> String {
    serde_json::from_str::<serde_json::Value>(pattern)
        .map(|json| json.to_string())
        .unwrap_or_else(|_| pattern.to_string())
}

pub(crate) fn flatten_segment(segment: &Segment) -> HashMap<String, Value> {
    let mut attributes = HashMap::new();
    put(&mut attributes, "arn", segment.arn());
    put(&mut attributes, "name", segment.name());
    put(&mut attributes, "description", segment.description());
    put(&mut attributes, "experiment_count", segment.experiment_count());
    put(&mut attributes, "launch_count", segment.launch_count());
    put_timestamp(&mut attributes, "created_time", segment.created_time());
    put_timestamp(&mut attributes, "last_updated_time", segment.last_updated_time());
    if let Some(pattern) = string_of(segment.pattern()) {
        attributes.insert("pattern".to_string(), Value::String(normalize_pattern(&pattern)));
    }
    attributes
}

impl AwsProvider {
    pub(crate) async fn read_evidently_segment(
        &self,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<State> {
        let result = self.evidently.get_segment().segment(identifier).send().await;
        let context = format!("reading Evidently Segment ({})", identifier);
        let Some(segment) = found(result, context)?.and_then(|o| o.segment().cloned()) else {
            log::warn!("Evidently Segment ({}) not found, removing from state", identifier);
            return Ok(State::not_found(id.clone()));
        };

        let mut attributes = flatten_segment(&segment);
        let tags = segment.tags().map(KeyValueTags::from).unwrap_or_default();
        self.tags.apply(&mut attributes, tags);

        Ok(State::existing(id.clone(), attributes).with_identifier(identifier))
    }

    pub(crate) async fn create_evidently_segment(
        &self,
        resource: Resource,
    ) -> ProviderResult<State> {
        let attrs = Attrs::new(&resource.attributes);
        let name = attrs.required_str("name")?;
        let context = format!("creating Evidently Segment ({})", name);
        log::debug!("Creating Evidently Segment: {}", name);

        let output = self
            .evidently
            .create_segment()
            .name(name)
            .pattern(attrs.required_str("pattern")?)
            .set_description(attrs.string("description"))
            .set_tags(tags_request(self.tags.desired(&resource.attributes)))
            .send()
            .await
            .map_err(|e| sdk_error(&context, e))?;
        let arn = output
            .segment()
            .map(|s| s.arn().to_string())
            .ok_or_else(|| missing(&context, "segment"))?;

        read_created(&resource.id, || self.read_evidently_segment(&resource.id, &arn)).await
    }

    /// Only tags can change in place
    pub(crate) async fn update_evidently_segment(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: Resource,
    ) -> ProviderResult<State> {
        let diff = self.tags.changes(&from.attributes, &to.attributes);
        if !diff.is_empty() {
            self.update_evidently_tags(identifier, diff).await?;
        }
        self.read_evidently_segment(id, identifier).await
    }

    pub(crate) async fn delete_evidently_segment(&self, identifier: &str) -> ProviderResult<()> {
        log::debug!("Deleting Evidently Segment: {}", identifier);
        let result = self.evidently.delete_segment().segment(identifier).send().await;
        deleted(result, format!("deleting Evidently Segment ({})", identifier))
    }
}

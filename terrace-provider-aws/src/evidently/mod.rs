//! CloudWatch Evidently resources
//!
//! Projects, features, segments and launches. Features and launches live
//! inside a project and are identified by `Name:ProjectNameOrARN`.

mod feature;
mod launch;
mod project;
mod segment;

use std::collections::HashMap;
use std::time::Duration;

use aws_sdk_evidently::types::{
    CloudWatchLogsDestinationConfig, LaunchGroupConfig, ProjectDataDeliveryConfig,
    S3DestinationConfig, ScheduledSplitConfig, ScheduledSplitsLaunchConfig, VariationConfig,
};
use terrace_core::id::{format_id, split_first};
use terrace_core::provider::{ProviderError, ProviderResult};
use terrace_core::resource::{State, Value};
use terrace_core::tags::TagDiff;

use crate::AwsProvider;
use crate::attrs::infallible_build;
use crate::error::sdk_error;

infallible_build!(
    CloudWatchLogsDestinationConfig,
    LaunchGroupConfig,
    ProjectDataDeliveryConfig,
    S3DestinationConfig,
    ScheduledSplitConfig,
    ScheduledSplitsLaunchConfig,
    VariationConfig,
);

const ID_SEPARATOR: &str = ":";

const CREATE_TIMEOUT: Duration = Duration::from_secs(2 * 60);
const UPDATE_TIMEOUT: Duration = Duration::from_secs(2 * 60);
const DELETE_TIMEOUT: Duration = Duration::from_secs(2 * 60);

/// `Name:Project` identifier of an object nested in a project
pub(crate) fn nested_id(name: &str, project: &str) -> String {
    format_id(&[name, project], ID_SEPARATOR)
}

/// Split a nested identifier into (name, project). The project may be an
/// ARN, which contains colons itself.
pub(crate) fn parse_nested_id(id: &str, shape: &str) -> ProviderResult<(String, String)> {
    split_first(id, ID_SEPARATOR, shape)
}

/// ARN stored by the last read of an object
fn recorded_arn(state: &State) -> ProviderResult<&str> {
    state
        .attributes
        .get("arn")
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::validation("previous state has no arn"))
}

impl AwsProvider {
    /// Apply tag changes between a previous state and the declared attributes
    async fn retag_evidently(
        &self,
        from: &State,
        to: &HashMap<String, Value>,
    ) -> ProviderResult<()> {
        let diff = self.tags.changes(&from.attributes, to);
        if diff.is_empty() {
            return Ok(());
        }
        self.update_evidently_tags(recorded_arn(from)?, diff).await
    }

    async fn update_evidently_tags(&self, arn: &str, diff: TagDiff) -> ProviderResult<()> {
        if !diff.remove.is_empty() {
            log::debug!("Removing tags from Evidently resource {}: {:?}", arn, diff.remove);
            self.evidently
                .untag_resource()
                .resource_arn(arn)
                .set_tag_keys(Some(diff.remove))
                .send()
                .await
                .map_err(|e| sdk_error(format!("untagging Evidently resource ({})", arn), e))?;
        }
        if !diff.upsert.is_empty() {
            log::debug!("Tagging Evidently resource {}: {:?}", arn, diff.upsert.keys());
            self.evidently
                .tag_resource()
                .resource_arn(arn)
                .set_tags(Some(diff.upsert))
                .send()
                .await
                .map_err(|e| sdk_error(format!("tagging Evidently resource ({})", arn), e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_id_keeps_project_arn_intact() {
        let arn = "arn:aws:evidently:us-west-2:123456789012:project/shop";
        let id = nested_id("checkout", arn);
        assert_eq!(
            parse_nested_id(&id, "FeatureName:ProjectNameOrARN").unwrap(),
            ("checkout".to_string(), arn.to_string())
        );
    }

    #[test]
    fn recorded_arn_comes_from_state() {
        let id = terrace_core::resource::ResourceId::new("evidently.segment", "s");
        let state = State::existing(
            id.clone(),
            HashMap::from([("arn".to_string(), Value::from("arn:aws:evidently:x"))]),
        );
        assert_eq!(recorded_arn(&state).unwrap(), "arn:aws:evidently:x");
        assert!(recorded_arn(&State::not_found(id)).is_err());
    }

    #[test]
    fn nested_id_requires_both_parts() {
        assert!(parse_nested_id("checkout", "FeatureName:ProjectNameOrARN").is_err());
        assert!(parse_nested_id(":shop", "FeatureName:ProjectNameOrARN").is_err());
    }
}

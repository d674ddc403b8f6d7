//! Amazon MQ resources
//!
//! Brokers (with their users) and broker configurations.

mod broker;
mod configuration;

use aws_sdk_mq::types::{ConfigurationId, EncryptionOptions, Logs, User, WeeklyStartTime};
use terrace_core::provider::ProviderResult;
use terrace_core::resource::{State, Value};
use terrace_core::tags::TagDiff;

use crate::AwsProvider;
use crate::attrs::infallible_build;
use crate::error::sdk_error;

infallible_build!(ConfigurationId, EncryptionOptions, Logs, User, WeeklyStartTime);

impl AwsProvider {
    /// ARN from the previous state, or built from the region and account
    fn mq_arn(&self, from: &State, resource: &str) -> String {
        from.attributes
            .get("arn")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| self.arn("mq", resource))
    }

    async fn update_mq_tags(&self, arn: &str, diff: TagDiff) -> ProviderResult<()> {
        if !diff.remove.is_empty() {
            log::debug!("Removing tags from MQ resource {}: {:?}", arn, diff.remove);
            self.mq
                .delete_tags()
                .resource_arn(arn)
                .set_tag_keys(Some(diff.remove))
                .send()
                .await
                .map_err(|e| sdk_error(format!("untagging MQ resource ({})", arn), e))?;
        }
        if !diff.upsert.is_empty() {
            log::debug!("Tagging MQ resource {}: {:?}", arn, diff.upsert.keys());
            self.mq
                .create_tags()
                .resource_arn(arn)
                .set_tags(Some(diff.upsert))
                .send()
                .await
                .map_err(|e| sdk_error(format!("tagging MQ resource ({})", arn), e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use terrace_core::resource::{ResourceId, State, Value};

    #[test]
    fn mq_arn_prefers_recorded_value() {
        let provider = crate::testing::provider();
        let id = ResourceId::new("mq.configuration", "cfg");
        let recorded = State::existing(
            id.clone(),
            HashMap::from([(
                "arn".to_string(),
                Value::from("arn:aws:mq:eu-west-1:111111111111:configuration:c-1"),
            )]),
        );
        assert_eq!(
            provider.mq_arn(&recorded, "configuration:c-1"),
            "arn:aws:mq:eu-west-1:111111111111:configuration:c-1"
        );
        assert_eq!(
            provider.mq_arn(&State::not_found(id), "configuration:c-1"),
            "arn:aws:mq:us-west-2:123456789012:configuration:c-1"
        );
    }
}

//! AWS AppConfig resources
//!
//! Applications, environments, configuration profiles, deployment
//! strategies, deployments and hosted configuration versions.

mod application;
mod configuration_profile;
mod deployment;
mod deployment_strategy;
mod environment;
mod hosted_configuration_version;

use aws_sdk_appconfig::types::{Monitor, Validator};
use terrace_core::provider::ProviderResult;
use terrace_core::tags::{KeyValueTags, TagDiff};

use crate::AwsProvider;
use crate::attrs::infallible_build;
use crate::error::sdk_error;

infallible_build!(Monitor, Validator);

impl AwsProvider {
    fn appconfig_arn(&self, resource: &str) -> String {
        self.arn("appconfig", resource)
    }

    async fn appconfig_tags(&self, arn: &str) -> ProviderResult<KeyValueTags> {
        let output = self
            .appconfig
            .list_tags_for_resource()
            .resource_arn(arn)
            .send()
            .await
            .map_err(|e| sdk_error(format!("listing tags for AppConfig resource ({})", arn), e))?;
        Ok(output.tags().map(KeyValueTags::from).unwrap_or_default())
    }

    async fn update_appconfig_tags(&self, arn: &str, diff: TagDiff) -> ProviderResult<()> {
        if !diff.remove.is_empty() {
            log::debug!("Removing tags from AppConfig resource {}: {:?}", arn, diff.remove);
            self.appconfig
                .untag_resource()
                .resource_arn(arn)
                .set_tag_keys(Some(diff.remove))
                .send()
                .await
                .map_err(|e| sdk_error(format!("untagging AppConfig resource ({})", arn), e))?;
        }
        if !diff.upsert.is_empty() {
            log::debug!("Tagging AppConfig resource {}: {:?}", arn, diff.upsert.keys());
            self.appconfig
                .tag_resource()
                .resource_arn(arn)
                .set_tags(Some(diff.upsert))
                .send()
                .await
                .map_err(|e| sdk_error(format!("tagging AppConfig resource ({})", arn), e))?;
        }
        Ok(())
    }
}

//! Terrace AWS Provider
//!
//! Resources and data sources for AppConfig, CloudWatch Evidently and
//! Amazon MQ, driven through the AWS SDK for Rust.

mod attrs;
mod error;

pub mod appconfig;
pub mod config;
pub mod evidently;
pub mod mq;
pub mod resources;
pub mod schemas;
pub mod tags;

use aws_sdk_appconfig::Client as AppConfigClient;
use aws_sdk_evidently::Client as EvidentlyClient;
use aws_sdk_mq::Client as MqClient;
use std::future::Future;
use std::time::Duration;

use aws_sdk_sts::Client as StsClient;
use terrace_core::provider::{
    BoxFuture, Provider, ProviderError, ProviderResult, ResourceType,
};
use terrace_core::resource::{Resource, ResourceId, State};
use terrace_core::waiter::retry_when_not_found;

use crate::config::{ConfigError, ProviderConfig, partition_for_region};
use crate::tags::TagPolicy;

/// AWS Provider
pub struct AwsProvider {
    appconfig: AppConfigClient,
    evidently: EvidentlyClient,
    mq: MqClient,
    region: String,
    partition: String,
    account_id: String,
    tags: TagPolicy,
}

impl AwsProvider {
    /// Create a new AWS Provider from provider configuration
    pub async fn new(config: &ProviderConfig) -> ProviderResult<Self> {
        config
            .validate()
            .map_err(|e: ConfigError| ProviderError::validation(e.to_string()))?;

        let sdk_config = config.load_sdk_config().await;
        let region = config.region();

        let account_id = if config.skip_requesting_account_id {
            String::new()
        } else {
            let identity = StsClient::new(&sdk_config)
                .get_caller_identity()
                .send()
                .await
                .map_err(|e| error::sdk_error("retrieving caller identity", e))?;
            identity.account().unwrap_or_default().to_string()
        };
        log::debug!("AWS provider configured for region {} (account {})", region, account_id);

        Ok(Self::with_clients(
            AppConfigClient::new(&sdk_config),
            EvidentlyClient::new(&sdk_config),
            MqClient::new(&sdk_config),
            region,
            account_id,
        )
        .with_tag_policy(TagPolicy::new(
            config.default_tags(),
            config.ignore_tags.clone(),
        )))
    }

    /// Create with specific clients (for testing)
    pub fn with_clients(
        appconfig: AppConfigClient,
        evidently: EvidentlyClient,
        mq: MqClient,
        region: String,
        account_id: String,
    ) -> Self {
        Self {
            appconfig,
            evidently,
            mq,
            partition: partition_for_region(&region).to_string(),
            region,
            account_id,
            tags: TagPolicy::default(),
        }
    }

    pub fn with_tag_policy(mut self, tags: TagPolicy) -> Self {
        self.tags = tags;
        self
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// ARN of an object in this provider's region and account
    fn arn(&self, service: &str, resource: &str) -> String {
        format!(
            "arn:{}:{}:{}:{}:{}",
            self.partition, service, self.region, self.account_id, resource
        )
    }
}

/// How long a freshly created object may stay invisible to reads
const CREATED_READ_TIMEOUT: Duration = Duration::from_secs(2 * 60);
const CREATED_READ_INTERVAL: Duration = Duration::from_secs(2);

/// Read an object right after creating it, retrying while it is not found
pub(crate) async fn read_created<F, Fut>(id: &ResourceId, read: F) -> ProviderResult<State>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<State>>,
{
    read_created_within(id, CREATED_READ_TIMEOUT, CREATED_READ_INTERVAL, read).await
}

async fn read_created_within<F, Fut>(
    id: &ResourceId,
    timeout: Duration,
    interval: Duration,
    mut read: F,
) -> ProviderResult<State>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<State>>,
{
    retry_when_not_found(timeout, interval, || {
        let pending = read();
        async move { created_state(id, pending.await?) }
    })
    .await
}

/// A read that found nothing after a create is a not-found error
fn created_state(id: &ResourceId, state: State) -> ProviderResult<State> {
    if state.exists {
        Ok(state)
    } else {
        Err(ProviderError::not_found(format!("{} not found after creation", id))
            .for_resource(id.clone()))
    }
}

fn unknown_type(id: &ResourceId) -> ProviderError {
    ProviderError::new(format!("Unknown resource type: {}", id.resource_type))
        .for_resource(id.clone())
}

impl Provider for AwsProvider {
    fn name(&self) -> &'static str {
        "aws"
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        resources::resource_types()
    }

    fn read(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        Box::pin(async move {
            let result = match id.resource_type.as_str() {
                "appconfig.application" => self.read_appconfig_application(&id, &identifier).await,
                "appconfig.environment" => self.read_appconfig_environment(&id, &identifier).await,
                "appconfig.configuration_profile" => {
                    self.read_appconfig_configuration_profile(&id, &identifier)
                        .await
                }
                "appconfig.deployment_strategy" => {
                    self.read_appconfig_deployment_strategy(&id, &identifier)
                        .await
                }
                "appconfig.deployment" => self.read_appconfig_deployment(&id, &identifier).await,
                "appconfig.hosted_configuration_version" => {
                    self.read_appconfig_hosted_configuration_version(&id, &identifier)
                        .await
                }
                "evidently.project" => self.read_evidently_project(&id, &identifier).await,
                "evidently.feature" => self.read_evidently_feature(&id, &identifier).await,
                "evidently.segment" => self.read_evidently_segment(&id, &identifier).await,
                "evidently.launch" => self.read_evidently_launch(&id, &identifier).await,
                "mq.broker" => self.read_mq_broker(&id, &identifier).await,
                "mq.configuration" => self.read_mq_configuration(&id, &identifier).await,
                _ => return Err(unknown_type(&id)),
            };
            result.map_err(|e| e.for_resource(id.clone()))
        })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move {
            let id = resource.id.clone();
            let result = match id.resource_type.as_str() {
                "appconfig.application" => self.create_appconfig_application(resource).await,
                "appconfig.environment" => self.create_appconfig_environment(resource).await,
                "appconfig.configuration_profile" => {
                    self.create_appconfig_configuration_profile(resource).await
                }
                "appconfig.deployment_strategy" => {
                    self.create_appconfig_deployment_strategy(resource).await
                }
                "appconfig.deployment" => self.create_appconfig_deployment(resource).await,
                "appconfig.hosted_configuration_version" => {
                    self.create_appconfig_hosted_configuration_version(resource)
                        .await
                }
                "evidently.project" => self.create_evidently_project(resource).await,
                "evidently.feature" => self.create_evidently_feature(resource).await,
                "evidently.segment" => self.create_evidently_segment(resource).await,
                "evidently.launch" => self.create_evidently_launch(resource).await,
                "mq.broker" => self.create_mq_broker(resource).await,
                "mq.configuration" => self.create_mq_configuration(resource).await,
                _ => return Err(unknown_type(&id)),
            };
            result.map_err(|e| e.for_resource(id))
        })
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let from = from.clone();
        let to = to.clone();
        Box::pin(async move {
            let result = match id.resource_type.as_str() {
                "appconfig.application" => {
                    self.update_appconfig_application(&id, &identifier, &from, to)
                        .await
                }
                "appconfig.environment" => {
                    self.update_appconfig_environment(&id, &identifier, &from, to)
                        .await
                }
                "appconfig.configuration_profile" => {
                    self.update_appconfig_configuration_profile(&id, &identifier, &from, to)
                        .await
                }
                "appconfig.deployment_strategy" => {
                    self.update_appconfig_deployment_strategy(&id, &identifier, &from, to)
                        .await
                }
                "appconfig.deployment" | "appconfig.hosted_configuration_version" => {
                    Err(ProviderError::validation(format!(
                        "{} cannot be updated in place; every attribute forces replacement",
                        id.resource_type
                    )))
                }
                "evidently.project" => {
                    self.update_evidently_project(&id, &identifier, &from, to)
                        .await
                }
                "evidently.feature" => {
                    self.update_evidently_feature(&id, &identifier, &from, to)
                        .await
                }
                "evidently.segment" => {
                    self.update_evidently_segment(&id, &identifier, &from, to)
                        .await
                }
                "evidently.launch" => {
                    self.update_evidently_launch(&id, &identifier, &from, to)
                        .await
                }
                "mq.broker" => self.update_mq_broker(&id, &identifier, &from, to).await,
                "mq.configuration" => {
                    self.update_mq_configuration(&id, &identifier, &from, to)
                        .await
                }
                _ => return Err(unknown_type(&id)),
            };
            result.map_err(|e| e.for_resource(id.clone()))
        })
    }

    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        Box::pin(async move {
            let result = match id.resource_type.as_str() {
                "appconfig.application" => self.delete_appconfig_application(&identifier).await,
                "appconfig.environment" => self.delete_appconfig_environment(&identifier).await,
                "appconfig.configuration_profile" => {
                    self.delete_appconfig_configuration_profile(&identifier)
                        .await
                }
                "appconfig.deployment_strategy" => {
                    self.delete_appconfig_deployment_strategy(&identifier)
                        .await
                }
                "appconfig.deployment" => self.delete_appconfig_deployment(&identifier),
                "appconfig.hosted_configuration_version" => {
                    self.delete_appconfig_hosted_configuration_version(&identifier)
                        .await
                }
                "evidently.project" => self.delete_evidently_project(&identifier).await,
                "evidently.feature" => self.delete_evidently_feature(&identifier).await,
                "evidently.segment" => self.delete_evidently_segment(&identifier).await,
                "evidently.launch" => self.delete_evidently_launch(&identifier).await,
                "mq.broker" => self.delete_mq_broker(&identifier).await,
                "mq.configuration" => self.delete_mq_configuration(&identifier),
                _ => return Err(unknown_type(&id)),
            };
            result.map_err(|e| e.for_resource(id.clone()))
        })
    }

    fn read_data_source(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move {
            let id = resource.id.clone();
            let result = match id.resource_type.as_str() {
                "appconfig.environment" => self.query_appconfig_environment(&resource).await,
                "appconfig.configuration_profile" => {
                    self.query_appconfig_configuration_profile(&resource).await
                }
                "appconfig.environments" => self.query_appconfig_environments(&resource).await,
                "mq.broker" => self.query_mq_broker(&resource).await,
                _ => {
                    return Err(ProviderError::new(format!(
                        "Unknown data source: {}",
                        id.resource_type
                    ))
                    .for_resource(id));
                }
            };
            result.map_err(|e| e.for_resource(id))
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use terrace_core::provider::ErrorKind;

    #[test]
    fn arns_use_partition_region_and_account() {
        let provider = testing::provider();
        assert_eq!(
            provider.arn("appconfig", "application/abc123"),
            "arn:aws:appconfig:us-west-2:123456789012:application/abc123"
        );
        assert_eq!(provider.region(), "us-west-2");
    }

    #[test]
    fn registry_covers_every_dispatched_type() {
        let provider = testing::provider();
        let names: Vec<&str> = provider
            .resource_types()
            .iter()
            .map(|t| t.name())
            .collect();
        for name in [
            "appconfig.application",
            "appconfig.environment",
            "appconfig.configuration_profile",
            "appconfig.deployment_strategy",
            "appconfig.deployment",
            "appconfig.hosted_configuration_version",
            "evidently.project",
            "evidently.feature",
            "evidently.segment",
            "evidently.launch",
            "mq.broker",
            "mq.configuration",
        ] {
            assert!(names.contains(&name), "missing {}", name);
        }
    }

    #[tokio::test]
    async fn unknown_type_is_rejected() {
        let provider = testing::provider();
        let id = ResourceId::new("s3.bucket", "b");
        let err = provider.read(&id, "b").await.unwrap_err();
        assert!(err.message.contains("Unknown resource type"));
        assert_eq!(err.resource_id, Some(id));
    }

    #[test]
    fn missing_object_after_create_is_not_found() {
        let id = ResourceId::new("appconfig.application", "app");
        let err = created_state(&id, State::not_found(id.clone())).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.resource_id, Some(id.clone()));

        let state = State::existing(id.clone(), HashMap::new()).with_identifier("abc123");
        assert_eq!(created_state(&id, state).unwrap().identifier.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn created_object_read_is_retried_until_visible() {
        let id = ResourceId::new("mq.configuration", "cfg");
        let reads = Arc::new(AtomicU32::new(0));
        let counter = reads.clone();
        let state = read_created_within(
            &id,
            Duration::from_secs(1),
            Duration::from_millis(1),
            || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let id = id.clone();
                async move {
                    if n < 2 {
                        Ok(State::not_found(id))
                    } else {
                        Ok(State::existing(id, HashMap::new()).with_identifier("c-1"))
                    }
                }
            },
        )
        .await
        .unwrap();
        assert!(state.exists);
        assert_eq!(reads.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn created_object_that_never_appears_fails() {
        let id = ResourceId::new("evidently.project", "p");
        let err = read_created_within(
            &id,
            Duration::from_millis(20),
            Duration::from_millis(5),
            || {
                let id = id.clone();
                async move { Ok(State::not_found(id)) }
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }
}

//! Evidently project

use std::collections::HashMap;

use aws_sdk_evidently::types::{
    CloudWatchLogsDestinationConfig, Project, ProjectDataDelivery, ProjectDataDeliveryConfig,
    S3DestinationConfig,
};
use terrace_core::differ::Changes;
use terrace_core::provider::ProviderResult;
use terrace_core::resource::{Resource, ResourceId, State, Value};
use terrace_core::tags::KeyValueTags;
use terrace_core::waiter::{Refresh, StateChangeConf};

use super::{CREATE_TIMEOUT, DELETE_TIMEOUT, UPDATE_TIMEOUT};
use crate::{AwsProvider, read_created};
use crate::attrs::{Attrs, Finish, block, put, put_timestamp, string_of};
use crate::error::{deleted, found, missing, sdk_error};
use crate::tags::tags_request;

const STATUS_AVAILABLE: &str = "AVAILABLE";
const STATUS_UPDATING: &str = "UPDATING";

pub(crate) fn expand_data_delivery(
    attrs: &Attrs<'_>,
) -> ProviderResult<Option<ProjectDataDeliveryConfig>> {
    let Some(delivery) = attrs.block("data_delivery") else {
        return Ok(None);
    };
    let cloudwatch_logs = delivery
        .block("cloudwatch_logs")
        .map(|b| {
            CloudWatchLogsDestinationConfig::builder()
                .set_log_group(b.string("log_group"))
                .build()
                .finish("Evidently CloudWatch Logs destination")
        })
        .transpose()?;
    let s3_destination = delivery
        .block("s3_destination")
        .map(|b| {
            S3DestinationConfig::builder()
                .set_bucket(b.string("bucket"))
                .set_prefix(b.string("prefix"))
                .build()
                .finish("Evidently S3 destination")
        })
        .transpose()?;
    ProjectDataDeliveryConfig::builder()
        .set_cloud_watch_logs(cloudwatch_logs)
        .set_s3_destination(s3_destination)
        .build()
        .finish("Evidently data delivery")
        .map(Some)
}

fn flatten_data_delivery(delivery: &ProjectDataDelivery) -> Value {
    let mut fields = HashMap::new();
    if let Some(logs) = delivery.cloud_watch_logs() {
        let mut destination = HashMap::new();
        put(&mut destination, "log_group", logs.log_group());
        fields.insert("cloudwatch_logs".to_string(), block(destination));
    }
    if let Some(s3) = delivery.s3_destination() {
        let mut destination = HashMap::new();
        put(&mut destination, "bucket", s3.bucket());
        put(&mut destination, "prefix", s3.prefix());
        fields.insert("s3_destination".to_string(), block(destination));
    }
    block(fields)
}

pub(crate) fn flatten_project(project: &Project) -> HashMap<String, Value> {
    let mut attributes = HashMap::new();
    put(&mut attributes, "arn", project.arn());
    put(&mut attributes, "name", project.name());
    put(&mut attributes, "description", project.description());
    put(&mut attributes, "status", project.status());
    put_timestamp(&mut attributes, "created_time", project.created_time());
    put_timestamp(&mut attributes, "last_updated_time", project.last_updated_time());
    put(&mut attributes, "active_experiment_count", project.active_experiment_count());
    put(&mut attributes, "active_launch_count", project.active_launch_count());
    put(&mut attributes, "experiment_count", project.experiment_count());
    put(&mut attributes, "feature_count", project.feature_count());
    put(&mut attributes, "launch_count", project.launch_count());
    if let Some(delivery) = project.data_delivery() {
        attributes.insert("data_delivery".to_string(), flatten_data_delivery(delivery));
    }
    attributes
}

impl AwsProvider {
    async fn find_evidently_project(&self, name: &str) -> ProviderResult<Option<Project>> {
        let result = self.evidently.get_project().project(name).send().await;
        let output = found(result, format!("reading Evidently Project ({})", name))?;
        Ok(output.and_then(|o| o.project().cloned()))
    }

    async fn evidently_project_status(&self, name: &str) -> Refresh<Project> {
        Ok(self.find_evidently_project(name).await?.map(|project| {
            let status = string_of(project.status()).unwrap_or_default();
            (project, status)
        }))
    }

    async fn wait_evidently_project_available(
        &self,
        name: &str,
        timeout: std::time::Duration,
    ) -> ProviderResult<()> {
        StateChangeConf::new(&[STATUS_UPDATING], &[STATUS_AVAILABLE], timeout)
            .wait(|| self.evidently_project_status(name))
            .await?;
        Ok(())
    }

    pub(crate) async fn read_evidently_project(
        &self,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<State> {
        let Some(project) = self.find_evidently_project(identifier).await? else {
            log::warn!("Evidently Project ({}) not found, removing from state", identifier);
            return Ok(State::not_found(id.clone()));
        };

        let mut attributes = flatten_project(&project);
        let tags = project.tags().map(KeyValueTags::from).unwrap_or_default();
        self.tags.apply(&mut attributes, tags);

        Ok(State::existing(id.clone(), attributes).with_identifier(identifier))
    }

    pub(crate) async fn create_evidently_project(
        &self,
        resource: Resource,
    ) -> ProviderResult<State> {
        let attrs = Attrs::new(&resource.attributes);
        let name = attrs.required_str("name")?;
        let context = format!("creating Evidently Project ({})", name);
        log::debug!("Creating Evidently Project: {}", name);

        let output = self
            .evidently
            .create_project()
            .name(name)
            .set_description(attrs.string("description"))
            .set_data_delivery(expand_data_delivery(&attrs)?)
            .set_tags(tags_request(self.tags.desired(&resource.attributes)))
            .send()
            .await
            .map_err(|e| sdk_error(&context, e))?;
        let project = output.project().ok_or_else(|| missing(&context, "project"))?;
        let identifier = project.name().to_string();

        self.wait_evidently_project_available(&identifier, CREATE_TIMEOUT)
            .await?;
        read_created(&resource.id, || self.read_evidently_project(&resource.id, &identifier)).await
    }

    pub(crate) async fn update_evidently_project(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: Resource,
    ) -> ProviderResult<State> {
        let changes = Changes::between(&from.attributes, &to.attributes);
        let attrs = Attrs::new(&to.attributes);

        if changes.has("description") {
            log::debug!("Updating Evidently Project: {}", identifier);
            self.evidently
                .update_project()
                .project(identifier)
                .description(attrs.str("description").unwrap_or_default())
                .send()
                .await
                .map_err(|e| sdk_error(format!("updating Evidently Project ({})", identifier), e))?;
            self.wait_evidently_project_available(identifier, UPDATE_TIMEOUT)
                .await?;
        }

        if changes.has("data_delivery") {
            log::debug!("Updating Evidently Project data delivery: {}", identifier);
            let delivery = expand_data_delivery(&attrs)?;
            self.evidently
                .update_project_data_delivery()
                .project(identifier)
                .set_cloud_watch_logs(delivery.as_ref().and_then(|d| d.cloud_watch_logs().cloned()))
                .set_s3_destination(delivery.as_ref().and_then(|d| d.s3_destination().cloned()))
                .send()
                .await
                .map_err(|e| {
                    sdk_error(
                        format!("updating Evidently Project ({}) data delivery", identifier),
                        e,
                    )
                })?;
            self.wait_evidently_project_available(identifier, UPDATE_TIMEOUT)
                .await?;
        }

        self.retag_evidently(from, &to.attributes).await?;
        self.read_evidently_project(id, identifier).await
    }

    pub(crate) async fn delete_evidently_project(&self, identifier: &str) -> ProviderResult<()> {
        log::debug!("Deleting Evidently Project: {}", identifier);
        let result = self.evidently.delete_project().project(identifier).send().await;
        deleted(result, format!("deleting Evidently Project ({})", identifier))?;

        StateChangeConf::new(&[STATUS_AVAILABLE, STATUS_UPDATING], &[], DELETE_TIMEOUT)
            .wait(|| self.evidently_project_status(identifier))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_evidently::types::{CloudWatchLogsDestination, ProjectStatus};
    use aws_smithy_types::DateTime;

    crate::attrs::infallible_build!(Project, ProjectDataDelivery, CloudWatchLogsDestination);

    fn delivery_attrs(delivery: Value) -> HashMap<String, Value> {
        HashMap::from([
            ("name".to_string(), Value::from("shop")),
            ("data_delivery".to_string(), delivery),
        ])
    }

    #[test]
    fn expand_cloudwatch_delivery() {
        let attributes = delivery_attrs(Value::Map(HashMap::from([(
            "cloudwatch_logs".to_string(),
            Value::Map(HashMap::from([(
                "log_group".to_string(),
                Value::from("/aws/vendedlogs/evidently"),
            )])),
        )])));
        let delivery = expand_data_delivery(&Attrs::new(&attributes))
            .unwrap()
            .unwrap();
        assert_eq!(
            delivery.cloud_watch_logs().and_then(|l| l.log_group()),
            Some("/aws/vendedlogs/evidently")
        );
        assert!(delivery.s3_destination().is_none());
    }

    #[test]
    fn expand_without_delivery() {
        let attributes = HashMap::from([("name".to_string(), Value::from("shop"))]);
        assert!(expand_data_delivery(&Attrs::new(&attributes)).unwrap().is_none());
    }

    #[test]
    fn flatten_project_fields() {
        let delivery = ProjectDataDelivery::builder()
            .cloud_watch_logs(
                CloudWatchLogsDestination::builder()
                    .log_group("/evidently")
                    .build()
                    .finish("logs")
                    .unwrap(),
            )
            .build()
            .finish("delivery")
            .unwrap();
        let project = Project::builder()
            .arn("arn:aws:evidently:us-west-2:123456789012:project/shop")
            .name("shop")
            .status(ProjectStatus::from("AVAILABLE"))
            .created_time(DateTime::from_secs(0))
            .last_updated_time(DateTime::from_secs(60))
            .feature_count(2)
            .data_delivery(delivery)
            .build()
            .finish("project")
            .unwrap();

        let attributes = flatten_project(&project);
        assert_eq!(attributes.get("status"), Some(&Value::from("AVAILABLE")));
        assert_eq!(attributes.get("feature_count"), Some(&Value::Int(2)));
        assert_eq!(
            attributes.get("last_updated_time"),
            Some(&Value::from("1970-01-01T00:01:00Z"))
        );
        let logs = attributes
            .get("data_delivery")
            .and_then(Value::as_map)
            .and_then(|d| d.get("cloudwatch_logs"))
            .and_then(Value::as_map)
            .unwrap();
        assert_eq!(logs.get("log_group"), Some(&Value::from("/evidently")));
        assert!(!attributes.contains_key("description"));
    }
}

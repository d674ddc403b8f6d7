//! AppConfig deployment
//!
//! Identified by `ApplicationID/EnvironmentID/DeploymentNumber`. Deployments
//! cannot be deleted through the API; deleting one only forgets it.

use std::collections::HashMap;

use aws_sdk_appconfig::operation::get_deployment::GetDeploymentOutput;
use terrace_core::id::{format_id, parse_id, parse_number};
use terrace_core::provider::ProviderResult;
use terrace_core::resource::{Resource, ResourceId, State, Value};

use crate::{AwsProvider, read_created};
use crate::attrs::{Attrs, int_of, put};
use crate::error::{found, missing, sdk_error};
use crate::tags::tags_request;

const ID_SEPARATOR: &str = "/";
const ID_SHAPE: &str = "ApplicationID/EnvironmentID/DeploymentNumber";

/// Parsed deployment identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DeploymentKey {
    pub application_id: String,
    pub environment_id: String,
    pub number: i32,
}

impl DeploymentKey {
    pub(crate) fn parse(id: &str) -> ProviderResult<Self> {
        let parts = parse_id(id, ID_SEPARATOR, 3, ID_SHAPE)?;
        Ok(Self {
            application_id: parts[0].clone(),
            environment_id: parts[1].clone(),
            number: parse_number(&parts[2], id, ID_SHAPE)?,
        })
    }

    pub(crate) fn format(&self) -> String {
        let number = self.number.to_string();
        format_id(
            &[self.application_id.as_str(), self.environment_id.as_str(), number.as_str()],
            ID_SEPARATOR,
        )
    }
}

pub(crate) fn flatten_deployment(output: &GetDeploymentOutput) -> HashMap<String, Value> {
    let mut attributes = HashMap::new();
    put(&mut attributes, "application_id", output.application_id());
    put(&mut attributes, "environment_id", output.environment_id());
    put(&mut attributes, "configuration_profile_id", output.configuration_profile_id());
    put(&mut attributes, "deployment_strategy_id", output.deployment_strategy_id());
    put(&mut attributes, "configuration_version", output.configuration_version());
    put(&mut attributes, "description", output.description());
    put(&mut attributes, "deployment_number", output.deployment_number());
    put(&mut attributes, "state", output.state());
    put(&mut attributes, "kms_key_identifier", output.kms_key_identifier());
    put(&mut attributes, "kms_key_arn", output.kms_key_arn());
    attributes
}

impl AwsProvider {
    fn appconfig_deployment_arn(&self, key: &DeploymentKey) -> String {
        self.appconfig_arn(&format!(
            "application/{}/environment/{}/deployment/{}",
            key.application_id, key.environment_id, key.number
        ))
    }

    pub(crate) async fn read_appconfig_deployment(
        &self,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<State> {
        let key = DeploymentKey::parse(identifier)?;
        let result = self
            .appconfig
            .get_deployment()
            .application_id(&key.application_id)
            .environment_id(&key.environment_id)
            .deployment_number(key.number)
            .send()
            .await;
        let context = format!("reading AppConfig Deployment ({})", identifier);
        let Some(output) = found(result, context)? else {
            log::warn!("AppConfig Deployment ({}) not found, removing from state", identifier);
            return Ok(State::not_found(id.clone()));
        };

        let arn = self.appconfig_deployment_arn(&key);
        let mut attributes = flatten_deployment(&output);
        let tags = self.appconfig_tags(&arn).await?;
        self.tags.apply(&mut attributes, tags);
        attributes.insert("arn".to_string(), Value::String(arn));

        Ok(State::existing(id.clone(), attributes).with_identifier(identifier))
    }

    pub(crate) async fn create_appconfig_deployment(
        &self,
        resource: Resource,
    ) -> ProviderResult<State> {
        let attrs = Attrs::new(&resource.attributes);
        let application_id = attrs.required_str("application_id")?;
        let environment_id = attrs.required_str("environment_id")?;
        let context = format!(
            "starting AppConfig Deployment for Application ({}) Environment ({})",
            application_id, environment_id
        );
        log::debug!("Starting AppConfig Deployment: {}/{}", application_id, environment_id);

        let output = self
            .appconfig
            .start_deployment()
            .application_id(application_id)
            .environment_id(environment_id)
            .configuration_profile_id(attrs.required_str("configuration_profile_id")?)
            .deployment_strategy_id(attrs.required_str("deployment_strategy_id")?)
            .configuration_version(attrs.required_str("configuration_version")?)
            .set_description(attrs.string("description"))
            .set_kms_key_identifier(attrs.string("kms_key_identifier"))
            .set_tags(tags_request(self.tags.desired(&resource.attributes)))
            .send()
            .await
            .map_err(|e| sdk_error(&context, e))?;

        let number = int_of(output.deployment_number())
            .and_then(|n| i32::try_from(n).ok())
            .ok_or_else(|| missing(&context, "deployment number"))?;
        let key = DeploymentKey {
            application_id: application_id.to_string(),
            environment_id: environment_id.to_string(),
            number,
        };

        let identifier = key.format();
        read_created(&resource.id, || {
            self.read_appconfig_deployment(&resource.id, &identifier)
        })
        .await
    }

    /// Deployments stay in AppConfig's history; only the local record goes away
    pub(crate) fn delete_appconfig_deployment(&self, identifier: &str) -> ProviderResult<()> {
        DeploymentKey::parse(identifier)?;
        log::info!(
            "AppConfig Deployment ({}) cannot be deleted, removing from state only",
            identifier
        );
        Ok(())
    }
}

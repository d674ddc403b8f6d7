//! AppConfig environment
//!
//! Identified by `EnvironmentID:ApplicationID`.

use std::collections::HashMap;

use aws_sdk_appconfig::operation::get_environment::GetEnvironmentOutput;
use aws_sdk_appconfig::types::Monitor;
use terrace_core::differ::Changes;
use terrace_core::id::{format_id, parse_pair};
use terrace_core::provider::{ProviderError, ProviderResult};
use terrace_core::resource::{Resource, ResourceId, State, Value};

use crate::{AwsProvider, read_created};
use crate::attrs::{Attrs, Finish, block, put};
use crate::error::{deleted, found, missing, sdk_error};
use crate::tags::tags_request;

const ID_SEPARATOR: &str = ":";
const ID_SHAPE: &str = "EnvironmentID:ApplicationID";

pub(crate) fn environment_id(environment_id: &str, application_id: &str) -> String {
    format_id(&[environment_id, application_id], ID_SEPARATOR)
}

/// Split an environment identifier into (environment ID, application ID)
pub(crate) fn parse_environment_id(id: &str) -> ProviderResult<(String, String)> {
    parse_pair(id, ID_SEPARATOR, ID_SHAPE)
}

pub(crate) fn expand_monitors(blocks: &[Attrs<'_>]) -> ProviderResult<Vec<Monitor>> {
    blocks
        .iter()
        .map(|b| {
            Monitor::builder()
                .alarm_arn(b.required_str("alarm_arn")?)
                .set_alarm_role_arn(b.string("alarm_role_arn"))
                .build()
                .finish("AppConfig monitor")
        })
        .collect()
}

fn flatten_monitors(monitors: &[Monitor]) -> Value {
    Value::List(
        monitors
            .iter()
            .map(|m| {
                let mut fields = HashMap::new();
                put(&mut fields, "alarm_arn", m.alarm_arn());
                put(&mut fields, "alarm_role_arn", m.alarm_role_arn());
                block(fields)
            })
            .collect(),
    )
}

pub(crate) fn flatten_environment(output: &GetEnvironmentOutput) -> HashMap<String, Value> {
    let mut attributes = HashMap::new();
    put(&mut attributes, "application_id", output.application_id());
    put(&mut attributes, "environment_id", output.id());
    put(&mut attributes, "name", output.name());
    put(&mut attributes, "description", output.description());
    put(&mut attributes, "state", output.state());
    if !output.monitors().is_empty() {
        attributes.insert("monitor".to_string(), flatten_monitors(output.monitors()));
    }
    attributes
}

impl AwsProvider {
    async fn find_appconfig_environment(
        &self,
        environment_id: &str,
        application_id: &str,
    ) -> ProviderResult<Option<HashMap<String, Value>>> {
        let result = self
            .appconfig
            .get_environment()
            .application_id(application_id)
            .environment_id(environment_id)
            .send()
            .await;
        let context = format!(
            "reading AppConfig Environment ({}) for Application ({})",
            environment_id, application_id
        );
        let Some(output) = found(result, context)? else {
            return Ok(None);
        };

        let arn = self.appconfig_arn(&format!(
            "application/{}/environment/{}",
            application_id, environment_id
        ));
        let mut attributes = flatten_environment(&output);
        let tags = self.appconfig_tags(&arn).await?;
        self.tags.apply(&mut attributes, tags);
        attributes.insert("arn".to_string(), Value::String(arn));
        Ok(Some(attributes))
    }

    pub(crate) async fn read_appconfig_environment(
        &self,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<State> {
        let (environment_id, application_id) = parse_environment_id(identifier)?;
        match self
            .find_appconfig_environment(&environment_id, &application_id)
            .await?
        {
            Some(attributes) => {
                Ok(State::existing(id.clone(), attributes).with_identifier(identifier))
            }
            None => {
                log::warn!("AppConfig Environment ({}) not found, removing from state", identifier);
                Ok(State::not_found(id.clone()))
            }
        }
    }

    pub(crate) async fn create_appconfig_environment(
        &self,
        resource: Resource,
    ) -> ProviderResult<State> {
        let attrs = Attrs::new(&resource.attributes);
        let application_id = attrs.required_str("application_id")?;
        let name = attrs.required_str("name")?;
        let monitors = expand_monitors(&attrs.blocks("monitor"))?;
        log::debug!("Creating AppConfig Environment: {} ({})", name, application_id);

        let output = self
            .appconfig
            .create_environment()
            .application_id(application_id)
            .name(name)
            .set_description(attrs.string("description"))
            .set_monitors(Some(monitors))
            .set_tags(tags_request(self.tags.desired(&resource.attributes)))
            .send()
            .await
            .map_err(|e| sdk_error(format!("creating AppConfig Environment ({})", name), e))?;

        let environment = output
            .id()
            .ok_or_else(|| missing(format!("creating AppConfig Environment ({})", name), "id"))?;

        let identifier = environment_id(environment, application_id);
        read_created(&resource.id, || {
            self.read_appconfig_environment(&resource.id, &identifier)
        })
        .await
    }

    pub(crate) async fn update_appconfig_environment(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: Resource,
    ) -> ProviderResult<State> {
        let (environment_id, application_id) = parse_environment_id(identifier)?;
        let changes = Changes::between(&from.attributes, &to.attributes);
        let attrs = Attrs::new(&to.attributes);

        if changes.has_any(&["name", "description", "monitor"]) {
            log::debug!("Updating AppConfig Environment: {}", identifier);
            let mut request = self
                .appconfig
                .update_environment()
                .application_id(&application_id)
                .environment_id(&environment_id)
                .set_name(attrs.string("name"));
            if changes.has("description") {
                request = request.description(attrs.str("description").unwrap_or_default());
            }
            if changes.has("monitor") {
                request = request.set_monitors(Some(expand_monitors(&attrs.blocks("monitor"))?));
            }
            request.send().await.map_err(|e| {
                sdk_error(format!("updating AppConfig Environment ({})", identifier), e)
            })?;
        }

        let arn = self.appconfig_arn(&format!(
            "application/{}/environment/{}",
            application_id, environment_id
        ));
        self.update_appconfig_tags(&arn, self.tags.changes(&from.attributes, &to.attributes))
            .await?;

        self.read_appconfig_environment(id, identifier).await
    }

    pub(crate) async fn delete_appconfig_environment(&self, identifier: &str) -> ProviderResult<()> {
        let (environment_id, application_id) = parse_environment_id(identifier)?;
        log::debug!("Deleting AppConfig Environment: {}", identifier);
        let result = self
            .appconfig
            .delete_environment()
            .application_id(application_id)
            .environment_id(environment_id)
            .send()
            .await;
        deleted(result, format!("deleting AppConfig Environment ({})", identifier))
    }

    /// Data source: one environment by application and environment ID
    pub(crate) async fn query_appconfig_environment(
        &self,
        query: &Resource,
    ) -> ProviderResult<State> {
        let attrs = Attrs::new(&query.attributes);
        let application_id = attrs.required_str("application_id")?;
        let environment = attrs.required_str("environment_id")?;

        let mut attributes = self
            .find_appconfig_environment(environment, application_id)
            .await?
            .ok_or_else(|| {
                ProviderError::empty_result(format!(
                    "AppConfig Environment ({}) for Application ({})",
                    environment, application_id
                ))
            })?;
        attributes.remove("tags_all");

        Ok(State::existing(query.id.clone(), attributes)
            .with_identifier(environment_id(environment, application_id)))
    }

    /// Data source: every environment ID of an application
    pub(crate) async fn query_appconfig_environments(
        &self,
        query: &Resource,
    ) -> ProviderResult<State> {
        let attrs = Attrs::new(&query.attributes);
        let application_id = attrs.required_str("application_id")?;

        let mut ids = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let output = self
                .appconfig
                .list_environments()
                .application_id(application_id)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| {
                    sdk_error(
                        format!("listing AppConfig Environments for Application ({})", application_id),
                        e,
                    )
                })?;
            ids.extend(
                output
                    .items()
                    .iter()
                    .filter_map(|env| env.id())
                    .map(|id| Value::String(id.to_string())),
            );
            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        let attributes = HashMap::from([
            ("application_id".to_string(), Value::from(application_id)),
            ("environment_ids".to_string(), Value::List(ids)),
        ]);
        Ok(State::existing(query.id.clone(), attributes).with_identifier(application_id))
    }
}

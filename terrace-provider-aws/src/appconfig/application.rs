//! AppConfig application

use std::collections::HashMap;

use aws_sdk_appconfig::operation::get_application::GetApplicationOutput;
use terrace_core::differ::Changes;
use terrace_core::provider::ProviderResult;
use terrace_core::resource::{Resource, ResourceId, State, Value};

use crate::{AwsProvider, read_created};
use crate::attrs::{Attrs, put};
use crate::error::{deleted, found, missing, sdk_error};
use crate::tags::tags_request;

pub(crate) fn flatten_application(output: &GetApplicationOutput) -> HashMap<String, Value> {
    let mut attributes = HashMap::new();
    put(&mut attributes, "name", output.name());
    put(&mut attributes, "description", output.description());
    attributes
}

impl AwsProvider {
    pub(crate) async fn read_appconfig_application(
        &self,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<State> {
        let context = format!("reading AppConfig Application ({})", identifier);
        let result = self
            .appconfig
            .get_application()
            .application_id(identifier)
            .send()
            .await;
        let Some(output) = found(result, &context)? else {
            log::warn!("AppConfig Application ({}) not found, removing from state", identifier);
            return Ok(State::not_found(id.clone()));
        };

        let arn = self.appconfig_arn(&format!("application/{}", identifier));
        let mut attributes = flatten_application(&output);
        let tags = self.appconfig_tags(&arn).await?;
        self.tags.apply(&mut attributes, tags);
        attributes.insert("arn".to_string(), Value::String(arn));

        Ok(State::existing(id.clone(), attributes).with_identifier(identifier))
    }

    pub(crate) async fn create_appconfig_application(
        &self,
        resource: Resource,
    ) -> ProviderResult<State> {
        let attrs = Attrs::new(&resource.attributes);
        let name = attrs.required_str("name")?;
        log::debug!("Creating AppConfig Application: {}", name);

        let output = self
            .appconfig
            .create_application()
            .name(name)
            .set_description(attrs.string("description"))
            .set_tags(tags_request(self.tags.desired(&resource.attributes)))
            .send()
            .await
            .map_err(|e| sdk_error(format!("creating AppConfig Application ({})", name), e))?;

        let app_id = output
            .id()
            .ok_or_else(|| missing(format!("creating AppConfig Application ({})", name), "id"))?;

        read_created(&resource.id, || self.read_appconfig_application(&resource.id, app_id)).await
    }

    pub(crate) async fn update_appconfig_application(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: Resource,
    ) -> ProviderResult<State> {
        let changes = Changes::between(&from.attributes, &to.attributes);
        let attrs = Attrs::new(&to.attributes);

        if changes.has_any(&["name", "description"]) {
            log::debug!("Updating AppConfig Application: {}", identifier);
            self.appconfig
                .update_application()
                .application_id(identifier)
                .set_name(attrs.string("name"))
                .description(attrs.str("description").unwrap_or_default())
                .send()
                .await
                .map_err(|e| {
                    sdk_error(format!("updating AppConfig Application ({})", identifier), e)
                })?;
        }

        let arn = self.appconfig_arn(&format!("application/{}", identifier));
        self.update_appconfig_tags(&arn, self.tags.changes(&from.attributes, &to.attributes))
            .await?;

        self.read_appconfig_application(id, identifier).await
    }

    pub(crate) async fn delete_appconfig_application(&self, identifier: &str) -> ProviderResult<()> {
        log::debug!("Deleting AppConfig Application: {}", identifier);
        let result = self
            .appconfig
            .delete_application()
            .application_id(identifier)
            .send()
            .await;
        deleted(result, format!("deleting AppConfig Application ({})", identifier))
    }
}

//! Amazon MQ configuration
//!
//! The configuration document travels base64-encoded. Configurations cannot
//! be deleted through the API; deleting one only forgets it.

use std::collections::HashMap;

use aws_sdk_mq::operation::describe_configuration::DescribeConfigurationOutput;
use aws_sdk_mq::types::{AuthenticationStrategy, EngineType};
use base64::prelude::*;
use terrace_core::differ::Changes;
use terrace_core::provider::{ProviderError, ProviderResult};
use terrace_core::resource::{Resource, ResourceId, State, Value};
use terrace_core::tags::KeyValueTags;

use crate::{AwsProvider, read_created};
use crate::attrs::{Attrs, int_of, put, string_of};
use crate::error::{found, missing, sdk_error};
use crate::schemas::types::normalize_engine_type;
use crate::tags::tags_request;

pub(crate) fn encode_data(data: &str) -> String {
    BASE64_STANDARD.encode(data)
}

pub(crate) fn decode_data(encoded: &str) -> ProviderResult<String> {
    let bytes = BASE64_STANDARD.decode(encoded).map_err(|e| {
        ProviderError::new(format!("decoding MQ configuration data: {}", e)).with_cause(e)
    })?;
    String::from_utf8(bytes).map_err(|e| {
        ProviderError::new(format!("MQ configuration data is not UTF-8: {}", e)).with_cause(e)
    })
}

/// Latest revision number reported for a configuration
fn latest_revision(output: &DescribeConfigurationOutput) -> Option<i32> {
    output
        .latest_revision()
        .and_then(|r| int_of(r.revision()))
        .and_then(|n| i32::try_from(n).ok())
}

pub(crate) fn flatten_configuration(output: &DescribeConfigurationOutput) -> HashMap<String, Value> {
    let mut attributes = HashMap::new();
    put(&mut attributes, "arn", output.arn());
    put(&mut attributes, "name", output.name());
    put(&mut attributes, "engine_type", output.engine_type());
    put(&mut attributes, "engine_version", output.engine_version());
    put(&mut attributes, "authentication_strategy", output.authentication_strategy());
    put(&mut attributes, "description", output.description());
    put(&mut attributes, "latest_revision", latest_revision(output));
    attributes
}

impl AwsProvider {
    async fn mq_configuration_data(
        &self,
        configuration_id: &str,
        revision: i32,
    ) -> ProviderResult<Option<String>> {
        let output = self
            .mq
            .describe_configuration_revision()
            .configuration_id(configuration_id)
            .configuration_revision(revision.to_string())
            .send()
            .await
            .map_err(|e| {
                sdk_error(
                    format!(
                        "reading MQ Configuration ({}) revision {}",
                        configuration_id, revision
                    ),
                    e,
                )
            })?;
        string_of(output.data()).map(|d| decode_data(&d)).transpose()
    }

    pub(crate) async fn read_mq_configuration(
        &self,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<State> {
        let result = self
            .mq
            .describe_configuration()
            .configuration_id(identifier)
            .send()
            .await;
        let context = format!("reading MQ Configuration ({})", identifier);
        let Some(output) = found(result, context)? else {
            log::warn!("MQ Configuration ({}) not found, removing from state", identifier);
            return Ok(State::not_found(id.clone()));
        };

        let mut attributes = flatten_configuration(&output);
        if let Some(revision) = latest_revision(&output)
            && let Some(data) = self.mq_configuration_data(identifier, revision).await?
        {
            attributes.insert("data".to_string(), Value::String(data));
        }
        let tags = output.tags().map(KeyValueTags::from).unwrap_or_default();
        self.tags.apply(&mut attributes, tags);

        Ok(State::existing(id.clone(), attributes).with_identifier(identifier))
    }

    async fn put_mq_configuration_data(
        &self,
        configuration_id: &str,
        attrs: &Attrs<'_>,
    ) -> ProviderResult<()> {
        log::debug!("Updating MQ Configuration data: {}", configuration_id);
        self.mq
            .update_configuration()
            .configuration_id(configuration_id)
            .set_data(attrs.str("data").map(encode_data))
            .set_description(attrs.string("description"))
            .send()
            .await
            .map_err(|e| sdk_error(format!("updating MQ Configuration ({})", configuration_id), e))?;
        Ok(())
    }

    pub(crate) async fn create_mq_configuration(
        &self,
        resource: Resource,
    ) -> ProviderResult<State> {
        let attrs = Attrs::new(&resource.attributes);
        let name = attrs.required_str("name")?;
        let context = format!("creating MQ Configuration ({})", name);
        log::debug!("Creating MQ Configuration: {}", name);

        let engine_type = normalize_engine_type(attrs.required_str("engine_type")?);
        let output = self
            .mq
            .create_configuration()
            .name(name)
            .engine_type(EngineType::from(engine_type.as_str()))
            .engine_version(attrs.required_str("engine_version")?)
            .set_authentication_strategy(
                attrs
                    .str("authentication_strategy")
                    .map(AuthenticationStrategy::from),
            )
            .set_tags(tags_request(self.tags.desired(&resource.attributes)))
            .send()
            .await
            .map_err(|e| sdk_error(&context, e))?;
        let configuration_id = output
            .id()
            .ok_or_else(|| missing(&context, "id"))?
            .to_string();

        if attrs.has("data") || attrs.has("description") {
            self.put_mq_configuration_data(&configuration_id, &attrs)
                .await?;
        }

        read_created(&resource.id, || {
            self.read_mq_configuration(&resource.id, &configuration_id)
        })
        .await
    }

    pub(crate) async fn update_mq_configuration(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: Resource,
    ) -> ProviderResult<State> {
        let changes = Changes::between(&from.attributes, &to.attributes);
        if changes.has_any(&["data", "description"]) {
            self.put_mq_configuration_data(identifier, &Attrs::new(&to.attributes))
                .await?;
        }

        let diff = self.tags.changes(&from.attributes, &to.attributes);
        if !diff.is_empty() {
            let arn = self.mq_arn(from, &format!("configuration:{}", identifier));
            self.update_mq_tags(&arn, diff).await?;
        }

        self.read_mq_configuration(id, identifier).await
    }

    pub(crate) fn delete_mq_configuration(&self, identifier: &str) -> ProviderResult<()> {
        log::info!(
            "MQ Configuration ({}) cannot be deleted, removing from state only",
            identifier
        );
        Ok(())
    }
}

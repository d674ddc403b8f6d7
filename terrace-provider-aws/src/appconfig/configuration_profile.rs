//! AppConfig configuration profile
//!
//! Identified by `ConfigurationProfileID:ApplicationID`.

use std::collections::HashMap;

use aws_sdk_appconfig::operation::get_configuration_profile::GetConfigurationProfileOutput;
use aws_sdk_appconfig::types::{Validator, ValidatorType};
use terrace_core::differ::Changes;
use terrace_core::id::{format_id, parse_pair};
use terrace_core::provider::{ProviderError, ProviderResult};
use terrace_core::resource::{Resource, ResourceId, State, Value};

use crate::{AwsProvider, read_created};
use crate::attrs::{Attrs, Finish, block, put};
use crate::error::{deleted, found, missing, sdk_error};
use crate::tags::tags_request;

const ID_SEPARATOR: &str = ":";
const ID_SHAPE: &str = "ConfigurationProfileID:ApplicationID";

pub(crate) fn profile_id(profile_id: &str, application_id: &str) -> String {
    format_id(&[profile_id, application_id], ID_SEPARATOR)
}

/// Split a profile identifier into (profile ID, application ID)
pub(crate) fn parse_profile_id(id: &str) -> ProviderResult<(String, String)> {
    parse_pair(id, ID_SEPARATOR, ID_SHAPE)
}

pub(crate) fn expand_validators(blocks: &[Attrs<'_>]) -> ProviderResult<Vec<Validator>> {
    blocks
        .iter()
        .map(|b| {
            Validator::builder()
                .r#type(ValidatorType::from(b.required_str("type")?))
                .content(b.str("content").unwrap_or_default())
                .build()
                .finish("AppConfig validator")
        })
        .collect()
}

fn flatten_validators(validators: &[Validator]) -> Value {
    Value::List(
        validators
            .iter()
            .map(|v| {
                let mut fields = HashMap::new();
                put(&mut fields, "type", v.r#type());
                put(&mut fields, "content", v.content());
                block(fields)
            })
            .collect(),
    )
}

pub(crate) fn flatten_configuration_profile(
    output: &GetConfigurationProfileOutput,
) -> HashMap<String, Value> {
    let mut attributes = HashMap::new();
    put(&mut attributes, "application_id", output.application_id());
    put(&mut attributes, "configuration_profile_id", output.id());
    put(&mut attributes, "name", output.name());
    put(&mut attributes, "description", output.description());
    put(&mut attributes, "location_uri", output.location_uri());
    put(&mut attributes, "retrieval_role_arn", output.retrieval_role_arn());
    put(&mut attributes, "type", output.r#type());
    put(&mut attributes, "kms_key_identifier", output.kms_key_identifier());
    put(&mut attributes, "kms_key_arn", output.kms_key_arn());
    if !output.validators().is_empty() {
        attributes.insert("validator".to_string(), flatten_validators(output.validators()));
    }
    attributes
}

impl AwsProvider {
    async fn find_appconfig_configuration_profile(
        &self,
        profile: &str,
        application_id: &str,
    ) -> ProviderResult<Option<HashMap<String, Value>>> {
        let result = self
            .appconfig
            .get_configuration_profile()
            .application_id(application_id)
            .configuration_profile_id(profile)
            .send()
            .await;
        let context = format!(
            "reading AppConfig Configuration Profile ({}) for Application ({})",
            profile, application_id
        );
        let Some(output) = found(result, context)? else {
            return Ok(None);
        };

        let arn = self.appconfig_arn(&format!(
            "application/{}/configurationprofile/{}",
            application_id, profile
        ));
        let mut attributes = flatten_configuration_profile(&output);
        let tags = self.appconfig_tags(&arn).await?;
        self.tags.apply(&mut attributes, tags);
        attributes.insert("arn".to_string(), Value::String(arn));
        Ok(Some(attributes))
    }

    pub(crate) async fn read_appconfig_configuration_profile(
        &self,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<State> {
        let (profile, application_id) = parse_profile_id(identifier)?;
        match self
            .find_appconfig_configuration_profile(&profile, &application_id)
            .await?
        {
            Some(attributes) => {
                Ok(State::existing(id.clone(), attributes).with_identifier(identifier))
            }
            None => {
                log::warn!(
                    "AppConfig Configuration Profile ({}) not found, removing from state",
                    identifier
                );
                Ok(State::not_found(id.clone()))
            }
        }
    }

    pub(crate) async fn create_appconfig_configuration_profile(
        &self,
        resource: Resource,
    ) -> ProviderResult<State> {
        let attrs = Attrs::new(&resource.attributes);
        let application_id = attrs.required_str("application_id")?;
        let name = attrs.required_str("name")?;
        let validators = expand_validators(&attrs.blocks("validator"))?;
        log::debug!("Creating AppConfig Configuration Profile: {} ({})", name, application_id);

        let output = self
            .appconfig
            .create_configuration_profile()
            .application_id(application_id)
            .name(name)
            .location_uri(attrs.required_str("location_uri")?)
            .set_description(attrs.string("description"))
            .set_retrieval_role_arn(attrs.string("retrieval_role_arn"))
            .set_type(attrs.string("type"))
            .set_kms_key_identifier(attrs.string("kms_key_identifier"))
            .set_validators(Some(validators))
            .set_tags(tags_request(self.tags.desired(&resource.attributes)))
            .send()
            .await
            .map_err(|e| {
                sdk_error(format!("creating AppConfig Configuration Profile ({})", name), e)
            })?;

        let profile = output.id().ok_or_else(|| {
            missing(format!("creating AppConfig Configuration Profile ({})", name), "id")
        })?;

        let identifier = profile_id(profile, application_id);
        read_created(&resource.id, || {
            self.read_appconfig_configuration_profile(&resource.id, &identifier)
        })
        .await
    }

    pub(crate) async fn update_appconfig_configuration_profile(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: Resource,
    ) -> ProviderResult<State> {
        let (profile, application_id) = parse_profile_id(identifier)?;
        let changes = Changes::between(&from.attributes, &to.attributes);
        let attrs = Attrs::new(&to.attributes);

        if changes.has_any(&[
            "name",
            "description",
            "retrieval_role_arn",
            "validator",
            "kms_key_identifier",
        ]) {
            log::debug!("Updating AppConfig Configuration Profile: {}", identifier);
            let mut request = self
                .appconfig
                .update_configuration_profile()
                .application_id(&application_id)
                .configuration_profile_id(&profile)
                .set_name(attrs.string("name"));
            if changes.has("description") {
                request = request.description(attrs.str("description").unwrap_or_default());
            }
            if changes.has("retrieval_role_arn") {
                request =
                    request.retrieval_role_arn(attrs.str("retrieval_role_arn").unwrap_or_default());
            }
            if changes.has("kms_key_identifier") {
                request =
                    request.kms_key_identifier(attrs.str("kms_key_identifier").unwrap_or_default());
            }
            if changes.has("validator") {
                request =
                    request.set_validators(Some(expand_validators(&attrs.blocks("validator"))?));
            }
            request.send().await.map_err(|e| {
                sdk_error(
                    format!("updating AppConfig Configuration Profile ({})", identifier),
                    e,
                )
            })?;
        }

        let arn = self.appconfig_arn(&format!(
            "application/{}/configurationprofile/{}",
            application_id, profile
        ));
        self.update_appconfig_tags(&arn, self.tags.changes(&from.attributes, &to.attributes))
            .await?;

        self.read_appconfig_configuration_profile(id, identifier)
            .await
    }

    pub(crate) async fn delete_appconfig_configuration_profile(
        &self,
        identifier: &str,
    ) -> ProviderResult<()> {
        let (profile, application_id) = parse_profile_id(identifier)?;
        log::debug!("Deleting AppConfig Configuration Profile: {}", identifier);
        let result = self
            .appconfig
            .delete_configuration_profile()
            .application_id(application_id)
            .configuration_profile_id(profile)
            .send()
            .await;
        deleted(
            result,
            format!("deleting AppConfig Configuration Profile ({})", identifier),
        )
    }

    /// Data source: one configuration profile by application and profile ID
    pub(crate) async fn query_appconfig_configuration_profile(
        &self,
        query: &Resource,
    ) -> ProviderResult<State> {
        let attrs = Attrs::new(&query.attributes);
        let application_id = attrs.required_str("application_id")?;
        let profile = attrs.required_str("configuration_profile_id")?;

        let mut attributes = self
            .find_appconfig_configuration_profile(profile, application_id)
            .await?
            .ok_or_else(|| {
                ProviderError::empty_result(format!(
                    "AppConfig Configuration Profile ({}) for Application ({})",
                    profile, application_id
                ))
            })?;
        attributes.remove("tags_all");
        attributes.remove("kms_key_arn");

        Ok(State::existing(query.id.clone(), attributes)
            .with_identifier(profile_id(profile, application_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::string_of;

    #[test]
    fn profile_id_round_trip() {
        let id = profile_id("prf9012", "abc1234");
        assert_eq!(id, "prf9012:abc1234");
        assert_eq!(
            parse_profile_id(&id).unwrap(),
            ("prf9012".to_string(), "abc1234".to_string())
        );
        assert!(parse_profile_id("prf9012/abc1234").is_err());
    }

    #[test]
    fn expand_validators_maps_type_and_content() {
        let schema = HashMap::from([
            ("type".to_string(), Value::from("JSON_SCHEMA")),
            ("content".to_string(), Value::from("{\"type\":\"object\"}")),
        ]);
        let lambda = HashMap::from([
            ("type".to_string(), Value::from("LAMBDA")),
            (
                "content".to_string(),
                Value::from("arn:aws:lambda:us-east-1:123456789012:function:check"),
            ),
        ]);
        let validators = expand_validators(&[Attrs::new(&schema), Attrs::new(&lambda)]).unwrap();
        assert_eq!(validators.len(), 2);
        assert_eq!(string_of(validators[0].r#type()).as_deref(), Some("JSON_SCHEMA"));
        assert_eq!(string_of(validators[1].r#type()).as_deref(), Some("LAMBDA"));
    }

    #[test]
    fn flatten_configuration_profile_fields() {
        let validator = Validator::builder()
            .r#type(ValidatorType::from("JSON_SCHEMA"))
            .content("{}")
            .build()
            .finish("validator")
            .unwrap();
        let output = GetConfigurationProfileOutput::builder()
            .application_id("abc1234")
            .id("prf9012")
            .name("flags")
            .location_uri("hosted")
            .r#type("AWS.AppConfig.FeatureFlags")
            .validators(validator)
            .build();

        let attributes = flatten_configuration_profile(&output);
        assert_eq!(attributes.get("location_uri"), Some(&Value::from("hosted")));
        assert_eq!(
            attributes.get("type"),
            Some(&Value::from("AWS.AppConfig.FeatureFlags"))
        );
        assert_eq!(
            attributes.get("configuration_profile_id"),
            Some(&Value::from("prf9012"))
        );
        let validators = attributes.get("validator").and_then(Value::as_list).unwrap();
        assert_eq!(
            validators[0].as_map().and_then(|v| v.get("type")),
            Some(&Value::from("JSON_SCHEMA"))
        );
        assert!(!attributes.contains_key("retrieval_role_arn"));
    }
}

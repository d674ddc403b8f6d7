//! AppConfig hosted configuration version
//!
//! Identified by `ApplicationID/ConfigurationProfileID/VersionNumber`.

use std::collections::HashMap;

use aws_sdk_appconfig::operation::get_hosted_configuration_version::GetHostedConfigurationVersionOutput;
use aws_sdk_appconfig::primitives::Blob;
use terrace_core::id::{format_id, parse_id, parse_number};
use terrace_core::provider::{ProviderError, ProviderResult};
use terrace_core::resource::{Resource, ResourceId, State, Value};

use crate::{AwsProvider, read_created};
use crate::attrs::{Attrs, int_of, put};
use crate::error::{deleted, found, missing, sdk_error};

const ID_SEPARATOR: &str = "/";
const ID_SHAPE: &str = "ApplicationID/ConfigurationProfileID/VersionNumber";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct VersionKey {
    pub application_id: String,
    pub profile_id: String,
    pub version: i32,
}

impl VersionKey {
    pub(crate) fn parse(id: &str) -> ProviderResult<Self> {
        let parts = parse_id(id, ID_SEPARATOR, 3, ID_SHAPE)?;
        Ok(Self {
            application_id: parts[0].clone(),
            profile_id: parts[1].clone(),
            version: parse_number(&parts[2], id, ID_SHAPE)?,
        })
    }

    pub(crate) fn format(&self) -> String {
        let version = self.version.to_string();
        format_id(
            &[self.application_id.as_str(), self.profile_id.as_str(), version.as_str()],
            ID_SEPARATOR,
        )
    }
}

pub(crate) fn flatten_hosted_configuration_version(
    output: &GetHostedConfigurationVersionOutput,
) -> ProviderResult<HashMap<String, Value>> {
    let mut attributes = HashMap::new();
    put(&mut attributes, "application_id", output.application_id());
    put(&mut attributes, "configuration_profile_id", output.configuration_profile_id());
    put(&mut attributes, "version_number", output.version_number());
    put(&mut attributes, "content_type", output.content_type());
    put(&mut attributes, "description", output.description());
    if let Some(content) = output.content() {
        let text = String::from_utf8(content.as_ref().to_vec()).map_err(|e| {
            ProviderError::new(format!("hosted configuration content is not UTF-8: {}", e))
                .with_cause(e)
        })?;
        attributes.insert("content".to_string(), Value::String(text));
    }
    Ok(attributes)
}

impl AwsProvider {
    pub(crate) async fn read_appconfig_hosted_configuration_version(
        &self,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<State> {
        let key = VersionKey::parse(identifier)?;
        let result = self
            .appconfig
            .get_hosted_configuration_version()
            .application_id(&key.application_id)
            .configuration_profile_id(&key.profile_id)
            .version_number(key.version)
            .send()
            .await;
        let context = format!("reading AppConfig Hosted Configuration Version ({})", identifier);
        let Some(output) = found(result, context)? else {
            log::warn!(
                "AppConfig Hosted Configuration Version ({}) not found, removing from state",
                identifier
            );
            return Ok(State::not_found(id.clone()));
        };

        let mut attributes = flatten_hosted_configuration_version(&output)?;
        attributes.insert(
            "arn".to_string(),
            Value::String(self.appconfig_arn(&format!(
                "application/{}/configurationprofile/{}/hostedconfigurationversion/{}",
                key.application_id, key.profile_id, key.version
            ))),
        );

        Ok(State::existing(id.clone(), attributes).with_identifier(identifier))
    }

    pub(crate) async fn create_appconfig_hosted_configuration_version(
        &self,
        resource: Resource,
    ) -> ProviderResult<State> {
        let attrs = Attrs::new(&resource.attributes);
        let application_id = attrs.required_str("application_id")?;
        let profile_id = attrs.required_str("configuration_profile_id")?;
        let context = format!(
            "creating AppConfig Hosted Configuration Version for Profile ({}) in Application ({})",
            profile_id, application_id
        );
        log::debug!(
            "Creating AppConfig Hosted Configuration Version: {}/{}",
            application_id,
            profile_id
        );

        let content = attrs
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let output = self
            .appconfig
            .create_hosted_configuration_version()
            .application_id(application_id)
            .configuration_profile_id(profile_id)
            .content(Blob::new(content.as_bytes()))
            .content_type(attrs.required_str("content_type")?)
            .set_description(attrs.string("description"))
            .send()
            .await
            .map_err(|e| sdk_error(&context, e))?;

        let version = int_of(output.version_number())
            .and_then(|n| i32::try_from(n).ok())
            .ok_or_else(|| missing(&context, "version number"))?;
        let key = VersionKey {
            application_id: application_id.to_string(),
            profile_id: profile_id.to_string(),
            version,
        };

        let identifier = key.format();
        read_created(&resource.id, || {
            self.read_appconfig_hosted_configuration_version(&resource.id, &identifier)
        })
        .await
    }

    pub(crate) async fn delete_appconfig_hosted_configuration_version(
        &self,
        identifier: &str,
    ) -> ProviderResult<()> {
        let key = VersionKey::parse(identifier)?;
        log::debug!("Deleting AppConfig Hosted Configuration Version: {}", identifier);
        let result = self
            .appconfig
            .delete_hosted_configuration_version()
            .application_id(key.application_id)
            .configuration_profile_id(key.profile_id)
            .version_number(key.version)
            .send()
            .await;
        deleted(
            result,
            format!("deleting AppConfig Hosted Configuration Version ({})", identifier),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_key_round_trip() {
        let key = VersionKey::parse("abc1234/prf9012/12").unwrap();
        assert_eq!(
            key,
            VersionKey {
                application_id: "abc1234".to_string(),
                profile_id: "prf9012".to_string(),
                version: 12,
            }
        );
        assert_eq!(key.format(), "abc1234/prf9012/12");
        assert!(VersionKey::parse("abc1234/prf9012").is_err());
        assert!(VersionKey::parse("abc1234/prf9012/latest").is_err());
    }

    #[test]
    fn flatten_reads_content_as_text() {
        let output = GetHostedConfigurationVersionOutput::builder()
            .application_id("abc1234")
            .configuration_profile_id("prf9012")
            .version_number(2)
            .content_type("application/json")
            .content(Blob::new(r#"{"flag":true}"#))
            .build();
        let attributes = flatten_hosted_configuration_version(&output).unwrap();
        assert_eq!(attributes.get("content"), Some(&Value::from(r#"{"flag":true}"#)));
        assert_eq!(attributes.get("version_number"), Some(&Value::Int(2)));
        assert_eq!(
            attributes.get("content_type"),
            Some(&Value::from("application/json"))
        );
        assert!(!attributes.contains_key("description"));
    }

    #[test]
    fn flatten_rejects_content_that_is_not_utf8() {
        let output = GetHostedConfigurationVersionOutput::builder()
            .application_id("abc1234")
            .configuration_profile_id("prf9012")
            .version_number(3)
            .content_type("application/octet-stream")
            .content(Blob::new(vec![0xff, 0xfe, 0x00]))
            .build();
        let err = flatten_hosted_configuration_version(&output).unwrap_err();
        assert!(err.message.contains("not UTF-8"));
    }
}

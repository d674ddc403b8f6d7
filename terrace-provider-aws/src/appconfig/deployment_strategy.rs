//! AppConfig deployment strategy

use std::collections::HashMap;

use aws_sdk_appconfig::operation::get_deployment_strategy::GetDeploymentStrategyOutput;
use aws_sdk_appconfig::types::{GrowthType, ReplicateTo};
use terrace_core::differ::Changes;
use terrace_core::provider::{ProviderError, ProviderResult};
use terrace_core::resource::{Resource, ResourceId, State, Value};

use crate::{AwsProvider, read_created};
use crate::attrs::{Attrs, put};
use crate::error::{deleted, found, missing, sdk_error};
use crate::tags::tags_request;

/// Strategies AWS ships with every account; they cannot be changed or deleted
const PREDEFINED_PREFIX: &str = "AppConfig.";

pub(crate) fn flatten_deployment_strategy(
    output: &GetDeploymentStrategyOutput,
) -> HashMap<String, Value> {
    let mut attributes = HashMap::new();
    put(&mut attributes, "name", output.name());
    put(&mut attributes, "description", output.description());
    put(
        &mut attributes,
        "deployment_duration_in_minutes",
        output.deployment_duration_in_minutes(),
    );
    put(
        &mut attributes,
        "final_bake_time_in_minutes",
        output.final_bake_time_in_minutes(),
    );
    put(&mut attributes, "growth_factor", output.growth_factor());
    put(&mut attributes, "growth_type", output.growth_type());
    put(&mut attributes, "replicate_to", output.replicate_to());
    attributes
}

/// Growth factor as sent to the API
fn growth_factor(attrs: &Attrs<'_>) -> Option<f32> {
    attrs.float("growth_factor").map(|f| f as f32)
}

fn ensure_mutable(identifier: &str) -> ProviderResult<()> {
    if identifier.starts_with(PREDEFINED_PREFIX) {
        return Err(ProviderError::validation(format!(
            "predefined deployment strategy {} cannot be modified",
            identifier
        )));
    }
    Ok(())
}

impl AwsProvider {
    pub(crate) async fn read_appconfig_deployment_strategy(
        &self,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<State> {
        let result = self
            .appconfig
            .get_deployment_strategy()
            .deployment_strategy_id(identifier)
            .send()
            .await;
        let context = format!("reading AppConfig Deployment Strategy ({})", identifier);
        let Some(output) = found(result, context)? else {
            log::warn!(
                "AppConfig Deployment Strategy ({}) not found, removing from state",
                identifier
            );
            return Ok(State::not_found(id.clone()));
        };

        let arn = self.appconfig_arn(&format!("deploymentstrategy/{}", identifier));
        let mut attributes = flatten_deployment_strategy(&output);
        let tags = self.appconfig_tags(&arn).await?;
        self.tags.apply(&mut attributes, tags);
        attributes.insert("arn".to_string(), Value::String(arn));

        Ok(State::existing(id.clone(), attributes).with_identifier(identifier))
    }

    pub(crate) async fn create_appconfig_deployment_strategy(
        &self,
        resource: Resource,
    ) -> ProviderResult<State> {
        let attrs = Attrs::new(&resource.attributes);
        let name = attrs.required_str("name")?;
        log::debug!("Creating AppConfig Deployment Strategy: {}", name);

        let output = self
            .appconfig
            .create_deployment_strategy()
            .name(name)
            .set_description(attrs.string("description"))
            .deployment_duration_in_minutes(attrs.required_int32("deployment_duration_in_minutes")?)
            .set_final_bake_time_in_minutes(attrs.int32("final_bake_time_in_minutes")?)
            .set_growth_factor(growth_factor(&attrs))
            .set_growth_type(attrs.str("growth_type").map(GrowthType::from))
            .set_replicate_to(attrs.str("replicate_to").map(ReplicateTo::from))
            .set_tags(tags_request(self.tags.desired(&resource.attributes)))
            .send()
            .await
            .map_err(|e| {
                sdk_error(format!("creating AppConfig Deployment Strategy ({})", name), e)
            })?;

        let strategy_id = output.id().ok_or_else(|| {
            missing(format!("creating AppConfig Deployment Strategy ({})", name), "id")
        })?;

        read_created(&resource.id, || {
            self.read_appconfig_deployment_strategy(&resource.id, strategy_id)
        })
        .await
    }

    pub(crate) async fn update_appconfig_deployment_strategy(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: Resource,
    ) -> ProviderResult<State> {
        ensure_mutable(identifier)?;
        let changes = Changes::between(&from.attributes, &to.attributes);
        let attrs = Attrs::new(&to.attributes);

        if changes.has_any(&[
            "description",
            "deployment_duration_in_minutes",
            "final_bake_time_in_minutes",
            "growth_factor",
            "growth_type",
        ]) {
            log::debug!("Updating AppConfig Deployment Strategy: {}", identifier);
            let mut request = self
                .appconfig
                .update_deployment_strategy()
                .deployment_strategy_id(identifier);
            if changes.has("description") {
                request = request.description(attrs.str("description").unwrap_or_default());
            }
            if changes.has("deployment_duration_in_minutes") {
                request = request.set_deployment_duration_in_minutes(
                    attrs.int32("deployment_duration_in_minutes")?,
                );
            }
            if changes.has("final_bake_time_in_minutes") {
                request = request.final_bake_time_in_minutes(
                    attrs.int32("final_bake_time_in_minutes")?.unwrap_or(0),
                );
            }
            if changes.has("growth_factor") {
                request = request.set_growth_factor(growth_factor(&attrs));
            }
            if changes.has("growth_type") {
                request = request.set_growth_type(attrs.str("growth_type").map(GrowthType::from));
            }
            request.send().await.map_err(|e| {
                sdk_error(
                    format!("updating AppConfig Deployment Strategy ({})", identifier),
                    e,
                )
            })?;
        }

        let arn = self.appconfig_arn(&format!("deploymentstrategy/{}", identifier));
        self.update_appconfig_tags(&arn, self.tags.changes(&from.attributes, &to.attributes))
            .await?;

        self.read_appconfig_deployment_strategy(id, identifier)
            .await
    }

    pub(crate) async fn delete_appconfig_deployment_strategy(
        &self,
        identifier: &str,
    ) -> ProviderResult<()> {
        ensure_mutable(identifier)?;
        log::debug!("Deleting AppConfig Deployment Strategy: {}", identifier);
        let result = self
            .appconfig
            .delete_deployment_strategy()
            .deployment_strategy_id(identifier)
            .send()
            .await;
        deleted(
            result,
            format!("deleting AppConfig Deployment Strategy ({})", identifier),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_deployment_strategy_fields() {
        let output = GetDeploymentStrategyOutput::builder()
            .id("str1234")
            .name("quick")
            .deployment_duration_in_minutes(3)
            .final_bake_time_in_minutes(4)
            .growth_factor(10.0)
            .growth_type(GrowthType::from("LINEAR"))
            .replicate_to(ReplicateTo::from("NONE"))
            .build();
        let attributes = flatten_deployment_strategy(&output);

        assert_eq!(
            attributes.get("deployment_duration_in_minutes"),
            Some(&Value::Int(3))
        );
        assert_eq!(attributes.get("final_bake_time_in_minutes"), Some(&Value::Int(4)));
        assert_eq!(attributes.get("growth_factor"), Some(&Value::Float(10.0)));
        assert_eq!(attributes.get("growth_type"), Some(&Value::from("LINEAR")));
        assert_eq!(attributes.get("replicate_to"), Some(&Value::from("NONE")));
        assert!(!attributes.contains_key("description"));
    }

    #[test]
    fn fractional_growth_factor_reads_back_exactly() {
        let output = GetDeploymentStrategyOutput::builder().growth_factor(12.5).build();
        assert_eq!(
            flatten_deployment_strategy(&output).get("growth_factor"),
            Some(&Value::Float(12.5))
        );
    }

    #[test]
    fn growth_factor_accepts_integers() {
        let values = HashMap::from([("growth_factor".to_string(), Value::Int(20))]);
        assert_eq!(growth_factor(&Attrs::new(&values)), Some(20.0));
    }

    #[test]
    fn predefined_strategies_are_immutable() {
        assert!(ensure_mutable("AppConfig.AllAtOnce").is_err());
        assert!(ensure_mutable("str1234").is_ok());
    }
}

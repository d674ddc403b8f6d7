//! Evidently feature
//!
//! Identified by `FeatureName:ProjectNameOrARN`.

use std::collections::HashMap;

use aws_sdk_evidently::types::{
    EvaluationRule, Feature, FeatureEvaluationStrategy, VariableValue, Variation, VariationConfig,
};
use terrace_core::differ::Changes;
use terrace_core::provider::{ProviderError, ProviderResult};
use terrace_core::resource::{Resource, ResourceId, State, Value};
use terrace_core::tags::KeyValueTags;
use terrace_core::waiter::{Refresh, StateChangeConf};

use super::{CREATE_TIMEOUT, DELETE_TIMEOUT, UPDATE_TIMEOUT, nested_id, parse_nested_id};
use crate::{AwsProvider, read_created};
use crate::attrs::{Attrs, Finish, OptionalMember, block, put, put_timestamp, string_map, string_of};
use crate::error::{deleted, found, sdk_error};
use crate::schemas::evidently::feature_schema;
use crate::tags::tags_request;

const ID_SHAPE: &str = "FeatureName:ProjectNameOrARN";

/// Attributes sent through UpdateFeature
const UPDATABLE: &[&str] = &[
    "description",
    "variations",
    "default_variation",
    "evaluation_strategy",
    "entity_overrides",
];

const STATUS_AVAILABLE: &str = "AVAILABLE";
const STATUS_UPDATING: &str = "UPDATING";

fn expand_variable_value(value: &Attrs<'_>) -> ProviderResult<VariableValue> {
    if let Some(s) = value.get("string_value").and_then(Value::as_str) {
        return Ok(VariableValue::StringValue(s.to_string()));
    }
    if let Some(n) = value.int("long_value") {
        return Ok(VariableValue::LongValue(n));
    }
    if let Some(f) = value.float("double_value") {
        return Ok(VariableValue::DoubleValue(f));
    }
    if let Some(b) = value.bool("bool_value") {
        return Ok(VariableValue::BoolValue(b));
    }
    Err(ProviderError::validation(
        "variation value needs one of string_value, long_value, double_value or bool_value",
    ))
}

fn flatten_variable_value(value: &VariableValue) -> Value {
    let (key, value) = match value {
        VariableValue::StringValue(s) => ("string_value", Value::String(s.clone())),
        VariableValue::LongValue(n) => ("long_value", Value::Int(*n)),
        VariableValue::DoubleValue(f) => ("double_value", Value::Float(*f)),
        VariableValue::BoolValue(b) => ("bool_value", Value::Bool(*b)),
        _ => return block(HashMap::new()),
    };
    block(HashMap::from([(key.to_string(), value)]))
}

pub(crate) fn expand_variations(blocks: &[Attrs<'_>]) -> ProviderResult<Vec<VariationConfig>> {
    blocks
        .iter()
        .map(|b| {
            let value = b
                .block("value")
                .ok_or_else(|| ProviderError::validation("variation value is required"))?;
            VariationConfig::builder()
                .name(b.required_str("name")?)
                .value(expand_variable_value(&value)?)
                .build()
                .finish("Evidently variation")
        })
        .collect()
}

fn flatten_variations(variations: &[Variation]) -> Value {
    Value::List(
        variations
            .iter()
            .map(|v| {
                let mut fields = HashMap::new();
                put(&mut fields, "name", v.name());
                if let Some(value) = v.value().optional() {
                    fields.insert("value".to_string(), flatten_variable_value(value));
                }
                block(fields)
            })
            .collect(),
    )
}

fn flatten_evaluation_rules(rules: &[EvaluationRule]) -> Value {
    Value::List(
        rules
            .iter()
            .map(|r| {
                let mut fields = HashMap::new();
                put(&mut fields, "name", r.name());
                put(&mut fields, "type", r.r#type());
                block(fields)
            })
            .collect(),
    )
}

/// Variations to send on update: (added or changed, removed names)
pub(crate) fn variation_changes<'a>(
    old: &[Attrs<'a>],
    new: &[Attrs<'a>],
) -> (Vec<Attrs<'a>>, Vec<String>) {
    let previous: HashMap<&str, Option<&Value>> = old
        .iter()
        .filter_map(|v| v.str("name").map(|name| (name, v.get("value"))))
        .collect();

    let upsert = new
        .iter()
        .filter(|v| match v.str("name") {
            Some(name) => previous.get(name) != Some(&v.get("value")),
            None => false,
        })
        .copied()
        .collect();

    let kept: Vec<&str> = new.iter().filter_map(|v| v.str("name")).collect();
    let mut removed: Vec<String> = previous
        .keys()
        .filter(|name| !kept.contains(*name))
        .map(|name| name.to_string())
        .collect();
    removed.sort();

    (upsert, removed)
}

/// What an update sends for a feature
#[derive(Debug, Default, PartialEq)]
pub(crate) struct FeatureUpdatePlan {
    pub(crate) changes: Changes,
    /// Whether UpdateFeature is called at all
    pub(crate) update_feature: bool,
    /// Names of variations added or changed
    pub(crate) upsert_variations: Vec<String>,
    pub(crate) remove_variations: Vec<String>,
}

pub(crate) fn feature_update_plan(
    from: &HashMap<String, Value>,
    to: &HashMap<String, Value>,
) -> FeatureUpdatePlan {
    let changes = Changes::for_schema(from, to, &feature_schema());
    let mut plan = FeatureUpdatePlan {
        update_feature: changes.has_any(UPDATABLE),
        ..Default::default()
    };
    if changes.has("variations") {
        let (upsert, removed) = variation_changes(
            &Attrs::new(from).blocks("variations"),
            &Attrs::new(to).blocks("variations"),
        );
        plan.upsert_variations = upsert
            .iter()
            .filter_map(|v| v.string("name"))
            .collect();
        plan.remove_variations = removed;
    }
    plan.changes = changes;
    plan
}

pub(crate) fn flatten_feature(feature: &Feature) -> HashMap<String, Value> {
    let mut attributes = HashMap::new();
    put(&mut attributes, "arn", feature.arn());
    put(&mut attributes, "name", feature.name());
    put(&mut attributes, "project", feature.project());
    put(&mut attributes, "description", feature.description());
    put(&mut attributes, "status", feature.status());
    put(&mut attributes, "value_type", feature.value_type());
    put(&mut attributes, "evaluation_strategy", feature.evaluation_strategy());
    put(&mut attributes, "default_variation", feature.default_variation());
    put_timestamp(&mut attributes, "created_time", feature.created_time());
    put_timestamp(&mut attributes, "last_updated_time", feature.last_updated_time());

    let variations = feature.variations().optional().unwrap_or_default();
    attributes.insert("variations".to_string(), flatten_variations(variations));

    let rules = feature.evaluation_rules().optional().unwrap_or_default();
    attributes.insert("evaluation_rules".to_string(), flatten_evaluation_rules(rules));

    if let Some(overrides) = feature.entity_overrides().optional() {
        if !overrides.is_empty() {
            attributes.insert("entity_overrides".to_string(), string_map(overrides));
        }
    }
    attributes
}

impl AwsProvider {
    async fn find_evidently_feature(
        &self,
        name: &str,
        project: &str,
    ) -> ProviderResult<Option<Feature>> {
        let result = self
            .evidently
            .get_feature()
            .project(project)
            .feature(name)
            .send()
            .await;
        let context = format!("reading Evidently Feature ({}) for Project ({})", name, project);
        let output = found(result, context)?;
        Ok(output.and_then(|o| o.feature().cloned()))
    }

    async fn evidently_feature_status(&self, name: &str, project: &str) -> Refresh<Feature> {
        Ok(self.find_evidently_feature(name, project).await?.map(|feature| {
            let status = string_of(feature.status()).unwrap_or_default();
            (feature, status)
        }))
    }

    async fn wait_evidently_feature_available(
        &self,
        name: &str,
        project: &str,
        timeout: std::time::Duration,
    ) -> ProviderResult<()> {
        StateChangeConf::new(&[STATUS_UPDATING], &[STATUS_AVAILABLE], timeout)
            .wait(|| self.evidently_feature_status(name, project))
            .await?;
        Ok(())
    }

    pub(crate) async fn read_evidently_feature(
        &self,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<State> {
        let (name, project) = parse_nested_id(identifier, ID_SHAPE)?;
        let Some(feature) = self.find_evidently_feature(&name, &project).await? else {
            log::warn!("Evidently Feature ({}) not found, removing from state", identifier);
            return Ok(State::not_found(id.clone()));
        };

        let mut attributes = flatten_feature(&feature);
        // The API reports the project ARN; keep the reference as declared
        attributes.insert("project".to_string(), Value::String(project));
        let tags = feature.tags().map(KeyValueTags::from).unwrap_or_default();
        self.tags.apply(&mut attributes, tags);

        Ok(State::existing(id.clone(), attributes).with_identifier(identifier))
    }

    pub(crate) async fn create_evidently_feature(
        &self,
        resource: Resource,
    ) -> ProviderResult<State> {
        let attrs = Attrs::new(&resource.attributes);
        let name = attrs.required_str("name")?;
        let project = attrs.required_str("project")?;
        log::debug!("Creating Evidently Feature: {} ({})", name, project);

        let overrides = attrs.string_map("entity_overrides");
        self.evidently
            .create_feature()
            .project(project)
            .name(name)
            .set_description(attrs.string("description"))
            .set_variations(Some(expand_variations(&attrs.blocks("variations"))?))
            .set_default_variation(attrs.string("default_variation"))
            .set_evaluation_strategy(
                attrs
                    .str("evaluation_strategy")
                    .map(FeatureEvaluationStrategy::from),
            )
            .set_entity_overrides((!overrides.is_empty()).then_some(overrides))
            .set_tags(tags_request(self.tags.desired(&resource.attributes)))
            .send()
            .await
            .map_err(|e| sdk_error(format!("creating Evidently Feature ({})", name), e))?;

        self.wait_evidently_feature_available(name, project, CREATE_TIMEOUT)
            .await?;
        let identifier = nested_id(name, project);
        read_created(&resource.id, || self.read_evidently_feature(&resource.id, &identifier)).await
    }

    pub(crate) async fn update_evidently_feature(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: Resource,
    ) -> ProviderResult<State> {
        let (name, project) = parse_nested_id(identifier, ID_SHAPE)?;
        let plan = feature_update_plan(&from.attributes, &to.attributes);
        let attrs = Attrs::new(&to.attributes);

        if plan.update_feature {
            log::debug!("Updating Evidently Feature: {}", identifier);
            let mut request = self
                .evidently
                .update_feature()
                .project(&project)
                .feature(&name)
                .set_default_variation(attrs.string("default_variation"))
                .set_evaluation_strategy(
                    attrs
                        .str("evaluation_strategy")
                        .map(FeatureEvaluationStrategy::from),
                )
                .set_entity_overrides(Some(attrs.string_map("entity_overrides")));
            if plan.changes.has("description") {
                request = request.description(attrs.str("description").unwrap_or_default());
            }
            let upsert: Vec<Attrs> = attrs
                .blocks("variations")
                .into_iter()
                .filter(|v| {
                    v.str("name")
                        .is_some_and(|n| plan.upsert_variations.iter().any(|u| u == n))
                })
                .collect();
            if !upsert.is_empty() {
                request = request.set_add_or_update_variations(Some(expand_variations(&upsert)?));
            }
            if !plan.remove_variations.is_empty() {
                request = request.set_remove_variations(Some(plan.remove_variations.clone()));
            }
            request.send().await.map_err(|e| {
                sdk_error(format!("updating Evidently Feature ({})", identifier), e)
            })?;
            self.wait_evidently_feature_available(&name, &project, UPDATE_TIMEOUT)
                .await?;
        }

        self.retag_evidently(from, &to.attributes).await?;
        self.read_evidently_feature(id, identifier).await
    }

    pub(crate) async fn delete_evidently_feature(&self, identifier: &str) -> ProviderResult<()> {
        let (name, project) = parse_nested_id(identifier, ID_SHAPE)?;
        log::debug!("Deleting Evidently Feature: {}", identifier);
        let result = self
            .evidently
            .delete_feature()
            .project(&project)
            .feature(&name)
            .send()
            .await;
        deleted(result, format!("deleting Evidently Feature ({})", identifier))?;

        StateChangeConf::new(&[STATUS_AVAILABLE, STATUS_UPDATING], &[], DELETE_TIMEOUT)
            .wait(|| self.evidently_feature_status(&name, &project))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_evidently::types::{FeatureStatus, VariationValueType};
    use aws_smithy_types::DateTime;

    crate::attrs::infallible_build!(Feature, Variation, EvaluationRule);

    fn variation(name: &str, key: &str, value: Value) -> HashMap<String, Value> {
        HashMap::from([
            ("name".to_string(), Value::from(name)),
            (
                "value".to_string(),
                Value::Map(HashMap::from([(key.to_string(), value)])),
            ),
        ])
    }

    #[test]
    fn expand_each_value_kind() {
        let blocks = [
            variation("s", "string_value", Value::from("")),
            variation("l", "long_value", Value::Int(7)),
            variation("d", "double_value", Value::Float(0.5)),
            variation("b", "bool_value", Value::Bool(true)),
        ];
        let attrs: Vec<Attrs> = blocks.iter().map(Attrs::new).collect();
        let variations = expand_variations(&attrs).unwrap();
        assert_eq!(variations.len(), 4);
        assert_eq!(
            variations[0].value().optional(),
            Some(&VariableValue::StringValue(String::new()))
        );
        assert_eq!(variations[1].value().optional(), Some(&VariableValue::LongValue(7)));
        assert_eq!(variations[2].value().optional(), Some(&VariableValue::DoubleValue(0.5)));
        assert_eq!(variations[3].value().optional(), Some(&VariableValue::BoolValue(true)));
    }

    #[test]
    fn expand_rejects_missing_value() {
        let block = HashMap::from([("name".to_string(), Value::from("on"))]);
        assert!(expand_variations(&[Attrs::new(&block)]).is_err());
        let empty = variation("on", "unknown", Value::Bool(true));
        assert!(expand_variations(&[Attrs::new(&empty)]).is_err());
    }

    #[test]
    fn variation_changes_split_upserts_and_removals() {
        let old = [
            variation("on", "bool_value", Value::Bool(true)),
            variation("off", "bool_value", Value::Bool(false)),
            variation("legacy", "string_value", Value::from("x")),
        ];
        let new = [
            variation("on", "bool_value", Value::Bool(true)),
            variation("off", "string_value", Value::from("no")),
            variation("beta", "long_value", Value::Int(2)),
        ];
        let old: Vec<Attrs> = old.iter().map(Attrs::new).collect();
        let new: Vec<Attrs> = new.iter().map(Attrs::new).collect();

        let (upsert, removed) = variation_changes(&old, &new);
        let names: Vec<&str> = upsert.iter().filter_map(|v| v.str("name")).collect();
        assert_eq!(names, vec!["off", "beta"]);
        assert_eq!(removed, vec!["legacy".to_string()]);
    }

    #[test]
    fn flatten_feature_fields() {
        let variation = Variation::builder()
            .name("on")
            .value(VariableValue::BoolValue(true))
            .build()
            .finish("variation")
            .unwrap();
        let feature = Feature::builder()
            .arn("arn:aws:evidently:us-west-2:123456789012:project/shop/feature/checkout")
            .name("checkout")
            .project("arn:aws:evidently:us-west-2:123456789012:project/shop")
            .status(FeatureStatus::from("AVAILABLE"))
            .created_time(DateTime::from_secs(0))
            .last_updated_time(DateTime::from_secs(0))
            .evaluation_strategy(FeatureEvaluationStrategy::from("ALL_RULES"))
            .value_type(VariationValueType::from("BOOLEAN"))
            .variations(variation)
            .default_variation("on")
            .entity_overrides("user-1", "on")
            .build()
            .finish("feature")
            .unwrap();

        let attributes = flatten_feature(&feature);
        assert_eq!(attributes.get("value_type"), Some(&Value::from("BOOLEAN")));
        assert_eq!(attributes.get("default_variation"), Some(&Value::from("on")));
        let variations = attributes.get("variations").and_then(Value::as_list).unwrap();
        let value = variations[0]
            .as_map()
            .and_then(|v| v.get("value"))
            .and_then(Value::as_map)
            .unwrap();
        assert_eq!(value.get("bool_value"), Some(&Value::Bool(true)));
        let overrides = attributes.get("entity_overrides").and_then(Value::as_map).unwrap();
        assert_eq!(overrides.get("user-1"), Some(&Value::from("on")));
    }

    /// State read back for a feature with two double variations
    fn read_back_feature() -> HashMap<String, Value> {
        let variations = [("low", 2.0), ("high", 5.5)].map(|(name, value)| {
            Variation::builder()
                .name(name)
                .value(VariableValue::DoubleValue(value))
                .build()
                .finish("variation")
                .unwrap()
        });
        let feature = Feature::builder()
            .arn("arn:aws:evidently:us-west-2:123456789012:project/shop/feature/pricing")
            .name("pricing")
            .project("shop")
            .status(FeatureStatus::from("AVAILABLE"))
            .created_time(DateTime::from_secs(0))
            .last_updated_time(DateTime::from_secs(0))
            .evaluation_strategy(FeatureEvaluationStrategy::from("ALL_RULES"))
            .value_type(VariationValueType::from("DOUBLE"))
            .set_variations(Some(variations.to_vec()))
            .default_variation("low")
            .build()
            .finish("feature")
            .unwrap();
        let mut attributes = flatten_feature(&feature);
        attributes.insert("tags".to_string(), Value::Map(HashMap::new()));
        attributes
    }

    fn declared_feature(variations: Vec<HashMap<String, Value>>) -> HashMap<String, Value> {
        let mut attrs = HashMap::from([
            ("name".to_string(), Value::from("pricing")),
            ("project".to_string(), Value::from("shop")),
            (
                "variations".to_string(),
                Value::List(variations.into_iter().map(Value::Map).collect()),
            ),
        ]);
        let schema = feature_schema();
        assert!(schema.validate(&attrs).is_ok());
        schema.apply_defaults(&mut attrs);
        schema.normalize(&mut attrs);
        attrs
    }

    #[test]
    fn unchanged_feature_is_not_updated() {
        let to = declared_feature(vec![
            variation("low", "double_value", Value::Int(2)),
            variation("high", "double_value", Value::Float(5.5)),
        ]);
        let plan = feature_update_plan(&read_back_feature(), &to);
        assert!(!plan.update_feature, "{:?}", plan.changes);
        assert!(plan.upsert_variations.is_empty());
        assert!(plan.remove_variations.is_empty());
    }

    #[test]
    fn variation_edits_are_upserted_and_removed() {
        let to = declared_feature(vec![
            variation("low", "double_value", Value::Int(3)),
            variation("mid", "double_value", Value::Float(4.0)),
        ]);
        let plan = feature_update_plan(&read_back_feature(), &to);
        assert!(plan.update_feature);
        assert_eq!(plan.upsert_variations, ["low".to_string(), "mid".to_string()]);
        assert_eq!(plan.remove_variations, ["high".to_string()]);
    }

    #[test]
    fn tag_change_skips_update_feature() {
        let mut to = declared_feature(vec![
            variation("low", "double_value", Value::Int(2)),
            variation("high", "double_value", Value::Float(5.5)),
        ]);
        to.insert(
            "tags".to_string(),
            Value::Map(HashMap::from([("team".to_string(), Value::from("pricing"))])),
        );
        let plan = feature_update_plan(&read_back_feature(), &to);
        assert_eq!(plan.changes.names(), ["tags".to_string()]);
        assert!(!plan.update_feature);
    }
}

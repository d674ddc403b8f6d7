//! Evidently launch
//!
//! Identified by `LaunchName:ProjectNameOrARN`.

use std::collections::HashMap;
use std::time::Duration;

use aws_sdk_evidently::types::{
    Launch, LaunchGroup, LaunchGroupConfig, ScheduledSplitConfig, ScheduledSplitsLaunchConfig,
    ScheduledSplitsLaunchDefinition,
};
use aws_smithy_types::DateTime;
use aws_smithy_types::date_time::Format;
use terrace_core::differ::Changes;
use terrace_core::provider::{ProviderError, ProviderResult};
use terrace_core::resource::{Resource, ResourceId, State, Value};
use terrace_core::tags::KeyValueTags;
use terrace_core::waiter::{Refresh, StateChangeConf};

use super::{CREATE_TIMEOUT, DELETE_TIMEOUT, UPDATE_TIMEOUT, nested_id, parse_nested_id};
use crate::{AwsProvider, read_created};
use crate::attrs::{Attrs, Finish, OptionalMember, block, put, put_timestamp, string_of};
use crate::error::{deleted, found, sdk_error};
use crate::schemas::evidently::launch_schema;
use crate::tags::tags_request;

const ID_SHAPE: &str = "LaunchName:ProjectNameOrARN";

/// Statuses a launch settles in after create or update
const SETTLED: &[&str] = &["CREATED", "RUNNING", "COMPLETED", "CANCELLED"];
const STATUS_UPDATING: &str = "UPDATING";

/// Attributes sent through UpdateLaunch
const UPDATABLE: &[&str] = &[
    "description",
    "groups",
    "randomization_salt",
    "scheduled_splits_config",
];

pub(crate) fn expand_groups(blocks: &[Attrs<'_>]) -> ProviderResult<Vec<LaunchGroupConfig>> {
    blocks
        .iter()
        .map(|b| {
            LaunchGroupConfig::builder()
                .name(b.required_str("name")?)
                .feature(b.required_str("feature")?)
                .variation(b.required_str("variation")?)
                .set_description(b.string("description"))
                .build()
                .finish("Evidently launch group")
        })
        .collect()
}

fn flatten_groups(groups: &[LaunchGroup]) -> Value {
    Value::List(
        groups
            .iter()
            .map(|g| {
                let mut fields = HashMap::new();
                put(&mut fields, "name", g.name());
                put(&mut fields, "description", g.description());
                // A launch group serves exactly one feature variation
                if let Some((feature, variation)) = g
                    .feature_variations()
                    .optional()
                    .and_then(|m| m.iter().next())
                {
                    fields.insert("feature".to_string(), Value::String(feature.clone()));
                    fields.insert("variation".to_string(), Value::String(variation.clone()));
                }
                block(fields)
            })
            .collect(),
    )
}

fn parse_start_time(value: &str) -> ProviderResult<DateTime> {
    DateTime::from_str(value, Format::DateTime).map_err(|e| {
        ProviderError::validation(format!("start_time {:?} is not RFC 3339: {}", value, e))
    })
}

pub(crate) fn expand_scheduled_splits(
    splits: &Attrs<'_>,
) -> ProviderResult<ScheduledSplitsLaunchConfig> {
    let steps = splits
        .blocks("steps")
        .iter()
        .map(|step| {
            ScheduledSplitConfig::builder()
                .start_time(parse_start_time(step.required_str("start_time")?)?)
                .set_group_weights(Some(step.int_map("group_weights")))
                .build()
                .finish("Evidently scheduled split")
        })
        .collect::<ProviderResult<Vec<_>>>()?;
    ScheduledSplitsLaunchConfig::builder()
        .set_steps(Some(steps))
        .build()
        .finish("Evidently scheduled splits")
}

fn flatten_scheduled_splits(definition: &ScheduledSplitsLaunchDefinition) -> Value {
    let steps = definition
        .steps()
        .optional()
        .unwrap_or_default()
        .iter()
        .map(|step| {
            let mut fields = HashMap::new();
            put_timestamp(&mut fields, "start_time", step.start_time());
            if let Some(weights) = step.group_weights().optional() {
                fields.insert(
                    "group_weights".to_string(),
                    Value::Map(
                        weights
                            .iter()
                            .map(|(group, weight)| (group.clone(), Value::Int(*weight)))
                            .collect(),
                    ),
                );
            }
            block(fields)
        })
        .collect();
    block(HashMap::from([("steps".to_string(), Value::List(steps))]))
}

/// Changed attributes, and whether they call for UpdateLaunch
pub(crate) fn launch_update_plan(
    from: &HashMap<String, Value>,
    to: &HashMap<String, Value>,
) -> (Changes, bool) {
    let changes = Changes::for_schema(from, to, &launch_schema());
    let update_launch = changes.has_any(UPDATABLE);
    (changes, update_launch)
}

pub(crate) fn flatten_launch(launch: &Launch) -> HashMap<String, Value> {
    let mut attributes = HashMap::new();
    put(&mut attributes, "arn", launch.arn());
    put(&mut attributes, "name", launch.name());
    put(&mut attributes, "project", launch.project());
    put(&mut attributes, "description", launch.description());
    put(&mut attributes, "status", launch.status());
    put(&mut attributes, "status_reason", launch.status_reason());
    put(&mut attributes, "type", launch.r#type());
    put(&mut attributes, "randomization_salt", launch.randomization_salt());
    put_timestamp(&mut attributes, "created_time", launch.created_time());
    put_timestamp(&mut attributes, "last_updated_time", launch.last_updated_time());

    let groups = launch.groups().optional().unwrap_or_default();
    attributes.insert("groups".to_string(), flatten_groups(groups));

    if let Some(execution) = launch.execution() {
        let mut fields = HashMap::new();
        put_timestamp(&mut fields, "started_time", execution.started_time());
        put_timestamp(&mut fields, "ended_time", execution.ended_time());
        attributes.insert("execution".to_string(), block(fields));
    }
    if let Some(definition) = launch.scheduled_splits_definition() {
        attributes.insert(
            "scheduled_splits_config".to_string(),
            flatten_scheduled_splits(definition),
        );
    }
    attributes
}

impl AwsProvider {
    async fn find_evidently_launch(
        &self,
        name: &str,
        project: &str,
    ) -> ProviderResult<Option<Launch>> {
        let result = self
            .evidently
            .get_launch()
            .project(project)
            .launch(name)
            .send()
            .await;
        let context = format!("reading Evidently Launch ({}) for Project ({})", name, project);
        let output = found(result, context)?;
        Ok(output.and_then(|o| o.launch().cloned()))
    }

    async fn evidently_launch_status(&self, name: &str, project: &str) -> Refresh<Launch> {
        Ok(self.find_evidently_launch(name, project).await?.map(|launch| {
            let status = string_of(launch.status()).unwrap_or_default();
            (launch, status)
        }))
    }

    async fn wait_evidently_launch_settled(
        &self,
        name: &str,
        project: &str,
        timeout: Duration,
    ) -> ProviderResult<()> {
        StateChangeConf::new(&[STATUS_UPDATING], SETTLED, timeout)
            .wait(|| self.evidently_launch_status(name, project))
            .await?;
        Ok(())
    }

    pub(crate) async fn read_evidently_launch(
        &self,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<State> {
        let (name, project) = parse_nested_id(identifier, ID_SHAPE)?;
        let Some(launch) = self.find_evidently_launch(&name, &project).await? else {
            log::warn!("Evidently Launch ({}) not found, removing from state", identifier);
            return Ok(State::not_found(id.clone()));
        };

        let mut attributes = flatten_launch(&launch);
        attributes.insert("project".to_string(), Value::String(project));
        let tags = launch.tags().map(KeyValueTags::from).unwrap_or_default();
        self.tags.apply(&mut attributes, tags);

        Ok(State::existing(id.clone(), attributes).with_identifier(identifier))
    }

    pub(crate) async fn create_evidently_launch(
        &self,
        resource: Resource,
    ) -> ProviderResult<State> {
        let attrs = Attrs::new(&resource.attributes);
        let name = attrs.required_str("name")?;
        let project = attrs.required_str("project")?;
        log::debug!("Creating Evidently Launch: {} ({})", name, project);

        let splits = attrs
            .block("scheduled_splits_config")
            .map(|b| expand_scheduled_splits(&b))
            .transpose()?;
        self.evidently
            .create_launch()
            .project(project)
            .name(name)
            .set_description(attrs.string("description"))
            .set_groups(Some(expand_groups(&attrs.blocks("groups"))?))
            .set_randomization_salt(attrs.string("randomization_salt"))
            .set_scheduled_splits_config(splits)
            .set_tags(tags_request(self.tags.desired(&resource.attributes)))
            .send()
            .await
            .map_err(|e| sdk_error(format!("creating Evidently Launch ({})", name), e))?;

        self.wait_evidently_launch_settled(name, project, CREATE_TIMEOUT)
            .await?;
        let identifier = nested_id(name, project);
        read_created(&resource.id, || self.read_evidently_launch(&resource.id, &identifier)).await
    }

    pub(crate) async fn update_evidently_launch(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: Resource,
    ) -> ProviderResult<State> {
        let (name, project) = parse_nested_id(identifier, ID_SHAPE)?;
        let (changes, update_launch) = launch_update_plan(&from.attributes, &to.attributes);
        let attrs = Attrs::new(&to.attributes);

        if update_launch {
            log::debug!("Updating Evidently Launch: {}", identifier);
            let splits = attrs
                .block("scheduled_splits_config")
                .map(|b| expand_scheduled_splits(&b))
                .transpose()?;
            let mut request = self
                .evidently
                .update_launch()
                .project(&project)
                .launch(&name)
                .set_groups(Some(expand_groups(&attrs.blocks("groups"))?))
                .set_scheduled_splits_config(splits);
            if changes.has("description") {
                request = request.description(attrs.str("description").unwrap_or_default());
            }
            if changes.has("randomization_salt") {
                request = request
                    .randomization_salt(attrs.str("randomization_salt").unwrap_or_default());
            }
            request.send().await.map_err(|e| {
                sdk_error(format!("updating Evidently Launch ({})", identifier), e)
            })?;
            self.wait_evidently_launch_settled(&name, &project, UPDATE_TIMEOUT)
                .await?;
        }

        self.retag_evidently(from, &to.attributes).await?;
        self.read_evidently_launch(id, identifier).await
    }

    pub(crate) async fn delete_evidently_launch(&self, identifier: &str) -> ProviderResult<()> {
        let (name, project) = parse_nested_id(identifier, ID_SHAPE)?;
        log::debug!("Deleting Evidently Launch: {}", identifier);
        let result = self
            .evidently
            .delete_launch()
            .project(&project)
            .launch(&name)
            .send()
            .await;
        deleted(result, format!("deleting Evidently Launch ({})", identifier))?;

        let mut pending = SETTLED.to_vec();
        pending.push(STATUS_UPDATING);
        StateChangeConf::new(&pending, &[], DELETE_TIMEOUT)
            .wait(|| self.evidently_launch_status(&name, &project))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_evidently::types::{LaunchExecution, LaunchStatus, LaunchType, ScheduledSplit};

    crate::attrs::infallible_build!(
        Launch,
        LaunchGroup,
        LaunchExecution,
        ScheduledSplit,
        ScheduledSplitsLaunchDefinition,
    );

    fn map(pairs: Vec<(&str, Value)>) -> HashMap<String, Value> {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn expand_groups_requires_feature_and_variation() {
        let full = map(vec![
            ("name", Value::from("control")),
            ("feature", Value::from("checkout")),
            ("variation", Value::from("off")),
        ]);
        let groups = expand_groups(&[Attrs::new(&full)]).unwrap();
        assert_eq!(groups.len(), 1);

        let partial = map(vec![("name", Value::from("control"))]);
        assert!(expand_groups(&[Attrs::new(&partial)]).is_err());
    }

    #[test]
    fn expand_scheduled_splits_parses_steps() {
        let splits = map(vec![(
            "steps",
            Value::List(vec![Value::Map(map(vec![
                ("start_time", Value::from("2024-01-01T00:00:00Z")),
                (
                    "group_weights",
                    Value::Map(map(vec![
                        ("control", Value::Int(90_000)),
                        ("treatment", Value::Int(10_000)),
                    ])),
                ),
            ]))]),
        )]);
        let config = expand_scheduled_splits(&Attrs::new(&splits)).unwrap();
        let steps = config.steps().optional().unwrap_or_default();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].start_time().optional().map(|t| t.secs()), Some(1_704_067_200));
        assert_eq!(
            steps[0]
                .group_weights()
                .optional()
                .and_then(|w| w.get("treatment")),
            Some(&10_000)
        );
    }

    #[test]
    fn expand_scheduled_splits_rejects_bad_time() {
        let splits = map(vec![(
            "steps",
            Value::List(vec![Value::Map(map(vec![
                ("start_time", Value::from("tomorrow")),
                ("group_weights", Value::Map(HashMap::new())),
            ]))]),
        )]);
        assert!(expand_scheduled_splits(&Attrs::new(&splits)).is_err());
    }

    #[test]
    fn flatten_launch_fields() {
        let group = LaunchGroup::builder()
            .name("treatment")
            .feature_variations("checkout", "on")
            .build()
            .finish("group")
            .unwrap();
        let split = ScheduledSplit::builder()
            .start_time(DateTime::from_secs(0))
            .group_weights("treatment", 100_000)
            .build()
            .finish("split")
            .unwrap();
        let definition = ScheduledSplitsLaunchDefinition::builder()
            .steps(split)
            .build()
            .finish("definition")
            .unwrap();
        let launch = Launch::builder()
            .arn("arn:aws:evidently:us-west-2:123456789012:project/shop/launch/rollout")
            .name("rollout")
            .status(LaunchStatus::from("CREATED"))
            .r#type(LaunchType::from("aws.evidently.splits"))
            .created_time(DateTime::from_secs(0))
            .last_updated_time(DateTime::from_secs(0))
            .groups(group)
            .scheduled_splits_definition(definition)
            .build()
            .finish("launch")
            .unwrap();

        let attributes = flatten_launch(&launch);
        assert_eq!(attributes.get("status"), Some(&Value::from("CREATED")));
        assert_eq!(attributes.get("type"), Some(&Value::from("aws.evidently.splits")));

        let groups = attributes.get("groups").and_then(Value::as_list).unwrap();
        let group = groups[0].as_map().unwrap();
        assert_eq!(group.get("feature"), Some(&Value::from("checkout")));
        assert_eq!(group.get("variation"), Some(&Value::from("on")));

        let steps = attributes
            .get("scheduled_splits_config")
            .and_then(Value::as_map)
            .and_then(|s| s.get("steps"))
            .and_then(Value::as_list)
            .unwrap();
        let step = steps[0].as_map().unwrap();
        assert_eq!(step.get("start_time"), Some(&Value::from("1970-01-01T00:00:00Z")));
        assert_eq!(
            step.get("group_weights")
                .and_then(Value::as_map)
                .and_then(|w| w.get("treatment")),
            Some(&Value::Int(100_000))
        );
        assert!(!attributes.contains_key("execution"));
    }

    /// State read back for a two-group launch with one scheduled step
    fn read_back_launch() -> HashMap<String, Value> {
        let groups = [("control", "off"), ("treatment", "on")].map(|(name, variation)| {
            LaunchGroup::builder()
                .name(name)
                .feature_variations("checkout", variation)
                .build()
                .finish("group")
                .unwrap()
        });
        let split = ScheduledSplit::builder()
            .start_time(DateTime::from_secs(1_717_200_000))
            .group_weights("control", 50_000)
            .group_weights("treatment", 50_000)
            .build()
            .finish("split")
            .unwrap();
        let launch = Launch::builder()
            .arn("arn:aws:evidently:us-west-2:123456789012:project/shop/launch/rollout")
            .name("rollout")
            .project("shop")
            .status(LaunchStatus::from("CREATED"))
            .r#type(LaunchType::from("aws.evidently.splits"))
            .randomization_salt("rollout")
            .created_time(DateTime::from_secs(0))
            .last_updated_time(DateTime::from_secs(0))
            .set_groups(Some(groups.to_vec()))
            .scheduled_splits_definition(
                ScheduledSplitsLaunchDefinition::builder()
                    .steps(split)
                    .build()
                    .finish("definition")
                    .unwrap(),
            )
            .build()
            .finish("launch")
            .unwrap();
        let mut attributes = flatten_launch(&launch);
        attributes.insert("tags".to_string(), Value::Map(HashMap::new()));
        attributes
    }

    fn declared_launch(start_time: &str, treatment_weight: i64) -> HashMap<String, Value> {
        let group = |name: &str, variation: &str| {
            Value::Map(map(vec![
                ("name", Value::from(name)),
                ("feature", Value::from("checkout")),
                ("variation", Value::from(variation)),
            ]))
        };
        let step = Value::Map(map(vec![
            ("start_time", Value::from(start_time)),
            (
                "group_weights",
                Value::Map(map(vec![
                    ("control", Value::Int(100_000 - treatment_weight)),
                    ("treatment", Value::Int(treatment_weight)),
                ])),
            ),
        ]));
        let mut attrs = map(vec![
            ("name", Value::from("rollout")),
            ("project", Value::from("shop")),
            (
                "groups",
                Value::List(vec![group("control", "off"), group("treatment", "on")]),
            ),
            (
                "scheduled_splits_config",
                Value::Map(map(vec![("steps", Value::List(vec![step]))])),
            ),
        ]);
        let schema = launch_schema();
        assert!(schema.validate(&attrs).is_ok());
        schema.apply_defaults(&mut attrs);
        schema.normalize(&mut attrs);
        attrs
    }

    #[test]
    fn offset_start_time_matches_read_back() {
        let (changes, update_launch) = launch_update_plan(
            &read_back_launch(),
            &declared_launch("2024-06-01T00:00:00+00:00", 50_000),
        );
        assert!(changes.is_empty(), "{:?}", changes);
        assert!(!update_launch);
    }

    #[test]
    fn changed_weights_update_launch() {
        let (changes, update_launch) = launch_update_plan(
            &read_back_launch(),
            &declared_launch("2024-06-01T00:00:00Z", 90_000),
        );
        assert_eq!(changes.names(), ["scheduled_splits_config".to_string()]);
        assert!(update_launch);
    }

    #[test]
    fn tag_change_skips_update_launch() {
        let mut to = declared_launch("2024-06-01T00:00:00Z", 50_000);
        to.insert(
            "tags".to_string(),
            Value::Map(map(vec![("team", Value::from("checkout"))])),
        );
        let (changes, update_launch) = launch_update_plan(&read_back_launch(), &to);
        assert_eq!(changes.names(), ["tags".to_string()]);
        assert!(!update_launch);
    }
}

//! CloudWatch Evidently resource schema definitions

use terrace_core::resource::Value;
use terrace_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::types as aws_types;

pub const EVALUATION_STRATEGIES: &[&str] = &["ALL_RULES", "DEFAULT_VARIATION"];

/// Members of a variation value; exactly one must be set
pub const VARIATION_VALUE_KINDS: &[&str] = &["string_value", "long_value", "double_value", "bool_value"];

fn name() -> AttributeType {
    types::string_matching("[-a-zA-Z0-9._]{1,127}")
}

fn description() -> AttributeType {
    types::string_len(0, 160)
}

fn computed(name: &str, attr_type: AttributeType) -> AttributeSchema {
    AttributeSchema::new(name, attr_type).computed()
}

fn timestamps() -> [AttributeSchema; 2] {
    [
        computed("created_time", AttributeType::String),
        computed("last_updated_time", AttributeType::String),
    ]
}

fn data_delivery_block() -> AttributeType {
    AttributeType::Custom {
        name: "DataDelivery".to_string(),
        base: Box::new(types::block(
            "DataDelivery",
            vec![
                AttributeSchema::new(
                    "cloudwatch_logs",
                    types::block(
                        "CloudWatchLogs",
                        vec![AttributeSchema::new("log_group", types::string_len(1, 512))],
                    ),
                ),
                AttributeSchema::new(
                    "s3_destination",
                    types::block(
                        "S3Destination",
                        vec![
                            AttributeSchema::new("bucket", types::string_len(3, 63)),
                            AttributeSchema::new("prefix", types::string_len(1, 1024)),
                        ],
                    ),
                ),
            ],
        )),
        validate: |value| match value.as_map() {
            Some(map) if map.contains_key("cloudwatch_logs") && map.contains_key("s3_destination") => {
                Err("only one of cloudwatch_logs or s3_destination may be set".to_string())
            }
            _ => Ok(()),
        },
    }
}

fn variation_value() -> AttributeType {
    AttributeType::Custom {
        name: "VariationValue".to_string(),
        base: Box::new(types::block(
            "VariationValue",
            vec![
                AttributeSchema::new("string_value", types::string_len(0, 512)),
                AttributeSchema::new("long_value", AttributeType::Int),
                AttributeSchema::new("double_value", AttributeType::Float),
                AttributeSchema::new("bool_value", AttributeType::Bool),
            ],
        )),
        validate: |value| {
            let set = value
                .as_map()
                .map(|m| VARIATION_VALUE_KINDS.iter().filter(|k| m.contains_key(**k)).count())
                .unwrap_or(0);
            if set == 1 {
                Ok(())
            } else {
                Err(format!(
                    "exactly one of {} must be set",
                    VARIATION_VALUE_KINDS.join(", ")
                ))
            }
        },
    }
}

/// Whole-number `double_value`s as the floats AWS reads back
pub fn normalize_variations(value: &Value) -> Value {
    let mut value = value.clone();
    if let Value::List(variations) = &mut value {
        for variation in variations.iter_mut() {
            if let Value::Map(fields) = variation
                && let Some(Value::Map(inner)) = fields.get_mut("value")
                && let Some(double) = inner.get_mut("double_value")
                && let Value::Int(n) = *double
            {
                *double = Value::Float(n as f64);
            }
        }
    }
    value
}

/// Scheduled split start times in UTC
pub fn normalize_scheduled_splits(value: &Value) -> Value {
    let mut value = value.clone();
    if let Value::Map(splits) = &mut value
        && let Some(Value::List(steps)) = splits.get_mut("steps")
    {
        for step in steps.iter_mut() {
            if let Value::Map(fields) = step
                && let Some(start) = fields.get_mut("start_time")
            {
                *start = aws_types::normalize_rfc3339(start);
            }
        }
    }
    value
}

fn variation_block() -> AttributeType {
    types::block(
        "Variation",
        vec![
            AttributeSchema::new("name", name()).required(),
            AttributeSchema::new("value", variation_value()).required(),
        ],
    )
}

fn launch_group_block() -> AttributeType {
    types::block(
        "LaunchGroup",
        vec![
            AttributeSchema::new("name", name()).required(),
            AttributeSchema::new("feature", name()).required(),
            AttributeSchema::new("variation", name()).required(),
            AttributeSchema::new("description", description()),
        ],
    )
}

fn scheduled_splits_block() -> AttributeType {
    types::block(
        "ScheduledSplitsConfig",
        vec![
            AttributeSchema::new(
                "steps",
                types::list_of(
                    types::block(
                        "ScheduledSplitStep",
                        vec![
                            AttributeSchema::new("start_time", aws_types::rfc3339()).required(),
                            AttributeSchema::new(
                                "group_weights",
                                AttributeType::Map(Box::new(types::int_between(0, 100_000))),
                            )
                            .required()
                            .with_description("Traffic per launch group, in thousandths of a percent"),
                        ],
                    ),
                    1,
                    6,
                ),
            )
            .required(),
        ],
    )
}

pub fn project_schema() -> ResourceSchema {
    let [tags, tags_all] = aws_types::tag_attributes();
    let [created, updated] = timestamps();
    ResourceSchema::new("evidently.project")
        .with_description("An Evidently project groups features, launches and experiments")
        .attribute(AttributeSchema::new("name", name()).required().force_new())
        .attribute(AttributeSchema::new("description", description()))
        .attribute(
            AttributeSchema::new("data_delivery", data_delivery_block())
                .with_description("Where evaluation events are stored: CloudWatch Logs or S3"),
        )
        .attribute(tags)
        .attribute(tags_all)
        .attribute(aws_types::arn_attribute())
        .attribute(computed("status", AttributeType::String))
        .attribute(created)
        .attribute(updated)
        .attribute(computed("active_experiment_count", AttributeType::Int))
        .attribute(computed("active_launch_count", AttributeType::Int))
        .attribute(computed("experiment_count", AttributeType::Int))
        .attribute(computed("feature_count", AttributeType::Int))
        .attribute(computed("launch_count", AttributeType::Int))
}

pub fn feature_schema() -> ResourceSchema {
    let [tags, tags_all] = aws_types::tag_attributes();
    let [created, updated] = timestamps();
    ResourceSchema::new("evidently.feature")
        .with_description("A feature flag and its variations")
        .attribute(AttributeSchema::new("name", name()).required().force_new())
        .attribute(
            AttributeSchema::new("project", types::string_len(1, 2048))
                .required()
                .force_new()
                .with_description("Name or ARN of the project"),
        )
        .attribute(AttributeSchema::new("description", description()))
        .attribute(
            AttributeSchema::new("variations", types::list_of(variation_block(), 1, 5))
                .required()
                .normalized_with(normalize_variations),
        )
        .attribute(
            AttributeSchema::new("default_variation", name())
                .optional_computed()
                .with_description("Variation served when no rule matches; defaults to the first variation"),
        )
        .attribute(
            AttributeSchema::new("evaluation_strategy", types::enumeration(EVALUATION_STRATEGIES))
                .with_default(Value::from("ALL_RULES")),
        )
        .attribute(
            AttributeSchema::new("entity_overrides", types::string_map())
                .with_description("Entity ID -> variation name served to that entity"),
        )
        .attribute(tags)
        .attribute(tags_all)
        .attribute(aws_types::arn_attribute())
        .attribute(computed("status", AttributeType::String))
        .attribute(computed("value_type", AttributeType::String))
        .attribute(computed(
            "evaluation_rules",
            AttributeType::List(Box::new(types::block(
                "EvaluationRule",
                vec![
                    AttributeSchema::new("name", AttributeType::String),
                    AttributeSchema::new("type", AttributeType::String),
                ],
            ))),
        ))
        .attribute(created)
        .attribute(updated)
}

pub fn segment_schema() -> ResourceSchema {
    let [tags, tags_all] = aws_types::tag_attributes();
    let [created, updated] = timestamps();
    ResourceSchema::new("evidently.segment")
        .with_description("A user segment defined by a pattern over evaluation attributes")
        .attribute(AttributeSchema::new("name", name()).required().force_new())
        .attribute(
            AttributeSchema::new("pattern", types::json_string())
                .required()
                .force_new(),
        )
        .attribute(AttributeSchema::new("description", description()).force_new())
        .attribute(tags)
        .attribute(tags_all)
        .attribute(aws_types::arn_attribute())
        .attribute(created)
        .attribute(updated)
        .attribute(computed("experiment_count", AttributeType::Int))
        .attribute(computed("launch_count", AttributeType::Int))
}

pub fn launch_schema() -> ResourceSchema {
    let [tags, tags_all] = aws_types::tag_attributes();
    let [created, updated] = timestamps();
    ResourceSchema::new("evidently.launch")
        .with_description("A gradual rollout of feature variations to launch groups")
        .attribute(AttributeSchema::new("name", name()).required().force_new())
        .attribute(
            AttributeSchema::new("project", types::string_len(1, 2048))
                .required()
                .force_new(),
        )
        .attribute(AttributeSchema::new("description", description()))
        .attribute(AttributeSchema::new("groups", types::list_of(launch_group_block(), 1, 5)).required())
        .attribute(
            AttributeSchema::new("randomization_salt", types::string_len(0, 127))
                .optional_computed()
                .with_description("Hash salt for group assignment; AWS uses the launch name when unset"),
        )
        .attribute(
            AttributeSchema::new("scheduled_splits_config", scheduled_splits_block())
                .normalized_with(normalize_scheduled_splits),
        )
        .attribute(tags)
        .attribute(tags_all)
        .attribute(aws_types::arn_attribute())
        .attribute(computed("status", AttributeType::String))
        .attribute(computed("status_reason", AttributeType::String))
        .attribute(computed("type", AttributeType::String))
        .attribute(computed(
            "execution",
            types::block(
                "LaunchExecution",
                vec![
                    AttributeSchema::new("started_time", AttributeType::String),
                    AttributeSchema::new("ended_time", AttributeType::String),
                ],
            ),
        ))
        .attribute(created)
        .attribute(updated)
}

pub fn schemas() -> Vec<ResourceSchema> {
    vec![project_schema(), feature_schema(), segment_schema(), launch_schema()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn map(pairs: Vec<(&str, Value)>) -> HashMap<String, Value> {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    fn variation(name: &str, value: Vec<(&str, Value)>) -> Value {
        Value::Map(map(vec![
            ("name", Value::from(name)),
            ("value", Value::Map(map(value))),
        ]))
    }

    #[test]
    fn data_delivery_is_exclusive() {
        let both = map(vec![(
            "data_delivery",
            Value::Map(map(vec![
                ("cloudwatch_logs", Value::Map(map(vec![("log_group", Value::from("/evidently"))]))),
                ("s3_destination", Value::Map(map(vec![("bucket", Value::from("events"))]))),
            ])),
        ), ("name", Value::from("p"))]);
        assert!(project_schema().validate(&both).is_err());

        let one = map(vec![(
            "data_delivery",
            Value::Map(map(vec![(
                "cloudwatch_logs",
                Value::Map(map(vec![("log_group", Value::from("/evidently"))])),
            )])),
        ), ("name", Value::from("p"))]);
        assert!(project_schema().validate(&one).is_ok());
    }

    #[test]
    fn variation_needs_exactly_one_value() {
        let ok = map(vec![
            ("name", Value::from("flag")),
            ("project", Value::from("p")),
            (
                "variations",
                Value::List(vec![
                    variation("on", vec![("bool_value", Value::Bool(true))]),
                    variation("off", vec![("bool_value", Value::Bool(false))]),
                ]),
            ),
        ]);
        assert!(feature_schema().validate(&ok).is_ok());

        let two_values = map(vec![
            ("name", Value::from("flag")),
            ("project", Value::from("p")),
            (
                "variations",
                Value::List(vec![variation(
                    "v",
                    vec![("bool_value", Value::Bool(true)), ("long_value", Value::Int(1))],
                )]),
            ),
        ]);
        assert!(feature_schema().validate(&two_values).is_err());

        let none = map(vec![
            ("name", Value::from("flag")),
            ("project", Value::from("p")),
            ("variations", Value::List(vec![variation("v", vec![])])),
        ]);
        assert!(feature_schema().validate(&none).is_err());
    }

    #[test]
    fn feature_limits_variations() {
        let many: Vec<Value> = (0..6)
            .map(|i| variation(&format!("v{}", i), vec![("long_value", Value::Int(i))]))
            .collect();
        let attrs = map(vec![
            ("name", Value::from("flag")),
            ("project", Value::from("p")),
            ("variations", Value::List(many)),
        ]);
        assert!(feature_schema().validate(&attrs).is_err());
    }

    #[test]
    fn segment_pattern_must_be_json() {
        let attrs = map(vec![
            ("name", Value::from("beta")),
            ("pattern", Value::from("{\"Price\":[{\"numeric\":[\">\",10]}]}")),
        ]);
        assert!(segment_schema().validate(&attrs).is_ok());

        let attrs = map(vec![("name", Value::from("beta")), ("pattern", Value::from("{oops"))]);
        assert!(segment_schema().validate(&attrs).is_err());
        assert!(segment_schema().is_force_new("description"));
    }

    #[test]
    fn launch_steps_validate_timestamps() {
        let step = |start: &str| {
            Value::Map(map(vec![
                ("start_time", Value::from(start)),
                (
                    "group_weights",
                    Value::Map(map(vec![("control", Value::Int(50_000)), ("treatment", Value::Int(50_000))])),
                ),
            ]))
        };
        let launch = |start: &str| {
            map(vec![
                ("name", Value::from("rollout")),
                ("project", Value::from("p")),
                (
                    "groups",
                    Value::List(vec![Value::Map(map(vec![
                        ("name", Value::from("control")),
                        ("feature", Value::from("flag")),
                        ("variation", Value::from("off")),
                    ]))]),
                ),
                (
                    "scheduled_splits_config",
                    Value::Map(map(vec![("steps", Value::List(vec![step(start)]))])),
                ),
            ])
        };
        assert!(launch_schema().validate(&launch("2024-05-01T10:00:00Z")).is_ok());
        assert!(launch_schema().validate(&launch("tomorrow")).is_err());
    }

    #[test]
    fn whole_double_values_normalize_to_floats() {
        let declared = Value::List(vec![
            variation("two", vec![("double_value", Value::Int(2))]),
            variation("count", vec![("long_value", Value::Int(2))]),
        ]);
        let Value::List(variations) = normalize_variations(&declared) else {
            panic!("expected a list");
        };
        assert_eq!(
            variations[0].as_map().unwrap()["value"],
            Value::Map(map(vec![("double_value", Value::Float(2.0))]))
        );
        assert_eq!(
            variations[1].as_map().unwrap()["value"],
            Value::Map(map(vec![("long_value", Value::Int(2))]))
        );
    }

    #[test]
    fn split_start_times_normalize_to_utc() {
        let mut attrs = map(vec![(
            "scheduled_splits_config",
            Value::Map(map(vec![(
                "steps",
                Value::List(vec![Value::Map(map(vec![
                    ("start_time", Value::from("2024-06-01T00:00:00+00:00")),
                    ("group_weights", Value::Map(map(vec![("control", Value::Int(100_000))]))),
                ]))]),
            )])),
        )]);
        launch_schema().normalize(&mut attrs);

        let steps = attrs["scheduled_splits_config"].as_map().unwrap()["steps"]
            .as_list()
            .unwrap()
            .to_vec();
        assert_eq!(
            steps[0].as_map().unwrap()["start_time"],
            Value::from("2024-06-01T00:00:00Z")
        );
    }

    #[test]
    fn aws_assigned_feature_and_launch_settings_are_optional_computed() {
        assert!(feature_schema().attributes["default_variation"].optional_computed);
        assert!(launch_schema().attributes["randomization_salt"].optional_computed);
    }
}

//! Amazon MQ resource schema definitions

use terrace_core::resource::Value;
use terrace_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::types as aws_types;

pub const DEPLOYMENT_MODES: &[&str] = &[
    "SINGLE_INSTANCE",
    "ACTIVE_STANDBY_MULTI_AZ",
    "CLUSTER_MULTI_AZ",
];
pub const STORAGE_TYPES: &[&str] = &["EBS", "EFS"];
pub const AUTHENTICATION_STRATEGIES: &[&str] = &["SIMPLE", "LDAP"];

fn user_block() -> AttributeType {
    types::block(
        "User",
        vec![
            AttributeSchema::new("username", types::string_matching("[\\w.~-]{2,100}")).required(),
            AttributeSchema::new("password", types::string_len(12, 250))
                .required()
                .sensitive()
                .write_only(),
            AttributeSchema::new("console_access", AttributeType::Bool)
                .with_default(Value::Bool(false)),
            AttributeSchema::new("groups", types::list_of(AttributeType::String, 0, 20)),
            AttributeSchema::new("replication_user", AttributeType::Bool)
                .with_default(Value::Bool(false)),
        ],
    )
}

/// Users sorted by username, each with sorted groups, the order they are read back in
pub fn normalize_users(value: &Value) -> Value {
    let Value::List(users) = value else {
        return value.clone();
    };
    let mut users: Vec<Value> = users
        .iter()
        .map(|user| match user {
            Value::Map(fields) => {
                let mut fields = fields.clone();
                if let Some(Value::List(groups)) = fields.get_mut("groups") {
                    groups.sort_by(|a, b| a.as_str().cmp(&b.as_str()));
                }
                Value::Map(fields)
            }
            other => other.clone(),
        })
        .collect();
    users.sort_by(|a, b| username(a).cmp(&username(b)));
    Value::List(users)
}

fn username(user: &Value) -> Option<&str> {
    user.as_map()
        .and_then(|fields| fields.get("username"))
        .and_then(Value::as_str)
}

fn configuration_block() -> AttributeType {
    types::block(
        "ConfigurationId",
        vec![
            AttributeSchema::new("id", AttributeType::String).required(),
            AttributeSchema::new("revision", types::positive_int()).optional_computed(),
        ],
    )
}

fn encryption_options_block() -> AttributeType {
    types::block(
        "EncryptionOptions",
        vec![
            AttributeSchema::new("kms_key_id", AttributeType::String).optional_computed(),
            AttributeSchema::new("use_aws_owned_key", AttributeType::Bool)
                .with_default(Value::Bool(true)),
        ],
    )
}

fn logs_block() -> AttributeType {
    types::block(
        "Logs",
        vec![
            AttributeSchema::new("general", AttributeType::Bool).optional_computed(),
            AttributeSchema::new("audit", AttributeType::Bool).optional_computed(),
        ],
    )
}

fn maintenance_window_block() -> AttributeType {
    types::block(
        "WeeklyStartTime",
        vec![
            AttributeSchema::new("day_of_week", aws_types::day_of_week()).required(),
            AttributeSchema::new("time_of_day", aws_types::time_of_day()).required(),
            AttributeSchema::new("time_zone", AttributeType::String).optional_computed(),
        ],
    )
}

fn instance_block() -> AttributeType {
    types::block(
        "BrokerInstance",
        vec![
            AttributeSchema::new("console_url", AttributeType::String),
            AttributeSchema::new("ip_address", AttributeType::String),
            AttributeSchema::new("endpoints", types::string_list()),
        ],
    )
}

pub fn broker_schema() -> ResourceSchema {
    let [tags, tags_all] = aws_types::tag_attributes();
    ResourceSchema::new("mq.broker")
        .with_description("An Amazon MQ message broker")
        .attribute(
            AttributeSchema::new("broker_name", types::string_matching("[0-9A-Za-z_-]{1,50}"))
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("engine_type", aws_types::engine_type())
                .required()
                .force_new()
                .normalized_with(aws_types::normalize_engine_value),
        )
        .attribute(AttributeSchema::new("engine_version", AttributeType::String).required())
        .attribute(
            AttributeSchema::new("host_instance_type", AttributeType::String)
                .required()
                .with_description("Broker instance type, e.g. mq.t3.micro"),
        )
        .attribute(
            AttributeSchema::new("deployment_mode", types::enumeration(DEPLOYMENT_MODES))
                .force_new()
                .with_default(Value::from("SINGLE_INSTANCE")),
        )
        .attribute(
            AttributeSchema::new("publicly_accessible", AttributeType::Bool)
                .force_new()
                .with_default(Value::Bool(false)),
        )
        .attribute(
            AttributeSchema::new("subnet_ids", types::string_list())
                .force_new()
                .optional_computed(),
        )
        .attribute(
            AttributeSchema::new("security_groups", types::list_of(AttributeType::String, 0, 5))
                .optional_computed(),
        )
        .attribute(
            AttributeSchema::new("storage_type", types::enumeration(STORAGE_TYPES))
                .force_new()
                .optional_computed(),
        )
        .attribute(
            AttributeSchema::new(
                "authentication_strategy",
                types::enumeration(AUTHENTICATION_STRATEGIES),
            )
            .with_default(Value::from("SIMPLE")),
        )
        .attribute(
            AttributeSchema::new("auto_minor_version_upgrade", AttributeType::Bool)
                .with_default(Value::Bool(false)),
        )
        .attribute(AttributeSchema::new("configuration", configuration_block()).optional_computed())
        .attribute(
            AttributeSchema::new("encryption_options", encryption_options_block())
                .force_new()
                .optional_computed(),
        )
        .attribute(AttributeSchema::new("logs", logs_block()).optional_computed())
        .attribute(
            AttributeSchema::new("maintenance_window_start_time", maintenance_window_block())
                .optional_computed(),
        )
        .attribute(
            AttributeSchema::new("users", types::list_of(user_block(), 1, 250))
                .required()
                .sensitive()
                .normalized_with(normalize_users),
        )
        .attribute(
            AttributeSchema::new("apply_immediately", AttributeType::Bool)
                .with_default(Value::Bool(false))
                .write_only()
                .with_description("Reboot the broker after updates that only apply on reboot"),
        )
        .attribute(tags)
        .attribute(tags_all)
        .attribute(aws_types::arn_attribute())
        .attribute(AttributeSchema::new("broker_id", AttributeType::String).computed())
        .attribute(
            AttributeSchema::new("instances", AttributeType::List(Box::new(instance_block())))
                .computed(),
        )
        .attribute(
            AttributeSchema::new("pending_data_replication_mode", AttributeType::String)
                .computed(),
        )
}

pub fn configuration_schema() -> ResourceSchema {
    let [tags, tags_all] = aws_types::tag_attributes();
    ResourceSchema::new("mq.configuration")
        .with_description("A broker configuration (ActiveMQ XML or RabbitMQ Cuttlefish)")
        .attribute(
            AttributeSchema::new("name", types::string_matching("[0-9A-Za-z_-]{1,150}"))
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("engine_type", aws_types::engine_type())
                .required()
                .force_new()
                .normalized_with(aws_types::normalize_engine_value),
        )
        .attribute(
            AttributeSchema::new("engine_version", AttributeType::String)
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new(
                "authentication_strategy",
                types::enumeration(AUTHENTICATION_STRATEGIES),
            )
            .force_new(),
        )
        .attribute(
            AttributeSchema::new("data", AttributeType::String)
                .with_description("Broker configuration document; sent base64-encoded"),
        )
        .attribute(AttributeSchema::new("description", AttributeType::String))
        .attribute(tags)
        .attribute(tags_all)
        .attribute(aws_types::arn_attribute())
        .attribute(AttributeSchema::new("latest_revision", AttributeType::Int).computed())
}

pub fn broker_data_source_schema() -> ResourceSchema {
    let [tags, _] = aws_types::tag_attributes();
    ResourceSchema::data_source("mq.broker")
        .with_description("Look up a broker by ID or name")
        .attribute(AttributeSchema::new("broker_id", AttributeType::String))
        .attribute(AttributeSchema::new("broker_name", AttributeType::String))
        .attribute(AttributeSchema::new("engine_type", AttributeType::String).computed())
        .attribute(AttributeSchema::new("engine_version", AttributeType::String).computed())
        .attribute(AttributeSchema::new("host_instance_type", AttributeType::String).computed())
        .attribute(AttributeSchema::new("deployment_mode", AttributeType::String).computed())
        .attribute(AttributeSchema::new("publicly_accessible", AttributeType::Bool).computed())
        .attribute(AttributeSchema::new("subnet_ids", types::string_list()).computed())
        .attribute(AttributeSchema::new("security_groups", types::string_list()).computed())
        .attribute(AttributeSchema::new("configuration", configuration_block()).computed())
        .attribute(AttributeSchema::new("logs", logs_block()).computed())
        .attribute(
            AttributeSchema::new("instances", AttributeType::List(Box::new(instance_block())))
                .computed(),
        )
        .attribute(tags.computed())
        .attribute(aws_types::arn_attribute())
}

pub fn schemas() -> Vec<ResourceSchema> {
    vec![broker_schema(), configuration_schema(), broker_data_source_schema()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn map(pairs: Vec<(&str, Value)>) -> HashMap<String, Value> {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    fn user(password: &str) -> Value {
        Value::Map(map(vec![
            ("username", Value::from("admin")),
            ("password", Value::from(password)),
        ]))
    }

    fn broker(users: Vec<Value>) -> HashMap<String, Value> {
        map(vec![
            ("broker_name", Value::from("orders")),
            ("engine_type", Value::from("ActiveMQ")),
            ("engine_version", Value::from("5.17.6")),
            ("host_instance_type", Value::from("mq.t3.micro")),
            ("users", Value::List(users)),
        ])
    }

    #[test]
    fn broker_minimal_configuration() {
        let result = broker_schema().validate(&broker(vec![user("correct-horse-battery")]));
        assert!(result.is_ok(), "{:?}", result);
    }

    #[test]
    fn broker_requires_users() {
        assert!(broker_schema().validate(&broker(vec![])).is_err());
    }

    #[test]
    fn broker_password_length() {
        assert!(broker_schema().validate(&broker(vec![user("short")])).is_err());
    }

    #[test]
    fn broker_maintenance_window() {
        let mut attrs = broker(vec![user("correct-horse-battery")]);
        attrs.insert(
            "maintenance_window_start_time".to_string(),
            Value::Map(map(vec![
                ("day_of_week", Value::from("MONDAY")),
                ("time_of_day", Value::from("02:00")),
                ("time_zone", Value::from("UTC")),
            ])),
        );
        assert!(broker_schema().validate(&attrs).is_ok());

        attrs.insert(
            "maintenance_window_start_time".to_string(),
            Value::Map(map(vec![("day_of_week", Value::from("FUNDAY")), ("time_of_day", Value::from("02:00"))])),
        );
        assert!(broker_schema().validate(&attrs).is_err());
    }

    #[test]
    fn broker_force_new_attributes() {
        let schema = broker_schema();
        assert!(schema.is_force_new("broker_name"));
        assert!(schema.is_force_new("deployment_mode"));
        assert!(!schema.is_force_new("engine_version"));
        assert!(!schema.is_force_new("users"));
        assert!(schema.attributes["users"].sensitive);
    }

    #[test]
    fn configuration_engine_type_any_case() {
        let attrs = map(vec![
            ("name", Value::from("cfg")),
            ("engine_type", Value::from("rabbitmq")),
            ("engine_version", Value::from("3.11.20")),
        ]);
        assert!(configuration_schema().validate(&attrs).is_ok());
    }

    #[test]
    fn engine_type_normalizes_to_api_spelling() {
        let mut attrs = broker(vec![user("correct-horse-battery")]);
        broker_schema().normalize(&mut attrs);
        assert_eq!(attrs["engine_type"], Value::from("ACTIVEMQ"));
        assert_eq!(attrs["broker_name"], Value::from("orders"));
    }

    #[test]
    fn users_normalize_to_read_back_order() {
        let declared = Value::List(vec![
            Value::Map(map(vec![
                ("username", Value::from("reports")),
                (
                    "groups",
                    Value::List(vec![Value::from("ops"), Value::from("admins")]),
                ),
            ])),
            Value::Map(map(vec![("username", Value::from("app"))])),
        ]);
        let Value::List(users) = normalize_users(&declared) else {
            panic!("expected a list");
        };
        assert_eq!(username(&users[0]), Some("app"));
        assert_eq!(
            users[1].as_map().unwrap()["groups"],
            Value::List(vec![Value::from("admins"), Value::from("ops")])
        );
    }

    #[test]
    fn aws_filled_broker_settings_are_optional_computed() {
        let schema = broker_schema();
        for name in ["subnet_ids", "security_groups", "encryption_options", "configuration"] {
            assert!(schema.attributes[name].optional_computed, "{}", name);
        }
        assert!(schema.attributes["apply_immediately"].write_only);
    }
}

//! AppConfig resource schema definitions

use terrace_core::resource::Value;
use terrace_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::types as aws_types;

pub const CONFIGURATION_PROFILE_TYPES: &[&str] = &["AWS.AppConfig.FeatureFlags", "AWS.Freeform"];
pub const VALIDATOR_TYPES: &[&str] = &["JSON_SCHEMA", "LAMBDA"];
pub const GROWTH_TYPES: &[&str] = &["LINEAR", "EXPONENTIAL"];
pub const REPLICATE_TO: &[&str] = &["NONE", "SSM_DOCUMENT"];

fn name() -> AttributeType {
    types::string_len(1, 64)
}

fn description() -> AttributeType {
    types::string_len(0, 1024)
}

/// AppConfig IDs are 4-7 lowercase alphanumerics
fn appconfig_id() -> AttributeType {
    types::string_matching("[a-z0-9]{4,7}")
}

fn monitor_block() -> AttributeType {
    types::block(
        "Monitor",
        vec![
            AttributeSchema::new("alarm_arn", types::arn())
                .required()
                .with_description("ARN of the CloudWatch alarm"),
            AttributeSchema::new("alarm_role_arn", aws_types::iam_role_arn())
                .with_description("ARN of an IAM role AppConfig uses to monitor the alarm"),
        ],
    )
}

fn validator_block() -> AttributeType {
    types::block(
        "Validator",
        vec![
            AttributeSchema::new("type", types::enumeration(VALIDATOR_TYPES)).required(),
            AttributeSchema::new("content", types::string_len(0, 32768))
                .sensitive()
                .with_description("JSON Schema document, or the ARN of a Lambda function"),
        ],
    )
}

pub fn application_schema() -> ResourceSchema {
    let [tags, tags_all] = aws_types::tag_attributes();
    ResourceSchema::new("appconfig.application")
        .with_description("An AppConfig application: a logical unit of code that provides capabilities")
        .attribute(AttributeSchema::new("name", name()).required())
        .attribute(AttributeSchema::new("description", description()))
        .attribute(tags)
        .attribute(tags_all)
        .attribute(aws_types::arn_attribute())
}

pub fn environment_schema() -> ResourceSchema {
    let [tags, tags_all] = aws_types::tag_attributes();
    ResourceSchema::new("appconfig.environment")
        .with_description("A deployment group of AppConfig targets")
        .attribute(
            AttributeSchema::new("application_id", appconfig_id())
                .required()
                .force_new(),
        )
        .attribute(AttributeSchema::new("name", name()).required())
        .attribute(AttributeSchema::new("description", description()))
        .attribute(
            AttributeSchema::new("monitor", types::list_of(monitor_block(), 0, 5))
                .with_description("CloudWatch alarms to monitor during deployment"),
        )
        .attribute(tags)
        .attribute(tags_all)
        .attribute(AttributeSchema::new("environment_id", AttributeType::String).computed())
        .attribute(
            AttributeSchema::new("state", AttributeType::String)
                .computed()
                .with_description("READY_FOR_DEPLOYMENT, DEPLOYING, ROLLING_BACK or ROLLED_BACK"),
        )
        .attribute(aws_types::arn_attribute())
}

pub fn configuration_profile_schema() -> ResourceSchema {
    let [tags, tags_all] = aws_types::tag_attributes();
    ResourceSchema::new("appconfig.configuration_profile")
        .with_description("Where and how AppConfig finds a configuration")
        .attribute(
            AttributeSchema::new("application_id", appconfig_id())
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("location_uri", types::string_len(1, 2048))
                .required()
                .force_new()
                .with_description("\"hosted\", or the URI of an SSM document, parameter or S3 object"),
        )
        .attribute(AttributeSchema::new("name", name()).required())
        .attribute(AttributeSchema::new("description", description()))
        .attribute(AttributeSchema::new("retrieval_role_arn", aws_types::iam_role_arn()))
        .attribute(
            AttributeSchema::new("type", types::enumeration(CONFIGURATION_PROFILE_TYPES))
                .force_new()
                .with_default(Value::from("AWS.Freeform")),
        )
        .attribute(
            AttributeSchema::new("validator", types::list_of(validator_block(), 0, 2))
                .with_description("Validators run before a configuration is deployed"),
        )
        .attribute(
            AttributeSchema::new("kms_key_identifier", types::string_len(1, 2048))
                .with_description("KMS key ID, alias or ARN used to encrypt hosted configuration data"),
        )
        .attribute(AttributeSchema::new("kms_key_arn", AttributeType::String).computed())
        .attribute(
            AttributeSchema::new("configuration_profile_id", AttributeType::String).computed(),
        )
        .attribute(tags)
        .attribute(tags_all)
        .attribute(aws_types::arn_attribute())
}

pub fn deployment_strategy_schema() -> ResourceSchema {
    let [tags, tags_all] = aws_types::tag_attributes();
    ResourceSchema::new("appconfig.deployment_strategy")
        .with_description("How an AppConfig deployment rolls out to its targets")
        .attribute(AttributeSchema::new("name", name()).required().force_new())
        .attribute(AttributeSchema::new("description", description()))
        .attribute(
            AttributeSchema::new("deployment_duration_in_minutes", types::int_between(0, 1440))
                .required(),
        )
        .attribute(
            AttributeSchema::new("final_bake_time_in_minutes", types::int_between(0, 1440))
                .with_description("Minutes to monitor alarms after the deployment completes"),
        )
        .attribute(
            AttributeSchema::new("growth_factor", types::float_between(1.0, 100.0))
                .required()
                .with_description("Percentage of targets to receive the deployment in each interval"),
        )
        .attribute(
            AttributeSchema::new("growth_type", types::enumeration(GROWTH_TYPES))
                .with_default(Value::from("LINEAR")),
        )
        .attribute(
            AttributeSchema::new("replicate_to", types::enumeration(REPLICATE_TO))
                .required()
                .force_new(),
        )
        .attribute(tags)
        .attribute(tags_all)
        .attribute(aws_types::arn_attribute())
}

pub fn deployment_schema() -> ResourceSchema {
    let [tags, tags_all] = aws_types::tag_attributes();
    ResourceSchema::new("appconfig.deployment")
        .with_description("A deployment of one configuration version to an environment")
        .attribute(
            AttributeSchema::new("application_id", appconfig_id())
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("environment_id", appconfig_id())
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("configuration_profile_id", appconfig_id())
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("deployment_strategy_id", types::string_matching("(AppConfig\\.[A-Za-z0-9]{9,40}|[a-z0-9]{4,7})"))
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("configuration_version", types::string_len(1, 1024))
                .required()
                .force_new(),
        )
        .attribute(AttributeSchema::new("description", description()).force_new())
        .attribute(AttributeSchema::new("kms_key_identifier", types::string_len(1, 2048)).force_new())
        .attribute(AttributeSchema::new("kms_key_arn", AttributeType::String).computed())
        .attribute(AttributeSchema::new("deployment_number", AttributeType::Int).computed())
        .attribute(AttributeSchema::new("state", AttributeType::String).computed())
        .attribute(tags.force_new())
        .attribute(tags_all)
        .attribute(aws_types::arn_attribute())
}

pub fn hosted_configuration_version_schema() -> ResourceSchema {
    ResourceSchema::new("appconfig.hosted_configuration_version")
        .with_description("An immutable version of a configuration stored by AppConfig")
        .attribute(
            AttributeSchema::new("application_id", appconfig_id())
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("configuration_profile_id", appconfig_id())
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("content", AttributeType::String)
                .required()
                .force_new()
                .sensitive(),
        )
        .attribute(
            AttributeSchema::new("content_type", types::string_len(1, 255))
                .required()
                .force_new()
                .with_description("MIME type, e.g. application/json"),
        )
        .attribute(AttributeSchema::new("description", description()).force_new())
        .attribute(AttributeSchema::new("version_number", AttributeType::Int).computed())
        .attribute(aws_types::arn_attribute())
}

pub fn environment_data_source_schema() -> ResourceSchema {
    let [tags, _] = aws_types::tag_attributes();
    ResourceSchema::data_source("appconfig.environment")
        .with_description("Look up one AppConfig environment")
        .attribute(AttributeSchema::new("application_id", appconfig_id()).required())
        .attribute(AttributeSchema::new("environment_id", appconfig_id()).required())
        .attribute(AttributeSchema::new("name", AttributeType::String).computed())
        .attribute(AttributeSchema::new("description", AttributeType::String).computed())
        .attribute(AttributeSchema::new("monitor", AttributeType::List(Box::new(monitor_block()))).computed())
        .attribute(AttributeSchema::new("state", AttributeType::String).computed())
        .attribute(tags.computed())
        .attribute(aws_types::arn_attribute())
}

pub fn configuration_profile_data_source_schema() -> ResourceSchema {
    let [tags, _] = aws_types::tag_attributes();
    ResourceSchema::data_source("appconfig.configuration_profile")
        .with_description("Look up one AppConfig configuration profile")
        .attribute(AttributeSchema::new("application_id", appconfig_id()).required())
        .attribute(AttributeSchema::new("configuration_profile_id", appconfig_id()).required())
        .attribute(AttributeSchema::new("name", AttributeType::String).computed())
        .attribute(AttributeSchema::new("description", AttributeType::String).computed())
        .attribute(AttributeSchema::new("location_uri", AttributeType::String).computed())
        .attribute(AttributeSchema::new("retrieval_role_arn", AttributeType::String).computed())
        .attribute(AttributeSchema::new("type", AttributeType::String).computed())
        .attribute(AttributeSchema::new("kms_key_identifier", AttributeType::String).computed())
        .attribute(
            AttributeSchema::new("validator", AttributeType::List(Box::new(validator_block())))
                .computed()
                .sensitive(),
        )
        .attribute(tags.computed())
        .attribute(aws_types::arn_attribute())
}

pub fn environments_data_source_schema() -> ResourceSchema {
    ResourceSchema::data_source("appconfig.environments")
        .with_description("List the environment IDs of an AppConfig application")
        .attribute(AttributeSchema::new("application_id", appconfig_id()).required())
        .attribute(AttributeSchema::new("environment_ids", types::string_list()).computed())
}

pub fn schemas() -> Vec<ResourceSchema> {
    vec![
        application_schema(),
        environment_schema(),
        configuration_profile_schema(),
        deployment_strategy_schema(),
        deployment_schema(),
        hosted_configuration_version_schema(),
        environment_data_source_schema(),
        configuration_profile_data_source_schema(),
        environments_data_source_schema(),
    ]
}

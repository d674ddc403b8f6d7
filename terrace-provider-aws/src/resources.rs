//! Resource type registry
//!
//! One [`ResourceType`] per resource and data source, each carrying its
//! schema from [`crate::schemas`].

use terrace_core::provider::ResourceType;
use terrace_core::schema::ResourceSchema;

use crate::schemas::{appconfig, evidently, mq};

macro_rules! define_resource_type {
    ($name:ident, $type_name:expr, $schema:path) => {
        pub struct $name;
        impl ResourceType for $name {
            fn name(&self) -> &'static str {
                $type_name
            }
            fn schema(&self) -> ResourceSchema {
                $schema()
            }
        }
    };
}

// AppConfig
define_resource_type!(AppConfigApplicationType, "appconfig.application", appconfig::application_schema);
define_resource_type!(AppConfigEnvironmentType, "appconfig.environment", appconfig::environment_schema);
define_resource_type!(
    AppConfigConfigurationProfileType,
    "appconfig.configuration_profile",
    appconfig::configuration_profile_schema
);
define_resource_type!(
    AppConfigDeploymentStrategyType,
    "appconfig.deployment_strategy",
    appconfig::deployment_strategy_schema
);
define_resource_type!(AppConfigDeploymentType, "appconfig.deployment", appconfig::deployment_schema);
define_resource_type!(
    AppConfigHostedConfigurationVersionType,
    "appconfig.hosted_configuration_version",
    appconfig::hosted_configuration_version_schema
);
define_resource_type!(
    AppConfigEnvironmentDataSource,
    "appconfig.environment",
    appconfig::environment_data_source_schema
);
define_resource_type!(
    AppConfigConfigurationProfileDataSource,
    "appconfig.configuration_profile",
    appconfig::configuration_profile_data_source_schema
);
define_resource_type!(
    AppConfigEnvironmentsDataSource,
    "appconfig.environments",
    appconfig::environments_data_source_schema
);

// Evidently
define_resource_type!(EvidentlyProjectType, "evidently.project", evidently::project_schema);
define_resource_type!(EvidentlyFeatureType, "evidently.feature", evidently::feature_schema);
define_resource_type!(EvidentlySegmentType, "evidently.segment", evidently::segment_schema);
define_resource_type!(EvidentlyLaunchType, "evidently.launch", evidently::launch_schema);

// MQ
define_resource_type!(MqBrokerType, "mq.broker", mq::broker_schema);
define_resource_type!(MqConfigurationType, "mq.configuration", mq::configuration_schema);
define_resource_type!(MqBrokerDataSource, "mq.broker", mq::broker_data_source_schema);

/// Returns all resource types and data sources supported by this provider
pub fn resource_types() -> Vec<Box<dyn ResourceType>> {
    vec![
        Box::new(AppConfigApplicationType),
        Box::new(AppConfigEnvironmentType),
        Box::new(AppConfigConfigurationProfileType),
        Box::new(AppConfigDeploymentStrategyType),
        Box::new(AppConfigDeploymentType),
        Box::new(AppConfigHostedConfigurationVersionType),
        Box::new(AppConfigEnvironmentDataSource),
        Box::new(AppConfigConfigurationProfileDataSource),
        Box::new(AppConfigEnvironmentsDataSource),
        Box::new(EvidentlyProjectType),
        Box::new(EvidentlyFeatureType),
        Box::new(EvidentlySegmentType),
        Box::new(EvidentlyLaunchType),
        Box::new(MqBrokerType),
        Box::new(MqConfigurationType),
        Box::new(MqBrokerDataSource),
    ]
}

//! Provider configuration
//!
//! Settings shared by every resource: region and credentials profile,
//! provider-wide default tags, and tags to ignore.

use std::collections::HashMap;
use std::path::Path;

use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use serde::Deserialize;
use terrace_core::tags::{IgnoreConfig, KeyValueTags};

pub const DEFAULT_REGION: &str = "us-east-1";

/// Errors raised while loading provider configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// AWS region; falls back to `AWS_REGION`, then us-east-1
    #[serde(default)]
    pub region: Option<String>,
    /// Named profile from the shared config files
    #[serde(default)]
    pub profile: Option<String>,
    /// Tags applied to every taggable resource
    #[serde(default)]
    pub default_tags: HashMap<String, String>,
    #[serde(default)]
    pub ignore_tags: IgnoreConfig,
    /// Maximum attempts for each API call, including the first
    #[serde(default)]
    pub max_attempts: Option<u32>,
    /// Skip the STS call that resolves the account ID
    #[serde(default)]
    pub skip_requesting_account_id: bool,
}

impl ProviderConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Effective region: explicit setting, then `AWS_REGION`, then the default
    pub fn region(&self) -> String {
        self.region
            .clone()
            .or_else(|| std::env::var("AWS_REGION").ok())
            .unwrap_or_else(|| DEFAULT_REGION.to_string())
    }

    pub fn default_tags(&self) -> KeyValueTags {
        KeyValueTags::from(&self.default_tags)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(0) = self.max_attempts {
            return Err(ConfigError::Invalid(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if let Some(key) = self.default_tags.keys().find(|k| k.starts_with("aws:")) {
            return Err(ConfigError::Invalid(format!(
                "default tag '{}' uses the reserved aws: prefix",
                key
            )));
        }
        Ok(())
    }

    /// Load the shared SDK configuration for these settings
    pub async fn load_sdk_config(&self) -> SdkConfig {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(self.region()));
        if let Some(profile) = &self.profile {
            loader = loader.profile_name(profile);
        }
        if let Some(attempts) = self.max_attempts {
            loader = loader.retry_config(RetryConfig::standard().with_max_attempts(attempts));
        }
        loader.load().await
    }
}

/// AWS partition for a region
pub fn partition_for_region(region: &str) -> &'static str {
    if region.starts_with("cn-") {
        "aws-cn"
    } else if region.starts_with("us-gov-") {
        "aws-us-gov"
    } else if region.starts_with("us-isob-") {
        "aws-iso-b"
    } else if region.starts_with("us-iso-") {
        "aws-iso"
    } else {
        "aws"
    }
}

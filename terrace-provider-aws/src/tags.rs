//! Provider-wide tag handling
//!
//! Resources declare `tags`; the provider sends `tags_all` (declared tags
//! over default tags) to AWS and reports both back on read.

use std::collections::HashMap;

use terrace_core::resource::Value;
use terrace_core::tags::{IgnoreConfig, KeyValueTags, TagDiff};

#[derive(Debug, Clone, Default)]
pub struct TagPolicy {
    pub default_tags: KeyValueTags,
    pub ignore: IgnoreConfig,
}

impl TagPolicy {
    pub fn new(default_tags: KeyValueTags, ignore: IgnoreConfig) -> Self {
        Self {
            default_tags,
            ignore,
        }
    }

    /// Tags to send to AWS for the declared attributes
    pub fn desired(&self, attributes: &HashMap<String, Value>) -> KeyValueTags {
        KeyValueTags::from_value(attributes.get("tags"))
            .merge(&self.default_tags)
            .ignore_system()
            .ignore(&self.ignore)
    }

    /// Record tags read from AWS as `tags_all`, and the declared part as `tags`
    pub fn apply(&self, attributes: &mut HashMap<String, Value>, remote: KeyValueTags) {
        let all = remote.ignore_system().ignore(&self.ignore);
        let own = all.without_defaults(&self.default_tags);
        attributes.insert("tags".to_string(), own.to_value());
        attributes.insert("tags_all".to_string(), all.to_value());
    }

    /// Tag changes between a previous state and new declared attributes
    pub fn changes(
        &self,
        from: &HashMap<String, Value>,
        to: &HashMap<String, Value>,
    ) -> TagDiff {
        let old = match from.get("tags_all") {
            Some(value) => KeyValueTags::from_value(Some(value))
                .ignore_system()
                .ignore(&self.ignore),
            None => self.desired(from),
        };
        old.diff(&self.desired(to))
    }
}

/// Request form of a tag set; `None` when empty
pub(crate) fn tags_request(tags: KeyValueTags) -> Option<HashMap<String, String>> {
    if tags.is_empty() {
        None
    } else {
        Some(tags.into_hash_map())
    }
}

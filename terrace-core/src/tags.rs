//! Tags - Key/value tag reconciliation
//!
//! Resources expose `tags` (what the user declared) and `tags_all`
//! (declared tags merged over provider-wide default tags). Updates diff the
//! old and new `tags_all` to decide which keys to set and which to remove.

use std::collections::{BTreeMap, HashMap};

use crate::resource::Value;

/// Prefix reserved by AWS for system tags, which cannot be modified
pub const SYSTEM_TAG_PREFIX: &str = "aws:";

/// Tags the provider never reports or removes
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
pub struct IgnoreConfig {
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub key_prefixes: Vec<String>,
}

impl IgnoreConfig {
    pub fn is_ignored(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key) || self.key_prefixes.iter().any(|p| key.starts_with(p))
    }
}

/// Ordered key/value tag set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyValueTags(BTreeMap<String, String>);

/// Changes needed to go from one tag set to another
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagDiff {
    /// Added or changed keys with their new values
    pub upsert: HashMap<String, String>,
    /// Keys to remove
    pub remove: Vec<String>,
}

impl TagDiff {
    pub fn is_empty(&self) -> bool {
        self.upsert.is_empty() && self.remove.is_empty()
    }
}

impl KeyValueTags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a `Value::Map`; non-string values are skipped
    pub fn from_value(value: Option<&Value>) -> Self {
        let mut tags = BTreeMap::new();
        if let Some(Value::Map(map)) = value {
            for (k, v) in map {
                if let Value::String(s) = v {
                    tags.insert(k.clone(), s.clone());
                }
            }
        }
        Self(tags)
    }

    pub fn to_value(&self) -> Value {
        Value::Map(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        )
    }

    pub fn into_hash_map(self) -> HashMap<String, String> {
        self.0.into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Drop `aws:`-prefixed system tags
    pub fn ignore_system(mut self) -> Self {
        self.0.retain(|k, _| !k.starts_with(SYSTEM_TAG_PREFIX));
        self
    }

    /// Drop keys matched by the ignore configuration
    pub fn ignore(mut self, config: &IgnoreConfig) -> Self {
        self.0.retain(|k, _| !config.is_ignored(k));
        self
    }

    /// Default tags overlaid with these tags
    pub fn merge(&self, defaults: &KeyValueTags) -> KeyValueTags {
        let mut merged = defaults.0.clone();
        merged.extend(self.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        KeyValueTags(merged)
    }

    /// Remove the entries that only exist because of default tags
    pub fn without_defaults(&self, defaults: &KeyValueTags) -> KeyValueTags {
        KeyValueTags(
            self.0
                .iter()
                .filter(|(k, v)| defaults.0.get(*k) != Some(*v))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Compute the changes that turn `self` into `new`
    pub fn diff(&self, new: &KeyValueTags) -> TagDiff {
        let remove = self
            .0
            .keys()
            .filter(|k| !new.0.contains_key(*k))
            .cloned()
            .collect();

        let upsert = new
            .0
            .iter()
            .filter(|(k, v)| self.0.get(*k) != Some(*v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        TagDiff { upsert, remove }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for KeyValueTags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<&HashMap<String, String>> for KeyValueTags {
    fn from(map: &HashMap<String, String>) -> Self {
        map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> KeyValueTags {
        pairs.iter().copied().collect()
    }

    #[test]
    fn diff_detects_added_changed_and_removed() {
        let old = tags(&[("env", "dev"), ("team", "a"), ("gone", "x")]);
        let new = tags(&[("env", "prod"), ("team", "a"), ("owner", "me")]);

        let diff = old.diff(&new);
        assert_eq!(diff.remove, vec!["gone".to_string()]);
        assert_eq!(diff.upsert.len(), 2);
        assert_eq!(diff.upsert.get("env"), Some(&"prod".to_string()));
        assert_eq!(diff.upsert.get("owner"), Some(&"me".to_string()));
    }

    #[test]
    fn diff_of_equal_sets_is_empty() {
        let a = tags(&[("k", "v")]);
        assert!(a.diff(&a.clone()).is_empty());
    }

    #[test]
    fn merge_prefers_resource_tags() {
        let defaults = tags(&[("env", "default"), ("org", "acme")]);
        let resource = tags(&[("env", "prod")]);
        let all = resource.merge(&defaults);
        assert_eq!(all, tags(&[("env", "prod"), ("org", "acme")]));
    }

    #[test]
    fn without_defaults_keeps_overridden_keys() {
        let defaults = tags(&[("env", "default"), ("org", "acme")]);
        let all = tags(&[("env", "prod"), ("org", "acme"), ("name", "x")]);
        assert_eq!(
            all.without_defaults(&defaults),
            tags(&[("env", "prod"), ("name", "x")])
        );
    }

    #[test]
    fn ignore_system_and_configured_keys() {
        let config = IgnoreConfig {
            keys: vec!["LastScanned".to_string()],
            key_prefixes: vec!["kubernetes.io/".to_string()],
        };
        let remote = tags(&[
            ("aws:cloudformation:stack-name", "s"),
            ("LastScanned", "today"),
            ("kubernetes.io/cluster", "owned"),
            ("env", "prod"),
        ]);
        assert_eq!(remote.ignore_system().ignore(&config), tags(&[("env", "prod")]));
    }

    #[test]
    fn value_round_trip_skips_non_strings() {
        let value = Value::Map(HashMap::from([
            ("env".to_string(), Value::from("prod")),
            ("count".to_string(), Value::Int(1)),
        ]));
        let parsed = KeyValueTags::from_value(Some(&value));
        assert_eq!(parsed, tags(&[("env", "prod")]));
        assert_eq!(
            parsed.to_value(),
            Value::Map(HashMap::from([("env".to_string(), Value::from("prod"))]))
        );
        assert!(KeyValueTags::from_value(None).is_empty());
    }
}

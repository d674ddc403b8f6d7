//! Attribute helpers shared by all resources
//!
//! [`Attrs`] reads typed values out of a declared attribute map ("expand"),
//! and [`put`] writes SDK output members into a state attribute map
//! ("flatten"). Absent optional members are never written, so a read-back
//! state only carries what the API reported.

use std::collections::HashMap;

use aws_smithy_types::DateTime;
use aws_smithy_types::date_time::Format;
use aws_smithy_types::error::operation::BuildError;
use terrace_core::provider::{ProviderError, ProviderResult};
use terrace_core::resource::Value;

/// Typed read access to an attribute map
#[derive(Debug, Clone, Copy)]
pub(crate) struct Attrs<'a> {
    map: &'a HashMap<String, Value>,
}

impl<'a> Attrs<'a> {
    pub(crate) fn new(map: &'a HashMap<String, Value>) -> Self {
        Self { map }
    }

    pub(crate) fn get(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key)
    }

    pub(crate) fn has(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// String value; empty strings count as unset
    pub(crate) fn str(&self, key: &str) -> Option<&'a str> {
        self.get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub(crate) fn string(&self, key: &str) -> Option<String> {
        self.str(key).map(str::to_string)
    }

    pub(crate) fn required_str(&self, key: &str) -> ProviderResult<&'a str> {
        self.str(key).ok_or_else(|| required(key))
    }

    pub(crate) fn int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_int)
    }

    /// Integer value narrowed to the 32-bit range most APIs use
    pub(crate) fn int32(&self, key: &str) -> ProviderResult<Option<i32>> {
        self.int(key)
            .map(|n| {
                i32::try_from(n).map_err(|_| {
                    ProviderError::validation(format!("{}: {} is out of range", key, n))
                })
            })
            .transpose()
    }

    pub(crate) fn required_int32(&self, key: &str) -> ProviderResult<i32> {
        self.int32(key)?.ok_or_else(|| required(key))
    }

    pub(crate) fn float(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_float)
    }

    pub(crate) fn bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    /// String items of a list; other item types are skipped
    pub(crate) fn strings(&self, key: &str) -> Vec<String> {
        self.get(key)
            .and_then(Value::as_list)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn string_map(&self, key: &str) -> HashMap<String, String> {
        self.get(key)
            .and_then(Value::as_map)
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn int_map(&self, key: &str) -> HashMap<String, i64> {
        self.get(key)
            .and_then(Value::as_map)
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_int().map(|n| (k.clone(), n)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Nested blocks given as a list of maps
    pub(crate) fn blocks(&self, key: &str) -> Vec<Attrs<'a>> {
        match self.get(key) {
            Some(Value::List(items)) => items
                .iter()
                .filter_map(Value::as_map)
                .map(Attrs::new)
                .collect(),
            Some(Value::Map(map)) => vec![Attrs::new(map)],
            _ => Vec::new(),
        }
    }

    /// A single nested block, given as a map or a one-item list
    pub(crate) fn block(&self, key: &str) -> Option<Attrs<'a>> {
        self.blocks(key).into_iter().next()
    }
}

fn required(key: &str) -> ProviderError {
    ProviderError::validation(format!("attribute '{}' is required", key))
}

/// An SDK output member that can be stored as an attribute value
pub(crate) trait AttrSource {
    fn into_value(self) -> Option<Value>;
}

impl<T: AsRef<str> + ?Sized> AttrSource for &T {
    fn into_value(self) -> Option<Value> {
        Some(Value::String(self.as_ref().to_string()))
    }
}

impl<T: AsRef<str> + ?Sized> AttrSource for Option<&T> {
    fn into_value(self) -> Option<Value> {
        self.and_then(AttrSource::into_value)
    }
}

macro_rules! int_source {
    ($($ty:ty),*) => {
        $(
            impl AttrSource for $ty {
                fn into_value(self) -> Option<Value> {
                    Some(Value::Int(i64::from(self)))
                }
            }

            impl AttrSource for Option<$ty> {
                fn into_value(self) -> Option<Value> {
                    self.and_then(AttrSource::into_value)
                }
            }
        )*
    };
}

int_source!(i32, i64);

impl AttrSource for f64 {
    fn into_value(self) -> Option<Value> {
        Some(Value::Float(self))
    }
}

impl AttrSource for Option<f64> {
    fn into_value(self) -> Option<Value> {
        self.and_then(AttrSource::into_value)
    }
}

// Widen through the shortest decimal form so 0.1f32 reads back as 0.1
impl AttrSource for f32 {
    fn into_value(self) -> Option<Value> {
        self.to_string().parse::<f64>().ok().map(Value::Float)
    }
}

impl AttrSource for Option<f32> {
    fn into_value(self) -> Option<Value> {
        self.and_then(AttrSource::into_value)
    }
}

impl AttrSource for bool {
    fn into_value(self) -> Option<Value> {
        Some(Value::Bool(self))
    }
}

impl AttrSource for Option<bool> {
    fn into_value(self) -> Option<Value> {
        self.and_then(AttrSource::into_value)
    }
}

/// Timestamp member, stored as an RFC 3339 string
pub(crate) trait TimestampSource {
    fn into_timestamp(self) -> Option<Value>;
}

impl TimestampSource for &DateTime {
    fn into_timestamp(self) -> Option<Value> {
        self.fmt(Format::DateTime).ok().map(Value::String)
    }
}

impl TimestampSource for Option<&DateTime> {
    fn into_timestamp(self) -> Option<Value> {
        self.and_then(TimestampSource::into_timestamp)
    }
}

/// Insert `source` under `key` unless the member was absent
pub(crate) fn put(attrs: &mut HashMap<String, Value>, key: &str, source: impl AttrSource) {
    if let Some(value) = source.into_value() {
        attrs.insert(key.to_string(), value);
    }
}

pub(crate) fn put_timestamp(
    attrs: &mut HashMap<String, Value>,
    key: &str,
    source: impl TimestampSource,
) {
    if let Some(value) = source.into_timestamp() {
        attrs.insert(key.to_string(), value);
    }
}

/// String form of a member, for status and enum comparisons
pub(crate) fn string_of(source: impl AttrSource) -> Option<String> {
    match source.into_value() {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

pub(crate) fn int_of(source: impl AttrSource) -> Option<i64> {
    source.into_value().and_then(|v| v.as_int())
}

pub(crate) fn bool_of(source: impl AttrSource) -> Option<bool> {
    source.into_value().and_then(|v| v.as_bool())
}

pub(crate) fn string_list<S: AsRef<str>>(items: &[S]) -> Value {
    Value::List(
        items
            .iter()
            .map(|s| Value::String(s.as_ref().to_string()))
            .collect(),
    )
}

pub(crate) fn string_map(map: &HashMap<String, String>) -> Value {
    Value::Map(
        map.iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

pub(crate) fn block(fields: HashMap<String, Value>) -> Value {
    Value::Map(fields)
}

/// Struct member that may be modeled as required (`&T`) or optional
/// (`Option<&T>`) depending on the service model
pub(crate) trait OptionalMember<'a, T: ?Sized> {
    fn optional(self) -> Option<&'a T>;
}

impl<'a, T: ?Sized> OptionalMember<'a, T> for &'a T {
    fn optional(self) -> Option<&'a T> {
        Some(self)
    }
}

impl<'a, T: ?Sized> OptionalMember<'a, T> for Option<&'a T> {
    fn optional(self) -> Option<&'a T> {
        self
    }
}

/// Finish a builder whose `build()` may or may not validate required members
pub(crate) trait Finish<T> {
    fn finish(self, what: &str) -> ProviderResult<T>;
}

impl<T> Finish<T> for Result<T, BuildError> {
    fn finish(self, what: &str) -> ProviderResult<T> {
        self.map_err(|e| {
            ProviderError::validation(format!("building {}: {}", what, e)).with_cause(e)
        })
    }
}

/// Implement [`Finish`] for types whose builder cannot fail
macro_rules! infallible_build {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $crate::attrs::Finish<$ty> for $ty {
                fn finish(self, _what: &str) -> terrace_core::provider::ProviderResult<$ty> {
                    Ok(self)
                }
            }
        )*
    };
}

pub(crate) use infallible_build;

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: Vec<(&str, Value)>) -> HashMap<String, Value> {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn typed_reads() {
        let attrs = map(vec![
            ("name", Value::from("app")),
            ("empty", Value::from("")),
            ("count", Value::Int(3)),
            ("factor", Value::Int(2)),
            ("enabled", Value::Bool(true)),
            ("subnets", Value::List(vec![Value::from("a"), Value::from("b")])),
        ]);
        let attrs = Attrs::new(&attrs);
        assert_eq!(attrs.str("name"), Some("app"));
        assert_eq!(attrs.str("empty"), None);
        assert_eq!(attrs.int32("count").unwrap(), Some(3));
        assert_eq!(attrs.float("factor"), Some(2.0));
        assert_eq!(attrs.bool("enabled"), Some(true));
        assert_eq!(attrs.strings("subnets"), vec!["a", "b"]);
        assert!(attrs.strings("missing").is_empty());
    }

    #[test]
    fn required_attributes() {
        let attrs = HashMap::new();
        let err = Attrs::new(&attrs).required_str("name").unwrap_err();
        assert_eq!(err.kind, terrace_core::provider::ErrorKind::Validation);
        assert!(err.message.contains("'name'"));
    }

    #[test]
    fn int32_out_of_range() {
        let attrs = map(vec![("n", Value::Int(i64::MAX))]);
        assert!(Attrs::new(&attrs).int32("n").is_err());
    }

    #[test]
    fn blocks_accept_list_or_map() {
        let monitor = map(vec![("alarm_arn", Value::from("arn:aws:cloudwatch:x"))]);
        let attrs = map(vec![
            ("list", Value::List(vec![Value::Map(monitor.clone())])),
            ("single", Value::Map(monitor)),
        ]);
        let attrs = Attrs::new(&attrs);
        assert_eq!(attrs.blocks("list").len(), 1);
        assert_eq!(
            attrs.block("single").and_then(|b| b.str("alarm_arn")),
            Some("arn:aws:cloudwatch:x")
        );
        assert!(attrs.block("none").is_none());
    }

    #[test]
    fn put_skips_absent_members() {
        let mut attrs = HashMap::new();
        put(&mut attrs, "name", Some("x"));
        put(&mut attrs, "description", None::<&str>);
        put(&mut attrs, "count", Some(4i32));
        put(&mut attrs, "factor", 0.1f32);
        put(&mut attrs, "enabled", false);
        assert_eq!(attrs.get("name"), Some(&Value::from("x")));
        assert!(!attrs.contains_key("description"));
        assert_eq!(attrs.get("count"), Some(&Value::Int(4)));
        assert_eq!(attrs.get("factor"), Some(&Value::Float(0.1)));
        assert_eq!(attrs.get("enabled"), Some(&Value::Bool(false)));
    }

    #[test]
    fn timestamps_are_rfc3339() {
        let mut attrs = HashMap::new();
        put_timestamp(&mut attrs, "created_time", &DateTime::from_secs(0));
        assert_eq!(
            attrs.get("created_time"),
            Some(&Value::from("1970-01-01T00:00:00Z"))
        );
    }

    #[test]
    fn optional_member_normalizes_presence() {
        let value = String::from("v");
        assert_eq!((&value).optional(), Some(&value));
        assert_eq!(None::<&String>.optional(), None);
    }
}

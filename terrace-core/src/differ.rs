//! Differ - Compare desired state with current state
//!
//! Compares the attributes declared by the caller with the attributes read
//! back from the Provider, and decides whether the remote object must be
//! created, updated in place, replaced, or left alone.

use std::collections::HashMap;

use crate::resource::{Resource, ResourceId, State, Value};
use crate::schema::{AttributeSchema, AttributeType, ResourceSchema};

/// Result of a diff operation
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Resource does not exist -> needs creation
    Create(Resource),
    /// Resource exists with differences that can be applied in place
    Update {
        id: ResourceId,
        changed_attributes: Vec<String>,
    },
    /// Resource exists but a force-new attribute changed
    Replace {
        id: ResourceId,
        changed_attributes: Vec<String>,
    },
    /// Resource exists with no differences -> no action needed
    NoChange(ResourceId),
}

impl Diff {
    /// Returns whether this Diff involves a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange(_))
    }
}

/// Set of attribute names whose values differ between two attribute maps
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Changes(Vec<String>);

impl Changes {
    /// Attributes in `desired` that differ from `current`, plus attributes
    /// present in `current` but removed from `desired`. An empty list or map
    /// counts the same as an absent one.
    pub fn between(current: &HashMap<String, Value>, desired: &HashMap<String, Value>) -> Self {
        Self::compare(current, desired, None)
    }

    /// Changes to attributes the user can set, compared through their types.
    ///
    /// Computed and unknown attributes are skipped. Optional+computed
    /// attributes may be omitted from `desired`, and write-only ones may be
    /// missing from `current`.
    pub fn for_schema(
        current: &HashMap<String, Value>,
        desired: &HashMap<String, Value>,
        schema: &ResourceSchema,
    ) -> Self {
        Self::compare(current, desired, Some(schema))
    }

    fn compare(
        current: &HashMap<String, Value>,
        desired: &HashMap<String, Value>,
        schema: Option<&ResourceSchema>,
    ) -> Self {
        let mut names: Vec<&String> = current
            .keys()
            .chain(desired.keys())
            // Skip internal attributes (starting with _)
            .filter(|key| !key.starts_with('_'))
            .collect();
        names.sort();
        names.dedup();

        let changed = names
            .into_iter()
            .filter(|name| {
                let attr = match schema {
                    Some(schema) => match schema.attributes.get(name.as_str()) {
                        Some(attr) => Some(attr),
                        None => return false,
                    },
                    None => None,
                };
                !attribute_matches(attr, current.get(*name), desired.get(*name))
            })
            .cloned()
            .collect();
        Changes(changed)
    }

    pub fn has(&self, name: &str) -> bool {
        self.0.iter().any(|c| c == name)
    }

    pub fn has_any(&self, names: &[&str]) -> bool {
        names.iter().any(|n| self.has(n))
    }

    /// True if anything other than the listed attributes changed
    pub fn has_other_than(&self, names: &[&str]) -> bool {
        self.0.iter().any(|c| !names.contains(&c.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }
}

/// Compare desired state with current state to compute a Diff
pub fn diff(desired: &Resource, current: &State, schema: &ResourceSchema) -> Diff {
    if !current.exists {
        return Diff::Create(desired.clone());
    }

    let changed = Changes::for_schema(&current.attributes, &desired.attributes, schema);

    if changed.is_empty() {
        return Diff::NoChange(desired.id.clone());
    }

    let changed_attributes = changed.names().to_vec();
    if changed_attributes.iter().any(|name| schema.is_force_new(name)) {
        Diff::Replace {
            id: desired.id.clone(),
            changed_attributes,
        }
    } else {
        Diff::Update {
            id: desired.id.clone(),
            changed_attributes,
        }
    }
}

fn is_empty_collection(value: &Value) -> bool {
    match value {
        Value::List(items) => items.is_empty(),
        Value::Map(map) => map.is_empty(),
        _ => false,
    }
}

/// Whether one attribute (or block field) is unchanged
fn attribute_matches(
    attr: Option<&AttributeSchema>,
    current: Option<&Value>,
    desired: Option<&Value>,
) -> bool {
    if attr.is_some_and(|a| a.computed) {
        return true;
    }
    match (current, desired) {
        (None, None) => true,
        (Some(c), Some(d)) => match attr {
            Some(attr) => equivalent(&attr.attr_type, c, d),
            None => c == d,
        },
        (Some(c), None) => {
            is_empty_collection(c)
                || attr.is_some_and(|a| {
                    a.optional_computed || a.write_only || a.default.as_ref() == Some(c)
                })
        }
        (None, Some(d)) => {
            is_empty_collection(d)
                || attr.is_some_and(|a| a.write_only || a.default.as_ref() == Some(d))
        }
    }
}

/// Value equality as seen through the attribute type
fn equivalent(attr_type: &AttributeType, current: &Value, desired: &Value) -> bool {
    match (attr_type, current, desired) {
        (AttributeType::Custom { base, .. } | AttributeType::Constrained { base, .. }, c, d) => {
            equivalent(base, c, d)
        }
        (AttributeType::Float, c, d) => match (c.as_float(), d.as_float()) {
            (Some(a), Some(b)) => a == b,
            _ => c == d,
        },
        (AttributeType::List(inner), Value::List(a), Value::List(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| equivalent(inner, x, y))
        }
        (AttributeType::Map(inner), Value::Map(a), Value::Map(b)) => {
            a.len() == b.len()
                && a
                    .iter()
                    .all(|(k, x)| b.get(k).is_some_and(|y| equivalent(inner, x, y)))
        }
        (AttributeType::Struct { fields, .. }, Value::Map(a), Value::Map(b)) => {
            let declared = fields
                .iter()
                .all(|f| attribute_matches(Some(f), a.get(&f.name), b.get(&f.name)));
            let undeclared = a
                .keys()
                .chain(b.keys())
                .filter(|k| !fields.iter().any(|f| &f.name == *k))
                .all(|k| a.get(k) == b.get(k));
            declared && undeclared
        }
        (_, c, d) => c == d,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeSchema, AttributeType};

    fn schema() -> ResourceSchema {
        ResourceSchema::new("appconfig.environment")
            .attribute(AttributeSchema::new("application_id", AttributeType::String).force_new())
            .attribute(AttributeSchema::new("name", AttributeType::String))
            .attribute(AttributeSchema::new("description", AttributeType::String))
            .attribute(AttributeSchema::new("state", AttributeType::String).computed())
    }

    fn current(attrs: &[(&str, &str)]) -> State {
        State::existing(
            ResourceId::new("appconfig.environment", "test"),
            attrs
                .iter()
                .map(|(k, v)| (k.to_string(), Value::from(*v)))
                .collect(),
        )
    }

    #[test]
    fn diff_create_when_not_exists() {
        let desired = Resource::new("appconfig.environment", "test");
        let current = State::not_found(ResourceId::new("appconfig.environment", "test"));

        let result = diff(&desired, &current, &schema());
        assert!(matches!(result, Diff::Create(_)));
    }

    #[test]
    fn diff_no_change_ignores_computed() {
        let desired = Resource::new("appconfig.environment", "test")
            .with_attribute("application_id", Value::from("app1"))
            .with_attribute("name", Value::from("prod"));
        let current = current(&[
            ("application_id", "app1"),
            ("name", "prod"),
            ("state", "READY_FOR_DEPLOYMENT"),
        ]);

        let result = diff(&desired, &current, &schema());
        assert!(matches!(result, Diff::NoChange(_)));
        assert!(!result.is_change());
    }

    #[test]
    fn diff_update_when_in_place_attribute_changes() {
        let desired = Resource::new("appconfig.environment", "test")
            .with_attribute("application_id", Value::from("app1"))
            .with_attribute("name", Value::from("staging"));
        let current = current(&[("application_id", "app1"), ("name", "prod")]);

        match diff(&desired, &current, &schema()) {
            Diff::Update {
                changed_attributes, ..
            } => assert_eq!(changed_attributes, vec!["name".to_string()]),
            other => panic!("Expected Update, got {:?}", other),
        }
    }

    #[test]
    fn diff_replace_when_force_new_changes() {
        let desired = Resource::new("appconfig.environment", "test")
            .with_attribute("application_id", Value::from("app2"))
            .with_attribute("name", Value::from("staging"));
        let current = current(&[("application_id", "app1"), ("name", "prod")]);

        assert!(matches!(
            diff(&desired, &current, &schema()),
            Diff::Replace { .. }
        ));
    }

    #[test]
    fn removed_attribute_counts_as_change() {
        let desired = Resource::new("appconfig.environment", "test")
            .with_attribute("application_id", Value::from("app1"));
        let current = current(&[("application_id", "app1"), ("description", "old")]);

        let changes = Changes::between(&current.attributes, &desired.attributes);
        assert!(changes.has("description"));
        assert!(!changes.has("application_id"));
        assert!(changes.has_any(&["name", "description"]));
        assert!(!changes.has_other_than(&["description"]));
    }

    #[test]
    fn internal_attributes_are_skipped() {
        let desired = HashMap::from([("_binding".to_string(), Value::from("x"))]);
        let current = HashMap::from([("_hint".to_string(), Value::from("y"))]);
        assert!(Changes::between(&current, &desired).is_empty());
    }

    fn broker_like_schema() -> ResourceSchema {
        let user = crate::schema::types::block(
            "User",
            vec![
                AttributeSchema::new("username", AttributeType::String).required(),
                AttributeSchema::new("password", AttributeType::String).write_only(),
                AttributeSchema::new("console_access", AttributeType::Bool)
                    .with_default(Value::Bool(false)),
            ],
        );
        ResourceSchema::new("mq.broker")
            .attribute(AttributeSchema::new("broker_name", AttributeType::String).force_new())
            .attribute(
                AttributeSchema::new("subnet_ids", crate::schema::types::string_list())
                    .force_new()
                    .optional_computed(),
            )
            .attribute(AttributeSchema::new(
                "security_groups",
                crate::schema::types::string_list(),
            ))
            .attribute(AttributeSchema::new("apply_immediately", AttributeType::Bool).write_only())
            .attribute(AttributeSchema::new("users", AttributeType::List(Box::new(user))))
            .attribute(AttributeSchema::new(
                "tags",
                crate::schema::types::string_map(),
            ))
            .attribute(AttributeSchema::new("weight", AttributeType::Float))
    }

    fn map(pairs: Vec<(&str, Value)>) -> HashMap<String, Value> {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn server_filled_and_write_only_attributes_are_not_changes() {
        let schema = broker_like_schema();
        let current = map(vec![
            ("broker_name", Value::from("orders")),
            ("subnet_ids", Value::List(vec![Value::from("subnet-1")])),
            ("security_groups", Value::List(vec![])),
            ("tags", Value::Map(HashMap::new())),
            (
                "users",
                Value::List(vec![Value::Map(map(vec![
                    ("username", Value::from("admin")),
                    ("console_access", Value::Bool(false)),
                ]))]),
            ),
        ]);
        let desired = map(vec![
            ("broker_name", Value::from("orders")),
            ("apply_immediately", Value::Bool(false)),
            (
                "users",
                Value::List(vec![Value::Map(map(vec![
                    ("username", Value::from("admin")),
                    ("password", Value::from("correct-horse-battery")),
                ]))]),
            ),
        ]);

        assert!(Changes::for_schema(&current, &desired, &schema).is_empty());
    }

    #[test]
    fn tag_only_change_is_an_update() {
        let schema = broker_like_schema();
        let current = State::existing(
            ResourceId::new("mq.broker", "orders"),
            map(vec![
                ("broker_name", Value::from("orders")),
                ("subnet_ids", Value::List(vec![Value::from("subnet-1")])),
            ]),
        );
        let desired = Resource::new("mq.broker", "orders")
            .with_attribute("broker_name", Value::from("orders"))
            .with_attribute(
                "tags",
                Value::Map(map(vec![("team", Value::from("core"))])),
            );

        match diff(&desired, &current, &schema) {
            Diff::Update {
                changed_attributes, ..
            } => assert_eq!(changed_attributes, vec!["tags".to_string()]),
            other => panic!("Expected Update, got {:?}", other),
        }
    }

    #[test]
    fn declared_optional_computed_value_still_compares() {
        let schema = broker_like_schema();
        let current = map(vec![("subnet_ids", Value::List(vec![Value::from("subnet-1")]))]);
        let desired = map(vec![("subnet_ids", Value::List(vec![Value::from("subnet-2")]))]);
        assert!(Changes::for_schema(&current, &desired, &schema).has("subnet_ids"));
    }

    #[test]
    fn removing_all_tags_is_a_change() {
        let schema = broker_like_schema();
        let current = map(vec![("tags", Value::Map(map(vec![("team", Value::from("core"))])))]);
        assert!(Changes::for_schema(&current, &HashMap::new(), &schema).has("tags"));
    }

    #[test]
    fn floats_compare_by_number() {
        let schema = broker_like_schema();
        let current = map(vec![("weight", Value::Float(2.0))]);
        let desired = map(vec![("weight", Value::Int(2))]);
        assert!(Changes::for_schema(&current, &desired, &schema).is_empty());
        let desired = map(vec![("weight", Value::Float(2.5))]);
        assert!(Changes::for_schema(&current, &desired, &schema).has("weight"));
    }

    #[test]
    fn nested_field_change_is_detected() {
        let schema = broker_like_schema();
        let user = |console: bool| {
            Value::List(vec![Value::Map(map(vec![
                ("username", Value::from("admin")),
                ("console_access", Value::Bool(console)),
            ]))])
        };
        let current = map(vec![("users", user(false))]);
        let desired = map(vec![("users", user(true))]);
        assert!(Changes::for_schema(&current, &desired, &schema).has("users"));
    }
}

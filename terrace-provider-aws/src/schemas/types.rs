//! AWS-specific type definitions

use terrace_core::resource::Value;
use terrace_core::schema::{AttributeSchema, AttributeType, types, validate_arn};

/// MQ broker engines, accepted in any letter case
const ENGINE_TYPES: &[&str] = &["ACTIVEMQ", "RABBITMQ"];

/// Resource tags (key -> value)
pub fn tags_type() -> AttributeType {
    types::string_map()
}

/// `tags` input plus the computed `tags_all`
pub fn tag_attributes() -> [AttributeSchema; 2] {
    [
        AttributeSchema::new("tags", tags_type())
            .with_description("Tags to assign to the resource, merged over provider default tags"),
        AttributeSchema::new("tags_all", tags_type())
            .computed()
            .with_description("All tags on the resource, including provider default tags"),
    ]
}

pub fn arn_attribute() -> AttributeSchema {
    AttributeSchema::new("arn", AttributeType::String)
        .computed()
        .with_description("ARN of the resource")
}

/// IAM role ARN (arn:<partition>:iam::<account>:role/<name>)
pub fn iam_role_arn() -> AttributeType {
    AttributeType::Custom {
        name: "IamRoleArn".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| {
            if let Value::String(s) = value {
                validate_arn(s)?;
                if s.split(':').nth(2) == Some("iam") && s.contains(":role/") {
                    Ok(())
                } else {
                    Err(format!("'{}' is not an IAM role ARN", s))
                }
            } else {
                Err("Expected string".to_string())
            }
        },
    }
}

/// Timestamp in RFC 3339 format (e.g., "2024-05-01T10:00:00Z")
pub fn rfc3339() -> AttributeType {
    AttributeType::Custom {
        name: "Rfc3339".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| {
            if let Value::String(s) = value {
                aws_smithy_types::DateTime::from_str(s, aws_smithy_types::date_time::Format::DateTime)
                    .map(|_| ())
                    .map_err(|e| format!("'{}' is not an RFC 3339 timestamp: {}", s, e))
            } else {
                Err("Expected string".to_string())
            }
        },
    }
}

/// MQ engine type; "ActiveMQ", "activemq" and "ACTIVEMQ" are all accepted
pub fn engine_type() -> AttributeType {
    AttributeType::Custom {
        name: "EngineType".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| {
            if let Value::String(s) = value {
                if ENGINE_TYPES.contains(&normalize_engine_type(s).as_str()) {
                    Ok(())
                } else {
                    Err(format!(
                        "Invalid engine type '{}', expected one of: ActiveMQ, RabbitMQ",
                        s
                    ))
                }
            } else {
                Err("Expected string".to_string())
            }
        },
    }
}

/// Normalize an engine type to the API form: "ActiveMQ" -> "ACTIVEMQ"
pub fn normalize_engine_type(s: &str) -> String {
    s.to_ascii_uppercase()
}

/// Declared engine type in the spelling the API reports back
pub fn normalize_engine_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(normalize_engine_type(s)),
        other => other.clone(),
    }
}

/// RFC 3339 timestamp in the UTC `Z` form AWS returns
pub fn normalize_rfc3339(value: &Value) -> Value {
    use aws_smithy_types::DateTime;
    use aws_smithy_types::date_time::Format;

    match value {
        Value::String(s) => DateTime::from_str(s, Format::DateTime)
            .ok()
            .and_then(|t| t.fmt(Format::DateTime).ok())
            .map(Value::String)
            .unwrap_or_else(|| value.clone()),
        other => other.clone(),
    }
}

/// Time of day in 24-hour HH:MM form
pub fn time_of_day() -> AttributeType {
    types::string_matching(r"([01][0-9]|2[0-3]):[0-5][0-9]")
}

pub fn day_of_week() -> AttributeType {
    types::enumeration(&[
        "MONDAY",
        "TUESDAY",
        "WEDNESDAY",
        "THURSDAY",
        "FRIDAY",
        "SATURDAY",
        "SUNDAY",
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_type_is_case_insensitive() {
        let t = engine_type();
        assert!(t.validate(&Value::from("ActiveMQ")).is_ok());
        assert!(t.validate(&Value::from("rabbitmq")).is_ok());
        assert!(t.validate(&Value::from("KAFKA")).is_err());
        assert_eq!(normalize_engine_type("RabbitMQ"), "RABBITMQ");
    }

    #[test]
    fn iam_role_arn_validation() {
        let t = iam_role_arn();
        assert!(
            t.validate(&Value::from("arn:aws:iam::123456789012:role/appconfig"))
                .is_ok()
        );
        assert!(
            t.validate(&Value::from("arn:aws:iam::123456789012:user/bob"))
                .is_err()
        );
        assert!(t.validate(&Value::from("role/appconfig")).is_err());
    }

    #[test]
    fn rfc3339_validation() {
        let t = rfc3339();
        assert!(t.validate(&Value::from("2024-05-01T10:00:00Z")).is_ok());
        assert!(t.validate(&Value::from("2024-05-01 10:00")).is_err());
    }

    #[test]
    fn rfc3339_normalizes_to_utc() {
        assert_eq!(
            normalize_rfc3339(&Value::from("2024-05-01T10:00:00+00:00")),
            Value::from("2024-05-01T10:00:00Z")
        );
        assert_eq!(
            normalize_rfc3339(&Value::from("2024-05-01T12:00:00+02:00")),
            Value::from("2024-05-01T10:00:00Z")
        );
        assert_eq!(normalize_rfc3339(&Value::from("soon")), Value::from("soon"));
    }

    #[test]
    fn time_of_day_validation() {
        let t = time_of_day();
        assert!(t.validate(&Value::from("02:30")).is_ok());
        assert!(t.validate(&Value::from("24:00")).is_err());
        assert!(t.validate(&Value::from("2:30")).is_err());
    }

    #[test]
    fn tag_attributes_mark_tags_all_computed() {
        let [tags, tags_all] = tag_attributes();
        assert!(!tags.computed);
        assert!(tags_all.computed);
    }
}

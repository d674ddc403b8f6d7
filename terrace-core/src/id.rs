//! Composite identifiers
//!
//! Many remote objects are addressed by more than one API parameter
//! (an environment needs both its own ID and its application's ID). These
//! are joined into one opaque identifier with a separator and split again
//! before each API call.

use crate::provider::{ProviderError, ProviderResult};

/// Join identifier parts with a separator
pub fn format_id<S: AsRef<str>>(parts: &[S], separator: &str) -> String {
    parts
        .iter()
        .map(|p| p.as_ref())
        .collect::<Vec<_>>()
        .join(separator)
}

/// Split an identifier into exactly `arity` non-empty parts
///
/// `shape` describes the expected layout for error messages,
/// e.g. `"EnvironmentID:ApplicationID"`.
pub fn parse_id(
    id: &str,
    separator: &str,
    arity: usize,
    shape: &str,
) -> ProviderResult<Vec<String>> {
    let parts: Vec<&str> = id.split(separator).collect();
    if parts.len() != arity || parts.iter().any(|p| p.is_empty()) {
        return Err(ProviderError::invalid_id(format!(
            "unexpected format for ID ({}), expected {}",
            id, shape
        )));
    }
    Ok(parts.into_iter().map(String::from).collect())
}

/// Split a two-part identifier
pub fn parse_pair(id: &str, separator: &str, shape: &str) -> ProviderResult<(String, String)> {
    let mut parts = parse_id(id, separator, 2, shape)?.into_iter();
    match (parts.next(), parts.next()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(ProviderError::invalid_id(format!(
            "unexpected format for ID ({}), expected {}",
            id, shape
        ))),
    }
}

/// Split an identifier at the first separator only
///
/// The trailing part may itself contain the separator, as when a project
/// is referenced by ARN in `FeatureName:arn:aws:evidently:...`.
pub fn split_first(id: &str, separator: &str, shape: &str) -> ProviderResult<(String, String)> {
    match id.split_once(separator) {
        Some((head, tail)) if !head.is_empty() && !tail.is_empty() => {
            Ok((head.to_string(), tail.to_string()))
        }
        _ => Err(ProviderError::invalid_id(format!(
            "unexpected format for ID ({}), expected {}",
            id, shape
        ))),
    }
}

/// Parse one identifier component as an integer
pub fn parse_number(part: &str, id: &str, shape: &str) -> ProviderResult<i32> {
    part.parse::<i32>().map_err(|_| {
        ProviderError::invalid_id(format!(
            "unexpected format for ID ({}), expected {}: '{}' is not a number",
            id, shape, part
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ErrorKind;

    #[test]
    fn format_joins_parts() {
        assert_eq!(format_id(&["env1", "app1"], ":"), "env1:app1");
        assert_eq!(
            format_id(&["app1".to_string(), "env1".to_string(), "3".to_string()], "/"),
            "app1/env1/3"
        );
    }

    #[test]
    fn parse_splits_parts() {
        let parts = parse_id("app1/env1/3", "/", 3, "AppID/EnvID/Number").unwrap();
        assert_eq!(parts, vec!["app1", "env1", "3"]);
    }

    #[test]
    fn parse_rejects_wrong_arity() {
        let err = parse_id("app1/env1", "/", 3, "AppID/EnvID/Number").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidId);
        assert!(err.message.contains("AppID/EnvID/Number"));

        assert!(parse_id("a:b:c", ":", 2, "A:B").is_err());
    }

    #[test]
    fn parse_rejects_empty_parts() {
        assert!(parse_id(":app1", ":", 2, "EnvID:AppID").is_err());
        assert!(parse_id("env1:", ":", 2, "EnvID:AppID").is_err());
        assert!(parse_id("", ":", 1, "ID").is_err());
    }

    #[test]
    fn parse_pair_returns_tuple() {
        let (env, app) = parse_pair("env1:app1", ":", "EnvID:AppID").unwrap();
        assert_eq!(env, "env1");
        assert_eq!(app, "app1");
    }

    #[test]
    fn split_first_keeps_arn_intact() {
        let (feature, project) = split_first(
            "feature1:arn:aws:evidently:us-east-1:123456789012:project/p",
            ":",
            "FeatureName:ProjectNameOrARN",
        )
        .unwrap();
        assert_eq!(feature, "feature1");
        assert_eq!(project, "arn:aws:evidently:us-east-1:123456789012:project/p");

        let (feature, project) = split_first("feature1:p", ":", "F:P").unwrap();
        assert_eq!((feature.as_str(), project.as_str()), ("feature1", "p"));

        assert!(split_first("feature1", ":", "F:P").is_err());
        assert!(split_first(":p", ":", "F:P").is_err());
    }

    #[test]
    fn parse_number_rejects_text() {
        assert_eq!(parse_number("12", "a/b/12", "A/B/N").unwrap(), 12);
        let err = parse_number("x", "a/b/x", "A/B/N").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidId);
    }
}

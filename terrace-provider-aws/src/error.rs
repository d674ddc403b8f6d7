//! Translation of SDK errors into provider errors
//!
//! Every AWS service reports a missing object with its own error code.
//! Reads turn those into "not found" so callers can drop the resource from
//! state, and deletes treat them as success.

use std::error::Error;
use std::fmt::{Debug, Display};

use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_types::error::display::DisplayErrorContext;
use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use terrace_core::provider::{ErrorKind, ProviderError, ProviderResult};

/// Error codes that mean the addressed object does not exist
const NOT_FOUND_CODES: &[&str] = &[
    "ResourceNotFoundException",
    "NotFoundException",
    "NotFound",
];

/// Returns true if the SDK error reports a missing object
pub(crate) fn is_not_found<E, R>(err: &SdkError<E, R>) -> bool
where
    E: ProvideErrorMetadata,
{
    is_not_found_code(err.code())
}

pub(crate) fn is_not_found_code(code: Option<&str>) -> bool {
    code.is_some_and(|c| NOT_FOUND_CODES.contains(&c))
}

/// Wrap an SDK error with a context message such as
/// `"reading AppConfig Application (abc123)"`
pub(crate) fn sdk_error<E, R>(context: impl Display, err: SdkError<E, R>) -> ProviderError
where
    E: ProvideErrorMetadata + Error + Send + Sync + 'static,
    R: Debug + Send + Sync + 'static,
{
    let kind = if is_not_found(&err) {
        ErrorKind::NotFound
    } else {
        ErrorKind::Other
    };
    ProviderError::new(format!("{}: {}", context, DisplayErrorContext(&err)))
        .with_kind(kind)
        .with_cause(err)
}

/// Result of a read call, with "not found" turned into `None`
pub(crate) fn found<T, E, R>(
    result: Result<T, SdkError<E, R>>,
    context: impl Display,
) -> ProviderResult<Option<T>>
where
    E: ProvideErrorMetadata + Error + Send + Sync + 'static,
    R: Debug + Send + Sync + 'static,
{
    match result {
        Ok(output) => Ok(Some(output)),
        Err(err) if is_not_found(&err) => {
            log::debug!("{}: not found", context);
            Ok(None)
        }
        Err(err) => Err(sdk_error(context, err)),
    }
}

/// Result of a delete call; deleting something already gone succeeds
pub(crate) fn deleted<T, E, R>(
    result: Result<T, SdkError<E, R>>,
    context: impl Display,
) -> ProviderResult<()>
where
    E: ProvideErrorMetadata + Error + Send + Sync + 'static,
    R: Debug + Send + Sync + 'static,
{
    match result {
        Ok(_) => Ok(()),
        Err(err) if is_not_found(&err) => {
            log::info!("{}: already deleted", context);
            Ok(())
        }
        Err(err) => Err(sdk_error(context, err)),
    }
}

/// Error for a required member missing from an API response
pub(crate) fn missing(context: impl Display, member: &str) -> ProviderError {
    ProviderError::empty_result(format!("{}: response has no {}", context, member))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_codes() {
        assert!(is_not_found_code(Some("ResourceNotFoundException")));
        assert!(is_not_found_code(Some("NotFoundException")));
        assert!(!is_not_found_code(Some("ConflictException")));
        assert!(!is_not_found_code(Some("AccessDeniedException")));
        assert!(!is_not_found_code(None));
    }

    #[test]
    fn missing_member_is_empty_result() {
        let err = missing("creating Evidently Project (p)", "project");
        assert_eq!(err.kind, ErrorKind::EmptyResult);
        assert!(err.message.contains("response has no project"));
    }
}

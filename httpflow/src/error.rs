//! Error types for the flow model.
//!
//! - [`FilterError`]: A filter expression failed to compile
//! - [`StateError`]: A snapshot could not be restored
//! - [`AddressError`]: A host/port could not be normalized
//! - [`Error`]: Umbrella type for callers that mix the above

use httpflow_core::CodecError;

/// Filter compilation error.
///
/// Distinct from a filter that compiled and simply did not match.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid filter expression {expr:?}: {reason}")]
pub struct FilterError {
    pub expr: String,
    pub reason: String,
}

impl FilterError {
    pub fn new<E: Into<String>, R: Into<String>>(expr: E, reason: R) -> Self {
        Self {
            expr: expr.into(),
            reason: reason.into(),
        }
    }
}

/// Snapshot restore errors.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    /// The snapshot is not an object.
    #[error("state must be an object, got {0}")]
    NotAnObject(&'static str),

    /// A non-nullable field was null or absent.
    #[error("missing value for field `{0}`")]
    MissingField(&'static str),

    /// A field held a value of the wrong shape.
    #[error("field `{field}` expected {expected}")]
    TypeMismatch {
        field: &'static str,
        expected: &'static str,
    },

    /// A field had the right shape but an unusable value.
    #[error("field `{field}` is invalid: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    /// The snapshot describes a different kind of flow.
    #[error("expected flow type {expected:?}, found {found:?}")]
    KindMismatch {
        expected: &'static str,
        found: String,
    },
}

/// Address normalization errors.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("missing port in address {0:?}")]
    MissingPort(String),

    #[error("invalid port in address {0:?}")]
    InvalidPort(String),

    #[error("empty host in address {0:?}")]
    EmptyHost(String),
}

/// Umbrella error for the flow model.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Address(#[from] AddressError),

    /// A replacement pattern failed to compile.
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_error_display() {
        let err = FilterError::new("~invalid[[[", "unbalanced bracket");
        assert_eq!(
            err.to_string(),
            "invalid filter expression \"~invalid[[[\": unbalanced bracket"
        );
    }

    #[test]
    fn test_state_error_display() {
        assert_eq!(
            StateError::MissingField("status_code").to_string(),
            "missing value for field `status_code`"
        );
        assert_eq!(
            StateError::TypeMismatch {
                field: "port",
                expected: "an integer",
            }
            .to_string(),
            "field `port` expected an integer"
        );
        assert_eq!(
            StateError::KindMismatch {
                expected: "http",
                found: "tcp".into(),
            }
            .to_string(),
            "expected flow type \"http\", found \"tcp\""
        );
    }

    #[test]
    fn test_error_from_conversions() {
        let err: Error = FilterError::new("~x", "bad").into();
        assert!(matches!(err, Error::Filter(_)));

        let err: Error = StateError::MissingField("host").into();
        assert!(matches!(err, Error::State(_)));

        let err: Error = CodecError::Unsupported("lz4".into()).into();
        assert_eq!(err.to_string(), "unsupported content encoding: lz4");
    }
}

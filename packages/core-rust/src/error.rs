//! Error types for parsing addresses, versions and filters.

/// Errors from parsing a version token or a version range.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionError {
    #[error("invalid version segment '{segment}' in '{input}'")]
    InvalidSegment { input: String, segment: String },
    #[error("invalid version range '{input}': {reason}")]
    InvalidRange { input: String, reason: &'static str },
}

/// Errors from parsing an operation address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("operation address '{input}' has an empty path")]
    EmptyPath { input: String },
    #[error("operation address '{input}' has an invalid version: {source}")]
    Version {
        input: String,
        #[source]
        source: VersionError,
    },
}

/// Errors from building an operation filter out of caller input.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("operation filter must not be empty")]
    Empty,
    #[error("invalid operation filter '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Errors from decoding a bus message into a typed protocol message.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("expected a '{expected}' message, got '{actual}'")]
    WrongKind { expected: &'static str, actual: String },
    #[error("message is missing required field '{0}'")]
    MissingField(&'static str),
    #[error("malformed JSON in field '{field}': {source}")]
    Json {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Version(#[from] VersionError),
}

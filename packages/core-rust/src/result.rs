//! Outcome of an operation execution.

use serde::{Deserialize, Serialize};

use crate::types::Properties;

/// Standard numeric return codes carried by failure results.
///
/// Operation-specific codes are free to use any other value.
pub mod return_codes {
    pub const OK: i64 = 0;
    pub const EMPTY: i64 = -1;
    pub const BUSY: i64 = -2;
    pub const USAGE: i64 = -12;
    pub const ACCESS_DENIED: i64 = -401;
    pub const NOT_FOUND: i64 = -404;
    pub const TIMEOUT: i64 = -408;
    pub const INTERNAL_ERROR: i64 = -500;
}

/// Classification of a failure result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NotFound,
    AccessDenied,
    Usage,
    Timeout,
    InternalError,
    /// Operation-specific code surfaced verbatim.
    Domain(i64),
}

impl FailureKind {
    /// Maps a return code onto its standard kind.
    #[must_use]
    pub fn from_code(code: i64) -> Self {
        match code {
            return_codes::NOT_FOUND => Self::NotFound,
            return_codes::ACCESS_DENIED => Self::AccessDenied,
            return_codes::USAGE => Self::Usage,
            return_codes::TIMEOUT => Self::Timeout,
            return_codes::INTERNAL_ERROR => Self::InternalError,
            other => Self::Domain(other),
        }
    }

    #[must_use]
    pub fn code(self) -> i64 {
        match self {
            Self::NotFound => return_codes::NOT_FOUND,
            Self::AccessDenied => return_codes::ACCESS_DENIED,
            Self::Usage => return_codes::USAGE,
            Self::Timeout => return_codes::TIMEOUT,
            Self::InternalError => return_codes::INTERNAL_ERROR,
            Self::Domain(code) => code,
        }
    }
}

/// Tagged outcome of executing an operation.
///
/// Serializes with an internal `"status"` tag so it can be embedded in bus
/// replies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ExecutionResult {
    Success {
        message: String,
        #[serde(default)]
        values: Properties,
    },
    Failure {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        caption: Option<String>,
        return_code: i64,
    },
}

impl ExecutionResult {
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self::Success {
            message: message.into(),
            values: Properties::new(),
        }
    }

    /// Success carrying key/value pairs.
    #[must_use]
    pub fn success_with<K, V, I>(message: impl Into<String>, values: I) -> Self
    where
        K: Into<String>,
        V: Into<serde_json::Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::Success {
            message: message.into(),
            values: values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    #[must_use]
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
            caption: None,
            return_code: kind.code(),
        }
    }

    /// Failure with an operation-specific return code and optional caption.
    #[must_use]
    pub fn domain(return_code: i64, message: impl Into<String>, caption: Option<String>) -> Self {
        Self::Failure {
            message: message.into(),
            caption,
            return_code,
        }
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::failure(FailureKind::NotFound, message)
    }

    #[must_use]
    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::failure(FailureKind::AccessDenied, message)
    }

    #[must_use]
    pub fn usage(message: impl Into<String>) -> Self {
        Self::failure(FailureKind::Usage, message)
    }

    #[must_use]
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::failure(FailureKind::InternalError, message)
    }

    #[must_use]
    pub fn is_successful(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Success { message, .. } | Self::Failure { message, .. } => message,
        }
    }

    /// `OK` for successes, the carried code otherwise.
    #[must_use]
    pub fn return_code(&self) -> i64 {
        match self {
            Self::Success { .. } => return_codes::OK,
            Self::Failure { return_code, .. } => *return_code,
        }
    }

    #[must_use]
    pub fn caption(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { caption, .. } => caption.as_deref(),
        }
    }

    /// `None` for successes.
    #[must_use]
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { return_code, .. } => Some(FailureKind::from_code(*return_code)),
        }
    }

    /// Success payload; `None` for failures.
    #[must_use]
    pub fn values(&self) -> Option<&Properties> {
        match self {
            Self::Success { values, .. } => Some(values),
            Self::Failure { .. } => None,
        }
    }
}

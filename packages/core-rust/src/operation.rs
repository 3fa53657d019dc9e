//! Contract for invocable operations.

use async_trait::async_trait;

use crate::context::TaskContext;
use crate::descriptor::OperationDescription;
use crate::result::ExecutionResult;

/// Failure raised by an operation body.
///
/// `Domain` failures carry an operation-specific code and are surfaced to
/// the caller verbatim; anything else becomes an internal error result.
#[derive(Debug, thiserror::Error)]
pub enum OperationFailure {
    #[error("{message} (rc={code})")]
    Domain {
        code: i64,
        message: String,
        caption: Option<String>,
    },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OperationFailure {
    /// Shorthand for a domain failure.
    #[must_use]
    pub fn domain(code: i64, message: impl Into<String>, caption: Option<&str>) -> Self {
        Self::Domain {
            code,
            message: message.into(),
            caption: caption.map(str::to_string),
        }
    }
}

/// A named, versioned unit of invocable behavior.
///
/// Implementations are registered with the local registry by the host
/// environment; the registry never discovers them on its own.
#[async_trait]
pub trait Operation: Send + Sync {
    /// Describes the operation: path, version, title, form and tag parameters.
    fn description(&self) -> OperationDescription;

    /// Runs the operation.
    async fn execute(&self, ctx: &TaskContext) -> Result<ExecutionResult, OperationFailure>;
}

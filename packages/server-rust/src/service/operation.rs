//! Dispatch-level types: the error taxonomy and the call envelope used by
//! the inbound execution pipeline.

use sop_core::{ExecutionResult, FilterError, OperationFilter, Properties};

/// Origin of an execution request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerOrigin {
    /// Issued by code on this node.
    Local,
    /// Forwarded from a peer over the bus.
    Forwarded,
}

/// Execution request flowing through the inbound tower pipeline.
#[derive(Debug, Clone)]
pub struct ExecuteCall {
    pub call_id: u64,
    pub origin: CallerOrigin,
    /// Queue of the peer that sent the call, if forwarded.
    pub caller_queue: Option<String>,
    pub filter: OperationFilter,
    pub parameters: Properties,
}

impl ExecuteCall {
    #[must_use]
    pub fn local(call_id: u64, filter: OperationFilter, parameters: Properties) -> Self {
        Self {
            call_id,
            origin: CallerOrigin::Local,
            caller_queue: None,
            filter,
            parameters,
        }
    }

    #[must_use]
    pub fn forwarded(
        call_id: u64,
        caller_queue: impl Into<String>,
        filter: OperationFilter,
        parameters: Properties,
    ) -> Self {
        Self {
            call_id,
            origin: CallerOrigin::Forwarded,
            caller_queue: Some(caller_queue.into()),
            filter,
            parameters,
        }
    }
}

/// Errors raised by providers and the dispatch facade.
///
/// Only `NotFound` escapes [`OperationApi`](super::OperationApi) execution;
/// the rest are folded into failure results via
/// [`OperationError::into_result`].
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("usage: {0}")]
    Usage(String),
    #[error("too many concurrent executions, try again later")]
    Overloaded,
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl OperationError {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Converts the error into the equivalent failure result.
    #[must_use]
    pub fn into_result(self) -> ExecutionResult {
        match self {
            Self::NotFound(msg) => ExecutionResult::not_found(msg),
            Self::AccessDenied(msg) => ExecutionResult::access_denied(msg),
            Self::Usage(msg) => ExecutionResult::usage(msg),
            Self::Overloaded => ExecutionResult::domain(
                sop_core::return_codes::BUSY,
                "too many concurrent executions",
                Some("busy".to_string()),
            ),
            Self::Internal(e) => ExecutionResult::internal_error(format!("{e:#}")),
        }
    }
}

impl From<FilterError> for OperationError {
    fn from(e: FilterError) -> Self {
        Self::Usage(e.to_string())
    }
}

//! Tracing middleware for inbound executions.
//!
//! Wraps each call in an `execute` span recording duration and outcome.
//! Execution counters are recorded by the facade itself.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use sop_core::ExecutionResult;
use tower::{Layer, Service};
use tracing::{info_span, Instrument};

use crate::service::operation::{CallerOrigin, ExecuteCall, OperationError};

// ---------------------------------------------------------------------------
// MetricsLayer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MetricsLayer;

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService { inner }
    }
}

// ---------------------------------------------------------------------------
// MetricsService
// ---------------------------------------------------------------------------

/// Service wrapper that records call duration and outcome in tracing spans.
#[derive(Debug, Clone)]
pub struct MetricsService<S> {
    inner: S,
}

fn outcome_label(result: &Result<ExecutionResult, OperationError>) -> &'static str {
    match result {
        Ok(r) if r.is_successful() => "success",
        Ok(_) => "failure",
        Err(OperationError::NotFound(_)) => "not_found",
        Err(OperationError::Overloaded) => "overloaded",
        Err(_) => "error",
    }
}

impl<S> Service<ExecuteCall> for MetricsService<S>
where
    S: Service<ExecuteCall, Response = ExecutionResult, Error = OperationError> + Send,
    S::Future: Send + 'static,
{
    type Response = ExecutionResult;
    type Error = OperationError;
    type Future = Pin<Box<dyn Future<Output = Result<ExecutionResult, OperationError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, call: ExecuteCall) -> Self::Future {
        let call_id = call.call_id;
        let origin = match call.origin {
            CallerOrigin::Local => "local",
            CallerOrigin::Forwarded => "forwarded",
        };
        let span = info_span!(
            "execute",
            call_id = call_id,
            pattern = %call.filter.pattern(),
            origin = origin,
            caller = call.caller_queue.as_deref().unwrap_or(""),
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        let fut = self.inner.call(call);

        Box::pin(
            async move {
                let start = Instant::now();
                let result = fut.await;

                #[allow(clippy::cast_possible_truncation)]
                let duration_ms = start.elapsed().as_millis() as u64;
                let outcome = outcome_label(&result);
                tracing::Span::current().record("duration_ms", duration_ms);
                tracing::Span::current().record("outcome", outcome);

                tracing::info!(call_id, duration_ms, outcome, "execution complete");

                result
            }
            .instrument(span),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

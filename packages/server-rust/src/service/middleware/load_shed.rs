//! Load shedding for inbound executions.
//!
//! A call takes an execution slot when it enters the stack and gives it back
//! when its future completes or is dropped. With no slot free the call is
//! refused on the spot with `OperationError::Overloaded`, which the peer
//! receives as a `BUSY` result.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use sop_core::ExecutionResult;
use tokio::sync::Semaphore;
use tower::{Layer, Service};
use tracing::warn;

use crate::service::operation::{ExecuteCall, OperationError};

type ShedFuture = Pin<Box<dyn Future<Output = Result<ExecutionResult, OperationError>> + Send>>;

// ---------------------------------------------------------------------------
// LoadShedLayer
// ---------------------------------------------------------------------------

/// Caps the number of executions in flight across every clone of the stack.
#[derive(Debug, Clone)]
pub struct LoadShedLayer {
    slots: Arc<Semaphore>,
}

impl LoadShedLayer {
    #[must_use]
    pub fn new(max_concurrent: u32) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(max_concurrent as usize)),
        }
    }

    /// Execution slots currently free.
    #[must_use]
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }
}

impl<S> Layer<S> for LoadShedLayer {
    type Service = LoadShedService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoadShedService {
            inner,
            slots: self.slots.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// LoadShedService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadShedService<S> {
    inner: S,
    slots: Arc<Semaphore>,
}

impl<S> Service<ExecuteCall> for LoadShedService<S>
where
    S: Service<ExecuteCall, Response = ExecutionResult, Error = OperationError> + Send,
    S::Future: Send + 'static,
{
    type Response = ExecutionResult;
    type Error = OperationError;
    type Future = ShedFuture;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, call: ExecuteCall) -> Self::Future {
        let Ok(slot) = self.slots.clone().try_acquire_owned() else {
            warn!(
                call_id = call.call_id,
                caller = call.caller_queue.as_deref().unwrap_or("local"),
                path = call.filter.pattern(),
                "execution shed, node overloaded"
            );
            metrics::counter!("sop_executions_shed_total").increment(1);
            return Box::pin(async { Err(OperationError::Overloaded) });
        };

        let pending = self.inner.call(call);
        Box::pin(async move {
            let outcome = pending.await;
            drop(slot);
            outcome
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

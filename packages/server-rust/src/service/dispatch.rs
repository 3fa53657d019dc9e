//! Innermost pipeline service: hands an [`ExecuteCall`] to the operation facade.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use sop_core::ExecutionResult;
use tower::Service;

use super::aggregator::OperationApi;
use super::operation::{ExecuteCall, OperationError};

/// Tower service executing calls through [`OperationApi::execute`].
#[derive(Clone)]
pub struct DispatchService {
    api: Arc<OperationApi>,
}

impl DispatchService {
    #[must_use]
    pub fn new(api: Arc<OperationApi>) -> Self {
        Self { api }
    }
}

impl Service<ExecuteCall> for DispatchService {
    type Response = ExecutionResult;
    type Error = OperationError;
    type Future = Pin<Box<dyn Future<Output = Result<ExecutionResult, OperationError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, call: ExecuteCall) -> Self::Future {
        let api = Arc::clone(&self.api);
        Box::pin(async move { api.execute(&call.filter, &call.parameters).await })
    }
}

//! Inbound side of remote execution.
//!
//! [`ExecuteChannel`] listens on this node's queue topic, lets an
//! [`InboundInterceptor`] vet each `execute` request, runs admitted calls
//! through the execution pipeline and publishes the `result` reply.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use sop_core::messages::{ExecuteReply, ExecuteRequest};
use sop_core::{
    AccessApi, Account, BusHandler, BusMessage, ExecutionResult, MessageBus, OperationFilter,
    SubscriptionId,
};
use tower::ServiceExt;
use tracing::{debug, warn};

use crate::service::local::EXECUTE_ACTION;
use crate::service::middleware::ExecutePipeline;
use crate::service::operation::ExecuteCall;

/// Resource type checked for executions arriving from peers.
pub const REMOTE_RESOURCE: &str = "remote.operation";

/// Gate applied to every inbound request before it reaches the facade.
pub trait InboundInterceptor: Send + Sync {
    /// Admits the request, or returns the failure to reply with.
    ///
    /// # Errors
    ///
    /// Returns the failure result when the request must be rejected.
    fn intercept(&self, request: &ExecuteRequest) -> Result<(), ExecutionResult>;
}

// ---------------------------------------------------------------------------
// AccessInterceptor
// ---------------------------------------------------------------------------

/// Checks the requesting account against the authorization service.
pub struct AccessInterceptor {
    access: Option<Arc<dyn AccessApi>>,
    relaxed: bool,
}

impl AccessInterceptor {
    #[must_use]
    pub fn new(access: Option<Arc<dyn AccessApi>>, relaxed: bool) -> Self {
        Self { access, relaxed }
    }
}

impl InboundInterceptor for AccessInterceptor {
    fn intercept(&self, request: &ExecuteRequest) -> Result<(), ExecutionResult> {
        let Some(access) = &self.access else {
            if self.relaxed {
                return Ok(());
            }
            return Err(ExecutionResult::access_denied(format!(
                "remote access to {} denied",
                request.path
            )));
        };
        let account = request
            .account
            .as_deref()
            .map_or_else(Account::guest, Account::new);
        match access.has_resource_access(&account, REMOTE_RESOURCE, &request.path, EXECUTE_ACTION, "") {
            Ok(true) => Ok(()),
            Ok(false) => {
                debug!(path = %request.path, account = %account.id, from = %request.source_queue, "remote access denied");
                Err(ExecutionResult::access_denied(format!(
                    "remote access to {} denied for {}",
                    request.path, account.id
                )))
            }
            Err(e) => {
                warn!(path = %request.path, error = %e, "remote access check failed");
                Err(ExecutionResult::access_denied(format!(
                    "remote access check failed for {}",
                    request.path
                )))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ExecuteChannel
// ---------------------------------------------------------------------------

/// Serves `execute` requests addressed to this node's queue.
pub struct ExecuteChannel {
    queue: String,
    bus: Arc<dyn MessageBus>,
    pipeline: Mutex<ExecutePipeline>,
    interceptor: Option<Arc<dyn InboundInterceptor>>,
    next_call_id: AtomicU64,
    subscription: Mutex<Option<SubscriptionId>>,
}

impl ExecuteChannel {
    #[must_use]
    pub fn new(
        queue: impl Into<String>,
        bus: Arc<dyn MessageBus>,
        pipeline: ExecutePipeline,
        interceptor: Option<Arc<dyn InboundInterceptor>>,
    ) -> Self {
        Self {
            queue: queue.into(),
            bus,
            pipeline: Mutex::new(pipeline),
            interceptor,
            next_call_id: AtomicU64::new(1),
            subscription: Mutex::new(None),
        }
    }

    /// Subscribes to the node's queue topic. Calling twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the bus rejects the subscription.
    pub fn start(self: &Arc<Self>) -> anyhow::Result<()> {
        let mut subscription = self.subscription.lock();
        if subscription.is_none() {
            let handler: Arc<dyn BusHandler> = self.clone();
            *subscription = Some(self.bus.subscribe(&self.queue, handler)?);
        }
        Ok(())
    }

    pub fn stop(&self) {
        if let Some(id) = self.subscription.lock().take() {
            self.bus.unsubscribe(id);
        }
    }

    async fn run(&self, request: ExecuteRequest) -> ExecutionResult {
        if let Some(interceptor) = &self.interceptor {
            if let Err(denied) = interceptor.intercept(&request) {
                return denied;
            }
        }
        let call = ExecuteCall::forwarded(
            self.next_call_id.fetch_add(1, Ordering::Relaxed),
            request.source_queue,
            OperationFilter::exact(&request.path, &request.version),
            request.parameters,
        );
        let pipeline = self.pipeline.lock().clone();
        pipeline
            .oneshot(call)
            .await
            .unwrap_or_else(|e| e.into_result())
    }
}

#[async_trait]
impl BusHandler for ExecuteChannel {
    async fn on_message(&self, message: BusMessage) {
        let request = match ExecuteRequest::from_message(&message) {
            Ok(request) => request,
            Err(e) => {
                warn!(queue = %self.queue, error = %e, "malformed execute request dropped");
                return;
            }
        };
        let correlation = request.correlation.clone();
        let reply_to = request.reply_to.clone();

        let result = self.run(request).await;

        let reply = ExecuteReply { correlation, result };
        let outcome = match reply.to_message() {
            Ok(msg) => self.bus.publish(&reply_to, msg).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = outcome {
            warn!(reply_to = %reply_to, error = %e, "execution reply not delivered");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Request/reply execution of remote operations over the bus.
//!
//! [`BusInvoker`] publishes an `execute` message on the owning peer's queue
//! topic and waits for the `result` message carrying the same correlation
//! id on this node's reply topic. The wait is unbounded unless
//! `reply_timeout` is configured.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use sop_core::messages::{ExecuteReply, ExecuteRequest};
use sop_core::{
    AccessApi, BusHandler, BusMessage, ExecutionResult, FailureKind, MessageBus,
    OperationDescriptor, Properties, SubscriptionId,
};
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::service::config::FederationConfig;
use crate::service::operation::OperationError;

/// Transport route for executing remote descriptors.
#[async_trait]
pub trait RemoteInvoker: Send + Sync {
    /// Runs `descriptor` on the peer that announced it and returns its result.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::NotFound`] if the descriptor names no peer,
    /// or [`OperationError::Internal`] if the request cannot be sent.
    async fn invoke(
        &self,
        descriptor: &OperationDescriptor,
        properties: &Properties,
    ) -> Result<ExecutionResult, OperationError>;
}

// ---------------------------------------------------------------------------
// BusInvoker
// ---------------------------------------------------------------------------

/// [`RemoteInvoker`] backed by the message bus.
pub struct BusInvoker {
    bus: Arc<dyn MessageBus>,
    source_queue: String,
    reply_topic: String,
    timeout: Option<Duration>,
    access: Option<Arc<dyn AccessApi>>,
    pending: DashMap<String, oneshot::Sender<ExecutionResult>>,
    subscription: Mutex<Option<SubscriptionId>>,
}

impl BusInvoker {
    #[must_use]
    pub fn new(
        config: &FederationConfig,
        bus: Arc<dyn MessageBus>,
        access: Option<Arc<dyn AccessApi>>,
    ) -> Self {
        Self {
            bus,
            source_queue: config.queue.clone(),
            reply_topic: config.reply_topic.clone(),
            timeout: config.reply_timeout,
            access,
            pending: DashMap::new(),
            subscription: Mutex::new(None),
        }
    }

    /// Subscribes to the reply topic. Calling twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the bus rejects the subscription.
    pub fn start(self: &Arc<Self>) -> anyhow::Result<()> {
        let mut subscription = self.subscription.lock();
        if subscription.is_none() {
            let handler: Arc<dyn BusHandler> = self.clone();
            *subscription = Some(self.bus.subscribe(&self.reply_topic, handler)?);
        }
        Ok(())
    }

    pub fn stop(&self) {
        if let Some(id) = self.subscription.lock().take() {
            self.bus.unsubscribe(id);
        }
        self.pending.clear();
    }

    /// Requests still waiting for a reply.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[async_trait]
impl RemoteInvoker for BusInvoker {
    async fn invoke(
        &self,
        descriptor: &OperationDescriptor,
        properties: &Properties,
    ) -> Result<ExecutionResult, OperationError> {
        let address = descriptor.address();
        if address.part_count() == 0 {
            return Err(OperationError::not_found(format!("no route to {address}")));
        }
        let queue = address.part(0).to_string();

        let request = ExecuteRequest {
            correlation: Uuid::new_v4().to_string(),
            reply_to: self.reply_topic.clone(),
            source_queue: self.source_queue.clone(),
            path: descriptor.path().to_string(),
            version: descriptor.version().clone(),
            account: self.access.as_ref().map(|a| a.current_account().id),
            parameters: properties.clone(),
        };
        let correlation = request.correlation.clone();

        let (tx, rx) = oneshot::channel();
        let _entry = PendingEntry::register(&self.pending, correlation.clone(), tx);
        debug!(queue = %queue, path = %request.path, correlation = %correlation, "forwarding execution");

        if let Err(e) = self.bus.publish(&queue, request.to_message()).await {
            return Err(OperationError::Internal(e.context(format!("publish to {queue}"))));
        }

        let reply = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(reply) => reply,
                Err(_elapsed) => {
                    warn!(queue = %queue, path = %descriptor.path(), "remote execution timed out");
                    return Ok(ExecutionResult::failure(
                        FailureKind::Timeout,
                        format!("no reply from {queue} within {}ms", limit.as_millis()),
                    ));
                }
            },
            None => rx.await,
        };
        reply.map_err(|_| {
            OperationError::Internal(anyhow::anyhow!("reply channel for {correlation} closed"))
        })
    }
}

/// Slot in the pending map, released when the waiting call finishes or is
/// dropped by its caller.
struct PendingEntry<'a> {
    pending: &'a DashMap<String, oneshot::Sender<ExecutionResult>>,
    correlation: String,
}

impl<'a> PendingEntry<'a> {
    fn register(
        pending: &'a DashMap<String, oneshot::Sender<ExecutionResult>>,
        correlation: String,
        tx: oneshot::Sender<ExecutionResult>,
    ) -> Self {
        pending.insert(correlation.clone(), tx);
        Self { pending, correlation }
    }
}

impl Drop for PendingEntry<'_> {
    fn drop(&mut self) {
        self.pending.remove(&self.correlation);
    }
}

#[async_trait]
impl BusHandler for BusInvoker {
    async fn on_message(&self, message: BusMessage) {
        let reply = match ExecuteReply::from_message(&message) {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "malformed execution reply dropped");
                return;
            }
        };
        match self.pending.remove(&reply.correlation) {
            Some((_, tx)) => {
                let _ = tx.send(reply.result);
            }
            None => debug!(correlation = %reply.correlation, "reply without pending request"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Announce/listen loop on the shared registry topic.
//!
//! Publishes this node's public catalog as `operations` messages, answers
//! `request` messages from peers and feeds peers' announcements into the
//! [`RemoteCatalog`]. Runs independently of caller-driven execution.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use sop_core::messages::{
    operations_message, read_announcements, registry_request, OperationAnnouncement,
    PROPERTY_CONNECTION,
};
use sop_core::{BusHandler, BusMessage, MessageBus, MessageKind, OperationFilter, SubscriptionId};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::catalog::RemoteCatalog;
use crate::service::aggregator::OperationApi;
use crate::service::config::FederationConfig;

/// Catalog exchange over the registry topic.
pub struct FederationChannel {
    config: FederationConfig,
    bus: Arc<dyn MessageBus>,
    catalog: Arc<RemoteCatalog>,
    api: Weak<OperationApi>,
    last_request: Mutex<Option<Instant>>,
    subscription: Mutex<Option<SubscriptionId>>,
}

impl FederationChannel {
    #[must_use]
    pub fn new(
        config: FederationConfig,
        bus: Arc<dyn MessageBus>,
        catalog: Arc<RemoteCatalog>,
        api: Weak<OperationApi>,
    ) -> Self {
        Self {
            config,
            bus,
            catalog,
            api,
            last_request: Mutex::new(None),
            subscription: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn config(&self) -> &FederationConfig {
        &self.config
    }

    #[must_use]
    pub fn queue(&self) -> &str {
        &self.config.queue
    }

    #[must_use]
    pub fn catalog(&self) -> &Arc<RemoteCatalog> {
        &self.catalog
    }

    /// Subscribes to the registry topic. Calling twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the bus rejects the subscription.
    pub fn start(self: &Arc<Self>) -> anyhow::Result<()> {
        let mut subscription = self.subscription.lock();
        if subscription.is_some() {
            return Ok(());
        }
        let handler: Arc<dyn BusHandler> = self.clone();
        *subscription = Some(self.bus.subscribe(&self.config.topic, handler)?);
        info!(topic = %self.config.topic, queue = %self.config.queue, "federation channel started");
        Ok(())
    }

    pub fn stop(&self) {
        if let Some(id) = self.subscription.lock().take() {
            self.bus.unsubscribe(id);
            info!(queue = %self.config.queue, "federation channel stopped");
        }
    }

    /// Operations this node offers to peers: everything the facade knows
    /// except what the federation provider itself imported.
    #[must_use]
    pub fn public_operations(&self) -> Vec<OperationAnnouncement> {
        let Some(api) = self.api.upgrade() else {
            return Vec::new();
        };
        let mut unique = BTreeMap::new();
        for descriptor in api.find(&OperationFilter::any()) {
            if descriptor.provider() == self.config.provider_name {
                continue;
            }
            unique
                .entry(descriptor.registry_key())
                .or_insert_with(|| OperationAnnouncement::from_descriptor(&descriptor));
        }
        unique.into_values().collect()
    }

    /// Publishes the public catalog on the registry topic.
    ///
    /// # Errors
    ///
    /// Returns an error if the bus publish fails.
    pub async fn announce(&self) -> anyhow::Result<()> {
        let operations = self.public_operations();
        debug!(count = operations.len(), queue = %self.config.queue, "announcing operations");
        let msg = operations_message(&self.config.queue, &self.config.connection, &operations);
        self.bus.publish(&self.config.topic, msg).await
    }

    /// Asks every peer to re-announce.
    ///
    /// # Errors
    ///
    /// Returns an error if the bus publish fails.
    pub async fn request_announcements(&self) -> anyhow::Result<()> {
        self.bus
            .publish(&self.config.topic, registry_request(&self.config.queue))
            .await
    }

    /// Records a handled request; `false` if the last one is too recent.
    fn admit_request(&self) -> bool {
        let mut last = self.last_request.lock();
        let now = Instant::now();
        if let Some(previous) = *last {
            if now.duration_since(previous) < self.config.request_min_interval {
                return false;
            }
        }
        *last = Some(now);
        true
    }

    async fn handle_request(&self, from: &str) {
        if !self.admit_request() {
            debug!(from, "registry request rate limited");
            return;
        }
        if let Err(e) = self.announce().await {
            warn!(error = %e, "announce after registry request failed");
        }
    }

    fn handle_operations(&self, queue: &str, msg: &BusMessage) {
        let connection = msg
            .property(PROPERTY_CONNECTION)
            .unwrap_or(&self.config.connection);
        let announcements = read_announcements(msg);
        self.catalog.ingest(connection, queue, &announcements);
    }
}

#[async_trait]
impl BusHandler for FederationChannel {
    async fn on_message(&self, message: BusMessage) {
        let Some(queue) = message.queue() else {
            debug!(kind = ?message.type_name(), "registry message without queue dropped");
            return;
        };
        if queue == self.config.queue {
            return;
        }
        match message.kind() {
            Some(MessageKind::Request) => self.handle_request(queue).await,
            Some(MessageKind::Operations) => self.handle_operations(queue, &message),
            _ => debug!(kind = ?message.type_name(), "unexpected message on registry topic"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

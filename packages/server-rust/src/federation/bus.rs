//! In-process message bus.
//!
//! Delivers every published message to the current subscribers of its
//! topic, sequentially and before `publish` returns. Messages pass through
//! the MsgPack wire codec on the way, so handlers see exactly what a
//! byte-oriented transport would deliver.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use sop_core::{BusHandler, BusMessage, MessageBus, SubscriptionId};
use tracing::trace;

type Subscribers = Vec<(SubscriptionId, Arc<dyn BusHandler>)>;

/// Topic-based bus for nodes sharing one process.
#[derive(Default)]
pub struct LoopbackBus {
    next_id: AtomicU64,
    topics: DashMap<String, Subscribers>,
}

impl LoopbackBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscriptions on `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map_or(0, |subs| subs.len())
    }
}

#[async_trait]
impl MessageBus for LoopbackBus {
    async fn publish(&self, topic: &str, message: BusMessage) -> anyhow::Result<()> {
        let bytes = message.to_bytes()?;
        let handlers: Vec<Arc<dyn BusHandler>> = self
            .topics
            .get(topic)
            .map(|subs| subs.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();
        trace!(topic, subscribers = handlers.len(), bytes = bytes.len(), "publish");
        for handler in handlers {
            handler.on_message(BusMessage::from_bytes(&bytes)?).await;
        }
        Ok(())
    }

    fn subscribe(&self, topic: &str, handler: Arc<dyn BusHandler>) -> anyhow::Result<SubscriptionId> {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.topics
            .entry(topic.to_string())
            .or_default()
            .push((id, handler));
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        for mut subs in self.topics.iter_mut() {
            subs.retain(|(sid, _)| *sid != id);
        }
    }
}

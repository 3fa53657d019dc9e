use std::sync::Arc;

use async_trait::async_trait;

use crate::messages::BusMessage;
use crate::types::Account;

/// Authorization collaborator deciding who may execute what.
/// ACL expressions are opaque to this layer; only the implementation interprets them.
pub trait AccessApi: Send + Sync {
    /// Account the current call runs as.
    fn current_account(&self) -> Account;

    /// Returns `true` if `account` may perform `action` on the resource under `acl`.
    fn has_resource_access(
        &self,
        account: &Account,
        resource_type: &str,
        resource_path: &str,
        action: &str,
        acl: &str,
    ) -> anyhow::Result<bool>;

    /// Resolves the effective ACL for a resource, falling back to `default_acl`.
    fn resource_access_acl(
        &self,
        account: &Account,
        resource_type: &str,
        resource_path: &str,
        action: &str,
        default_acl: &str,
    ) -> anyhow::Result<String>;
}

/// Handle returned by [`MessageBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Receiver of bus messages for one subscription.
/// Invoked on a delivery task supplied by the transport.
#[async_trait]
pub trait BusHandler: Send + Sync {
    async fn on_message(&self, message: BusMessage);
}

/// Topic-based publish/subscribe transport with at-least-once, unordered delivery.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publishes `message` to every subscriber of `topic`.
    async fn publish(&self, topic: &str, message: BusMessage) -> anyhow::Result<()>;

    /// Registers `handler` for `topic`.
    fn subscribe(&self, topic: &str, handler: Arc<dyn BusHandler>) -> anyhow::Result<SubscriptionId>;

    /// Removes a subscription. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}

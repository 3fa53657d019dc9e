use std::time::Duration;

/// Node-level configuration for the operation layer.
///
/// Controls the local registry's authorization fallback, the federation
/// channel and the periodic synchronization interval.
#[derive(Debug, Clone)]
pub struct SopConfig {
    /// Unique identifier for this node (server ident).
    pub node_id: String,
    pub local: LocalConfig,
    pub federation: FederationConfig,
    /// Interval between `synchronize_all` runs in milliseconds.
    pub sync_interval_ms: u64,
}

impl SopConfig {
    /// Default configuration for `node_id`, with queue and reply topic derived from it.
    #[must_use]
    pub fn for_node(node_id: &str) -> Self {
        Self {
            node_id: node_id.to_string(),
            local: LocalConfig::default(),
            federation: FederationConfig::for_node(node_id),
            sync_interval_ms: 60_000,
        }
    }
}

impl Default for SopConfig {
    fn default() -> Self {
        Self::for_node("local")
    }
}

/// Settings for the local operations provider.
#[derive(Debug, Clone)]
pub struct LocalConfig {
    /// Allow execution when no authorization service is installed.
    pub relaxed: bool,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self { relaxed: true }
    }
}

/// Settings for the bus-backed federation provider and its channels.
#[derive(Debug, Clone)]
pub struct FederationConfig {
    /// Provider name remote descriptors are registered under.
    pub provider_name: String,
    /// Shared broadcast topic for `request`/`operations` messages.
    pub topic: String,
    /// This node's queue: source identifier for announcements and the
    /// topic inbound executions arrive on.
    pub queue: String,
    /// Bus connection name recorded in remote addresses.
    pub connection: String,
    /// Topic execution replies for this node arrive on.
    pub reply_topic: String,
    /// Minimum spacing between handled `request` messages.
    pub request_min_interval: Duration,
    /// Optional cap on how long a forwarded execution waits for its reply.
    /// `None` (the default) waits until the peer answers.
    pub reply_timeout: Option<Duration>,
    /// Gate inbound executions with the access interceptor.
    pub access_control: bool,
    /// Concurrent inbound executions before new ones are shed.
    pub max_concurrent_executions: u32,
}

impl FederationConfig {
    #[must_use]
    pub fn for_node(node_id: &str) -> Self {
        Self {
            provider_name: "jms".to_string(),
            topic: "sop.registry".to_string(),
            queue: format!("sop.operation.{node_id}"),
            connection: "sop".to_string(),
            reply_topic: format!("sop.reply.{node_id}"),
            request_min_interval: Duration::from_secs(10),
            reply_timeout: None,
            access_control: true,
            max_concurrent_executions: 64,
        }
    }
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self::for_node("local")
    }
}

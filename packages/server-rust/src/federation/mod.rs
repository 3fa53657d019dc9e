//! Catalog federation over a message bus.
//!
//! - [`catalog`]: remote descriptors with per-queue staleness sweep
//! - [`channel`]: `request`/`operations` exchange on the registry topic
//! - [`provider`]: the remote catalog as an [`OperationsProvider`](crate::service::OperationsProvider)
//! - [`invoker`]: outbound request/reply execution
//! - [`execute_channel`]: inbound execution with access interception
//! - [`bus`]: in-process loopback transport

pub mod bus;
pub mod catalog;
pub mod channel;
pub mod execute_channel;
pub mod invoker;
pub mod provider;

pub use bus::LoopbackBus;
pub use catalog::{IngestReport, RemoteCatalog, RemoteKey};
pub use channel::FederationChannel;
pub use execute_channel::{AccessInterceptor, ExecuteChannel, InboundInterceptor, REMOTE_RESOURCE};
pub use invoker::{BusInvoker, RemoteInvoker};
pub use provider::FederationProvider;

// ---------------------------------------------------------------------------
// Integration tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod integration_tests {
    use std::sync::Arc;

    use sop_core::{
        AccessApi, FailureKind, ManualClock, MessageBus, OperationAddress, OperationFilter,
        Properties,
    };

    use super::*;
    use crate::node::SopNode;
    use crate::service::SopConfig;
    use crate::testing::{Behavior, CountingOperation, StaticAccess};

    fn node(bus: &Arc<LoopbackBus>, id: &str, access: Option<Arc<dyn AccessApi>>) -> SopNode {
        SopNode::new(SopConfig::for_node(id), bus.clone(), access)
    }

    fn remote_only(api_node: &SopNode, pattern: &str) -> Vec<sop_core::OperationDescriptor> {
        api_node
            .api()
            .find(&OperationFilter::new(pattern).unwrap())
            .into_iter()
            .filter(|d| d.provider() == "jms")
            .collect()
    }

    #[tokio::test]
    async fn two_nodes_exchange_catalogs_and_execute() {
        let bus = Arc::new(LoopbackBus::new());
        let mut a = node(&bus, "a", None);
        let mut b = node(&bus, "b", None);
        let echo = CountingOperation::new("b.Echo", "1").shared();
        b.local().on_added(echo.clone(), None);

        a.start().await.unwrap();
        b.start().await.unwrap();

        let on_a = remote_only(&a, "b.Echo");
        assert_eq!(on_a.len(), 1);
        assert_eq!(on_a[0].address().to_string(), "jms://b.Echo:1/sop.operation.b/sop");
        assert_eq!(remote_only(&b, "sop.util.Ping").len(), 1);

        let mut params = Properties::new();
        params.insert("text".to_string(), "over the bus".into());
        let result = a
            .api()
            .execute(&OperationFilter::new("b.Echo").unwrap(), &params)
            .await
            .unwrap();
        assert_eq!(result.values().unwrap()["echo"], "over the bus");
        assert_eq!(echo.calls(), 1);

        a.stop().await;
        b.stop().await;
    }

    #[tokio::test]
    async fn remote_ping_answers_from_peer() {
        let bus = Arc::new(LoopbackBus::new());
        let mut a = node(&bus, "a", None);
        let mut b = node(&bus, "b", None);
        a.start().await.unwrap();
        b.start().await.unwrap();

        let remote_ping = remote_only(&a, "sop.util.Ping").remove(0);
        let result = a
            .api()
            .execute_descriptor(&remote_ping, &Properties::new())
            .await
            .unwrap();
        assert_eq!(result.values().unwrap()["ident"], "b");
    }

    #[tokio::test]
    async fn removed_operation_disappears_from_peer() {
        let bus = Arc::new(LoopbackBus::new());
        let clock = Arc::new(ManualClock::new(1_000));
        let mut a = SopNode::with_clock(SopConfig::for_node("a"), bus.clone(), None, clock.clone());
        let mut b = node(&bus, "b", None);
        let gone = CountingOperation::new("b.Gone", "1").shared();
        let description = sop_core::Operation::description(gone.as_ref());
        b.local().on_added(gone, None);

        a.start().await.unwrap();
        b.start().await.unwrap();
        assert_eq!(remote_only(&a, "b.*").len(), 1);

        b.local().on_removed(&description);
        clock.advance(60_000);
        b.channel().announce().await.unwrap();

        assert!(remote_only(&a, "b.*").is_empty());
        let ping = a
            .api()
            .describe(&OperationAddress::parse("jms://sop.util.Ping/sop.operation.b/sop").unwrap())
            .unwrap();
        assert_eq!(ping.last_updated(), Some(61_000));
    }

    #[tokio::test]
    async fn announcements_from_own_queue_change_nothing() {
        let bus = Arc::new(LoopbackBus::new());
        let mut a = node(&bus, "a", None);
        a.start().await.unwrap();

        a.channel().announce().await.unwrap();
        assert!(a.channel().catalog().is_empty());
    }

    #[tokio::test]
    async fn denied_remote_call_never_runs() {
        let bus = Arc::new(LoopbackBus::new());
        let mut a = node(&bus, "a", None);
        let mut b = node(&bus, "b", Some(StaticAccess::deny_all()));
        let secret = CountingOperation::new("b.Secret", "1").with_tags("acl=deny-all").shared();
        b.local().on_added(secret.clone(), None);

        a.start().await.unwrap();
        b.start().await.unwrap();

        let result = a
            .api()
            .execute(&OperationFilter::new("b.Secret").unwrap(), &Properties::new())
            .await
            .unwrap();
        assert_eq!(result.kind(), Some(FailureKind::AccessDenied));
        assert_eq!(secret.calls(), 0);
    }

    #[tokio::test]
    async fn remote_domain_failure_keeps_code_and_caption() {
        let bus = Arc::new(LoopbackBus::new());
        let mut a = node(&bus, "a", None);
        let mut b = node(&bus, "b", None);
        b.local().on_added(
            CountingOperation::new("b.Busy", "1")
                .with_behavior(Behavior::Domain { code: 42, caption: "busy" })
                .shared(),
            None,
        );
        a.start().await.unwrap();
        b.start().await.unwrap();

        let result = a
            .api()
            .execute(&OperationFilter::new("b.Busy").unwrap(), &Properties::new())
            .await
            .unwrap();
        assert_eq!(result.return_code(), 42);
        assert_eq!(result.caption(), Some("busy"));
    }

    #[tokio::test]
    async fn late_joiner_bootstraps_through_request() {
        let bus = Arc::new(LoopbackBus::new());
        let mut a = node(&bus, "a", None);
        a.local().on_added(CountingOperation::new("a.Early", "1").shared(), None);
        a.start().await.unwrap();

        let mut c = node(&bus, "c", None);
        c.start().await.unwrap();
        assert_eq!(remote_only(&c, "a.Early").len(), 1);

        bus.publish(
            "sop.registry",
            sop_core::messages::registry_request("sop.operation.z"),
        )
        .await
        .unwrap();
        assert_eq!(remote_only(&c, "a.*").len(), 1);
    }
}

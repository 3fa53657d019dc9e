//! Provider exposing the remote catalog to the operation facade.

use std::sync::Arc;

use async_trait::async_trait;
use sop_core::{ExecutionResult, OperationAddress, OperationDescriptor, OperationFilter, Properties};
use tracing::debug;

use super::channel::FederationChannel;
use super::invoker::RemoteInvoker;
use crate::service::operation::OperationError;
use crate::service::provider::OperationsProvider;

/// Operations announced by peers. Descriptors carry no callable; execution
/// is forwarded through the [`RemoteInvoker`], if one is installed.
pub struct FederationProvider {
    channel: Arc<FederationChannel>,
    invoker: Option<Arc<dyn RemoteInvoker>>,
}

impl FederationProvider {
    #[must_use]
    pub fn new(channel: Arc<FederationChannel>, invoker: Option<Arc<dyn RemoteInvoker>>) -> Self {
        Self { channel, invoker }
    }

    /// Name the provider is registered under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.channel.config().provider_name
    }
}

#[async_trait]
impl OperationsProvider for FederationProvider {
    fn find_matching(&self, filter: &OperationFilter) -> anyhow::Result<Vec<OperationDescriptor>> {
        Ok(self.channel.catalog().find_matching(filter))
    }

    async fn execute(
        &self,
        filter: &OperationFilter,
        properties: &Properties,
    ) -> Result<ExecutionResult, OperationError> {
        let descriptor = self
            .channel
            .catalog()
            .find_matching(filter)
            .into_iter()
            .next()
            .ok_or_else(|| OperationError::not_found(filter.pattern()))?;
        self.execute_descriptor(&descriptor, properties).await
    }

    async fn execute_descriptor(
        &self,
        descriptor: &OperationDescriptor,
        properties: &Properties,
    ) -> Result<ExecutionResult, OperationError> {
        let Some(invoker) = &self.invoker else {
            return Err(OperationError::not_found(format!(
                "no transport route for {}",
                descriptor.address()
            )));
        };
        invoker.invoke(descriptor, properties).await
    }

    fn get_operation(&self, address: &OperationAddress) -> Result<OperationDescriptor, OperationError> {
        self.channel
            .catalog()
            .get(address)
            .ok_or_else(|| OperationError::not_found(address))
    }

    /// Announces the local catalog; while nothing is known about peers,
    /// also asks them to announce theirs.
    async fn synchronize(&self) -> anyhow::Result<()> {
        self.channel.announce().await?;
        if self.channel.catalog().is_empty() {
            debug!(queue = %self.channel.queue(), "remote catalog empty, requesting announcements");
            self.channel.request_announcements().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use sop_core::messages::OperationAnnouncement;
    use sop_core::{MessageBus, SystemClock};

    use super::*;
    use crate::federation::bus::LoopbackBus;
    use crate::federation::catalog::RemoteCatalog;
    use crate::service::aggregator::OperationApi;
    use crate::service::config::FederationConfig;

    fn provider(bus: &Arc<LoopbackBus>, api: &Arc<OperationApi>) -> FederationProvider {
        let config = FederationConfig::for_node("a");
        let catalog = Arc::new(RemoteCatalog::new("jms", Arc::new(SystemClock)));
        let channel = Arc::new(FederationChannel::new(
            config,
            bus.clone(),
            catalog,
            Arc::downgrade(api),
        ));
        FederationProvider::new(channel, None)
    }

    fn announcement(path: &str) -> OperationAnnouncement {
        OperationAnnouncement {
            path: path.to_string(),
            version: "1".to_string(),
            tags: Default::default(),
            title: path.to_string(),
            form: None,
        }
    }

    #[tokio::test]
    async fn execute_without_invoker_is_not_found() {
        let bus = Arc::new(LoopbackBus::new());
        let api = Arc::new(OperationApi::new());
        let provider = provider(&bus, &api);
        provider.channel.catalog().ingest("sop", "sop.operation.b", &[announcement("b.Op")]);

        let filter = OperationFilter::new("b.Op").unwrap();
        assert_eq!(provider.find_matching(&filter).unwrap().len(), 1);
        let err = provider.execute(&filter, &Properties::new()).await.unwrap_err();
        assert!(err.is_not_found());

        let address = OperationAddress::parse("jms://b.Op:1/sop.operation.b/sop").unwrap();
        assert_eq!(provider.get_operation(&address).unwrap().title(), "b.Op");
        assert_eq!(provider.name(), "jms");
    }

    #[tokio::test]
    async fn synchronize_requests_while_catalog_empty() {
        let bus = Arc::new(LoopbackBus::new());
        let api = Arc::new(OperationApi::new());
        let provider = provider(&bus, &api);

        let seen = Arc::new(Recorder::default());
        bus.subscribe("sop.registry", seen.clone()).unwrap();

        provider.synchronize().await.unwrap();
        assert_eq!(seen.kinds(), vec!["operations", "request"]);

        provider.channel.catalog().ingest("sop", "sop.operation.b", &[announcement("b.Op")]);
        provider.synchronize().await.unwrap();
        assert_eq!(seen.kinds(), vec!["operations", "request", "operations"]);
    }

    #[derive(Default)]
    struct Recorder {
        kinds: parking_lot::Mutex<Vec<String>>,
    }

    impl Recorder {
        fn kinds(&self) -> Vec<String> {
            self.kinds.lock().clone()
        }
    }

    #[async_trait]
    impl sop_core::BusHandler for Recorder {
        async fn on_message(&self, message: sop_core::BusMessage) {
            self.kinds
                .lock()
                .push(message.type_name().unwrap_or_default().to_string());
        }
    }
}

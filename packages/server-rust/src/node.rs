//! Assembly of one node: local registry, federation, facade and sync worker.

use std::sync::Arc;

use sop_core::{AccessApi, ClockSource, MessageBus, SystemClock};
use tracing::info;

use crate::federation::{
    AccessInterceptor, BusInvoker, ExecuteChannel, FederationChannel, FederationProvider,
    InboundInterceptor, RemoteCatalog, RemoteInvoker,
};
use crate::service::middleware::build_execute_pipeline;
use crate::service::ping::{PingOperation, PING_TAGS};
use crate::service::{
    BackgroundWorker, LocalOperationsProvider, OperationApi, SopConfig, SyncRequest,
    SyncRunnable, TagsProperty,
};
use sop_core::DEFAULT_PROVIDER;

/// A fully wired node.
///
/// The facade is shared by `Arc`; the federation channel only holds a
/// weak handle to it.
pub struct SopNode {
    config: SopConfig,
    api: Arc<OperationApi>,
    local: Arc<LocalOperationsProvider>,
    channel: Arc<FederationChannel>,
    invoker: Arc<BusInvoker>,
    execute_channel: Arc<ExecuteChannel>,
    worker: Option<BackgroundWorker<SyncRunnable>>,
}

impl SopNode {
    #[must_use]
    pub fn new(
        config: SopConfig,
        bus: Arc<dyn MessageBus>,
        access: Option<Arc<dyn AccessApi>>,
    ) -> Self {
        Self::with_clock(config, bus, access, Arc::new(SystemClock))
    }

    /// Like [`SopNode::new`] with an explicit clock for catalog stamps.
    #[must_use]
    pub fn with_clock(
        config: SopConfig,
        bus: Arc<dyn MessageBus>,
        access: Option<Arc<dyn AccessApi>>,
        clock: Arc<dyn ClockSource>,
    ) -> Self {
        let api = Arc::new(OperationApi::new());

        let local = Arc::new(LocalOperationsProvider::new(
            config.local.clone(),
            access.clone(),
        ));
        local.on_added(
            Arc::new(PingOperation::new(config.node_id.clone())),
            Some(TagsProperty::Delimited(PING_TAGS.to_string())),
        );
        api.register_provider(DEFAULT_PROVIDER, local.clone());

        let federation = &config.federation;
        let catalog = Arc::new(RemoteCatalog::new(federation.provider_name.clone(), clock));
        let channel = Arc::new(FederationChannel::new(
            federation.clone(),
            bus.clone(),
            catalog,
            Arc::downgrade(&api),
        ));
        let invoker = Arc::new(BusInvoker::new(federation, bus.clone(), access.clone()));
        let remote: Arc<dyn RemoteInvoker> = invoker.clone();
        api.register_provider(
            &federation.provider_name,
            Arc::new(FederationProvider::new(channel.clone(), Some(remote))),
        );

        let interceptor: Option<Arc<dyn InboundInterceptor>> = if federation.access_control {
            Some(Arc::new(AccessInterceptor::new(access, config.local.relaxed)))
        } else {
            None
        };
        let execute_channel = Arc::new(ExecuteChannel::new(
            federation.queue.clone(),
            bus,
            build_execute_pipeline(api.clone(), federation),
            interceptor,
        ));

        Self {
            config,
            api,
            local,
            channel,
            invoker,
            execute_channel,
            worker: None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &SopConfig {
        &self.config
    }

    #[must_use]
    pub fn api(&self) -> &Arc<OperationApi> {
        &self.api
    }

    /// Registration port for operations implemented on this node.
    #[must_use]
    pub fn local(&self) -> &Arc<LocalOperationsProvider> {
        &self.local
    }

    #[must_use]
    pub fn channel(&self) -> &Arc<FederationChannel> {
        &self.channel
    }

    /// Subscribes to the bus, runs a first synchronization and starts the
    /// periodic sync worker. Calling twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if a bus subscription fails.
    pub async fn start(&mut self) -> anyhow::Result<()> {
        if self.worker.is_some() {
            return Ok(());
        }
        self.invoker.start()?;
        self.execute_channel.start()?;
        self.channel.start()?;
        self.api.synchronize_all().await;
        self.worker = Some(BackgroundWorker::start(
            SyncRunnable::new(self.api.clone()),
            self.config.sync_interval_ms,
        ));
        info!(node = %self.config.node_id, queue = %self.config.federation.queue, "node started");
        Ok(())
    }

    /// Runs a synchronization round on the worker now and waits for it.
    ///
    /// # Errors
    ///
    /// Returns an error if the node has not been started.
    pub async fn sync_now(&self) -> anyhow::Result<()> {
        self.sync(SyncRequest::all()).await
    }

    /// Synchronizes one provider on the worker and waits for it. An unknown
    /// provider name completes without doing anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the node has not been started.
    pub async fn sync_provider(&self, name: &str) -> anyhow::Result<()> {
        self.sync(SyncRequest::provider(name)).await
    }

    async fn sync(&self, request: SyncRequest) -> anyhow::Result<()> {
        let Some(worker) = &self.worker else {
            anyhow::bail!("node {} is not started", self.config.node_id);
        };
        let (request, done) = request.acknowledged();
        worker.submit(request).await?;
        done
            .await
            .map_err(|_| anyhow::anyhow!("sync worker dropped the request"))
    }

    pub async fn stop(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.stop().await;
        }
        self.channel.stop();
        self.execute_channel.stop();
        self.invoker.stop();
        info!(node = %self.config.node_id, "node stopped");
    }
}

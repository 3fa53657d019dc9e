//! Dispatch facade over all registered providers.

use std::sync::Arc;

use parking_lot::RwLock;
use sop_core::{ExecutionResult, OperationAddress, OperationDescriptor, OperationFilter, Properties};
use tracing::{debug, warn};

use super::operation::OperationError;
use super::provider::OperationsProvider;

type ProviderEntry = (String, Arc<dyn OperationsProvider>);

// ---------------------------------------------------------------------------
// OperationApi
// ---------------------------------------------------------------------------

/// Composes every registered provider for discovery and execution.
///
/// Providers are consulted in registration order; re-registering a name
/// replaces the provider in place. Every cross-provider call works on a
/// snapshot of the provider list taken under the lock, so providers are
/// never called while the lock is held.
pub struct OperationApi {
    providers: RwLock<Vec<ProviderEntry>>,
}

impl OperationApi {
    #[must_use]
    pub fn new() -> Self {
        Self {
            providers: RwLock::new(Vec::new()),
        }
    }

    /// Registers `provider` under `name`. Last registration wins.
    pub fn register_provider(&self, name: &str, provider: Arc<dyn OperationsProvider>) {
        let mut providers = self.providers.write();
        if let Some(entry) = providers.iter_mut().find(|(n, _)| n == name) {
            warn!(provider = name, "provider already registered, replacing");
            entry.1 = provider;
        } else {
            debug!(provider = name, "provider registered");
            providers.push((name.to_string(), provider));
        }
    }

    pub fn unregister_provider(&self, name: &str) -> Option<Arc<dyn OperationsProvider>> {
        let mut providers = self.providers.write();
        let index = providers.iter().position(|(n, _)| n == name)?;
        debug!(provider = name, "provider unregistered");
        Some(providers.remove(index).1)
    }

    #[must_use]
    pub fn provider(&self, name: &str) -> Option<Arc<dyn OperationsProvider>> {
        self.providers
            .read()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| Arc::clone(p))
    }

    /// Names of all providers, in consultation order.
    #[must_use]
    pub fn provider_names(&self) -> Vec<String> {
        self.providers.read().iter().map(|(n, _)| n.clone()).collect()
    }

    fn snapshot(&self) -> Vec<ProviderEntry> {
        self.providers.read().clone()
    }

    /// Resolves an address through the provider it names.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::NotFound`] if the provider or the key is absent.
    pub fn describe(&self, address: &OperationAddress) -> Result<OperationDescriptor, OperationError> {
        let provider = self
            .provider(address.provider())
            .ok_or_else(|| OperationError::not_found(format!("provider {}", address.provider())))?;
        provider.get_operation(address)
    }

    /// Collects the matches of every provider. Provider failures are logged
    /// and skipped.
    #[must_use]
    pub fn find(&self, filter: &OperationFilter) -> Vec<OperationDescriptor> {
        let mut out = Vec::new();
        for (name, provider) in self.snapshot() {
            match provider.find_matching(filter) {
                Ok(found) => out.extend(found),
                Err(e) => warn!(provider = %name, error = %e, "provider lookup failed"),
            }
        }
        out
    }

    /// First match of the first provider contributing one.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::NotFound`] if no provider has a match.
    pub fn find_first(&self, filter: &OperationFilter) -> Result<OperationDescriptor, OperationError> {
        for (name, provider) in self.snapshot() {
            match provider.find_matching(filter) {
                Ok(found) => {
                    if let Some(first) = found.into_iter().next() {
                        return Ok(first);
                    }
                }
                Err(e) => warn!(provider = %name, error = %e, "provider lookup failed"),
            }
        }
        Err(OperationError::not_found(filter.pattern()))
    }

    /// Executes through the first provider that does not report `NotFound`.
    ///
    /// Whatever that provider answers, success or failure, is the result.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::NotFound`] only if every provider reported it.
    pub async fn execute(
        &self,
        filter: &OperationFilter,
        properties: &Properties,
    ) -> Result<ExecutionResult, OperationError> {
        for (name, provider) in self.snapshot() {
            match provider.execute(filter, properties).await {
                Err(e) if e.is_not_found() => continue,
                outcome => return Ok(settle(&name, outcome)),
            }
        }
        Err(OperationError::not_found(filter.pattern()))
    }

    /// Executes `descriptor` on the provider that owns it.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::NotFound`] if the owning provider is unknown
    /// or cannot resolve the operation.
    pub async fn execute_descriptor(
        &self,
        descriptor: &OperationDescriptor,
        properties: &Properties,
    ) -> Result<ExecutionResult, OperationError> {
        let name = descriptor.provider();
        let provider = self
            .provider(name)
            .ok_or_else(|| OperationError::not_found(format!("provider {name}")))?;
        match provider.execute_descriptor(descriptor, properties).await {
            Err(e) if e.is_not_found() => Err(e),
            outcome => Ok(settle(name, outcome)),
        }
    }

    /// Runs `synchronize` on every provider; failures are logged.
    pub async fn synchronize_all(&self) {
        for (name, provider) in self.snapshot() {
            if let Err(e) = provider.synchronize().await {
                warn!(provider = %name, error = %e, "provider synchronization failed");
            }
        }
    }
}

impl Default for OperationApi {
    fn default() -> Self {
        Self::new()
    }
}

fn settle(provider: &str, outcome: Result<ExecutionResult, OperationError>) -> ExecutionResult {
    let result = outcome.unwrap_or_else(OperationError::into_result);
    let label = if result.is_successful() { "success" } else { "failure" };
    metrics::counter!(
        "sop_operations_executed_total",
        "provider" => provider.to_string(),
        "outcome" => label
    )
    .increment(1);
    result
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use sop_core::FailureKind;

    use super::*;
    use crate::service::config::LocalConfig;
    use crate::service::local::LocalOperationsProvider;
    use crate::testing::CountingOperation;

    /// Provider that fails or reports nothing, counting every call.
    struct StubProvider {
        fail_lookup: bool,
        execute_error: Option<fn() -> OperationError>,
        executions: AtomicU32,
        syncs: AtomicU32,
    }

    impl StubProvider {
        fn not_found() -> Self {
            Self {
                fail_lookup: false,
                execute_error: Some(|| OperationError::not_found("stub")),
                executions: AtomicU32::new(0),
                syncs: AtomicU32::new(0),
            }
        }

        fn broken() -> Self {
            Self {
                fail_lookup: true,
                execute_error: Some(|| OperationError::Internal(anyhow::anyhow!("stub broke"))),
                executions: AtomicU32::new(0),
                syncs: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl OperationsProvider for StubProvider {
        fn find_matching(&self, _filter: &OperationFilter) -> anyhow::Result<Vec<OperationDescriptor>> {
            if self.fail_lookup {
                anyhow::bail!("catalog unavailable");
            }
            Ok(Vec::new())
        }

        async fn execute(
            &self,
            _filter: &OperationFilter,
            _properties: &Properties,
        ) -> Result<ExecutionResult, OperationError> {
            self.executions.fetch_add(1, Ordering::SeqCst);
            match self.execute_error {
                Some(make) => Err(make()),
                None => Ok(ExecutionResult::success("stub")),
            }
        }

        async fn execute_descriptor(
            &self,
            _descriptor: &OperationDescriptor,
            _properties: &Properties,
        ) -> Result<ExecutionResult, OperationError> {
            Err(OperationError::not_found("stub"))
        }

        fn get_operation(&self, address: &OperationAddress) -> Result<OperationDescriptor, OperationError> {
            Err(OperationError::not_found(address))
        }

        async fn synchronize(&self) -> anyhow::Result<()> {
            self.syncs.fetch_add(1, Ordering::SeqCst);
            if self.fail_lookup {
                anyhow::bail!("sync broke");
            }
            Ok(())
        }
    }

    fn local_with(ops: &[(&str, &str)]) -> Arc<LocalOperationsProvider> {
        let local = Arc::new(LocalOperationsProvider::new(LocalConfig::default(), None));
        for (path, tags) in ops {
            local.on_added(CountingOperation::new(path, "1").with_tags(tags).shared(), None);
        }
        local
    }

    #[test]
    fn register_overwrite_keeps_position() {
        let api = OperationApi::new();
        api.register_provider("a", Arc::new(StubProvider::not_found()));
        api.register_provider("b", Arc::new(StubProvider::not_found()));
        api.register_provider("a", Arc::new(StubProvider::broken()));
        assert_eq!(api.provider_names(), vec!["a", "b"]);

        assert!(api.unregister_provider("a").is_some());
        assert!(api.unregister_provider("a").is_none());
        assert_eq!(api.provider_names(), vec!["b"]);
    }

    #[test]
    fn describe_routes_by_provider_name() {
        let api = OperationApi::new();
        api.register_provider("local", local_with(&[("a.B", "")]));

        let found = api.describe(&OperationAddress::parse("local://a.B:1").unwrap()).unwrap();
        assert_eq!(found.path(), "a.B");

        let unknown_provider = OperationAddress::parse("jms://a.B:1").unwrap();
        assert!(api.describe(&unknown_provider).unwrap_err().is_not_found());
        let unknown_key = OperationAddress::parse("a.C:1").unwrap();
        assert!(api.describe(&unknown_key).unwrap_err().is_not_found());
    }

    #[test]
    fn find_swallows_provider_failures() {
        let api = OperationApi::new();
        api.register_provider("broken", Arc::new(StubProvider::broken()));
        api.register_provider("local", local_with(&[("a.One", "x;y"), ("a.Two", "x")]));

        let tagged = api.find(&OperationFilter::any().with_tags(["y"]));
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].path(), "a.One");

        assert_eq!(api.find(&OperationFilter::any()).len(), 2);
        assert!(api.find(&OperationFilter::any().with_tags(["nope"])).is_empty());
    }

    #[test]
    fn find_first_skips_empty_providers() {
        let api = OperationApi::new();
        api.register_provider("empty", Arc::new(StubProvider::not_found()));
        api.register_provider("local", local_with(&[("a.One", "")]));

        let first = api.find_first(&OperationFilter::new("a.*").unwrap()).unwrap();
        assert_eq!(first.path(), "a.One");
        assert!(api
            .find_first(&OperationFilter::new("b.*").unwrap())
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn execute_falls_through_not_found() {
        let api = OperationApi::new();
        let p1 = Arc::new(StubProvider::not_found());
        api.register_provider("p1", p1.clone());
        api.register_provider("p2", local_with(&[("a.Echo", "")]));

        let result = api
            .execute(&OperationFilter::new("a.Echo").unwrap(), &Properties::new())
            .await
            .unwrap();
        assert!(result.is_successful());
        assert_eq!(p1.executions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn execute_stops_at_first_failure_result() {
        let api = OperationApi::new();
        api.register_provider("broken", Arc::new(StubProvider::broken()));
        let local = local_with(&[("a.Echo", "")]);
        api.register_provider("local", local);

        let result = api
            .execute(&OperationFilter::new("a.Echo").unwrap(), &Properties::new())
            .await
            .unwrap();
        assert_eq!(result.kind(), Some(FailureKind::InternalError));
        assert!(result.message().contains("stub broke"));
    }

    #[tokio::test]
    async fn execute_not_found_when_nobody_has_it() {
        let api = OperationApi::new();
        api.register_provider("p1", Arc::new(StubProvider::not_found()));
        api.register_provider("local", local_with(&[]));

        let err = api
            .execute(&OperationFilter::new("a.Missing").unwrap(), &Properties::new())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn execute_descriptor_requires_known_provider() {
        let api = OperationApi::new();
        let local = local_with(&[("a.Echo", "")]);
        api.register_provider("local", local.clone());

        let descriptor = api.find_first(&OperationFilter::new("a.Echo").unwrap()).unwrap();
        let result = api.execute_descriptor(&descriptor, &Properties::new()).await.unwrap();
        assert!(result.is_successful());

        api.unregister_provider("local");
        let err = api
            .execute_descriptor(&descriptor, &Properties::new())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn synchronize_all_isolates_failures() {
        let api = OperationApi::new();
        let broken = Arc::new(StubProvider::broken());
        let healthy = Arc::new(StubProvider::not_found());
        api.register_provider("broken", broken.clone());
        api.register_provider("healthy", healthy.clone());

        api.synchronize_all().await;
        api.synchronize_all().await;

        assert_eq!(broken.syncs.load(Ordering::SeqCst), 2);
        assert_eq!(healthy.syncs.load(Ordering::SeqCst), 2);
    }
}

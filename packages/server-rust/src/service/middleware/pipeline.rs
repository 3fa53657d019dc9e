//! Pipeline composition: combines the middleware layers into a single service stack.

use std::sync::Arc;

use sop_core::ExecutionResult;
use tower::util::BoxCloneService;
use tower::ServiceBuilder;

use super::load_shed::LoadShedLayer;
use super::metrics::MetricsLayer;
use crate::service::aggregator::OperationApi;
use crate::service::config::FederationConfig;
use crate::service::dispatch::DispatchService;
use crate::service::operation::{ExecuteCall, OperationError};

/// Type-erased execution pipeline.
pub type ExecutePipeline = BoxCloneService<ExecuteCall, ExecutionResult, OperationError>;

/// Build the inbound execution pipeline around the operation facade.
///
/// Layer order (outermost to innermost):
/// 1. `LoadShedLayer` -- reject when overloaded (fail fast before doing any work)
/// 2. `MetricsLayer` -- record timing and outcome (closest to the actual handler)
#[must_use]
pub fn build_execute_pipeline(api: Arc<OperationApi>, config: &FederationConfig) -> ExecutePipeline {
    let service = ServiceBuilder::new()
        .layer(LoadShedLayer::new(config.max_concurrent_executions))
        .layer(MetricsLayer)
        .service(DispatchService::new(api));
    BoxCloneService::new(service)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use sop_core::{FailureKind, OperationFilter, Properties};
    use tower::ServiceExt;

    use super::*;
    use crate::service::config::LocalConfig;
    use crate::service::local::LocalOperationsProvider;
    use crate::testing::{Behavior, CountingOperation};

    #[tokio::test]
    async fn pipeline_routes_through_all_layers() {
        let api = Arc::new(OperationApi::new());
        let local = Arc::new(LocalOperationsProvider::new(LocalConfig::default(), None));
        local.on_added(
            CountingOperation::new("a.Busy", "1")
                .with_behavior(Behavior::Domain { code: 42, caption: "busy" })
                .shared(),
            None,
        );
        api.register_provider("local", local);

        let pipeline = build_execute_pipeline(api, &FederationConfig::default());
        let call = ExecuteCall::forwarded(7, "peer", OperationFilter::new("a.Busy").unwrap(), Properties::new());
        let result = pipeline.oneshot(call).await.unwrap();
        assert_eq!(result.kind(), Some(FailureKind::Domain(42)));
        assert_eq!(result.caption(), Some("busy"));
    }

    #[tokio::test]
    async fn zero_capacity_sheds_everything() {
        let config = FederationConfig {
            max_concurrent_executions: 0,
            ..FederationConfig::default()
        };
        let pipeline = build_execute_pipeline(Arc::new(OperationApi::new()), &config);
        let call = ExecuteCall::local(1, OperationFilter::any(), Properties::new());
        let err = pipeline.oneshot(call).await.unwrap_err();
        assert!(matches!(err, OperationError::Overloaded));
    }
}

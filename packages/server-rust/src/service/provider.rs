//! Provider contract shared by the local registry and the federation provider.

use async_trait::async_trait;
use sop_core::{ExecutionResult, OperationAddress, OperationDescriptor, OperationFilter, Properties};

use super::operation::OperationError;

/// A named contributor to the operation catalog.
///
/// Providers are registered with [`OperationApi`](super::OperationApi) under
/// a name that matches the `provider` segment of the addresses they own.
#[async_trait]
pub trait OperationsProvider: Send + Sync {
    /// Returns every descriptor matching `filter`. Order is unspecified.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot consult its catalog.
    fn find_matching(&self, filter: &OperationFilter) -> anyhow::Result<Vec<OperationDescriptor>>;

    /// Executes the first operation matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::NotFound`] if nothing matches; execution
    /// failures come back as failure results.
    async fn execute(
        &self,
        filter: &OperationFilter,
        properties: &Properties,
    ) -> Result<ExecutionResult, OperationError>;

    /// Executes the operation behind `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::NotFound`] if no callable or route exists.
    async fn execute_descriptor(
        &self,
        descriptor: &OperationDescriptor,
        properties: &Properties,
    ) -> Result<ExecutionResult, OperationError>;

    /// Looks up the descriptor stored for `address`.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::NotFound`] if the key is absent.
    fn get_operation(&self, address: &OperationAddress) -> Result<OperationDescriptor, OperationError>;

    /// Periodic re-synchronization hook. Default is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if synchronization fails; the caller logs it.
    async fn synchronize(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

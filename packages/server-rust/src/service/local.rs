//! Local operations provider.
//!
//! Holds the operations implemented on this node. The host environment
//! drives the catalog through the registration port
//! ([`LocalOperationsProvider::on_added`], [`on_modified`](LocalOperationsProvider::on_modified),
//! [`on_removed`](LocalOperationsProvider::on_removed)); the ACL of each
//! descriptor is resolved once, at registration.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use sop_core::descriptor::{split_tags, tag_option, TAG_DEFAULT_ACL};
use sop_core::{
    AccessApi, Account, ExecutionResult, Operation, OperationAddress, OperationDescription,
    OperationDescriptor, OperationFailure, OperationFilter, Properties, TaskContext,
    DEFAULT_PROVIDER,
};
use tracing::{debug, info, warn};

use super::config::LocalConfig;
use super::operation::OperationError;
use super::provider::OperationsProvider;

/// Resource type checked for local executions.
pub const LOCAL_RESOURCE: &str = "local.operation";
/// Action checked for every execution.
pub const EXECUTE_ACTION: &str = "execute";

const NO_PARTS: [&str; 0] = [];

/// Tags supplied by the discovery mechanism alongside an implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagsProperty {
    /// Semicolon-delimited string.
    Delimited(String),
    List(Vec<String>),
}

impl TagsProperty {
    fn into_tags(self) -> Vec<String> {
        match self {
            Self::Delimited(raw) => split_tags(&raw, ';'),
            Self::List(items) => items
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }
}

/// Outcome of a registration event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Added,
    /// An entry with the same `path:version` key was overwritten.
    Replaced,
    /// The implementation describes no usable address and was ignored.
    Rejected,
}

// ---------------------------------------------------------------------------
// LocalOperationsProvider
// ---------------------------------------------------------------------------

/// Provider for operations implemented on this node.
pub struct LocalOperationsProvider {
    config: LocalConfig,
    access: Option<Arc<dyn AccessApi>>,
    registry: Mutex<HashMap<String, OperationDescriptor>>,
}

impl LocalOperationsProvider {
    #[must_use]
    pub fn new(config: LocalConfig, access: Option<Arc<dyn AccessApi>>) -> Self {
        Self {
            config,
            access,
            registry: Mutex::new(HashMap::new()),
        }
    }

    /// An implementation appeared. Last registration under a key wins.
    pub fn on_added(
        &self,
        operation: Arc<dyn Operation>,
        tags: Option<TagsProperty>,
    ) -> Registration {
        let Some(descriptor) = self.build_descriptor(operation, tags) else {
            return Registration::Rejected;
        };
        let key = descriptor.registry_key();
        let previous = self.registry.lock().insert(key.clone(), descriptor);
        if previous.is_some() {
            warn!(key = %key, "operation already registered, replacing");
            Registration::Replaced
        } else {
            info!(key = %key, "operation registered");
            Registration::Added
        }
    }

    /// An implementation changed; tags and ACL are recomputed.
    pub fn on_modified(
        &self,
        operation: Arc<dyn Operation>,
        tags: Option<TagsProperty>,
    ) -> Registration {
        let Some(descriptor) = self.build_descriptor(operation, tags) else {
            return Registration::Rejected;
        };
        let key = descriptor.registry_key();
        let previous = self.registry.lock().insert(key.clone(), descriptor);
        debug!(key = %key, "operation updated");
        if previous.is_some() {
            Registration::Replaced
        } else {
            Registration::Added
        }
    }

    /// An implementation disappeared. Returns whether an entry was removed.
    pub fn on_removed(&self, description: &OperationDescription) -> bool {
        let key = description.registry_key();
        let removed = self.registry.lock().remove(&key).is_some();
        if removed {
            info!(key = %key, "operation unregistered");
        }
        removed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry.lock().is_empty()
    }

    fn matching(&self, filter: &OperationFilter) -> Vec<OperationDescriptor> {
        self.registry
            .lock()
            .values()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect()
    }

    /// The registered entry behind `descriptor`, falling back to the
    /// descriptor itself only when it carries a callable.
    fn resolve(&self, descriptor: &OperationDescriptor) -> Option<OperationDescriptor> {
        let stored = self.registry.lock().get(&descriptor.registry_key()).cloned();
        stored.or_else(|| descriptor.operation().map(|_| descriptor.clone()))
    }

    fn build_descriptor(
        &self,
        operation: Arc<dyn Operation>,
        tags: Option<TagsProperty>,
    ) -> Option<OperationDescriptor> {
        let description = operation.description();
        let mut merged: BTreeSet<String> = tags
            .map(TagsProperty::into_tags)
            .unwrap_or_default()
            .into_iter()
            .collect();
        merged.extend(description.embedded_tags());

        let address = match OperationAddress::compose(
            DEFAULT_PROVIDER,
            description.path(),
            Some(description.version()),
            &NO_PARTS,
        ) {
            Ok(address) => address,
            Err(e) => {
                warn!(path = description.path(), error = %e, "ignoring operation without a valid address");
                return None;
            }
        };

        let default_acl = tag_option(&merged, TAG_DEFAULT_ACL, "").to_string();
        let acl = self.resolve_acl(description.path(), &default_acl);
        Some(OperationDescriptor::new(address, &description, merged, acl).with_operation(operation))
    }

    fn resolve_acl(&self, path: &str, default_acl: &str) -> String {
        let Some(access) = &self.access else {
            warn!(path, "no access service, using tag acl");
            return default_acl.to_string();
        };
        let account = access.current_account();
        match access.resource_access_acl(&account, LOCAL_RESOURCE, path, EXECUTE_ACTION, default_acl) {
            Ok(acl) => acl,
            Err(e) => {
                warn!(path, error = %e, "acl lookup failed, using tag acl");
                default_acl.to_string()
            }
        }
    }

    /// Checks the caller against the descriptor's ACL.
    ///
    /// Returns the account the call runs as, or the failure to report.
    fn authorize(&self, descriptor: &OperationDescriptor) -> Result<Option<Account>, ExecutionResult> {
        let Some(access) = &self.access else {
            if self.config.relaxed {
                return Ok(None);
            }
            warn!(path = descriptor.path(), "no access service and not relaxed, denying");
            return Err(ExecutionResult::access_denied(format!(
                "access denied to {}",
                descriptor.path()
            )));
        };
        let account = access.current_account();
        match access.has_resource_access(
            &account,
            LOCAL_RESOURCE,
            descriptor.path(),
            EXECUTE_ACTION,
            descriptor.acl(),
        ) {
            Ok(true) => Ok(Some(account)),
            Ok(false) => {
                debug!(path = descriptor.path(), account = %account.id, "access denied");
                Err(ExecutionResult::access_denied(format!(
                    "access denied to {} for {}",
                    descriptor.path(),
                    account.id
                )))
            }
            Err(e) => {
                warn!(path = descriptor.path(), error = %e, "access check failed, denying");
                Err(ExecutionResult::access_denied(format!(
                    "access check failed for {}",
                    descriptor.path()
                )))
            }
        }
    }
}

#[async_trait]
impl OperationsProvider for LocalOperationsProvider {
    fn find_matching(&self, filter: &OperationFilter) -> anyhow::Result<Vec<OperationDescriptor>> {
        Ok(self.matching(filter))
    }

    async fn execute(
        &self,
        filter: &OperationFilter,
        properties: &Properties,
    ) -> Result<ExecutionResult, OperationError> {
        let descriptor = self
            .matching(filter)
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
        let entry = self
            .resolve(descriptor)
            .ok_or_else(|| OperationError::not_found(descriptor.address()))?;
        let operation = entry
            .operation()
            .ok_or_else(|| OperationError::not_found(descriptor.address()))?;

        let account = match self.authorize(&entry) {
            Ok(account) => account,
            Err(denied) => return Ok(denied),
        };

        let mut ctx = TaskContext::new(DEFAULT_PROVIDER, properties.clone());
        if let Some(account) = account {
            ctx = ctx.with_account(account);
        }

        match operation.execute(&ctx).await {
            Ok(result) => Ok(result),
            Err(OperationFailure::Domain {
                code,
                message,
                caption,
            }) => Ok(ExecutionResult::domain(code, message, caption)),
            Err(OperationFailure::Other(e)) => {
                warn!(path = descriptor.path(), error = %e, "operation failed");
                Ok(ExecutionResult::internal_error(e.to_string()))
            }
        }
    }

    fn get_operation(&self, address: &OperationAddress) -> Result<OperationDescriptor, OperationError> {
        self.registry
            .lock()
            .get(&address.registry_key())
            .cloned()
            .ok_or_else(|| OperationError::not_found(address))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

use crate::types::{Account, Properties};

/// Per-call context handed to an operation.
/// Built fresh for every execution from the caller's properties.
#[derive(Debug, Clone)]
pub struct TaskContext {
    /// Call parameters.
    pub parameters: Properties,
    /// Account the call runs as, if the dispatch path knows one.
    pub account: Option<Account>,
    /// Name of the provider that dispatched the call.
    pub provider: String,
}

impl TaskContext {
    /// Creates a context for `provider` carrying `parameters`.
    #[must_use]
    pub fn new(provider: impl Into<String>, parameters: Properties) -> Self {
        Self {
            parameters,
            account: None,
            provider: provider.into(),
        }
    }

    /// Attaches the calling account.
    #[must_use]
    pub fn with_account(mut self, account: Account) -> Self {
        self.account = Some(account);
        self
    }

    /// Returns a string parameter, if present and a string.
    #[must_use]
    pub fn parameter_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(serde_json::Value::as_str)
    }
}

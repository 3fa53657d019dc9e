//! Test doubles shared by the unit and integration tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use sop_core::{
    AccessApi, Account, ExecutionResult, Operation, OperationDescription, OperationFailure,
    TaskContext, Version,
};

/// What a [`CountingOperation`] does when invoked.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Succeeds, echoing the `text` parameter as value `echo`.
    Echo,
    /// Raises a domain failure.
    Domain { code: i64, caption: &'static str },
    /// Raises an unexpected error with the given message.
    Crash(&'static str),
}

/// Operation that counts its invocations.
pub struct CountingOperation {
    path: String,
    version: Version,
    tags: Option<String>,
    behavior: Behavior,
    calls: AtomicU32,
}

impl CountingOperation {
    pub fn new(path: &str, version: &str) -> Self {
        Self {
            path: path.to_string(),
            version: Version::parse(version).unwrap(),
            tags: None,
            behavior: Behavior::Echo,
            calls: AtomicU32::new(0),
        }
    }

    pub fn with_tags(mut self, tags: &str) -> Self {
        self.tags = Some(tags.to_string());
        self
    }

    pub fn with_behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl Operation for CountingOperation {
    fn description(&self) -> OperationDescription {
        let desc = OperationDescription::from_path(
            self.path.clone(),
            self.version.clone(),
            format!("Test {}", self.path),
        );
        match &self.tags {
            Some(tags) => desc.with_tags(tags),
            None => desc,
        }
    }

    async fn execute(&self, ctx: &TaskContext) -> Result<ExecutionResult, OperationFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Echo => Ok(ExecutionResult::success_with(
                "ok",
                [("echo", ctx.parameter_str("text").unwrap_or_default())],
            )),
            Behavior::Domain { code, caption } => Err(OperationFailure::domain(
                *code,
                "operation refused",
                Some(*caption),
            )),
            Behavior::Crash(msg) => Err(anyhow::anyhow!(*msg).into()),
        }
    }
}

/// Authorization double with a fixed verdict that records every check.
pub struct StaticAccess {
    allow: bool,
    acl_override: Option<String>,
    failing: bool,
    checks: Mutex<Vec<(String, String, String)>>,
}

impl StaticAccess {
    pub fn allow_all() -> Arc<Self> {
        Arc::new(Self::with_verdict(true))
    }

    pub fn deny_all() -> Arc<Self> {
        Arc::new(Self::with_verdict(false))
    }

    /// Every call returns an error.
    pub fn broken() -> Arc<Self> {
        Arc::new(Self {
            failing: true,
            ..Self::with_verdict(true)
        })
    }

    /// Allows everything and answers ACL lookups with `acl`.
    pub fn with_acl(acl: &str) -> Arc<Self> {
        Arc::new(Self {
            acl_override: Some(acl.to_string()),
            ..Self::with_verdict(true)
        })
    }

    fn with_verdict(allow: bool) -> Self {
        Self {
            allow,
            acl_override: None,
            failing: false,
            checks: Mutex::new(Vec::new()),
        }
    }

    /// `(resource_type, resource_path, acl)` of every access check so far.
    pub fn checks(&self) -> Vec<(String, String, String)> {
        self.checks.lock().clone()
    }
}

impl AccessApi for StaticAccess {
    fn current_account(&self) -> Account {
        Account::new("tester")
    }

    fn has_resource_access(
        &self,
        _account: &Account,
        resource_type: &str,
        resource_path: &str,
        _action: &str,
        acl: &str,
    ) -> anyhow::Result<bool> {
        if self.failing {
            anyhow::bail!("access service unavailable");
        }
        self.checks.lock().push((
            resource_type.to_string(),
            resource_path.to_string(),
            acl.to_string(),
        ));
        Ok(self.allow)
    }

    fn resource_access_acl(
        &self,
        _account: &Account,
        _resource_type: &str,
        _resource_path: &str,
        _action: &str,
        default_acl: &str,
    ) -> anyhow::Result<String> {
        if self.failing {
            anyhow::bail!("access service unavailable");
        }
        Ok(self
            .acl_override
            .clone()
            .unwrap_or_else(|| default_acl.to_string()))
    }
}

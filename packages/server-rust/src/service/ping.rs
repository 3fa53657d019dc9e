//! Built-in liveness operation.

use async_trait::async_trait;
use sop_core::{ExecutionResult, Operation, OperationDescription, OperationFailure, TaskContext, Version};
use tracing::info;

/// Address path of the ping operation.
pub const PING_PATH: &str = "sop.util.Ping";
/// Discovery tags the ping operation is registered with.
pub const PING_TAGS: &str = "acl=*";

/// Answers with the caller and the identity of the answering node.
pub struct PingOperation {
    ident: String,
}

impl PingOperation {
    #[must_use]
    pub fn new(ident: impl Into<String>) -> Self {
        Self {
            ident: ident.into(),
        }
    }
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

#[async_trait]
impl Operation for PingOperation {
    fn description(&self) -> OperationDescription {
        OperationDescription::from_path(PING_PATH, Version::Any, "Ping")
    }

    async fn execute(&self, ctx: &TaskContext) -> Result<ExecutionResult, OperationFailure> {
        info!(parameters = ?ctx.parameters, "ping");
        let (user, admin) = ctx
            .account
            .as_ref()
            .map_or((String::new(), false), |a| (a.id.clone(), a.is_admin()));
        Ok(ExecutionResult::success_with(
            "ok",
            [
                ("user", user),
                ("admin", admin.to_string()),
                ("ident", self.ident.clone()),
                ("pid", std::process::id().to_string()),
                ("host", hostname()),
            ],
        ))
    }
}

#[cfg(test)]
mod tests {
    use sop_core::{Account, Properties};

    use super::*;

    #[tokio::test]
    async fn ping_reports_caller_and_node() {
        let ping = PingOperation::new("node-a");
        let ctx = TaskContext::new("local", Properties::new())
            .with_account(Account::new("alice").with_role("admin"));
        let result = ping.execute(&ctx).await.unwrap();

        let values = result.values().unwrap();
        assert_eq!(values["user"], "alice");
        assert_eq!(values["admin"], "true");
        assert_eq!(values["ident"], "node-a");
        assert_eq!(values["pid"], std::process::id().to_string());
        assert!(values.contains_key("host"));
    }

    #[tokio::test]
    async fn anonymous_ping() {
        let result = PingOperation::new("n")
            .execute(&TaskContext::new("local", Properties::new()))
            .await
            .unwrap();
        assert_eq!(result.values().unwrap()["user"], "");
        assert_eq!(result.values().unwrap()["admin"], "false");
    }

    #[test]
    fn described_as_unversioned_ping() {
        let d = PingOperation::new("n").description();
        assert_eq!(d.path(), PING_PATH);
        assert_eq!(d.registry_key(), "sop.util.Ping:*");
        assert_eq!(d.title(), "Ping");
    }
}

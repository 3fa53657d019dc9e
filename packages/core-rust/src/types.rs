use serde::{Deserialize, Serialize};

/// Opaque key/value bag used for call parameters and result payloads.
///
/// Backed by a JSON object so it can travel over any bus transport
/// without a bespoke schema.
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// Authenticated account as seen by the authorization collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier for the account.
    pub id: String,
    /// Roles assigned to this account for authorization checks.
    pub roles: Vec<String>,
}

impl Account {
    /// Identifier used for unauthenticated callers.
    pub const GUEST_ID: &'static str = "guest";

    /// Creates an account with no roles.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            roles: Vec::new(),
        }
    }

    /// The unauthenticated guest account.
    #[must_use]
    pub fn guest() -> Self {
        Self::new(Self::GUEST_ID)
    }

    /// Adds a role, builder style.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    /// Returns `true` if the account carries the `admin` role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r == "admin")
    }
}

//! Wire format for the operation bus.
//!
//! Every bus message is a [`BusMessage`]: string properties used for routing
//! and filtering (`type`, `queue`, ...) plus a string-keyed body. Byte-oriented
//! transports encode it as named `MsgPack` (`rmp_serde::to_vec_named()`).
//!
//! - [`registry`]: `request` / `operations` catalog announcements
//! - [`execute`]: `execute` / `result` request-reply between peers

pub mod execute;
pub mod registry;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use execute::{ExecuteReply, ExecuteRequest};
pub use registry::{
    operations_message, read_announcements, registry_request, OperationAnnouncement,
    TAG_DELIMITER,
};

/// Property naming the message kind.
pub const PROPERTY_TYPE: &str = "type";
/// Property naming the source queue of the sender.
pub const PROPERTY_QUEUE: &str = "queue";
/// Property naming the sender's bus connection.
pub const PROPERTY_CONNECTION: &str = "connection";

// ---------------------------------------------------------------------------
// MessageKind
// ---------------------------------------------------------------------------

/// Value of the `type` property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Ask peers to re-announce their catalogs.
    Request,
    /// Full catalog announcement from one source queue.
    Operations,
    /// Remote execution request.
    Execute,
    /// Reply to an `Execute`.
    Result,
}

impl MessageKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Operations => "operations",
            Self::Execute => "execute",
            Self::Result => "result",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "request" => Some(Self::Request),
            "operations" => Some(Self::Operations),
            "execute" => Some(Self::Execute),
            "result" => Some(Self::Result),
            _ => None,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// BusMessage
// ---------------------------------------------------------------------------

/// Structured key/value message carried by the bus.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusMessage {
    pub properties: BTreeMap<String, String>,
    pub body: BTreeMap<String, String>,
}

impl BusMessage {
    /// Creates an empty message of the given kind.
    #[must_use]
    pub fn new(kind: MessageKind) -> Self {
        let mut msg = Self::default();
        msg.properties
            .insert(PROPERTY_TYPE.to_string(), kind.as_str().to_string());
        msg
    }

    #[must_use]
    pub fn with_property(mut self, key: &str, value: impl Into<String>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn with_field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.body.insert(key.to_string(), value.into());
        self
    }

    pub fn set_field(&mut self, key: String, value: impl Into<String>) {
        self.body.insert(key, value.into());
    }

    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn field(&self, key: &str) -> Option<&str> {
        self.body.get(key).map(String::as_str)
    }

    /// Raw `type` property.
    #[must_use]
    pub fn type_name(&self) -> Option<&str> {
        self.property(PROPERTY_TYPE)
    }

    /// Parsed `type` property; `None` for unknown kinds.
    #[must_use]
    pub fn kind(&self) -> Option<MessageKind> {
        self.type_name().and_then(MessageKind::parse)
    }

    /// Source queue of the sender.
    #[must_use]
    pub fn queue(&self) -> Option<&str> {
        self.property(PROPERTY_QUEUE)
    }

    /// Encodes as named `MsgPack`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_bytes(&self) -> anyhow::Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    /// Decodes from named `MsgPack`.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid encoded message.
    pub fn from_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

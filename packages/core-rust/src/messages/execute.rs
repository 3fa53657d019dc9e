//! Request/reply messages for executing an operation on a peer.
//!
//! An `execute` message is published to the owning peer's queue topic and
//! names the topic the `result` reply goes to. Replies are matched to
//! requests by the `correlation` property.

use super::{BusMessage, MessageKind, PROPERTY_QUEUE};
use crate::error::MessageError;
use crate::result::ExecutionResult;
use crate::types::Properties;
use crate::version::Version;

const PROPERTY_CORRELATION: &str = "correlation";
const PROPERTY_REPLY_TO: &str = "replyTo";
const PROPERTY_PATH: &str = "path";
const PROPERTY_VERSION: &str = "version";
const PROPERTY_ACCOUNT: &str = "account";
const FIELD_PARAMETERS: &str = "parameters";
const FIELD_RESULT: &str = "result";

fn expect_kind(msg: &BusMessage, expected: MessageKind) -> Result<(), MessageError> {
    match msg.kind() {
        Some(kind) if kind == expected => Ok(()),
        _ => Err(MessageError::WrongKind {
            expected: expected.as_str(),
            actual: msg.type_name().unwrap_or_default().to_string(),
        }),
    }
}

fn required<'a>(msg: &'a BusMessage, key: &'static str) -> Result<&'a str, MessageError> {
    msg.property(key).ok_or(MessageError::MissingField(key))
}

// ---------------------------------------------------------------------------
// ExecuteRequest
// ---------------------------------------------------------------------------

/// Ask a peer to run `path` at `version` with `parameters`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteRequest {
    pub correlation: String,
    /// Topic the reply must be published to.
    pub reply_to: String,
    /// Queue of the requesting node.
    pub source_queue: String,
    pub path: String,
    pub version: Version,
    /// Account id of the caller, checked by the receiving interceptor.
    pub account: Option<String>,
    pub parameters: Properties,
}

impl ExecuteRequest {
    #[must_use]
    pub fn to_message(&self) -> BusMessage {
        let mut msg = BusMessage::new(MessageKind::Execute)
            .with_property(PROPERTY_QUEUE, self.source_queue.clone())
            .with_property(PROPERTY_CORRELATION, self.correlation.clone())
            .with_property(PROPERTY_REPLY_TO, self.reply_to.clone())
            .with_property(PROPERTY_PATH, self.path.clone())
            .with_property(PROPERTY_VERSION, self.version.to_string())
            .with_field(
                FIELD_PARAMETERS,
                serde_json::Value::Object(self.parameters.clone()).to_string(),
            );
        if let Some(account) = &self.account {
            msg.properties
                .insert(PROPERTY_ACCOUNT.to_string(), account.clone());
        }
        msg
    }

    /// Decodes an `execute` message.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError`] for a wrong kind, a missing property, a bad
    /// version token or malformed parameter JSON.
    pub fn from_message(msg: &BusMessage) -> Result<Self, MessageError> {
        expect_kind(msg, MessageKind::Execute)?;
        let parameters = match msg.field(FIELD_PARAMETERS) {
            None => Properties::new(),
            Some(raw) => serde_json::from_str(raw).map_err(|source| MessageError::Json {
                field: FIELD_PARAMETERS,
                source,
            })?,
        };
        Ok(Self {
            correlation: required(msg, PROPERTY_CORRELATION)?.to_string(),
            reply_to: required(msg, PROPERTY_REPLY_TO)?.to_string(),
            source_queue: msg.queue().unwrap_or_default().to_string(),
            path: required(msg, PROPERTY_PATH)?.to_string(),
            version: Version::parse(msg.property(PROPERTY_VERSION).unwrap_or_default())?,
            account: msg.property(PROPERTY_ACCOUNT).map(str::to_string),
            parameters,
        })
    }
}

// ---------------------------------------------------------------------------
// ExecuteReply
// ---------------------------------------------------------------------------

/// Outcome of a remote execution, routed back by correlation id.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteReply {
    pub correlation: String,
    pub result: ExecutionResult,
}

impl ExecuteReply {
    /// Encodes the reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the result cannot be serialized to JSON.
    pub fn to_message(&self) -> Result<BusMessage, MessageError> {
        let result = serde_json::to_string(&self.result).map_err(|source| MessageError::Json {
            field: FIELD_RESULT,
            source,
        })?;
        Ok(BusMessage::new(MessageKind::Result)
            .with_property(PROPERTY_CORRELATION, self.correlation.clone())
            .with_field(FIELD_RESULT, result))
    }

    /// Decodes a `result` message.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError`] for a wrong kind, missing fields or bad JSON.
    pub fn from_message(msg: &BusMessage) -> Result<Self, MessageError> {
        expect_kind(msg, MessageKind::Result)?;
        let raw = msg
            .field(FIELD_RESULT)
            .ok_or(MessageError::MissingField(FIELD_RESULT))?;
        let result = serde_json::from_str(raw).map_err(|source| MessageError::Json {
            field: FIELD_RESULT,
            source,
        })?;
        Ok(Self {
            correlation: required(msg, PROPERTY_CORRELATION)?.to_string(),
            result,
        })
    }
}

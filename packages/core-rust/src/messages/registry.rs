//! Catalog announcement messages.
//!
//! An `operations` message lists the operations of one source queue as
//! indexed fields `operation{i}`, `version{i}`, `tags{i}`, `title{i}` and
//! optional `form{i}`, for `i = 0..count`. Readers stop at the first
//! missing `operation{i}`.

use std::collections::BTreeSet;

use super::{BusMessage, MessageKind, PROPERTY_CONNECTION, PROPERTY_QUEUE};
use crate::descriptor::{split_tags, OperationDescriptor};

/// Delimiter joining tags inside `tags{i}`.
pub const TAG_DELIMITER: char = ',';

/// One announced operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationAnnouncement {
    pub path: String,
    /// Version token as written by the sender (`*` for any).
    pub version: String,
    pub tags: BTreeSet<String>,
    pub title: String,
    /// Parameter form, JSON-encoded.
    pub form: Option<String>,
}

impl OperationAnnouncement {
    /// Builds the announcement for a catalog entry.
    #[must_use]
    pub fn from_descriptor(descriptor: &OperationDescriptor) -> Self {
        Self {
            path: descriptor.path().to_string(),
            version: descriptor.version_string(),
            tags: descriptor.tags().clone(),
            title: descriptor.title().to_string(),
            form: descriptor.form().map(ToString::to_string),
        }
    }
}

/// Builds a `request` message asking peers to re-announce.
#[must_use]
pub fn registry_request(queue: &str) -> BusMessage {
    BusMessage::new(MessageKind::Request).with_property(PROPERTY_QUEUE, queue)
}

/// Builds an `operations` message for `queue` on `connection`.
#[must_use]
pub fn operations_message(
    queue: &str,
    connection: &str,
    announcements: &[OperationAnnouncement],
) -> BusMessage {
    let mut msg = BusMessage::new(MessageKind::Operations)
        .with_property(PROPERTY_QUEUE, queue)
        .with_property(PROPERTY_CONNECTION, connection);
    let delimiter = TAG_DELIMITER.to_string();
    for (i, a) in announcements.iter().enumerate() {
        msg.set_field(format!("operation{i}"), a.path.clone());
        msg.set_field(format!("version{i}"), a.version.clone());
        msg.set_field(
            format!("tags{i}"),
            a.tags.iter().map(String::as_str).collect::<Vec<_>>().join(&delimiter),
        );
        msg.set_field(format!("title{i}"), a.title.clone());
        if let Some(form) = &a.form {
            msg.set_field(format!("form{i}"), form.clone());
        }
    }
    msg
}

/// Reads the indexed announcements of an `operations` message.
#[must_use]
pub fn read_announcements(msg: &BusMessage) -> Vec<OperationAnnouncement> {
    let mut out = Vec::new();
    for i in 0.. {
        let Some(path) = msg.field(&format!("operation{i}")) else {
            break;
        };
        out.push(OperationAnnouncement {
            path: path.to_string(),
            version: msg.field(&format!("version{i}")).unwrap_or_default().to_string(),
            tags: msg
                .field(&format!("tags{i}"))
                .map(|t| split_tags(t, TAG_DELIMITER).into_iter().collect())
                .unwrap_or_default(),
            title: msg.field(&format!("title{i}")).unwrap_or_default().to_string(),
            form: msg.field(&format!("form{i}")).map(str::to_string),
        });
    }
    tracing::trace!(queue = ?msg.queue(), count = out.len(), "announcements decoded");
    out
}

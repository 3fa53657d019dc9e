//! Operation descriptions and catalog descriptors.
//!
//! An [`OperationDescription`] is what an implementation says about itself.
//! An [`OperationDescriptor`] is what a provider stores in its catalog: the
//! description bound to an address, resolved tags and ACL, and (for local
//! operations) a handle to the callable.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::address::{registry_key, OperationAddress};
use crate::operation::Operation;
use crate::types::Properties;
use crate::version::Version;

/// Description parameter holding `;`-separated tags.
pub const TAGS_PARAMETER: &str = "tags";

/// Tag option naming the default ACL (`acl=<expr>`).
pub const TAG_DEFAULT_ACL: &str = "acl";

// ---------------------------------------------------------------------------
// OperationDescription
// ---------------------------------------------------------------------------

/// Self-description of an operation implementation.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationDescription {
    path: String,
    version: Version,
    title: String,
    form: Option<serde_json::Value>,
    parameters: Properties,
}

impl OperationDescription {
    /// Describes the operation at `group.name`.
    #[must_use]
    pub fn new(group: &str, name: &str, version: Version, title: impl Into<String>) -> Self {
        let path = if group.is_empty() {
            name.to_string()
        } else {
            format!("{group}.{name}")
        };
        Self::from_path(path, version, title)
    }

    /// Describes the operation at a full dotted path.
    #[must_use]
    pub fn from_path(path: impl Into<String>, version: Version, title: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            version,
            title: title.into(),
            form: None,
            parameters: Properties::new(),
        }
    }

    /// Attaches an opaque parameter schema.
    #[must_use]
    pub fn with_form(mut self, form: serde_json::Value) -> Self {
        self.form = Some(form);
        self
    }

    /// Sets a description parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }

    /// Sets the `tags` parameter from a `;`-separated string.
    #[must_use]
    pub fn with_tags(self, tags: &str) -> Self {
        self.with_parameter(TAGS_PARAMETER, tags)
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn version(&self) -> &Version {
        &self.version
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn form(&self) -> Option<&serde_json::Value> {
        self.form.as_ref()
    }

    #[must_use]
    pub fn parameters(&self) -> &Properties {
        &self.parameters
    }

    /// Tags embedded in the description parameters.
    #[must_use]
    pub fn embedded_tags(&self) -> Vec<String> {
        match self.parameters.get(TAGS_PARAMETER) {
            None | Some(serde_json::Value::Null) => Vec::new(),
            Some(serde_json::Value::String(s)) => split_tags(s, ';'),
            Some(other) => split_tags(&other.to_string(), ';'),
        }
    }

    /// `path:version`.
    #[must_use]
    pub fn registry_key(&self) -> String {
        registry_key(&self.path, &self.version)
    }
}

/// Splits a delimiter-joined tag string, dropping empty items.
#[must_use]
pub fn split_tags(raw: &str, delimiter: char) -> Vec<String> {
    raw.split(delimiter)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Returns the value of the first `key=value` tag, or `default`.
#[must_use]
pub fn tag_option<'a>(tags: &'a BTreeSet<String>, key: &str, default: &'a str) -> &'a str {
    tags.iter()
        .find_map(|t| {
            t.split_once('=')
                .filter(|(k, _)| *k == key)
                .map(|(_, v)| v)
        })
        .unwrap_or(default)
}

// ---------------------------------------------------------------------------
// OperationDescriptor
// ---------------------------------------------------------------------------

/// Catalog entry binding an address to metadata.
///
/// Immutable once stored; providers replace entries instead of mutating
/// them, except for the federation catalog's `last_updated` stamp.
#[derive(Clone)]
pub struct OperationDescriptor {
    address: OperationAddress,
    title: String,
    form: Option<serde_json::Value>,
    tags: BTreeSet<String>,
    acl: String,
    last_updated: Option<u64>,
    operation: Option<Arc<dyn Operation>>,
}

impl OperationDescriptor {
    /// Creates a metadata-only descriptor.
    #[must_use]
    pub fn new(
        address: OperationAddress,
        description: &OperationDescription,
        tags: BTreeSet<String>,
        acl: impl Into<String>,
    ) -> Self {
        Self {
            address,
            title: description.title().to_string(),
            form: description.form().cloned(),
            tags,
            acl: acl.into(),
            last_updated: None,
            operation: None,
        }
    }

    /// Attaches the callable behind this descriptor.
    #[must_use]
    pub fn with_operation(mut self, operation: Arc<dyn Operation>) -> Self {
        self.operation = Some(operation);
        self
    }

    #[must_use]
    pub fn with_last_updated(mut self, stamp: u64) -> Self {
        self.last_updated = Some(stamp);
        self
    }

    pub fn set_last_updated(&mut self, stamp: u64) {
        self.last_updated = Some(stamp);
    }

    #[must_use]
    pub fn address(&self) -> &OperationAddress {
        &self.address
    }

    #[must_use]
    pub fn provider(&self) -> &str {
        self.address.provider()
    }

    #[must_use]
    pub fn path(&self) -> &str {
        self.address.path()
    }

    #[must_use]
    pub fn version(&self) -> &Version {
        self.address.version()
    }

    #[must_use]
    pub fn version_string(&self) -> String {
        self.address.version_string()
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn form(&self) -> Option<&serde_json::Value> {
        self.form.as_ref()
    }

    #[must_use]
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    #[must_use]
    pub fn acl(&self) -> &str {
        &self.acl
    }

    /// Stamp of the last federation announce; `None` for local entries.
    #[must_use]
    pub fn last_updated(&self) -> Option<u64> {
        self.last_updated
    }

    /// Typed capability query: the callable, when this node holds it.
    #[must_use]
    pub fn operation(&self) -> Option<Arc<dyn Operation>> {
        self.operation.clone()
    }

    /// `path:version`.
    #[must_use]
    pub fn registry_key(&self) -> String {
        self.address.registry_key()
    }

    /// Two descriptors describe the same operation iff path and version string match.
    #[must_use]
    pub fn is_same_operation(&self, other: &Self) -> bool {
        self.path() == other.path() && self.version_string() == other.version_string()
    }
}

impl fmt::Debug for OperationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationDescriptor")
            .field("address", &self.address.to_string())
            .field("title", &self.title)
            .field("tags", &self.tags)
            .field("acl", &self.acl)
            .field("last_updated", &self.last_updated)
            .field("has_operation", &self.operation.is_some())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn description_path_from_group_and_name() {
        let d = OperationDescription::new("de.xyz", "Operation", Version::Any, "Op");
        assert_eq!(d.path(), "de.xyz.Operation");
        assert_eq!(d.registry_key(), "de.xyz.Operation:*");
        let d = OperationDescription::new("", "Ping", Version::Any, "Ping");
        assert_eq!(d.path(), "Ping");
    }

    #[test]
    fn embedded_tags_split_on_semicolon() {
        let d = OperationDescription::from_path("a.b", Version::Any, "t").with_tags("x; y;;acl=*");
        assert_eq!(d.embedded_tags(), vec!["x", "y", "acl=*"]);
    }

    #[test]
    fn tag_option_finds_key_value() {
        let t = tags(&["admin", "acl=user:read"]);
        assert_eq!(tag_option(&t, TAG_DEFAULT_ACL, ""), "user:read");
        assert_eq!(tag_option(&t, "missing", "fallback"), "fallback");
    }

    #[test]
    fn same_operation_ignores_provider() {
        let desc = OperationDescription::from_path("a.b", Version::parse("1.0").unwrap(), "t");
        let local = OperationDescriptor::new(
            OperationAddress::parse("local://a.b:1.0").unwrap(),
            &desc,
            BTreeSet::new(),
            "",
        );
        let remote = OperationDescriptor::new(
            OperationAddress::parse("jms://a.b:1.0/q/c").unwrap(),
            &desc,
            BTreeSet::new(),
            "",
        );
        assert!(local.is_same_operation(&remote));
        assert!(local.operation().is_none());
        assert!(local.last_updated().is_none());
    }
}

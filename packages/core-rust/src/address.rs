//! Operation addresses.
//!
//! An address names an operation independently of where it runs:
//!
//! ```text
//! jms://de.xyz.Operation:1.2.3/remote/sop
//! ^^^   ^^^^^^ ^^^^^^^^^ ^^^^^ ^^^^^^ ^^^
//! |     group  name      |     queue  connection
//! provider               version
//! ```
//!
//! The scheme defaults to [`DEFAULT_PROVIDER`], the version to
//! [`Version::Any`]. Everything after the first `/` is kept as ordered
//! residual parts (federation uses them for queue and connection).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AddressError;
use crate::version::Version;

/// Provider name assumed when the address has no scheme.
pub const DEFAULT_PROVIDER: &str = "local";

const SCHEME_SEPARATOR: &str = "://";

/// Parsed operation address.
///
/// `path` is never empty. Stringification returns the parsed input text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OperationAddress {
    provider: String,
    path: String,
    version: Version,
    parts: Vec<String>,
    raw: String,
}

impl OperationAddress {
    /// Parses an address string.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError::EmptyPath`] if no path remains after removing
    /// scheme, version and parts, and [`AddressError::Version`] if the version
    /// token is malformed.
    pub fn parse(input: &str) -> Result<Self, AddressError> {
        let (provider, rest) = match input.find(SCHEME_SEPARATOR) {
            Some(p) => (&input[..p], &input[p + SCHEME_SEPARATOR.len()..]),
            None => (DEFAULT_PROVIDER, input),
        };

        let (path_and_version, residual) = match rest.split_once('/') {
            Some((head, tail)) => (head, tail),
            None => (rest, ""),
        };

        let (path, version) = match path_and_version.split_once(':') {
            Some((path, version)) => {
                let version = Version::parse(version).map_err(|source| AddressError::Version {
                    input: input.to_string(),
                    source,
                })?;
                (path, version)
            }
            None => (path_and_version, Version::Any),
        };

        if path.is_empty() {
            return Err(AddressError::EmptyPath {
                input: input.to_string(),
            });
        }

        let parts = if residual.is_empty() {
            Vec::new()
        } else {
            residual.split('/').map(str::to_string).collect()
        };

        Ok(Self {
            provider: provider.to_string(),
            path: path.to_string(),
            version,
            parts,
            raw: input.to_string(),
        })
    }

    /// Builds the canonical address `provider://path[:version][/part]*`.
    ///
    /// The version segment is omitted when `version` is `None` or
    /// [`Version::Any`].
    ///
    /// # Errors
    ///
    /// Returns [`AddressError::EmptyPath`] if `path` is empty.
    pub fn compose<S: AsRef<str>>(
        provider: &str,
        path: &str,
        version: Option<&Version>,
        parts: &[S],
    ) -> Result<Self, AddressError> {
        let mut out = String::with_capacity(provider.len() + path.len() + 16);
        out.push_str(provider);
        out.push_str(SCHEME_SEPARATOR);
        out.push_str(path);
        if let Some(v) = version.filter(|v| !v.is_any()) {
            out.push(':');
            out.push_str(&v.to_string());
        }
        for part in parts {
            out.push('/');
            out.push_str(part.as_ref());
        }
        Self::parse(&out)
    }

    /// Name of the provider owning the operation.
    #[must_use]
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Full dotted path (`group.name`).
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn version(&self) -> &Version {
        &self.version
    }

    #[must_use]
    pub fn version_string(&self) -> String {
        self.version.to_string()
    }

    /// Text before the last `.` of the path, or `""` without a dot.
    #[must_use]
    pub fn group(&self) -> &str {
        self.path.rsplit_once('.').map_or("", |(group, _)| group)
    }

    /// Text after the last `.` of the path, or the whole path without a dot.
    #[must_use]
    pub fn name(&self) -> &str {
        self.path.rsplit_once('.').map_or(self.path.as_str(), |(_, name)| name)
    }

    /// Residual part at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.part_count()`; callers check the count first.
    #[must_use]
    pub fn part(&self, index: usize) -> &str {
        &self.parts[index]
    }

    #[must_use]
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    #[must_use]
    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// Key under which a provider stores this operation: `path:version`.
    #[must_use]
    pub fn registry_key(&self) -> String {
        registry_key(&self.path, &self.version)
    }
}

/// Builds a provider-local registry key.
#[must_use]
pub fn registry_key(path: &str, version: &Version) -> String {
    format!("{path}:{version}")
}

impl fmt::Display for OperationAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for OperationAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for OperationAddress {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<OperationAddress> for String {
    fn from(value: OperationAddress) -> Self {
        value.raw
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn parses_full_federated_address() {
        let addr = OperationAddress::parse("jms://de.xyz.Operation:1.2.3/remote/sop").unwrap();
        assert_eq!(addr.provider(), "jms");
        assert_eq!(addr.path(), "de.xyz.Operation");
        assert_eq!(addr.group(), "de.xyz");
        assert_eq!(addr.name(), "Operation");
        assert_eq!(addr.version_string(), "1.2.3");
        assert_eq!(addr.parts(), ["remote", "sop"]);
        assert_eq!(addr.part(0), "remote");
        assert_eq!(addr.part(1), "sop");
        assert_eq!(addr.to_string(), "jms://de.xyz.Operation:1.2.3/remote/sop");
    }

    #[test]
    fn defaults_without_scheme_or_version() {
        let addr = OperationAddress::parse("de.xyz.Operation").unwrap();
        assert_eq!(addr.provider(), DEFAULT_PROVIDER);
        assert!(addr.version().is_any());
        assert_eq!(addr.part_count(), 0);
        assert_eq!(addr.registry_key(), "de.xyz.Operation:*");
    }

    #[test]
    fn path_without_dot_has_empty_group() {
        let addr = OperationAddress::parse("local://Ping:1").unwrap();
        assert_eq!(addr.group(), "");
        assert_eq!(addr.name(), "Ping");
    }

    #[test]
    fn empty_path_rejected() {
        assert!(matches!(
            OperationAddress::parse("jms://:1.0/q"),
            Err(AddressError::EmptyPath { .. })
        ));
        assert!(OperationAddress::parse("").is_err());
    }

    #[test]
    fn malformed_version_rejected() {
        assert!(matches!(
            OperationAddress::parse("a.b:one"),
            Err(AddressError::Version { .. })
        ));
    }

    #[test]
    #[should_panic(expected = "index out of bounds")]
    fn part_out_of_range_panics() {
        let addr = OperationAddress::parse("a.b").unwrap();
        let _ = addr.part(0);
    }

    #[test]
    fn compose_omits_missing_version() {
        let addr = OperationAddress::compose::<&str>("local", "a.b", None, &[]).unwrap();
        assert_eq!(addr.to_string(), "local://a.b");
        let addr =
            OperationAddress::compose("jms", "a.b", Some(&Version::Any), &["q", "c"]).unwrap();
        assert_eq!(addr.to_string(), "jms://a.b/q/c");
    }

    #[test]
    fn serde_as_string() {
        let addr = OperationAddress::parse("jms://a.b:2/q").unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"jms://a.b:2/q\"");
        let back: OperationAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    fn segment() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z0-9_]{0,8}"
    }

    proptest! {
        #[test]
        fn compose_parse_round_trip(
            provider in segment(),
            path in prop::collection::vec(segment(), 1..4).prop_map(|s| s.join(".")),
            version in prop::option::of(prop::collection::vec(0u64..50, 1..4)),
            parts in prop::collection::vec(segment(), 0..3),
        ) {
            let version = version.map(Version::Exact);
            let first = OperationAddress::compose(&provider, &path, version.as_ref(), &parts).unwrap();
            let second = OperationAddress::parse(&first.to_string()).unwrap();
            prop_assert_eq!(second.provider(), provider.as_str());
            prop_assert_eq!(second.path(), path.as_str());
            prop_assert_eq!(second.version(), &version.unwrap_or(Version::Any));
            prop_assert_eq!(second.parts(), parts.as_slice());
            prop_assert_eq!(second, first);
        }
    }
}

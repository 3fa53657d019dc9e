//! Discovery filters: path pattern, version range and required tags.

use std::collections::BTreeSet;

use regex::Regex;

use crate::descriptor::OperationDescriptor;
use crate::error::FilterError;
use crate::version::{Version, VersionRange};

/// Wildcard matching any run of characters in a path pattern.
pub const WILDCARD: &str = "*";

#[derive(Debug, Clone)]
enum PathPattern {
    Any,
    Exact(String),
    Glob(Regex),
}

impl PathPattern {
    fn compile(pattern: &str) -> Result<Self, FilterError> {
        if pattern == WILDCARD {
            return Ok(Self::Any);
        }
        if !pattern.contains(WILDCARD) {
            return Ok(Self::Exact(pattern.to_string()));
        }
        let body = pattern
            .split(WILDCARD)
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        Regex::new(&format!("^{body}$"))
            .map(Self::Glob)
            .map_err(|source| FilterError::Pattern {
                pattern: pattern.to_string(),
                source,
            })
    }

    fn matches(&self, path: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(p) => p == path,
            Self::Glob(re) => re.is_match(path),
        }
    }
}

/// Selects descriptors by path pattern, version range and required tags.
///
/// A descriptor matches when its path satisfies the pattern (`*` matches
/// any run of characters), its version lies in the range, and its tags are
/// a superset of the required tags.
#[derive(Debug, Clone)]
pub struct OperationFilter {
    pattern: String,
    path: PathPattern,
    version: VersionRange,
    tags: BTreeSet<String>,
}

impl OperationFilter {
    /// Creates a filter for `pattern` accepting every version and tag set.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::Empty`] for an empty pattern.
    pub fn new(pattern: &str) -> Result<Self, FilterError> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(FilterError::Empty);
        }
        Ok(Self {
            pattern: pattern.to_string(),
            path: PathPattern::compile(pattern)?,
            version: VersionRange::any(),
            tags: BTreeSet::new(),
        })
    }

    /// Filter matching every operation.
    #[must_use]
    pub fn any() -> Self {
        Self {
            pattern: WILDCARD.to_string(),
            path: PathPattern::Any,
            version: VersionRange::any(),
            tags: BTreeSet::new(),
        }
    }

    /// Filter for exactly one `path` at exactly one `version`.
    #[must_use]
    pub fn exact(path: &str, version: &Version) -> Self {
        Self {
            pattern: path.to_string(),
            path: PathPattern::Exact(path.to_string()),
            version: VersionRange::exact(version),
            tags: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_version(mut self, version: VersionRange) -> Self {
        self.version = version;
        self
    }

    /// Adds required tags.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    #[must_use]
    pub fn version_range(&self) -> &VersionRange {
        &self.version
    }

    #[must_use]
    pub fn required_tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Matches raw catalog fields.
    #[must_use]
    pub fn matches_parts(&self, path: &str, version: &Version, tags: &BTreeSet<String>) -> bool {
        self.path.matches(path) && self.version.includes(version) && tags.is_superset(&self.tags)
    }

    #[must_use]
    pub fn matches(&self, descriptor: &OperationDescriptor) -> bool {
        self.matches_parts(descriptor.path(), descriptor.version(), descriptor.tags())
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

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn star_matches_everything() {
        let f = OperationFilter::new("*").unwrap();
        assert!(f.matches_parts("a.b.C", &v("1"), &BTreeSet::new()));
        assert!(OperationFilter::any().matches_parts("x", &Version::Any, &tags(&["t"])));
    }

    #[test]
    fn exact_pattern() {
        let f = OperationFilter::new("de.xyz.Op").unwrap();
        assert!(f.matches_parts("de.xyz.Op", &v("1"), &BTreeSet::new()));
        assert!(!f.matches_parts("de.xyz.Op2", &v("1"), &BTreeSet::new()));
    }

    #[test]
    fn glob_pattern_escapes_dots() {
        let f = OperationFilter::new("de.*.Op").unwrap();
        assert!(f.matches_parts("de.xyz.Op", &v("1"), &BTreeSet::new()));
        assert!(!f.matches_parts("deXxyzXOp", &v("1"), &BTreeSet::new()));
        let prefix = OperationFilter::new("de.xyz.*").unwrap();
        assert!(prefix.matches_parts("de.xyz.Anything", &v("1"), &BTreeSet::new()));
    }

    #[test]
    fn required_tags_are_a_subset() {
        let f = OperationFilter::any().with_tags(["admin", "fast"]);
        assert!(f.matches_parts("a", &v("1"), &tags(&["admin", "fast", "extra"])));
        assert!(!f.matches_parts("a", &v("1"), &tags(&["admin"])));
    }

    #[test]
    fn version_range_applies() {
        let f = OperationFilter::new("a")
            .unwrap()
            .with_version(VersionRange::parse("[2,3)").unwrap());
        assert!(f.matches_parts("a", &v("2.5"), &BTreeSet::new()));
        assert!(!f.matches_parts("a", &v("3"), &BTreeSet::new()));
    }

    #[test]
    fn empty_pattern_rejected() {
        assert!(matches!(OperationFilter::new("  "), Err(FilterError::Empty)));
    }
}

//! Operation versions and version ranges.
//!
//! A version is a dot-separated list of numeric segments (`1.2.3`),
//! optionally closed by one qualifier segment (`1.0.0.SNAPSHOT`). A
//! qualifier is made of ASCII letters, digits, `-` and `_`, and must follow
//! at least one numeric segment. A missing version is the [`Version::Any`]
//! sentinel, written as `*`. Ranges use OSGi interval notation:
//!
//! - `[1.0,2.0)` -- at least 1.0, below 2.0
//! - `(1.0,2.0]` -- above 1.0, at most 2.0
//! - `1.2` -- at least 1.2
//! - `*` -- everything

use std::cmp::Ordering;
use std::fmt;
use std::ops::Bound;
use std::str::FromStr;

use crate::error::VersionError;

/// Token used for the "any version" sentinel.
pub const ANY_VERSION: &str = "*";

// ---------------------------------------------------------------------------
// Version
// ---------------------------------------------------------------------------

/// Version of an operation.
///
/// Equality is textual (`1.0` and `1.0.0` are different registry keys).
/// Ordering for range checks pads missing numeric segments with zero, then
/// compares qualifiers lexically; no qualifier sorts below any qualifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Version {
    /// No version given; matches every range.
    #[default]
    Any,
    /// Concrete numeric version.
    Exact(Vec<u64>),
    /// Numeric version closed by a qualifier segment.
    Qualified { segments: Vec<u64>, qualifier: String },
}

fn is_qualifier(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl Version {
    /// Parses a version token. Empty input and `*` yield [`Version::Any`].
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::InvalidSegment`] if a segment is neither a
    /// number nor a trailing qualifier.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed == ANY_VERSION {
            return Ok(Self::Any);
        }
        let invalid = |segment: &str| VersionError::InvalidSegment {
            input: input.to_string(),
            segment: segment.to_string(),
        };

        let mut segments = Vec::new();
        let mut parts = trimmed.split('.').peekable();
        while let Some(part) = parts.next() {
            if let Ok(number) = part.parse::<u64>() {
                segments.push(number);
                continue;
            }
            if parts.peek().is_some() || segments.is_empty() || !is_qualifier(part) {
                return Err(invalid(part));
            }
            return Ok(Self::Qualified {
                segments,
                qualifier: part.to_string(),
            });
        }
        Ok(Self::Exact(segments))
    }

    /// Returns `true` for the "any version" sentinel.
    #[must_use]
    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    /// Numeric segments; empty for [`Version::Any`].
    #[must_use]
    pub fn segments(&self) -> &[u64] {
        match self {
            Self::Any => &[],
            Self::Exact(segments) | Self::Qualified { segments, .. } => segments.as_slice(),
        }
    }

    #[must_use]
    pub fn qualifier(&self) -> Option<&str> {
        match self {
            Self::Qualified { qualifier, .. } => Some(qualifier),
            _ => None,
        }
    }

    /// Range-check ordering of two concrete versions.
    fn precedence(&self, other: &Self) -> Ordering {
        Self::compare_segments(self.segments(), other.segments())
            .then_with(|| self.qualifier().cmp(&other.qualifier()))
    }

    /// Compares two concrete segment lists, padding the shorter with zeros.
    fn compare_segments(a: &[u64], b: &[u64]) -> Ordering {
        let len = a.len().max(b.len());
        for i in 0..len {
            let left = a.get(i).copied().unwrap_or(0);
            let right = b.get(i).copied().unwrap_or(0);
            match left.cmp(&right) {
                Ordering::Equal => {}
                other => return other,
            }
        }
        Ordering::Equal
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_any() {
            return f.write_str(ANY_VERSION);
        }
        for (i, s) in self.segments().iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{s}")?;
        }
        if let Some(qualifier) = self.qualifier() {
            write!(f, ".{qualifier}")?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ---------------------------------------------------------------------------
// VersionRange
// ---------------------------------------------------------------------------

/// Interval of acceptable versions. The default range accepts everything.
///
/// Bounds only ever hold concrete versions; an open side is `Unbounded`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    lower: Bound<Version>,
    upper: Bound<Version>,
}

impl Default for VersionRange {
    fn default() -> Self {
        Self::any()
    }
}

impl VersionRange {
    /// Range accepting every version.
    #[must_use]
    pub fn any() -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: Bound::Unbounded,
        }
    }

    /// Range accepting exactly one version. `Any` yields the open range.
    #[must_use]
    pub fn exact(version: &Version) -> Self {
        if version.is_any() {
            return Self::any();
        }
        Self {
            lower: Bound::Included(version.clone()),
            upper: Bound::Included(version.clone()),
        }
    }

    /// Range accepting `version` and everything above it.
    #[must_use]
    pub fn at_least(version: &Version) -> Self {
        if version.is_any() {
            return Self::any();
        }
        Self {
            lower: Bound::Included(version.clone()),
            upper: Bound::Unbounded,
        }
    }

    /// Parses OSGi interval notation.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError`] on unbalanced brackets, a missing comma,
    /// or malformed version tokens.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed == ANY_VERSION {
            return Ok(Self::any());
        }

        let first = trimmed.chars().next();
        if !matches!(first, Some('[' | '(')) {
            return Ok(Self::at_least(&Version::parse(trimmed)?));
        }

        let last = trimmed.chars().last();
        if !matches!(last, Some(']' | ')')) || trimmed.len() < 2 {
            return Err(VersionError::InvalidRange {
                input: input.to_string(),
                reason: "missing closing bracket",
            });
        }
        let inner = &trimmed[1..trimmed.len() - 1];
        let Some((low, high)) = inner.split_once(',') else {
            return Err(VersionError::InvalidRange {
                input: input.to_string(),
                reason: "expected two comma-separated bounds",
            });
        };

        let lower = match Version::parse(low)? {
            Version::Any => Bound::Unbounded,
            v if first == Some('[') => Bound::Included(v),
            v => Bound::Excluded(v),
        };
        let upper = match Version::parse(high)? {
            Version::Any => Bound::Unbounded,
            v if last == Some(']') => Bound::Included(v),
            v => Bound::Excluded(v),
        };
        Ok(Self { lower, upper })
    }

    /// Returns `true` if the range has no bounds.
    #[must_use]
    pub fn is_any(&self) -> bool {
        matches!(
            (&self.lower, &self.upper),
            (Bound::Unbounded, Bound::Unbounded)
        )
    }

    /// Returns `true` if `version` lies inside the range.
    ///
    /// [`Version::Any`] is inside every range.
    #[must_use]
    pub fn includes(&self, version: &Version) -> bool {
        if version.is_any() {
            return true;
        }
        let lower_ok = match &self.lower {
            Bound::Unbounded => true,
            Bound::Included(b) => version.precedence(b) != Ordering::Less,
            Bound::Excluded(b) => version.precedence(b) == Ordering::Greater,
        };
        let upper_ok = match &self.upper {
            Bound::Unbounded => true,
            Bound::Included(b) => version.precedence(b) != Ordering::Greater,
            Bound::Excluded(b) => version.precedence(b) == Ordering::Less,
        };
        lower_ok && upper_ok
    }
}

impl FromStr for VersionRange {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn parse_and_display() {
        assert_eq!(v("1.2.3"), Version::Exact(vec![1, 2, 3]));
        assert_eq!(v("1.2.3").to_string(), "1.2.3");
        assert_eq!(v(""), Version::Any);
        assert_eq!(v("*"), Version::Any);
        assert_eq!(Version::Any.to_string(), "*");
    }

    #[test]
    fn parse_rejects_misplaced_qualifier() {
        let err = Version::parse("1.x.2").unwrap_err();
        assert!(matches!(err, VersionError::InvalidSegment { segment, .. } if segment == "x"));
        assert!(Version::parse("beta").is_err());
        assert!(Version::parse("1.0.").is_err());
        assert!(Version::parse("1.0.SNAP SHOT").is_err());
    }

    #[test]
    fn trailing_qualifier_is_kept() {
        let snapshot = v("1.0.0.SNAPSHOT");
        assert_eq!(
            snapshot,
            Version::Qualified {
                segments: vec![1, 0, 0],
                qualifier: "SNAPSHOT".to_string(),
            }
        );
        assert_eq!(snapshot.to_string(), "1.0.0.SNAPSHOT");
        assert_eq!(snapshot.segments(), &[1, 0, 0]);
        assert_eq!(snapshot.qualifier(), Some("SNAPSHOT"));
        assert_eq!(v("2.rc-1_b").to_string(), "2.rc-1_b");
        assert_ne!(snapshot, v("1.0.0"));
    }

    #[test]
    fn qualifier_sorts_after_bare_version() {
        let range = VersionRange::parse("(1.0.0,1.0.0.b]").unwrap();
        assert!(!range.includes(&v("1.0.0")));
        assert!(range.includes(&v("1.0.0.a")));
        assert!(range.includes(&v("1.0.0.b")));
        assert!(!range.includes(&v("1.0.0.c")));
        assert!(!range.includes(&v("1.0.1")));

        let exact = VersionRange::exact(&v("3.1.FINAL"));
        assert!(exact.includes(&v("3.1.0.FINAL")));
        assert!(!exact.includes(&v("3.1")));
    }

    #[test]
    fn textual_equality_differs_from_ordering() {
        assert_ne!(v("1.0"), v("1.0.0"));
        assert!(VersionRange::exact(&v("1.0")).includes(&v("1.0.0")));
    }

    #[test]
    fn half_open_interval() {
        let range = VersionRange::parse("[1.0,2.0)").unwrap();
        assert!(range.includes(&v("1.0")));
        assert!(range.includes(&v("1.9.9")));
        assert!(!range.includes(&v("2.0")));
        assert!(!range.includes(&v("0.9")));
    }

    #[test]
    fn exclusive_lower_inclusive_upper() {
        let range = VersionRange::parse("(1.0,2.0]").unwrap();
        assert!(!range.includes(&v("1.0")));
        assert!(range.includes(&v("2.0")));
    }

    #[test]
    fn bare_version_means_at_least() {
        let range = VersionRange::parse("1.2").unwrap();
        assert!(range.includes(&v("1.2")));
        assert!(range.includes(&v("7")));
        assert!(!range.includes(&v("1.1.9")));
    }

    #[test]
    fn any_version_is_inside_every_range() {
        let range = VersionRange::parse("[5,6)").unwrap();
        assert!(range.includes(&Version::Any));
    }

    #[test]
    fn star_and_empty_are_open() {
        assert!(VersionRange::parse("*").unwrap().is_any());
        assert!(VersionRange::parse("").unwrap().is_any());
        assert!(VersionRange::default().is_any());
    }

    #[test]
    fn malformed_ranges_rejected() {
        assert!(VersionRange::parse("[1.0,2.0").is_err());
        assert!(VersionRange::parse("[1.0]").is_err());
    }
}

//! manatee-open version identifiers.
//!
//! Supports:
//! - Two components: `2.208` (patch defaults to 0)
//! - Three components: `2.214.1`
//! - Custom builds: `2.225.8-cnc` (suffix stripped, kept as the variant)
//!
//! Ordering and equality only look at `(major, minor, patch)`; the variant
//! is carried for display purposes.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use thiserror::Error;

/// Suffix appended to custom manatee-open builds. It carries no ordering
/// information and is stripped before the numeric components are parsed.
pub const VARIANT_SUFFIX: &str = "-cnc";

/// First release which splits `hat-trie` and `fsa3` into separately built
/// static components. Both the derived link flags and the source
/// preparation change shape from this version on.
pub const THRESHOLD_VERSION: Version = Version::new(2, 208, 0);

/// Versions manabuild is willing to build against unless told otherwise.
pub const DEFAULT_KNOWN_VERSIONS: &[&str] = &[
    "2.167.8", "2.167.10", "2.208.0", "2.214.1", "2.223.6", "2.225.8",
];

/// A malformed version string. Never silently defaulted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Wrong number of dot-separated components
    #[error("invalid version specifier: {0}")]
    InvalidSpecifier(String),

    /// A component is not a plain decimal number
    #[error("invalid version component `{component}` in {input}")]
    NonNumeric {
        /// Whole input string
        input: String,
        /// Offending component
        component: String,
    },
}

/// A parsed manatee-open version.
///
/// Values are immutable once constructed.
#[derive(Debug, Clone)]
pub struct Version {
    major: u32,
    minor: u32,
    patch: u32,
    variant: String,
}

impl Version {
    /// Construct a plain (variant-less) version.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            variant: String::new(),
        }
    }

    /// Parse a version string such as `2.208`, `2.214.1` or `2.225.8-cnc`.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] when the string does not have two or three
    /// dot-separated components, or when a component is not a number.
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let (numeric, variant) = match input.strip_suffix(VARIANT_SUFFIX) {
            Some(stripped) => (stripped, VARIANT_SUFFIX.trim_start_matches('-')),
            None => (input, ""),
        };

        let items: Vec<&str> = numeric.split('.').collect();
        if !(2..=3).contains(&items.len()) {
            return Err(ParseError::InvalidSpecifier(input.to_string()));
        }

        let component = |s: &str| {
            let non_numeric = || ParseError::NonNumeric {
                input: input.to_string(),
                component: s.to_string(),
            };
            // `u32::from_str` would also take a leading `+`
            if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                return Err(non_numeric());
            }
            s.parse::<u32>().map_err(|_| non_numeric())
        };

        Ok(Self {
            major: component(items[0])?,
            minor: component(items[1])?,
            patch: items.get(2).map_or(Ok(0), |s| component(*s))?,
            variant: variant.to_string(),
        })
    }

    /// Major component
    pub fn major(&self) -> u32 {
        self.major
    }

    /// Minor component
    pub fn minor(&self) -> u32 {
        self.minor
    }

    /// Patch component (0 when the input omitted it)
    pub fn patch(&self) -> u32 {
        self.patch
    }

    /// Custom-build variant, empty for upstream releases
    pub fn variant(&self) -> &str {
        &self.variant
    }

    /// Normalized `major.minor.patch` form used for allow-list membership
    /// and cache paths.
    pub fn canonical(&self) -> String {
        format!("{}.{}.{}", self.major, self.minor, self.patch)
    }

    /// Name of the upstream source distribution, e.g. `manatee-open-2.208.0`.
    pub fn dist_name(&self) -> String {
        format!("manatee-open-{}", self.canonical())
    }

    /// Whether this version builds `hat-trie` and `fsa3` as separate static
    /// components, see [`THRESHOLD_VERSION`].
    pub fn has_static_components(&self) -> bool {
        *self >= THRESHOLD_VERSION
    }

    fn key(&self) -> (u32, u32, u32) {
        (self.major, self.minor, self.patch)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Version {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())?;
        if !self.variant.is_empty() {
            write!(f, "-{}", self.variant)?;
        }
        Ok(())
    }
}

/// Closed set of versions manabuild agrees to build against.
///
/// Entries are stored in canonical form, so `2.208` and `2.208.0` name the
/// same release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownVersions {
    canonical: Vec<String>,
}

impl KnownVersions {
    /// Build an allow-list from version strings, preserving their order.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if any entry is not a valid version.
    pub fn new<I, S>(entries: I) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let canonical = entries
            .into_iter()
            .map(|e| Version::parse(e.as_ref()).map(|v| v.canonical()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { canonical })
    }

    /// Exact match on the canonical form.
    pub fn contains(&self, version: &Version) -> bool {
        let wanted = version.canonical();
        self.canonical.iter().any(|c| *c == wanted)
    }

    /// Canonical entries in their configured order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.canonical.iter().map(String::as_str)
    }
}

impl Default for KnownVersions {
    fn default() -> Self {
        Self {
            canonical: DEFAULT_KNOWN_VERSIONS
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl fmt::Display for KnownVersions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_parse_three_components() {
        let ver = v("2.214.1");
        assert_eq!((ver.major(), ver.minor(), ver.patch()), (2, 214, 1));
        assert_eq!(ver.variant(), "");
    }

    #[test]
    fn test_parse_patch_defaults_to_zero() {
        let ver = v("2.208");
        assert_eq!(ver.patch(), 0);
        assert_eq!(ver.canonical(), "2.208.0");
    }

    #[test]
    fn test_parse_strips_variant() {
        let ver = v("2.225.8-cnc");
        assert_eq!(ver.canonical(), "2.225.8");
        assert_eq!(ver.variant(), "cnc");
        assert_eq!(ver.to_string(), "2.225.8-cnc");
    }

    #[test]
    fn test_parse_invalid() {
        assert!(matches!(
            Version::parse("2"),
            Err(ParseError::InvalidSpecifier(_))
        ));
        assert!(matches!(
            Version::parse("1.2.3.4"),
            Err(ParseError::InvalidSpecifier(_))
        ));
        assert!(matches!(
            Version::parse("2.x.1"),
            Err(ParseError::NonNumeric { .. })
        ));
        assert!(matches!(
            Version::parse("+2.+208"),
            Err(ParseError::NonNumeric { .. })
        ));
        assert!(matches!(
            Version::parse("2.208.+1"),
            Err(ParseError::NonNumeric { .. })
        ));
        assert!(matches!(
            Version::parse("2..1"),
            Err(ParseError::NonNumeric { .. })
        ));
        assert!(Version::parse("").is_err());
        assert!(Version::parse("2.208-beta").is_err());
    }

    #[test]
    fn test_canonical_round_trip() {
        for (input, expected) in [
            ("0.0", "0.0.0"),
            ("2.167.10", "2.167.10"),
            ("2.208", "2.208.0"),
            ("10.0.3", "10.0.3"),
        ] {
            let parsed = v(input);
            assert_eq!(parsed.canonical(), expected);
            assert_eq!(v(&parsed.canonical()), parsed);
        }
    }

    #[test]
    fn test_ordering_is_numeric() {
        assert!(v("2.167.10") > v("2.167.8"));
        assert!(v("2.208") > v("2.167.10"));
        assert!(v("3.0") > v("2.999.999"));
        assert!(v("2.208.0") < v("2.208.1"));
    }

    #[test]
    fn test_variant_ignored_by_comparison() {
        assert_eq!(v("2.225.8-cnc"), v("2.225.8"));
        assert_eq!(v("2.225.8-cnc").cmp(&v("2.225.8")), Ordering::Equal);
    }

    #[test]
    fn test_total_order_and_transitivity() {
        let versions: Vec<Version> = ["2.167.8", "2.167.10", "2.208", "2.208.0", "2.214.1", "0.0"]
            .iter()
            .map(|s| v(s))
            .collect();

        for a in &versions {
            for b in &versions {
                let outcomes = [a < b, a == b, a > b];
                assert_eq!(outcomes.iter().filter(|o| **o).count(), 1);
                for c in &versions {
                    if a < b && b < c {
                        assert!(a < c);
                    }
                }
            }
        }
    }

    #[test]
    fn test_threshold_is_exact() {
        assert!(!v("2.207.9").has_static_components());
        assert!(!v("2.167.10").has_static_components());
        assert!(v("2.208").has_static_components());
        assert!(v("2.208.0-cnc").has_static_components());
        assert!(v("2.214.1").has_static_components());
    }

    #[test]
    fn test_known_versions_normalize_entries() {
        let known = KnownVersions::new(["2.167.8", "2.208"]).unwrap();
        assert!(known.contains(&v("2.208.0")));
        assert!(known.contains(&v("2.167.8-cnc")));
        assert!(!known.contains(&v("2.214.1")));
        assert_eq!(known.to_string(), "2.167.8, 2.208.0");
    }

    #[test]
    fn test_known_versions_default() {
        let known = KnownVersions::default();
        assert!(known.contains(&v("2.208")));
        assert!(known.contains(&v("2.225.8")));
        assert_eq!(known.iter().count(), DEFAULT_KNOWN_VERSIONS.len());
    }

    #[test]
    fn test_dist_name() {
        assert_eq!(v("2.214.1").dist_name(), "manatee-open-2.214.1");
    }
}

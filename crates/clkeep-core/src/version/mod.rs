//! Version abstraction over the supported versioning schemas
//!
//! A [`Version`] is always produced under one [`VersionFormat`]; values parsed
//! under different formats are never compared within one run.

mod pep440;

pub use pep440::{Pep440Version, PreRelease};

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

/// Semver restricted to `alpha|beta|rc` pre-releases with a numeric suffix
static STRICT_SEMVER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:0|[1-9]\d*)\.(?:0|[1-9]\d*)\.(?:0|[1-9]\d*)(?:-(?:alpha|beta|rc)(?:0|[1-9]\d*))?$",
    )
    .expect("Invalid regex")
});

/// PEP 440 semantics written with semver-like dashes
static PYTHON_SEMVER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        ^
        (?:(?:0|[1-9]\d*)!)?
        (?:0|[1-9]\d*)\.(?:0|[1-9]\d*)\.(?:0|[1-9]\d*)
        (?:
            -(?:
                (?:alpha|beta|rc)(?:0|[1-9]\d*)(?:\.post(?:0|[1-9]\d*))?
                | (?:post(?:0|[1-9]\d*))
            )
        )?
        $",
    )
    .expect("Invalid regex")
});

/// Canonical PEP 440 spelling with a three-component release
static STRICT_PYTHON_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        ^
        (?:(?:0|[1-9]\d*)!)?
        (?:0|[1-9]\d*)\.(?:0|[1-9]\d*)\.(?:0|[1-9]\d*)
        (?:(?:a|b|rc)(?:0|[1-9]\d*))?
        (?:\.post(?:0|[1-9]\d*))?
        $",
    )
    .expect("Invalid regex")
});

/// Versioning schema used for parsing, ordering, and canonizing versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VersionFormat {
    /// Semantic versioning
    #[default]
    Semver,
    /// Semantic versioning with `alpha`, `beta`, and `rc` pre-releases only
    SemverStrict,
    /// PEP 440
    Python,
    /// PEP 440 with a mandatory three-component release and canonical spelling
    PythonStrict,
    /// PEP 440 semantics with semver-like syntax, e.g. `1.0.0-beta1.post2`
    PythonSemver,
    /// No versioning, releases are never ordered
    None,
}

impl VersionFormat {
    /// Name of the format as used in configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Semver => "semver",
            Self::SemverStrict => "semver-strict",
            Self::Python => "python",
            Self::PythonStrict => "python-strict",
            Self::PythonSemver => "python-semver",
            Self::None => "none",
        }
    }
}

impl fmt::Display for VersionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for VersionFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "semver" => Ok(Self::Semver),
            "semver-strict" => Ok(Self::SemverStrict),
            "python" => Ok(Self::Python),
            "python-strict" => Ok(Self::PythonStrict),
            "python-semver" => Ok(Self::PythonSemver),
            "none" => Ok(Self::None),
            _ => Err(format!("Unknown version format: {}", s)),
        }
    }
}

/// A parsed release version
#[derive(Debug, Clone)]
pub enum Version {
    Semver(semver::Version),
    Pep440(Pep440Version),
}

impl Version {
    /// Whether the version carries a pre-release component
    pub fn is_pre_release(&self) -> bool {
        match self {
            Self::Semver(v) => !v.pre.is_empty(),
            Self::Pep440(v) => v.is_prerelease(),
        }
    }

    /// Whether the version carries a post-release component
    pub fn is_post_release(&self) -> bool {
        match self {
            Self::Semver(_) => false,
            Self::Pep440(v) => v.is_postrelease(),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Semver(_) => 0,
            Self::Pep440(_) => 1,
        }
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    /// Build metadata doesn't take part in semver precedence.
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Semver(a), Self::Semver(b)) => (a.major, a.minor, a.patch, &a.pre)
                .cmp(&(b.major, b.minor, b.patch, &b.pre)),
            (Self::Pep440(a), Self::Pep440(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Semver(v) => write!(f, "{}", v),
            Self::Pep440(v) => write!(f, "{}", v),
        }
    }
}

/// Parse a version under the given format
///
/// Returns `None` for text that doesn't follow the format, and always for
/// [`VersionFormat::None`].
pub fn parse_version(text: &str, format: VersionFormat) -> Option<Version> {
    match format {
        VersionFormat::Semver => semver::Version::parse(text).ok().map(Version::Semver),
        VersionFormat::SemverStrict => {
            if !STRICT_SEMVER_REGEX.is_match(text) {
                return None;
            }
            semver::Version::parse(text).ok().map(Version::Semver)
        }
        VersionFormat::Python => Pep440Version::parse(text).map(Version::Pep440),
        VersionFormat::PythonStrict => {
            if !STRICT_PYTHON_REGEX.is_match(text) {
                return None;
            }
            Pep440Version::parse(text).map(Version::Pep440)
        }
        VersionFormat::PythonSemver => {
            if !PYTHON_SEMVER_REGEX.is_match(text) {
                return None;
            }
            Pep440Version::parse(text).map(Version::Pep440)
        }
        VersionFormat::None => None,
    }
}

/// Render a parsed version in the canonical spelling of the given format
pub fn canonize_version(version: &Version, format: VersionFormat) -> Option<String> {
    match (format, version) {
        (VersionFormat::None, _) => None,
        (VersionFormat::PythonSemver, Version::Pep440(v)) => Some(python_semver_string(v)),
        _ => Some(version.to_string()),
    }
}

/// Parse a version and return its canonical spelling, falling back to the
/// text itself when it doesn't parse
pub fn canonize_str(text: &str, format: VersionFormat) -> String {
    parse_version(text, format)
        .and_then(|v| canonize_version(&v, format))
        .unwrap_or_else(|| text.to_string())
}

fn python_semver_string(version: &Pep440Version) -> String {
    assert!(
        version.dev().is_none(),
        "development releases can't be expressed in python-semver syntax"
    );
    assert!(
        !version.has_local(),
        "local versions can't be expressed in python-semver syntax"
    );
    assert!(
        version.release().len() <= 3,
        "python-semver releases have at most three components"
    );

    let mut out = String::new();

    if version.epoch() != 0 {
        out.push_str(&format!("{}!", version.epoch()));
    }

    let component = |i: usize| version.release().get(i).copied().unwrap_or(0);
    out.push_str(&format!("{}.{}.{}", component(0), component(1), component(2)));

    if let Some((phase, n)) = version.pre() {
        let name = match phase {
            PreRelease::Alpha => "alpha",
            PreRelease::Beta => "beta",
            PreRelease::Rc => "rc",
        };
        out.push_str(&format!("-{}{}", name, n));
    }

    if let Some(n) = version.post() {
        if version.pre().is_some() {
            out.push_str(&format!(".post{}", n));
        } else {
            out.push_str(&format!("-post{}", n));
        }
    }

    out
}

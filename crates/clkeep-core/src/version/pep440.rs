//! PEP 440 versions
//!
//! Parsing, normalization and ordering come from `pep440_rs`; this module
//! exposes the pieces the release workflows need.

use pep440_rs::{Prerelease, PrereleaseKind};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use tracing::trace;

/// Pre-release phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PreRelease {
    Alpha,
    Beta,
    Rc,
}

impl PreRelease {
    /// Normalized PEP 440 spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alpha => "a",
            Self::Beta => "b",
            Self::Rc => "rc",
        }
    }

    fn kind(self) -> PrereleaseKind {
        match self {
            Self::Alpha => PrereleaseKind::Alpha,
            Self::Beta => PrereleaseKind::Beta,
            Self::Rc => PrereleaseKind::Rc,
        }
    }
}

impl From<PrereleaseKind> for PreRelease {
    fn from(kind: PrereleaseKind) -> Self {
        match kind {
            PrereleaseKind::Alpha => Self::Alpha,
            PrereleaseKind::Beta => Self::Beta,
            PrereleaseKind::Rc => Self::Rc,
        }
    }
}

/// A parsed PEP 440 version
#[derive(Debug, Clone)]
pub struct Pep440Version(pep440_rs::Version);

impl Pep440Version {
    /// Parse any valid PEP 440 spelling
    pub fn parse(text: &str) -> Option<Self> {
        match pep440_rs::Version::from_str(text.trim()) {
            Ok(version) => Some(Self(version)),
            Err(err) => {
                trace!(text, %err, "not a PEP 440 version");
                None
            }
        }
    }

    /// Build a public version from its components
    pub fn new(epoch: u64, release: &[u64], pre: Option<(PreRelease, u64)>, post: Option<u64>) -> Self {
        let version = pep440_rs::Version::new(release.iter().copied())
            .with_epoch(epoch)
            .with_pre(pre.map(|(phase, number)| Prerelease {
                kind: phase.kind(),
                number,
            }))
            .with_post(post);
        Self(version)
    }

    pub fn epoch(&self) -> u64 {
        self.0.epoch()
    }

    pub fn release(&self) -> &[u64] {
        self.0.release()
    }

    pub fn pre(&self) -> Option<(PreRelease, u64)> {
        self.0.pre().map(|pre| (pre.kind.into(), pre.number))
    }

    pub fn post(&self) -> Option<u64> {
        self.0.post()
    }

    pub fn dev(&self) -> Option<u64> {
        self.0.dev()
    }

    /// Whether the version carries a `+local` label
    pub fn has_local(&self) -> bool {
        self.0.to_string().contains('+')
    }

    /// Whether this is a pre-release (including development releases)
    pub fn is_prerelease(&self) -> bool {
        self.pre().is_some() || self.dev().is_some()
    }

    /// Whether this is a post-release
    pub fn is_postrelease(&self) -> bool {
        self.post().is_some()
    }
}

impl PartialEq for Pep440Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Pep440Version {}

impl PartialOrd for Pep440Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pep440Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl fmt::Display for Pep440Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//! Version bumping

use clkeep_core::error::{ReleaseError, VersionError};
use clkeep_core::version::{Pep440Version, PreRelease};
use clkeep_core::{canonize_version, Result, Settings, Version};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use tracing::{debug, instrument};

use crate::model::Section;

/// Splits a semver pre-release into its label and trailing number
static SEMVER_PRE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-zA-Z0-9.-]*?)([0-9]*)$").expect("Invalid regex"));

/// Which version component to bump
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BumpMode {
    /// Pick major, minor, or patch from the unreleased change categories
    Auto,
    Major,
    Minor,
    Patch,
    /// Post-release, PEP 440 schemas only
    Post,
}

impl fmt::Display for BumpMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Auto => "auto",
            Self::Major => "major",
            Self::Minor => "minor",
            Self::Patch => "patch",
            Self::Post => "post",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for BumpMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "major" => Ok(Self::Major),
            "minor" => Ok(Self::Minor),
            "patch" => Ok(Self::Patch),
            "post" => Ok(Self::Post),
            _ => Err(format!("Unknown bump mode: {}", s)),
        }
    }
}

/// Pre-release phase to create
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreReleaseKind {
    Alpha,
    Beta,
    Rc,
}

impl PreReleaseKind {
    fn from_label(label: &str) -> Option<Self> {
        match label {
            "a" | "alpha" => Some(Self::Alpha),
            "b" | "beta" => Some(Self::Beta),
            "rc" => Some(Self::Rc),
            _ => None,
        }
    }

    fn semver_label(&self) -> &'static str {
        match self {
            Self::Alpha => "alpha",
            Self::Beta => "beta",
            Self::Rc => "rc",
        }
    }

    fn pep440(&self) -> PreRelease {
        match self {
            Self::Alpha => PreRelease::Alpha,
            Self::Beta => PreRelease::Beta,
            Self::Rc => PreRelease::Rc,
        }
    }
}

/// What to bump
///
/// A request without a mode bumps the pre-release number of a version that
/// already is a pre-release.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BumpRequest {
    pub mode: Option<BumpMode>,
    pub pre_release: Option<PreReleaseKind>,
}

impl BumpRequest {
    /// Bump a version component
    pub fn new(mode: BumpMode) -> Self {
        Self {
            mode: Some(mode),
            pre_release: None,
        }
    }

    /// Bump only the pre-release component
    pub fn pre_release(kind: PreReleaseKind) -> Self {
        Self {
            mode: None,
            pre_release: Some(kind),
        }
    }

    /// Make the bumped version a pre-release
    pub fn with_pre_release(mut self, kind: PreReleaseKind) -> Self {
        self.pre_release = Some(kind);
        self
    }
}

/// Version decomposed into the components a bump works on
#[derive(Debug, Clone, PartialEq, Eq)]
struct Components {
    epoch: u64,
    major: u64,
    minor: u64,
    patch: u64,
    /// Pre-release label as written, and its number
    pre: Option<(String, u64)>,
    post: Option<u64>,
}

impl Components {
    fn from_version(version: &Version) -> Self {
        match version {
            Version::Semver(v) => Self {
                epoch: 0,
                major: v.major,
                minor: v.minor,
                patch: v.patch,
                pre: split_semver_pre(v.pre.as_str()),
                post: None,
            },
            Version::Pep440(v) => {
                let component = |i: usize| v.release().get(i).copied().unwrap_or(0);
                Self {
                    epoch: v.epoch(),
                    major: component(0),
                    minor: component(1),
                    patch: component(2),
                    pre: v.pre().map(|(phase, n)| (phase.as_str().to_string(), n)),
                    post: v.post(),
                }
            }
        }
    }
}

fn increment(n: u64, component: &str) -> Result<u64> {
    n.checked_add(1).ok_or_else(|| {
        VersionError::Unsupported(format!("Can't bump {} component {}: number is too large", component, n)).into()
    })
}

fn split_semver_pre(pre: &str) -> Option<(String, u64)> {
    if pre.is_empty() {
        return None;
    }
    match SEMVER_PRE_REGEX.captures(pre) {
        Some(caps) => {
            let label = caps[1].trim_end_matches(['.', '-']).to_string();
            let number = caps[2].parse().unwrap_or(0);
            Some((label, number))
        }
        None => Some((pre.to_string(), 0)),
    }
}

/// Compute the next version after `latest`
///
/// `unreleased` is consulted by [`BumpMode::Auto`]. The result is spelled
/// canonically under the configured schema.
#[instrument(skip_all, fields(latest = %latest, mode = ?request.mode))]
pub fn bump_version(
    latest: &Version,
    request: BumpRequest,
    unreleased: Option<&Section>,
    settings: &Settings,
) -> Result<String> {
    let is_semver = matches!(latest, Version::Semver(_));
    let mut c = Components::from_version(latest);

    let mode = match request.mode {
        Some(BumpMode::Post) if is_semver => {
            return Err(VersionError::Unsupported(
                "Semver schema doesn't support creating post releases".to_string(),
            )
            .into());
        }
        Some(BumpMode::Auto) => match unreleased {
            Some(section) => Some(suggest_bump(section, settings)?),
            None => return Err(ReleaseError::CannotSuggestBump.into()),
        },
        mode => mode,
    };

    match mode {
        Some(BumpMode::Major) => {
            c = Components {
                major: increment(c.major, "major")?,
                minor: 0,
                patch: 0,
                pre: None,
                post: None,
                ..c
            }
        }
        Some(BumpMode::Minor) => {
            c = Components {
                minor: increment(c.minor, "minor")?,
                patch: 0,
                pre: None,
                post: None,
                ..c
            }
        }
        Some(BumpMode::Patch) => {
            c = Components {
                patch: increment(c.patch, "patch")?,
                pre: None,
                post: None,
                ..c
            }
        }
        Some(BumpMode::Post) => {
            if c.pre.is_some() {
                return Err(ReleaseError::InvalidBump(format!(
                    "Creating a post-release for pre-release {} is probably a mistake, specify the version manually",
                    latest
                ))
                .into());
            }
            c.post = Some(match c.post {
                Some(p) => increment(p, "post-release")?,
                None => 0,
            });
        }
        Some(BumpMode::Auto) => unreachable!("auto bump is resolved above"),
        None => {
            if request.pre_release.is_none() {
                return Err(ReleaseError::InvalidBump(
                    "Nothing to bump: specify a version component or a pre-release".to_string(),
                )
                .into());
            }
            if c.pre.is_none() {
                return Err(ReleaseError::InvalidBump(format!(
                    "Can't create a pre-release without bumping a primary version component: latest release {} is not a pre-release",
                    latest
                ))
                .into());
            }
        }
    }

    if let Some(kind) = request.pre_release {
        c.pre = Some(next_pre_release(c.pre.as_ref(), kind, latest)?);
    }

    let bumped = match latest {
        Version::Semver(_) => {
            let mut version = semver::Version::new(c.major, c.minor, c.patch);
            if let Some((label, n)) = &c.pre {
                let label = PreReleaseKind::from_label(label).map_or(label.as_str(), |k| k.semver_label());
                version.pre = semver::Prerelease::new(&format!("{}{}", label, n))
                    .map_err(|e| VersionError::Unsupported(e.to_string()))?;
            }
            Version::Semver(version)
        }
        Version::Pep440(_) => {
            let pre = match &c.pre {
                Some((label, n)) => PreReleaseKind::from_label(label).map(|k| (k.pep440(), *n)),
                None => None,
            };
            Version::Pep440(Pep440Version::new(c.epoch, &[c.major, c.minor, c.patch], pre, c.post))
        }
    };

    let canonical = canonize_version(&bumped, settings.version_format).ok_or_else(|| {
        VersionError::Unsupported(format!(
            "Can't spell version {} under {} specification",
            bumped, settings.version_format
        ))
    })?;

    debug!(?mode, pre_release = ?request.pre_release, result = %canonical, "bumped version");
    Ok(canonical)
}

fn next_pre_release(
    current: Option<&(String, u64)>,
    kind: PreReleaseKind,
    latest: &Version,
) -> Result<(String, u64)> {
    let current = match current {
        None => None,
        Some((label, n)) => match PreReleaseKind::from_label(label) {
            Some(current) => Some((current, *n)),
            None => {
                return Err(ReleaseError::InvalidBump(format!(
                    "Can't create a pre-release: latest release {} has unknown label '{}', specify the version manually",
                    latest, label
                ))
                .into());
            }
        },
    };

    let number = match (kind, current) {
        (kind, Some((current, n))) if kind == current => increment(n, "pre-release")?,
        (PreReleaseKind::Alpha, Some((current, _))) => {
            let what = match current {
                PreReleaseKind::Rc => "a release candidate",
                _ => "a beta pre-release",
            };
            return Err(ReleaseError::InvalidBump(format!(
                "Can't create an alpha pre-release after {}",
                what
            ))
            .into());
        }
        (PreReleaseKind::Beta, Some((PreReleaseKind::Rc, _))) => {
            return Err(ReleaseError::InvalidBump(
                "Can't create a beta pre-release after a release candidate".to_string(),
            )
            .into());
        }
        _ => 0,
    };

    Ok((kind.semver_label().to_string(), number))
}

/// Pick a version component from the unreleased change categories
///
/// Major categories win over minor ones, minor over patch. Unknown
/// categories are ignored.
pub fn suggest_bump(unreleased: &Section, settings: &Settings) -> Result<BumpMode> {
    let known = unreleased.subsections.iter().filter(|s| s.is_known());
    let mut suggestion: Option<BumpMode> = None;

    for subsection in known {
        let category = subsection.category();
        let mode = if settings.bump_major_categories.contains(category) {
            BumpMode::Major
        } else if settings.bump_minor_categories.contains(category) {
            BumpMode::Minor
        } else if settings.bump_patch_categories.contains(category) {
            BumpMode::Patch
        } else {
            continue;
        };
        debug!(category, %mode, "category warrants a bump");
        suggestion = Some(match (suggestion, mode) {
            (Some(BumpMode::Major), _) | (_, BumpMode::Major) => BumpMode::Major,
            (Some(BumpMode::Minor), _) | (_, BumpMode::Minor) => BumpMode::Minor,
            _ => BumpMode::Patch,
        });
    }

    suggestion.ok_or_else(|| ReleaseError::CannotSuggestBump.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SectionKind, SubSection, Unreleased};
    use crate::test_support::settings;
    use clkeep_core::{parse_version, KeeperError, VersionFormat};

    fn bump(latest: &str, format: VersionFormat, request: BumpRequest) -> Result<String> {
        let mut settings = settings();
        settings.version_format = format;
        let latest = parse_version(latest, format).unwrap();
        bump_version(&latest, request, None, &settings)
    }

    fn semver(latest: &str, request: BumpRequest) -> String {
        bump(latest, VersionFormat::Semver, request).unwrap()
    }

    fn python(latest: &str, request: BumpRequest) -> String {
        bump(latest, VersionFormat::Python, request).unwrap()
    }

    #[test]
    fn test_bump_components() {
        assert_eq!(semver("1.2.3", BumpRequest::new(BumpMode::Major)), "2.0.0");
        assert_eq!(semver("1.2.3", BumpRequest::new(BumpMode::Minor)), "1.3.0");
        assert_eq!(semver("1.2.3-rc.1", BumpRequest::new(BumpMode::Patch)), "1.2.4");
        assert_eq!(python("1!1.2.post3", BumpRequest::new(BumpMode::Minor)), "1!1.3.0");
    }

    #[test]
    fn test_bump_pre_release() {
        let request = BumpRequest::new(BumpMode::Major).with_pre_release(PreReleaseKind::Beta);
        assert_eq!(python("1.5.1", request), "2.0.0b0");
        assert_eq!(semver("1.5.1", request), "2.0.0-beta0");

        assert_eq!(python("1.0.0b0", BumpRequest::pre_release(PreReleaseKind::Beta)), "1.0.0b1");
        assert_eq!(python("1.0.0b0", BumpRequest::pre_release(PreReleaseKind::Rc)), "1.0.0rc0");
        assert_eq!(semver("1.0.0-alpha.2", BumpRequest::pre_release(PreReleaseKind::Alpha)), "1.0.0-alpha3");
        assert_eq!(
            bump("1.0.0-alpha1", VersionFormat::PythonSemver, BumpRequest::pre_release(PreReleaseKind::Beta)).unwrap(),
            "1.0.0-beta0"
        );
    }

    #[test]
    fn test_bump_pre_release_transitions_refused() {
        let alpha = BumpRequest::pre_release(PreReleaseKind::Alpha);
        let err = bump("1.0.0rc1", VersionFormat::Python, alpha).unwrap_err();
        assert_eq!(err.to_string(), "Can't create an alpha pre-release after a release candidate");
        let err = bump("1.0.0b1", VersionFormat::Python, alpha).unwrap_err();
        assert_eq!(err.to_string(), "Can't create an alpha pre-release after a beta pre-release");

        let beta = BumpRequest::pre_release(PreReleaseKind::Beta);
        assert!(bump("1.0.0rc1", VersionFormat::Python, beta).is_err());

        let err = bump("1.0.0", VersionFormat::Python, beta).unwrap_err();
        assert!(err.to_string().contains("is not a pre-release"));

        let err = bump("1.0.0-dev.1", VersionFormat::Semver, beta).unwrap_err();
        assert!(err.to_string().contains("unknown label 'dev'"));
    }

    #[test]
    fn test_bump_post_release() {
        assert_eq!(python("1.0.0", BumpRequest::new(BumpMode::Post)), "1.0.0.post0");
        assert_eq!(python("1.0.0.post0", BumpRequest::new(BumpMode::Post)), "1.0.0.post1");
        assert!(bump("1.0.0rc1", VersionFormat::Python, BumpRequest::new(BumpMode::Post)).is_err());

        let err = bump("1.0.0", VersionFormat::Semver, BumpRequest::new(BumpMode::Post)).unwrap_err();
        assert!(matches!(err, KeeperError::Version(VersionError::Unsupported(_))));
    }

    #[test]
    fn test_bump_component_overflow() {
        let err = bump("18446744073709551615.0.0", VersionFormat::Semver, BumpRequest::new(BumpMode::Major)).unwrap_err();
        assert!(matches!(err, KeeperError::Version(VersionError::Unsupported(_))));
        assert!(err.to_string().contains("major"));

        let err = bump("1.0.18446744073709551615", VersionFormat::Semver, BumpRequest::new(BumpMode::Patch)).unwrap_err();
        assert!(matches!(err, KeeperError::Version(VersionError::Unsupported(_))));

        let err = bump("1.0.0.post18446744073709551615", VersionFormat::Python, BumpRequest::new(BumpMode::Post)).unwrap_err();
        assert!(matches!(err, KeeperError::Version(VersionError::Unsupported(_))));

        assert_eq!(semver("18446744073709551615.0.0", BumpRequest::new(BumpMode::Minor)), "18446744073709551615.1.0");
    }

    fn unreleased(categories: &[&str]) -> Section {
        Section::new(
            SectionKind::Unreleased(Unreleased::default()),
            categories
                .iter()
                .map(|c| SubSection::changes(*c, None, vec![]))
                .collect(),
        )
    }

    #[test]
    fn test_suggest_bump() {
        let settings = settings();
        assert_eq!(suggest_bump(&unreleased(&["fixed"]), &settings).unwrap(), BumpMode::Patch);
        assert_eq!(suggest_bump(&unreleased(&["fixed", "added"]), &settings).unwrap(), BumpMode::Minor);
        assert_eq!(
            suggest_bump(&unreleased(&["added", "breaking", "fixed"]), &settings).unwrap(),
            BumpMode::Major
        );
        let err = suggest_bump(&unreleased(&[]), &settings).unwrap_err();
        assert!(matches!(err, KeeperError::Release(ReleaseError::CannotSuggestBump)));
    }

    #[test]
    fn test_auto_bump() {
        let settings = settings();
        let latest = parse_version("0.3.1", VersionFormat::Semver).unwrap();
        let section = unreleased(&["added"]);
        let next = bump_version(&latest, BumpRequest::new(BumpMode::Auto), Some(&section), &settings).unwrap();
        assert_eq!(next, "0.4.0");
    }

    #[test]
    fn test_bump_mode_from_str() {
        assert_eq!("Minor".parse::<BumpMode>().unwrap(), BumpMode::Minor);
        assert!("huge".parse::<BumpMode>().is_err());
    }
}

//! Finding changelog entries and the latest release

use clkeep_core::error::ReleaseError;
use clkeep_core::version::canonize_str;
use clkeep_core::{parse_version, KeeperError, Result, Settings, Version, VersionFormat};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::model::{Changelog, Release, RepoVersions, Section, SectionKind};
use crate::render::render_sections;

/// Which section to look for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionQuery {
    /// The first release in the document
    Latest,
    Unreleased,
    /// A release, matched by canonized version
    Version(String),
}

impl SectionQuery {
    /// Interpret a user-supplied query
    ///
    /// `latest` and `unreleased` are keywords. Anything else is a version or
    /// tag; `refs/tags/` and the tag prefix are removed.
    pub fn from_arg(arg: &str, settings: &Settings) -> Self {
        match arg {
            "latest" => Self::Latest,
            "unreleased" => Self::Unreleased,
            _ => {
                let version = arg.strip_prefix("refs/tags/").unwrap_or(arg);
                let version = version
                    .strip_prefix(settings.tag_prefix.as_str())
                    .unwrap_or(version);
                Self::Version(version.to_string())
            }
        }
    }
}

/// A section matched by a query
#[derive(Debug, Clone, Copy)]
pub struct FoundSection<'a> {
    /// Index in `Changelog::sections`
    pub index: usize,
    pub section: &'a Section,
    /// Whether no release precedes this one, absent for unreleased sections
    pub is_latest: Option<bool>,
}

/// Find all sections matching a query, in document order
///
/// Several sections may match when a release is duplicated.
pub fn find_sections<'a>(
    changelog: &'a Changelog,
    query: &SectionQuery,
    settings: &Settings,
) -> Vec<FoundSection<'a>> {
    let mut target = match query {
        SectionQuery::Version(version) => Some(canonize_str(version, settings.version_format)),
        _ => None,
    };
    debug!(?query, canonized_version = ?target, "searching changelog");

    let mut found = Vec::new();
    let mut is_latest = true;
    for (index, section) in changelog.sections.iter().enumerate() {
        match &section.kind {
            SectionKind::Unreleased(_) => {
                if *query == SectionQuery::Unreleased {
                    found.push(FoundSection {
                        index,
                        section,
                        is_latest: None,
                    });
                }
            }
            SectionKind::Release(release) => {
                let matches = match &target {
                    Some(target) => *target == release.canonized_version,
                    None => *query == SectionQuery::Latest,
                };
                if matches {
                    found.push(FoundSection {
                        index,
                        section,
                        is_latest: Some(is_latest),
                    });
                    target = Some(release.canonized_version.clone());
                }
                is_latest = false;
            }
            SectionKind::Trivia => {}
        }
    }
    found
}

/// A changelog entry assembled from every section matching a query
#[derive(Debug, Clone)]
pub struct Entry {
    pub section: Section,
    pub is_latest_in_changelog: Option<bool>,
}

/// Find a changelog entry, merging duplicated sections
///
/// A release missing from the changelog is still found, with no content,
/// when its version is exempt from missing-release checks and the
/// repository knows it.
#[instrument(skip_all, fields(query = ?query))]
pub fn find_entry(
    changelog: &Changelog,
    query: &SectionQuery,
    repo_versions: Option<&RepoVersions>,
    settings: &Settings,
) -> Option<Entry> {
    let mut found = find_sections(changelog, query, settings).into_iter();
    if let Some(first) = found.next() {
        let mut section = first.section.clone();
        for other in found {
            crate::sort::merge_sections(&mut section, other.section.clone());
        }
        return Some(Entry {
            section,
            is_latest_in_changelog: first.is_latest,
        });
    }

    let SectionQuery::Version(version) = query else {
        return None;
    };
    let format = settings.version_format;
    let parsed = parse_version(version, format);
    let canonized = canonize_str(version, format);

    let known = repo_versions.map_or(true, |r| r.contains_key(&canonized));
    let exempt = match &parsed {
        Some(parsed) => settings.is_exempt(Some(parsed), version),
        None => settings
            .ignore_missing_releases_regexp
            .as_ref()
            .is_some_and(|r| r.is_match(version)),
    };
    if !(known && exempt) {
        return None;
    }

    debug!(version = %version, "synthesizing entry for exempt release");
    Some(Entry {
        section: Section::new(
            SectionKind::Release(Release::new(version.as_str(), parsed, canonized)),
            vec![],
        ),
        is_latest_in_changelog: None,
    })
}

/// Machine-readable description of a changelog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryInfo {
    pub version: Option<String>,
    pub canonized_version: Option<String>,
    pub tag: Option<String>,
    /// Entry content without its heading, unwrapped
    pub text: String,
    pub is_latest_in_changelog: Option<bool>,
    pub is_latest_in_semantic_order: Option<bool>,
    pub is_pre_release: Option<bool>,
    pub is_post_release: Option<bool>,
    pub is_unreleased: bool,
}

impl EntryInfo {
    /// Describe an entry found in a changelog
    pub fn new(
        changelog: &Changelog,
        entry: &Entry,
        repo_versions: Option<&RepoVersions>,
        settings: &Settings,
    ) -> Self {
        let body = Section {
            heading: None,
            ..entry.section.clone()
        };
        let text = render_sections(changelog, [&body], settings, true);

        let mut info = Self {
            version: None,
            canonized_version: None,
            tag: None,
            text,
            is_latest_in_changelog: entry.is_latest_in_changelog,
            is_latest_in_semantic_order: None,
            is_pre_release: None,
            is_post_release: None,
            is_unreleased: entry.section.is_unreleased(),
        };

        if let Some(release) = entry.section.as_release() {
            info.version = Some(release.version.clone());
            info.canonized_version = Some(release.canonized_version.clone());
            info.tag = repo_versions
                .and_then(|r| r.get(&release.canonized_version))
                .map(|data| format!("{}{}", settings.tag_prefix, data.version));
            info.is_pre_release = release.parsed_version.as_ref().map(Version::is_pre_release);
            info.is_post_release = release.parsed_version.as_ref().map(Version::is_post_release);
            info.is_latest_in_semantic_order = find_latest_version(changelog, repo_versions, settings)
                .ok()
                .flatten()
                .map(|latest| latest.canonized_version == release.canonized_version);
        }

        info
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(KeeperError::from)
    }
}

/// The greatest known version
#[derive(Debug, Clone)]
pub struct LatestVersion {
    pub version: Version,
    /// Version as written in the changelog or tag
    pub text: String,
    pub canonized_version: String,
}

/// Find the greatest version among changelog releases and repository tags
///
/// Returns `None` when there are no releases at all. Fails when any
/// candidate doesn't parse, and always under the `none` version format.
pub fn find_latest_version(
    changelog: &Changelog,
    repo_versions: Option<&RepoVersions>,
    settings: &Settings,
) -> Result<Option<LatestVersion>> {
    if settings.version_format == VersionFormat::None {
        return Err(ReleaseError::LatestVersionUnknown(
            "`version_format` is set to `none`".to_string(),
        )
        .into());
    }

    let from_changelog = changelog.sections.iter().filter_map(|section| {
        let release = section.as_release()?;
        let line = section.position().map(|p| p.first_line());
        Some((&release.parsed_version, &release.version, &release.canonized_version, line))
    });
    let from_repo = repo_versions
        .into_iter()
        .flat_map(|r| r.values())
        .map(|data| (&data.parsed_version, &data.version, &data.canonized_version, None));

    let mut latest: Option<LatestVersion> = None;
    for (parsed, text, canonized, line) in from_changelog.chain(from_repo) {
        let Some(parsed) = parsed else {
            return Err(latest_version_unknown(text, line, settings.version_format));
        };
        if latest.as_ref().map_or(true, |l| *parsed > l.version) {
            latest = Some(LatestVersion {
                version: parsed.clone(),
                text: text.clone(),
                canonized_version: canonized.clone(),
            });
        }
    }

    debug!(latest = ?latest.as_ref().map(|l| &l.text), "determined latest version");
    Ok(latest)
}

fn latest_version_unknown(version: &str, line: Option<usize>, format: VersionFormat) -> KeeperError {
    let line = line.map(|l| format!(" on line `{}`", l)).unwrap_or_default();
    ReleaseError::LatestVersionUnknown(format!(
        "release `{}`{} doesn't follow {} specification",
        version, line, format
    ))
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::test_support::{repo_version, settings};
    use chrono::NaiveDate;

    const TEXT: &str = "# Changelog\n\n## Unreleased\n\n### Added\n\n- soon\n\n\
                        ## 1.1.0 - 2024-02-01\n\n### Fixed\n\n- bug\n\n\
                        ## 1.0.0 - 2024-01-01\n\n### Added\n\n- init\n\n\
                        ## 1.1.0 - 2024-02-01\n\n### Added\n\n- feature\n";

    fn changelog(text: &str, settings: &Settings) -> Changelog {
        let mut diagnostics = settings.diagnostics();
        parse(text, settings, &mut diagnostics)
    }

    #[test]
    fn test_section_query_from_arg() {
        let settings = settings();
        assert_eq!(SectionQuery::from_arg("latest", &settings), SectionQuery::Latest);
        assert_eq!(SectionQuery::from_arg("unreleased", &settings), SectionQuery::Unreleased);
        assert_eq!(
            SectionQuery::from_arg("refs/tags/v1.2.0", &settings),
            SectionQuery::Version("1.2.0".to_string())
        );
    }

    #[test]
    fn test_find_sections() {
        let settings = settings();
        let changelog = changelog(TEXT, &settings);

        let latest = find_sections(&changelog, &SectionQuery::Latest, &settings);
        let found: Vec<(usize, Option<bool>)> = latest.iter().map(|f| (f.index, f.is_latest)).collect();
        assert_eq!(found, [(2, Some(true)), (4, Some(false))]);

        let old = find_sections(&changelog, &SectionQuery::Version("1.0.0".to_string()), &settings);
        assert_eq!(old.len(), 1);
        assert_eq!(old[0].is_latest, Some(false));

        let unreleased = find_sections(&changelog, &SectionQuery::Unreleased, &settings);
        assert_eq!(unreleased.len(), 1);
        assert_eq!(unreleased[0].is_latest, None);
    }

    #[test]
    fn test_find_entry_merges_duplicates() {
        let settings = settings();
        let changelog = changelog(TEXT, &settings);
        let entry = find_entry(&changelog, &SectionQuery::Latest, None, &settings).unwrap();
        let categories: Vec<&str> = entry.section.subsections.iter().map(|s| s.category()).collect();
        assert_eq!(categories, ["fixed", "added"]);
        assert_eq!(entry.is_latest_in_changelog, Some(true));
    }

    #[test]
    fn test_find_entry_synthesizes_exempt_release() {
        let settings = settings();
        let changelog = changelog(TEXT, &settings);
        let query = SectionQuery::Version("0.9.0-beta.1".to_string());
        let entry = find_entry(&changelog, &query, None, &settings).unwrap();
        assert!(entry.section.subsections.is_empty());

        let mut repo = RepoVersions::new();
        repo.insert(
            "1.0.0".to_string(),
            repo_version("1.0.0", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
        );
        assert!(find_entry(&changelog, &query, Some(&repo), &settings).is_none());
        let missing = SectionQuery::Version("2.0.0".to_string());
        assert!(find_entry(&changelog, &missing, None, &settings).is_none());
    }

    #[test]
    fn test_entry_info() {
        let settings = settings();
        let changelog = changelog(TEXT, &settings);
        let mut repo = RepoVersions::new();
        repo.insert(
            "1.0.0".to_string(),
            repo_version("1.0.0", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
        );
        let query = SectionQuery::from_arg("v1.0.0", &settings);
        let entry = find_entry(&changelog, &query, Some(&repo), &settings).unwrap();
        let info = EntryInfo::new(&changelog, &entry, Some(&repo), &settings);
        assert_eq!(info.version.as_deref(), Some("1.0.0"));
        assert_eq!(info.tag.as_deref(), Some("v1.0.0"));
        assert_eq!(info.text, "### Added\n\n- init\n");
        assert_eq!(info.is_latest_in_changelog, Some(false));
        assert_eq!(info.is_latest_in_semantic_order, Some(false));
        assert_eq!(info.is_pre_release, Some(false));
        assert!(!info.is_unreleased);

        let json = info.to_json().unwrap();
        assert!(json.contains("\"canonizedVersion\": \"1.0.0\""));
        assert!(json.contains("\"isLatestInSemanticOrder\": false"));
    }

    #[test]
    fn test_entry_info_unreleased() {
        let settings = settings();
        let changelog = changelog(TEXT, &settings);
        let entry = find_entry(&changelog, &SectionQuery::Unreleased, None, &settings).unwrap();
        let info = EntryInfo::new(&changelog, &entry, None, &settings);
        assert!(info.is_unreleased);
        assert_eq!(info.version, None);
        assert_eq!(info.is_latest_in_changelog, None);
    }

    #[test]
    fn test_find_latest_version() {
        let settings = settings();
        let changelog = changelog(TEXT, &settings);
        let latest = find_latest_version(&changelog, None, &settings).unwrap().unwrap();
        assert_eq!(latest.text, "1.1.0");

        let mut repo = RepoVersions::new();
        repo.insert(
            "1.2.0".to_string(),
            repo_version("1.2.0", NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()),
        );
        let latest = find_latest_version(&changelog, Some(&repo), &settings).unwrap().unwrap();
        assert_eq!(latest.canonized_version, "1.2.0");

        let empty = Changelog::default();
        assert!(find_latest_version(&empty, None, &settings).unwrap().is_none());
    }

    #[test]
    fn test_find_latest_version_fails_on_unparsed() {
        let settings = settings();
        let changelog = changelog("# Changelog\n\n## 1.0.0.1 - 2024-01-01\n", &settings);
        let err = find_latest_version(&changelog, None, &settings).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Can't determine the latest version because release `1.0.0.1` on line `3` doesn't follow semver specification"
        );
    }

    #[test]
    fn test_find_latest_version_without_version_format() {
        let mut settings = settings();
        settings.version_format = VersionFormat::None;
        let message = "Can't determine the latest version because `version_format` is set to `none`";

        let err = find_latest_version(&Changelog::default(), None, &settings).unwrap_err();
        assert_eq!(err.to_string(), message);

        let changelog = changelog("# Changelog\n\n## 1.0.0 - 2024-01-01\n", &settings);
        let err = find_latest_version(&changelog, None, &settings).unwrap_err();
        assert_eq!(err.to_string(), message);
    }
}

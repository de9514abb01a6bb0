//! Release workflows
//!
//! Locating changelog entries, computing the next version, and turning the
//! unreleased section into a new release.

mod bump;
mod find;

pub use bump::{bump_version, suggest_bump, BumpMode, BumpRequest, PreReleaseKind};
pub use find::{
    find_entry, find_latest_version, find_sections, Entry, EntryInfo, FoundSection, LatestVersion,
    SectionQuery,
};

use chrono::NaiveDate;
use clkeep_core::error::ReleaseError;
use clkeep_core::{
    canonize_version, parse_version, Diagnostics, IssueCode, Result, Settings, VersionFormat,
};
use tracing::{info, instrument};

use crate::model::{Changelog, Release, Section, SectionKind, Unreleased};
use crate::sort::merge_sections;

/// Move unreleased changes into a new release dated `today`
///
/// All unreleased sections are collapsed into the new release and replaced
/// by a single empty unreleased section. A version that doesn't follow the
/// versioning schema is reported but still used. Fails when the changelog
/// already has a release with the same version.
///
/// The result isn't in canonical shape; run [`crate::fix`] afterwards to
/// regenerate headings and links.
#[instrument(skip_all, fields(version = %version))]
pub fn bump_release(
    changelog: &mut Changelog,
    version: &str,
    today: NaiveDate,
    settings: &Settings,
    diagnostics: &mut Diagnostics,
) -> Result<()> {
    let version = version
        .strip_prefix(settings.tag_prefix.as_str())
        .unwrap_or(version);
    let format = settings.version_format;

    let parsed_version = parse_version(version, format);
    if parsed_version.is_none() && format != VersionFormat::None {
        diagnostics.external(
            IssueCode::InvalidVersion,
            "New version `%s` doesn't follow %s specification",
            &[version, format.as_str()],
        );
    }

    let query = SectionQuery::Version(version.to_string());
    if let Some(existing) = find_sections(changelog, &query, settings).first() {
        return Err(ReleaseError::AlreadyExists {
            version: version.to_string(),
            line: existing.section.position().map(|p| p.first_line()),
        }
        .into());
    }

    let mut collected: Option<Section> = None;
    for section in std::mem::take(&mut changelog.sections) {
        if !section.is_unreleased() {
            changelog.sections.push(section);
            continue;
        }
        match &mut collected {
            Some(collected) => merge_sections(collected, section),
            None => collected = Some(section),
        }
    }
    let subsections = collected.map(|s| s.subsections).unwrap_or_default();

    let canonized_version = parsed_version
        .as_ref()
        .and_then(|v| canonize_version(v, format))
        .unwrap_or_else(|| version.to_string());
    let release = Release::new(version, parsed_version, canonized_version).with_date(today);

    changelog.sections.push(Section::new(
        SectionKind::Unreleased(Unreleased::default()),
        vec![],
    ));
    changelog
        .sections
        .push(Section::new(SectionKind::Release(release), subsections));

    info!(version = %version, "created release from unreleased changes");
    Ok(())
}

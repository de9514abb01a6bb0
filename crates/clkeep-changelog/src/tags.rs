//! Repository tag ingestion

use chrono::NaiveDate;
use clkeep_core::error::VersionError;
use clkeep_core::{
    canonize_version, parse_version, Diagnostics, IssueCode, Result, Settings, Version,
    VersionFormat,
};
use tracing::{debug, instrument};

use crate::model::{RepoVersion, RepoVersions};

/// A tag found in the repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// Tag name, without `refs/tags/`
    pub name: String,
    /// Author date of the tagged commit
    pub author_date: NaiveDate,
    /// Committer date of the tagged commit
    pub committer_date: NaiveDate,
}

impl Tag {
    /// Create a tag whose commit was authored and committed on the same day
    pub fn new(name: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            name: name.into(),
            author_date: date,
            committer_date: date,
        }
    }

    /// Set the committer date
    pub fn with_committer_date(mut self, date: NaiveDate) -> Self {
        self.committer_date = date;
        self
    }
}

/// Build the version map from repository tags
///
/// Tags without the configured prefix are ignored. Tags that don't follow the
/// versioning schema are reported and kept under their literal version.
#[instrument(skip_all, fields(tag_count = tags.len()))]
pub fn repo_versions_from_tags(
    tags: &[Tag],
    settings: &Settings,
    diagnostics: &mut Diagnostics,
) -> RepoVersions {
    let format = settings.version_format;
    let mut repo_versions = RepoVersions::new();

    for tag in tags {
        let Some(version) = tag.name.strip_prefix(settings.tag_prefix.as_str()) else {
            continue;
        };
        let parsed_version = parse_version(version, format);
        if parsed_version.is_none() && format != VersionFormat::None {
            diagnostics.external(
                IssueCode::InvalidTag,
                "Tag `%s` doesn't follow %s specification",
                &[tag.name.as_str(), format.as_str()],
            );
        }
        let canonized_version = parsed_version
            .as_ref()
            .and_then(|v| canonize_version(v, format))
            .unwrap_or_else(|| version.to_string());

        repo_versions.insert(
            canonized_version.clone(),
            RepoVersion {
                version: version.to_string(),
                parsed_version,
                canonized_version,
                author_date: tag.author_date,
                committer_date: tag.committer_date,
            },
        );
    }

    debug!(count = repo_versions.len(), "collected repository versions");
    repo_versions
}

/// Check that a tag name carries a version under the configured schema
///
/// Returns the parsed version, or `None` when versioning is disabled.
pub fn check_tag(tag: &str, settings: &Settings) -> Result<Option<Version>> {
    let tag = tag.strip_prefix("refs/tags/").unwrap_or(tag);
    let Some(version) = tag.strip_prefix(settings.tag_prefix.as_str()) else {
        return Err(VersionError::MissingTagPrefix {
            tag: tag.to_string(),
            prefix: settings.tag_prefix.clone(),
        }
        .into());
    };

    let format = settings.version_format;
    if format == VersionFormat::None {
        return Ok(None);
    }
    match parse_version(version, format) {
        Some(parsed) => Ok(Some(parsed)),
        None => Err(VersionError::InvalidTag(tag.to_string(), format.to_string()).into()),
    }
}

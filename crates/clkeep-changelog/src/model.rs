//! Changelog document model

use chrono::NaiveDate;
use clkeep_core::{LineRange, Version};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::markdown::{Block, LinkReference};

/// A parsed changelog
#[derive(Debug, Clone, Default)]
pub struct Changelog {
    pub sections: Vec<Section>,
    /// Link reference definitions, in document order
    pub references: Vec<LinkReference>,
}

impl Changelog {
    /// Define or redefine a link reference
    pub fn register_reference(&mut self, label: &str, dest: &str) {
        match self
            .references
            .iter_mut()
            .find(|r| r.label.eq_ignore_ascii_case(label))
        {
            Some(existing) => {
                existing.dest = dest.to_string();
                existing.title = None;
            }
            None => self.references.push(LinkReference {
                label: label.to_string(),
                dest: dest.to_string(),
                title: None,
            }),
        }
    }

    /// Look up a link reference by label
    pub fn reference(&self, label: &str) -> Option<&LinkReference> {
        self.references
            .iter()
            .find(|r| r.label.eq_ignore_ascii_case(label))
    }

    /// Releases in document order
    pub fn releases(&self) -> impl Iterator<Item = &Release> {
        self.sections.iter().filter_map(Section::as_release)
    }

    /// Whether the document opens with a trivia section whose first block is
    /// a level-one heading
    pub fn starts_with_title(&self) -> bool {
        self.sections
            .first()
            .filter(|s| s.is_trivia())
            .and_then(|s| s.subsections.first())
            .and_then(|s| s.content.first())
            .and_then(Block::heading_level)
            == Some(1)
    }
}

/// A level-two section of a changelog
#[derive(Debug, Clone)]
pub struct Section {
    pub kind: SectionKind,
    pub heading: Option<Block>,
    pub subsections: Vec<SubSection>,
}

/// What a section describes
#[derive(Debug, Clone)]
pub enum SectionKind {
    /// Free text with no release semantics
    Trivia,
    Unreleased(Unreleased),
    Release(Release),
}

/// Link data of the section for unreleased changes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Unreleased {
    pub link: Option<String>,
    pub label: Option<String>,
}

/// A released version
#[derive(Debug, Clone)]
pub struct Release {
    /// Version as it appears in the heading
    pub version: String,
    pub parsed_version: Option<Version>,
    /// Canonical spelling, or `version` when it can't be canonized
    pub canonized_version: String,
    pub link: Option<String>,
    pub label: Option<String>,
    pub release_date: Option<NaiveDate>,
    /// Date text as found in the heading, possibly not a valid date
    pub release_date_raw: Option<String>,
    pub release_comment: Option<String>,
}

impl Release {
    /// Create a release with no link, date, or comment
    pub fn new(version: impl Into<String>, parsed_version: Option<Version>, canonized_version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            parsed_version,
            canonized_version: canonized_version.into(),
            link: None,
            label: None,
            release_date: None,
            release_date_raw: None,
            release_comment: None,
        }
    }

    /// Set the release date
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.release_date_raw = Some(date.format("%Y-%m-%d").to_string());
        self.release_date = Some(date);
        self
    }

    /// Date text to put into the heading
    pub fn date_text(&self) -> Option<String> {
        match self.release_date {
            Some(date) => Some(date.format("%Y-%m-%d").to_string()),
            None => self.release_date_raw.clone(),
        }
    }
}

impl Section {
    /// Create a section with no heading
    pub fn new(kind: SectionKind, subsections: Vec<SubSection>) -> Self {
        Self {
            kind,
            heading: None,
            subsections,
        }
    }

    pub fn is_trivia(&self) -> bool {
        matches!(self.kind, SectionKind::Trivia)
    }

    pub fn is_unreleased(&self) -> bool {
        matches!(self.kind, SectionKind::Unreleased(_))
    }

    pub fn is_release(&self) -> bool {
        matches!(self.kind, SectionKind::Release(_))
    }

    pub fn as_release(&self) -> Option<&Release> {
        match &self.kind {
            SectionKind::Release(release) => Some(release),
            _ => None,
        }
    }

    pub fn as_release_mut(&mut self) -> Option<&mut Release> {
        match &mut self.kind {
            SectionKind::Release(release) => Some(release),
            _ => None,
        }
    }

    pub fn as_unreleased(&self) -> Option<&Unreleased> {
        match &self.kind {
            SectionKind::Unreleased(unreleased) => Some(unreleased),
            _ => None,
        }
    }

    /// Link of an unreleased or release section
    pub fn link(&self) -> Option<&str> {
        match &self.kind {
            SectionKind::Trivia => None,
            SectionKind::Unreleased(u) => u.link.as_deref(),
            SectionKind::Release(r) => r.link.as_deref(),
        }
    }

    /// Replace link and label of an unreleased or release section
    pub fn set_link(&mut self, link: Option<String>, label: Option<String>) {
        match &mut self.kind {
            SectionKind::Trivia => {}
            SectionKind::Unreleased(u) => {
                u.link = link;
                u.label = label;
            }
            SectionKind::Release(r) => {
                r.link = link;
                r.label = label;
            }
        }
    }

    /// Human-readable name used in messages
    pub fn what(&self) -> String {
        match &self.kind {
            SectionKind::Trivia => "trivia section".to_string(),
            SectionKind::Unreleased(_) => "unreleased section".to_string(),
            SectionKind::Release(r) => format!("release `{}`", r.version),
        }
    }

    /// First known source position of the section
    pub fn position(&self) -> Option<LineRange> {
        self.heading
            .as_ref()
            .and_then(|h| h.lines)
            .or_else(|| self.subsections.iter().find_map(SubSection::position))
    }

    /// Every block of the section, heading first
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.heading
            .iter()
            .chain(self.subsections.iter().flat_map(|s| s.blocks()))
    }
}

/// A level-three part of a section
#[derive(Debug, Clone)]
pub struct SubSection {
    pub kind: SubSectionKind,
    pub heading: Option<Block>,
    pub content: Vec<Block>,
}

/// What a subsection describes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubSectionKind {
    Trivia,
    Changes(Changes),
}

/// A group of changes of one category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Changes {
    /// Category name, or the case-folded heading for unknown categories
    pub category: String,
    pub category_kind: CategoryKind,
    /// Position in the preferred category order
    pub sort_key: Option<usize>,
}

/// Whether a category is configured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    Known,
    Unknown,
}

impl SubSection {
    /// Create a subsection with no heading
    pub fn trivia(content: Vec<Block>) -> Self {
        Self {
            kind: SubSectionKind::Trivia,
            heading: None,
            content,
        }
    }

    /// Create a subsection for a known category
    pub fn changes(category: impl Into<String>, sort_key: Option<usize>, content: Vec<Block>) -> Self {
        Self {
            kind: SubSectionKind::Changes(Changes {
                category: category.into(),
                category_kind: CategoryKind::Known,
                sort_key,
            }),
            heading: None,
            content,
        }
    }

    pub fn as_changes(&self) -> Option<&Changes> {
        match &self.kind {
            SubSectionKind::Changes(changes) => Some(changes),
            SubSectionKind::Trivia => None,
        }
    }

    /// Category used to group subsections, empty for trivia
    pub fn category(&self) -> &str {
        self.as_changes().map_or("", |c| c.category.as_str())
    }

    pub fn sort_key(&self) -> Option<usize> {
        self.as_changes().and_then(|c| c.sort_key)
    }

    pub fn is_known(&self) -> bool {
        self.as_changes()
            .is_some_and(|c| c.category_kind == CategoryKind::Known)
    }

    /// First known source position of the subsection
    pub fn position(&self) -> Option<LineRange> {
        self.heading
            .as_ref()
            .and_then(|h| h.lines)
            .or_else(|| self.content.iter().find_map(|b| b.lines))
    }

    /// Every block of the subsection, heading first
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.heading.iter().chain(self.content.iter())
    }
}

/// A version tag found in the repository
#[derive(Debug, Clone)]
pub struct RepoVersion {
    /// Tag name with the tag prefix removed
    pub version: String,
    pub parsed_version: Option<Version>,
    pub canonized_version: String,
    pub author_date: NaiveDate,
    pub committer_date: NaiveDate,
}

/// Repository tags by canonized version
pub type RepoVersions = BTreeMap<String, RepoVersion>;

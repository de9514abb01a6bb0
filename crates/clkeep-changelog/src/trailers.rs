//! Harvesting changelog entries from commit trailers
//!
//! A commit may carry one or more `Changelog:` trailers:
//!
//! ```text
//! Fix crash on startup
//!
//! Changelog: [fixed] crash when the config file is empty
//! Changelog: [Docs] describe the
//!   new link presets
//! ```
//!
//! The optional bracketed group selects the change category.

use clkeep_core::Settings;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, instrument};

use crate::markdown::Block;
use crate::model::{
    CategoryKind, Changelog, Changes, Section, SectionKind, SubSection, SubSectionKind, Unreleased,
};
use crate::sort::merge_sections;

/// Regex for trailer lines
static TRAILER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^changelog:\s*(?P<value>.*)$").expect("Invalid regex"));

/// Regex for an optional `[group]` before the message
static ENTRY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*(?:\[(?P<group>[^\]]*)\])?\s*(?P<message>.*?)\s*$").expect("Invalid regex")
});

/// Category for messages with no group that match no category pattern
const FALLBACK_CATEGORY: &str = "changed";

/// Changes collected from trailers, grouped by category
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestedChanges {
    /// Categories in first-seen order
    pub categories: Vec<HarvestedCategory>,
}

/// Messages for one category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestedCategory {
    /// Configured category name, or the lowercased group
    pub category: String,
    pub kind: CategoryKind,
    /// Group as written, used as the heading of unknown categories
    pub title: String,
    pub messages: Vec<String>,
}

impl HarvestedChanges {
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    fn push(&mut self, category: String, kind: CategoryKind, title: &str, message: String) {
        match self.categories.iter_mut().find(|c| c.category == category) {
            Some(existing) => existing.messages.push(message),
            None => self.categories.push(HarvestedCategory {
                category,
                kind,
                title: title.to_string(),
                messages: vec![message],
            }),
        }
    }

    /// Subsections holding one bullet list per category
    pub fn into_subsections(self, settings: &Settings) -> Vec<SubSection> {
        self.categories
            .into_iter()
            .map(|harvested| {
                let list = Block::bullet_list(harvested.messages);
                match harvested.kind {
                    CategoryKind::Known => {
                        let sort_key = settings.category_sort_key(&harvested.category);
                        let mut subsection = SubSection::changes(harvested.category, sort_key, vec![list]);
                        subsection.heading = Some(Block::plain_heading(3, &harvested.title));
                        subsection
                    }
                    CategoryKind::Unknown => SubSection {
                        kind: SubSectionKind::Changes(Changes {
                            category: harvested.category,
                            category_kind: CategoryKind::Unknown,
                            sort_key: None,
                        }),
                        heading: Some(Block::plain_heading(3, &harvested.title)),
                        content: vec![list],
                    },
                }
            })
            .collect()
    }
}

/// Extract trailer values from a commit message
///
/// Indented lines following a trailer continue it.
fn trailer_values(message: &str) -> Vec<String> {
    let mut values: Vec<String> = Vec::new();
    let mut in_trailer = false;

    for line in message.lines() {
        if let Some(caps) = TRAILER_REGEX.captures(line) {
            in_trailer = true;
            values.push(caps["value"].trim().to_string());
        } else if in_trailer && line.starts_with([' ', '\t']) {
            if let Some(last) = values.last_mut() {
                if !last.is_empty() {
                    last.push(' ');
                }
                last.push_str(line.trim());
            }
        } else {
            in_trailer = false;
        }
    }

    values
}

/// Collect `Changelog:` trailers from commit messages
#[instrument(skip_all, fields(message_count = messages.len()))]
pub fn harvest_trailers<S: AsRef<str>>(messages: &[S], settings: &Settings) -> HarvestedChanges {
    let mut harvested = HarvestedChanges::default();

    for value in messages.iter().flat_map(|m| trailer_values(m.as_ref())) {
        let Some(caps) = ENTRY_REGEX.captures(&value) else {
            continue;
        };
        let message = caps["message"].to_string();
        if message.is_empty() {
            continue;
        }
        let group = caps.name("group").map(|g| g.as_str().trim()).filter(|g| !g.is_empty());

        let detected = settings.detect_category(group.unwrap_or(&message));
        match (detected, group) {
            (Some(category), _) => {
                let title = settings.category_title(category).unwrap_or(category);
                harvested.push(category.to_string(), CategoryKind::Known, title, message);
            }
            (None, Some(group)) => {
                harvested.push(group.to_lowercase(), CategoryKind::Unknown, group, message);
            }
            (None, None) => match settings.category_title(FALLBACK_CATEGORY) {
                Some(title) => {
                    harvested.push(FALLBACK_CATEGORY.to_string(), CategoryKind::Known, title, message)
                }
                None => {
                    debug!(message = %message, "no category for trailer, skipping");
                }
            },
        }
    }

    debug!(categories = harvested.categories.len(), "harvested trailers");
    harvested
}

/// Merge harvested changes into the unreleased section
///
/// Multiple unreleased sections are collapsed into the first one. When there
/// is none, a new one is created after the leading trivia.
pub fn merge_into_unreleased(changelog: &mut Changelog, harvested: HarvestedChanges, settings: &Settings) {
    if harvested.is_empty() {
        return;
    }

    let mut unreleased_index: Option<usize> = None;
    let mut sections: Vec<Section> = Vec::with_capacity(changelog.sections.len() + 1);
    for section in std::mem::take(&mut changelog.sections) {
        match unreleased_index {
            Some(index) if section.is_unreleased() => merge_sections(&mut sections[index], section),
            None if section.is_unreleased() => {
                unreleased_index = Some(sections.len());
                sections.push(section);
            }
            _ => sections.push(section),
        }
    }

    let index = match unreleased_index {
        Some(index) => index,
        None => {
            let index = sections
                .iter()
                .position(|s| !s.is_trivia())
                .unwrap_or(sections.len());
            sections.insert(
                index,
                Section::new(SectionKind::Unreleased(Unreleased::default()), vec![]),
            );
            index
        }
    };

    let incoming = Section::new(
        SectionKind::Unreleased(Unreleased::default()),
        harvested.into_subsections(settings),
    );
    merge_sections(&mut sections[index], incoming);
    changelog.sections = sections;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fix::fix;
    use crate::parser::parse;
    use crate::render::render;
    use crate::test_support::settings;

    #[test]
    fn test_trailer_values() {
        let message = "Fix crash\n\nSome body\n\nchangelog: [Fixed] crash\n  on startup\nReviewed-by: someone\n  indented\n";
        assert_eq!(trailer_values(message), ["[Fixed] crash on startup"]);
    }

    #[test]
    fn test_harvest_trailers() {
        let settings = settings();
        let messages = [
            "Add presets\n\nChangelog: [added] link presets\nChangelog: fix wrapping of long items",
            "Docs\n\nChangelog: [Docs] new guide",
            "Refactor\n\nChangelog: [added] tag ingestion\nChangelog: tweak internals",
            "No trailer here",
            "Empty\n\nChangelog: [fixed]",
        ];
        let harvested = harvest_trailers(&messages, &settings);

        let summary: Vec<(&str, CategoryKind, &str, Vec<&str>)> = harvested
            .categories
            .iter()
            .map(|c| {
                (
                    c.category.as_str(),
                    c.kind,
                    c.title.as_str(),
                    c.messages.iter().map(String::as_str).collect(),
                )
            })
            .collect();
        assert_eq!(
            summary,
            [
                ("added", CategoryKind::Known, "Added", vec!["link presets", "tag ingestion"]),
                ("fixed", CategoryKind::Known, "Fixed", vec!["fix wrapping of long items"]),
                ("docs", CategoryKind::Unknown, "Docs", vec!["new guide"]),
                ("changed", CategoryKind::Known, "Changed", vec!["tweak internals"]),
            ]
        );
    }

    #[test]
    fn test_merge_into_existing_unreleased() {
        let settings = settings();
        let mut diagnostics = settings.diagnostics();
        let mut changelog = parse(
            "# Changelog\n\n## Unreleased\n\n### Added\n\n- existing\n\n## Unreleased\n\n### Fixed\n\n- bug\n\n## 1.0.0 - 2024-01-01\n\n- init\n",
            &settings,
            &mut diagnostics,
        );
        let harvested = harvest_trailers(&["x\n\nChangelog: [added] new thing"], &settings);
        merge_into_unreleased(&mut changelog, harvested, &settings);

        assert_eq!(changelog.sections.iter().filter(|s| s.is_unreleased()).count(), 1);
        fix(&mut changelog, &settings, None);
        let output = render(&changelog, &settings, false);
        assert!(output.contains("## [Unreleased]\n\n### Added\n\n- existing\n- new thing\n\n### Fixed\n\n- bug\n\n## [1.0.0]"));
    }

    #[test]
    fn test_merge_creates_unreleased() {
        let settings = settings();
        let mut diagnostics = settings.diagnostics();
        let mut changelog = parse(
            "# Changelog\n\n## 1.0.0 - 2024-01-01\n\n- init\n",
            &settings,
            &mut diagnostics,
        );
        let harvested = harvest_trailers(&["x\n\nChangelog: [Docs] guide"], &settings);
        merge_into_unreleased(&mut changelog, harvested, &settings);

        assert!(changelog.sections[1].is_unreleased());
        let subsection = &changelog.sections[1].subsections[0];
        assert_eq!(subsection.category(), "docs");
        assert!(!subsection.is_known());
        let output = render(&changelog, &settings, false);
        assert!(output.contains("### Docs\n\n- guide\n"));
    }

    #[test]
    fn test_merge_nothing_harvested() {
        let settings = settings();
        let mut changelog = Changelog::default();
        merge_into_unreleased(&mut changelog, HarvestedChanges::default(), &settings);
        assert!(changelog.sections.is_empty());
    }
}

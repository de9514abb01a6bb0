//! Changelog fixer
//!
//! Brings a parsed changelog into canonical shape: sections sorted by version,
//! a title on top, dates and links filled in, headings regenerated, and change
//! categories in preferred order.

use clkeep_core::Settings;
use tracing::{debug, instrument};

use crate::heading::{heading_block, section_label};
use crate::markdown::Block;
use crate::model::{Changelog, RepoVersions, Section, SectionKind, SubSection};
use crate::sort::{sorted_sections, sorted_subsections};

/// Title inserted when a changelog doesn't start with one
pub const DEFAULT_TITLE: &str = "Changelog";

/// Fix a changelog in place
#[instrument(skip_all, fields(section_count = changelog.sections.len()))]
pub fn fix(changelog: &mut Changelog, settings: &Settings, repo_versions: Option<&RepoVersions>) {
    changelog.sections = sorted_sections(std::mem::take(&mut changelog.sections));

    if !changelog.starts_with_title() {
        debug!("inserting changelog title");
        changelog.sections.insert(
            0,
            Section::new(
                SectionKind::Trivia,
                vec![SubSection::trivia(vec![Block::plain_heading(1, DEFAULT_TITLE)])],
            ),
        );
    }

    let mut prev_tag: Option<String> = None;
    let mut links = Vec::new();

    for section in changelog.sections.iter_mut().rev() {
        if section.is_trivia() {
            continue;
        }

        if settings.add_release_date {
            if let (Some(release), Some(repo_versions)) = (section.as_release_mut(), repo_versions) {
                if release.release_date.is_none() {
                    if let Some(data) = repo_versions.get(&release.canonized_version) {
                        debug!(version = %release.version, date = %data.author_date, "filling release date");
                        release.release_date = Some(data.author_date);
                    }
                }
            }
        }

        if settings.add_release_link {
            let (link, tag) = make_link(section, prev_tag.as_deref(), repo_versions, settings);
            prev_tag = tag;
            let label = link.as_ref().and_then(|_| section_label(section, settings));
            if let (Some(link), Some(label)) = (&link, &label) {
                links.push((label.clone(), link.clone()));
            }
            section.set_link(link, label);
        }

        section.heading = Some(heading_block(section, settings));

        section.subsections = sorted_subsections(std::mem::take(&mut section.subsections));
        for subsection in &mut section.subsections {
            if !subsection.is_known() {
                continue;
            }
            if let Some(title) = settings
                .category_title(subsection.category())
                .filter(|t| !t.is_empty())
            {
                subsection.heading = Some(Block::plain_heading(3, title));
            }
        }
    }

    for (label, link) in links.into_iter().rev() {
        changelog.register_reference(&label, &link);
    }
}

/// Expected link of a section and the tag it refers to
///
/// `prev_tag` is the tag of the next older release. The unreleased section
/// links changes since `prev_tag` and has no link before the first release.
/// A release's tag is the repository's spelling of the version when the
/// repository knows it, and `tag_prefix` followed by the version otherwise.
pub fn make_link(
    section: &Section,
    prev_tag: Option<&str>,
    repo_versions: Option<&RepoVersions>,
    settings: &Settings,
) -> (Option<String>, Option<String>) {
    let templates = &settings.link_templates;
    match &section.kind {
        SectionKind::Trivia => (None, None),
        SectionKind::Unreleased(_) => match prev_tag {
            Some(prev) => (Some(templates.unreleased_link(prev)), Some(prev.to_string())),
            None => (None, None),
        },
        SectionKind::Release(release) => {
            let version = repo_versions
                .and_then(|r| r.get(&release.canonized_version))
                .map_or(release.version.as_str(), |data| data.version.as_str());
            let tag = format!("{}{}", settings.tag_prefix, version);
            let link = match prev_tag.filter(|p| !p.is_empty()) {
                Some(prev) => templates.release_link(&tag, prev),
                None => templates.first_release_link(&tag),
            };
            (Some(link), Some(tag))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::render::render;
    use crate::test_support::{repo_version, settings};
    use chrono::NaiveDate;

    fn fixed(text: &str, repo_versions: Option<&RepoVersions>) -> String {
        let settings = settings();
        let mut diagnostics = settings.diagnostics();
        let mut changelog = parse(text, &settings, &mut diagnostics);
        fix(&mut changelog, &settings, repo_versions);
        render(&changelog, &settings, false)
    }

    #[test]
    fn test_fix_reorders_releases_and_links() {
        let text = "# Changelog\n\n## 1.0.0 - 2024-01-01\n\n- first\n\n## 2.0.0 - 2024-02-01\n\n- second\n";
        assert_eq!(
            fixed(text, None),
            "# Changelog\n\n\
             ## [2.0.0] - 2024-02-01\n\n- second\n\n\
             ## [1.0.0] - 2024-01-01\n\n- first\n\n\
             [2.0.0]: https://github.com/acme/widgets/compare/v1.0.0...v2.0.0\n\
             [1.0.0]: https://github.com/acme/widgets/releases/tag/v1.0.0\n"
        );
    }

    #[test]
    fn test_fix_inserts_title_and_unreleased_link() {
        let text = "## Unreleased\n\n### Fixed\n\n- bug\n\n### Added\n\n- feature\n\n## 0.1.0 - 2024-01-01\n\n- init\n";
        assert_eq!(
            fixed(text, None),
            "# Changelog\n\n\
             ## [Unreleased]\n\n### Added\n\n- feature\n\n### Fixed\n\n- bug\n\n\
             ## [0.1.0] - 2024-01-01\n\n- init\n\n\
             [Unreleased]: https://github.com/acme/widgets/compare/v0.1.0...HEAD\n\
             [0.1.0]: https://github.com/acme/widgets/releases/tag/v0.1.0\n"
        );
    }

    #[test]
    fn test_fix_canonical_category_headings() {
        let text = "# Changelog\n\n## Unreleased\n\n### bug fixes\n\n- bug\n";
        let output = fixed(text, None);
        assert!(output.contains("### Fixed\n"));
        assert!(output.contains("## Unreleased\n"));
    }

    #[test]
    fn test_fix_uses_repository_dates_and_tags() {
        let mut repo = RepoVersions::new();
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        repo.insert("1.0.0".to_string(), repo_version("1.0.0", date));
        let output = fixed("# Changelog\n\n## 1.0.0\n\n- x\n", Some(&repo));
        assert!(output.contains("## [1.0.0] - 2024-06-01\n"));
    }

    #[test]
    fn test_fix_is_idempotent() {
        let text = "Intro paragraph that is fairly long and will certainly be wrapped at ninety columns by the fixer.\n\n\
                    ## 1.0.0\n\n### fixes\n\n* a\n* b\n\n## unreleased\n\n### Added\n\n- new\n\n\
                    ## 1.1.0 - 2024-03-01 - Yanked\n\nnotes\n";
        let once = fixed(text, None);
        let twice = fixed(&once, None);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_fix_without_links() {
        let mut settings = settings();
        settings.add_release_link = false;
        let mut diagnostics = settings.diagnostics();
        let mut changelog = parse(
            "# Changelog\n\n## [1.0.0](https://old) - 2024-01-01\n\n- x\n",
            &settings,
            &mut diagnostics,
        );
        fix(&mut changelog, &settings, None);
        assert_eq!(
            render(&changelog, &settings, false),
            "# Changelog\n\n## 1.0.0 - 2024-01-01\n\n- x\n"
        );
    }

    #[test]
    fn test_make_link_prefers_repository_spelling() {
        let settings = settings();
        let mut repo = RepoVersions::new();
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        repo.insert("1.0.0".to_string(), repo_version("1.0.0", date));
        let mut diagnostics = settings.diagnostics();
        let changelog = parse("## 1.0.0\n", &settings, &mut diagnostics);
        let (link, tag) = make_link(&changelog.sections[0], Some("v0.9.0"), Some(&repo), &settings);
        assert_eq!(tag.as_deref(), Some("v1.0.0"));
        assert_eq!(
            link.as_deref(),
            Some("https://github.com/acme/widgets/compare/v0.9.0...v1.0.0")
        );
    }
}

//! Changelog validation
//!
//! Every check runs to completion and reports into [`Diagnostics`]; none of
//! them mutates the changelog. Link checks are weakened when the document
//! order can't be trusted, since expected links depend on the neighbouring
//! release.

use clkeep_core::{Diagnostics, IssueCode, Settings, Version};
use std::collections::BTreeSet;
use tracing::{debug, instrument};

use crate::fix::make_link;
use crate::model::{Changelog, RepoVersions, Section, SubSectionKind};

const NO_ARGS: &[&str] = &[];

/// Check a changelog and report issues
#[instrument(skip_all, fields(section_count = changelog.sections.len()))]
pub fn check(
    changelog: &Changelog,
    settings: &Settings,
    repo_versions: Option<&RepoVersions>,
    diagnostics: &mut Diagnostics,
) {
    let sections = &changelog.sections;

    let duplicates = check_duplicates(sections, diagnostics);
    let ordering = check_order(changelog, diagnostics);
    check_links(
        sections,
        repo_versions,
        settings,
        !ordering.releases && !duplicates.releases,
        !ordering.unreleased && !duplicates.unreleased,
        diagnostics,
    );
    check_dates(sections, repo_versions, settings, diagnostics);
    check_content(sections, settings, diagnostics);
    if let Some(repo_versions) = repo_versions {
        check_tags(sections, repo_versions, settings, diagnostics);
    }

    debug!(issue_count = diagnostics.issues().len(), "checked changelog");
}

/// Which kinds of sections were found duplicated or out of order
#[derive(Debug, Default, Clone, Copy)]
struct Findings {
    releases: bool,
    unreleased: bool,
}

fn check_duplicates(sections: &[Section], diagnostics: &mut Diagnostics) -> Findings {
    let mut findings = Findings::default();
    let mut seen_unreleased = false;
    let mut seen_versions: BTreeSet<&str> = BTreeSet::new();

    for section in sections {
        if section.is_unreleased() {
            if seen_unreleased {
                diagnostics.issue(
                    IssueCode::DuplicateReleases,
                    "Found multiple sections for unreleased changes",
                    NO_ARGS,
                    section.position(),
                );
                findings.unreleased = true;
            }
            seen_unreleased = true;
        } else if let Some(release) = section.as_release() {
            if !seen_versions.insert(release.canonized_version.as_str()) {
                diagnostics.issue(
                    IssueCode::DuplicateReleases,
                    "Found multiple sections for release `%s`",
                    &[release.version.as_str()],
                    section.position(),
                );
                findings.releases = true;
            }
        } else {
            continue;
        }

        let mut seen_categories: BTreeSet<&str> = BTreeSet::new();
        for subsection in &section.subsections {
            if let SubSectionKind::Changes(changes) = &subsection.kind {
                if !seen_categories.insert(changes.category.as_str()) {
                    diagnostics.issue(
                        IssueCode::DuplicateChangeCategories,
                        "Found multiple sub-sections for change category `%s` in %s",
                        &[changes.category.clone(), section.what()],
                        subsection.position(),
                    );
                }
            }
        }
    }

    findings
}

fn check_order(changelog: &Changelog, diagnostics: &mut Diagnostics) -> Findings {
    let sections = &changelog.sections;
    if !changelog.starts_with_title() {
        diagnostics.issue(
            IssueCode::GeneralFormattingError,
            "Changelog must start with a first level heading",
            NO_ARGS,
            sections.first().and_then(Section::position),
        );
    }

    let mut findings = Findings::default();
    let mut last_version: Option<&Version> = None;

    for section in sections {
        if section.is_unreleased() {
            if last_version.is_some() {
                if !findings.unreleased {
                    diagnostics.issue(
                        IssueCode::ReleaseOrdering,
                        "Section for unreleased changes must be first in the changelog",
                        NO_ARGS,
                        section.position(),
                    );
                }
                findings.unreleased = true;
            }
        } else if let Some(release) = section.as_release() {
            match (last_version, &release.parsed_version) {
                (Some(last), Some(parsed)) if last < parsed => {
                    if !findings.releases {
                        diagnostics.issue(
                            IssueCode::ReleaseOrdering,
                            "Sections are not ordered by release versions",
                            NO_ARGS,
                            section.position(),
                        );
                    }
                    findings.releases = true;
                }
                (_, Some(parsed)) => last_version = Some(parsed),
                (_, None) => {}
            }
        } else {
            continue;
        }

        check_category_order(section, diagnostics);
    }

    findings
}

fn check_category_order(section: &Section, diagnostics: &mut Diagnostics) {
    let mut last_sort_key: Option<usize> = None;
    for subsection in &section.subsections {
        let Some(sort_key) = subsection.sort_key() else {
            continue;
        };
        if last_sort_key.is_some_and(|last| last > sort_key) {
            diagnostics.issue(
                IssueCode::ChangeCategoryOrdering,
                "Change categories in %s are not ordered by preferred order",
                &[section.what()],
                subsection.position(),
            );
            return;
        }
        last_sort_key = Some(sort_key);
    }
}

fn check_links(
    sections: &[Section],
    repo_versions: Option<&RepoVersions>,
    settings: &Settings,
    can_trust_order: bool,
    can_trust_order_unreleased: bool,
    diagnostics: &mut Diagnostics,
) {
    let linked = sections.iter().rev().filter(|s| !s.is_trivia());

    if !settings.add_release_link {
        for section in linked.filter(|s| s.link().is_some()) {
            diagnostics.issue(
                IssueCode::UnexpectedReleaseLink,
                "Unexpected link for %s",
                &[section.what()],
                section.position(),
            );
        }
        return;
    }

    let mut prev_tag: Option<String> = None;
    for section in linked {
        if section.is_unreleased() && !(can_trust_order && can_trust_order_unreleased) {
            continue;
        }

        let (expected, tag) = make_link(section, prev_tag.as_deref(), repo_versions, settings);
        if section.is_release() && tag.is_some() && tag == prev_tag {
            continue;
        }
        prev_tag = tag;

        let position = section.position();
        match (expected, section.link()) {
            (None, Some(_)) => diagnostics.issue(
                IssueCode::UnexpectedReleaseLink,
                "Unexpected link for %s",
                &[section.what()],
                position,
            ),
            (None, None) => {}
            (Some(expected), None) if can_trust_order => diagnostics.issue(
                IssueCode::MissingReleaseLink,
                "Missing link for %s, should be %s",
                &[section.what(), expected],
                position,
            ),
            (Some(_), None) => diagnostics.issue(
                IssueCode::MissingReleaseLink,
                "Missing link for %s",
                &[section.what()],
                position,
            ),
            (Some(expected), Some(actual)) if actual != expected => {
                if can_trust_order {
                    diagnostics.issue(
                        IssueCode::MissingReleaseLink,
                        "Incorrect link for %s, should be %s",
                        &[section.what(), expected],
                        position,
                    );
                } else {
                    diagnostics.issue(
                        IssueCode::IncorrectReleaseLink,
                        "Potentially incorrect link for %s",
                        &[section.what()],
                        position,
                    );
                }
            }
            (Some(_), Some(_)) => {}
        }
    }
}

fn check_dates(
    sections: &[Section],
    repo_versions: Option<&RepoVersions>,
    settings: &Settings,
    diagnostics: &mut Diagnostics,
) {
    for section in sections {
        let Some(release) = section.as_release() else {
            continue;
        };
        let has_date = release.release_date_raw.is_some();

        if !settings.add_release_date {
            if has_date {
                diagnostics.issue(
                    IssueCode::UnexpectedReleaseDate,
                    "Unexpected release date for release `%s`",
                    &[release.version.as_str()],
                    section.position(),
                );
            }
            continue;
        }

        if !has_date {
            diagnostics.issue(
                IssueCode::MissingReleaseDate,
                "Missing date for release `%s`",
                &[release.version.as_str()],
                section.position(),
            );
            continue;
        }

        let (Some(date), Some(data)) = (
            release.release_date,
            repo_versions.and_then(|r| r.get(&release.canonized_version)),
        ) else {
            continue;
        };
        if data.author_date != date && data.committer_date != date {
            diagnostics.issue(
                IssueCode::IncorrectReleaseDate,
                "Release date for release `%s` is different from commit date `%s`",
                &[
                    release.version.clone(),
                    data.committer_date.format("%Y-%m-%d").to_string(),
                ],
                section.position(),
            );
        }
    }
}

fn check_content(sections: &[Section], settings: &Settings, diagnostics: &mut Diagnostics) {
    for (i, section) in sections.iter().enumerate() {
        let skip = usize::from(i == 0 && section.is_trivia());
        for block in section.blocks().skip(skip) {
            if block.heading_level() == Some(1) {
                diagnostics.issue(
                    IssueCode::GeneralFormattingError,
                    "Unexpected first level heading",
                    NO_ARGS,
                    block.lines,
                );
            }
        }

        let Some(release) = section.as_release() else {
            continue;
        };

        if section.subsections.is_empty()
            && !settings.is_exempt(release.parsed_version.as_ref(), &release.version)
        {
            diagnostics.issue(
                IssueCode::EmptyRelease,
                "Section for release `%s` is empty",
                &[release.version.as_str()],
                section.position(),
            );
        }

        if let Some(empty) = section.subsections.iter().find(|s| s.content.is_empty()) {
            diagnostics.issue(
                IssueCode::EmptyChangeCategory,
                "Sub-section `%s` for release `%s` is empty",
                &[empty.category(), release.version.as_str()],
                section.position(),
            );
        }
    }
}

fn check_tags(
    sections: &[Section],
    repo_versions: &RepoVersions,
    settings: &Settings,
    diagnostics: &mut Diagnostics,
) {
    let releases: BTreeSet<&str> = sections
        .iter()
        .filter_map(Section::as_release)
        .map(|r| r.canonized_version.as_str())
        .collect();

    let not_in_repo: Vec<&str> = sections
        .iter()
        .filter_map(Section::as_release)
        .filter(|r| !repo_versions.contains_key(&r.canonized_version))
        .filter(|r| !settings.is_exempt(r.parsed_version.as_ref(), &r.canonized_version))
        .map(|r| r.version.as_str())
        .collect();
    if !not_in_repo.is_empty() {
        diagnostics.external(
            IssueCode::MissingTagForRelease,
            format!("Missing tags for {} %s", plural("release", not_in_repo.len())),
            &[join_more(&not_in_repo)],
        );
    }

    let not_in_changelog: Vec<&str> = repo_versions
        .values()
        .filter(|d| !releases.contains(d.canonized_version.as_str()))
        .filter(|d| !settings.is_exempt(d.parsed_version.as_ref(), &d.canonized_version))
        .map(|d| d.version.as_str())
        .collect();
    if !not_in_changelog.is_empty() {
        diagnostics.external(
            IssueCode::MissingReleaseForTag,
            format!(
                "Missing changelog sections for {} %s",
                plural("release", not_in_changelog.len())
            ),
            &[join_more(&not_in_changelog)],
        );
    }
}

fn plural(word: &str, count: usize) -> String {
    if count == 1 {
        word.to_string()
    } else {
        format!("{}s", word)
    }
}

/// Sorted, backticked list of at most five items
fn join_more(items: &[&str]) -> String {
    let mut sorted: Vec<&str> = items.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    let mut joined = sorted
        .iter()
        .take(5)
        .map(|s| format!("`{}`", s))
        .collect::<Vec<_>>()
        .join(", ");
    if sorted.len() > 5 {
        joined.push_str(&format!(" (+{} more)", sorted.len() - 5));
    }
    joined
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::test_support::{repo_version, settings};
    use chrono::NaiveDate;
    use clkeep_core::{IssueScope, Report};

    fn check_text(text: &str, settings: &Settings, repo_versions: Option<&RepoVersions>) -> Report {
        let mut diagnostics = settings.diagnostics();
        let changelog = parse(text, settings, &mut diagnostics);
        diagnostics.clear();
        check(&changelog, settings, repo_versions, &mut diagnostics);
        diagnostics.into_report()
    }

    fn codes(report: &Report) -> Vec<IssueCode> {
        report.issues.iter().map(|i| i.code).collect()
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn test_missing_release_link() {
        let report = check_text("# Changelog\n\n## 1.0.0 - 2025-01-01\n\nContent\n", &settings(), None);
        assert_eq!(codes(&report), [IssueCode::MissingReleaseLink]);
        assert_eq!(
            report.issues[0].message(),
            "Missing link for release `1.0.0`, should be https://github.com/acme/widgets/releases/tag/v1.0.0"
        );
        assert_eq!(report.issues[0].position.unwrap().first_line(), 3);
    }

    #[test]
    fn test_duplicate_unreleased() {
        let text = "# Changelog\n\n## Unreleased\n\n- a\n\n## Unreleased\n\n- b\n";
        let report = check_text(text, &settings(), None);
        assert_eq!(codes(&report), [IssueCode::DuplicateReleases]);
        assert_eq!(report.issues[0].position.unwrap().first_line(), 7);
    }

    #[test]
    fn test_clean_changelog() {
        let text = "# Changelog\n\n## [Unreleased]\n\n### Added\n\n- new\n\n\
                    ## [1.1.0] - 2024-01-02\n\n### Fixed\n\n- bug\n\n\
                    ## [1.0.0] - 2024-01-01\n\n### Added\n\n- init\n\n\
                    [Unreleased]: https://github.com/acme/widgets/compare/v1.1.0...HEAD\n\
                    [1.1.0]: https://github.com/acme/widgets/compare/v1.0.0...v1.1.0\n\
                    [1.0.0]: https://github.com/acme/widgets/releases/tag/v1.0.0\n";
        let mut repo = RepoVersions::new();
        repo.insert("1.0.0".to_string(), repo_version("1.0.0", date(1)));
        repo.insert("1.1.0".to_string(), repo_version("1.1.0", date(2)));
        let report = check_text(text, &settings(), Some(&repo));
        assert!(report.is_empty(), "{:?}", report.issues);
    }

    #[test]
    fn test_missing_title() {
        let report = check_text("Intro\n", &settings(), None);
        assert_eq!(codes(&report), [IssueCode::GeneralFormattingError]);
        assert_eq!(report.issues[0].message(), "Changelog must start with a first level heading");
    }

    #[test]
    fn test_unexpected_first_level_heading() {
        let report = check_text("# Changelog\n\ntext\n\n# Again\n", &settings(), None);
        assert_eq!(codes(&report), [IssueCode::GeneralFormattingError]);
        assert_eq!(report.issues[0].position.unwrap().first_line(), 5);
    }

    #[test]
    fn test_release_ordering_reported_once() {
        let mut settings = settings();
        settings.add_release_link = false;
        let text = "# Changelog\n\n## 1.0.0 - 2024-01-01\n\n- a\n\n## 2.0.0 - 2024-01-02\n\n- b\n\n\
                    ## 3.0.0 - 2024-01-03\n\n- c\n\n## Unreleased\n\n- d\n";
        let report = check_text(text, &settings, None);
        assert_eq!(codes(&report), [IssueCode::ReleaseOrdering, IssueCode::ReleaseOrdering]);
        let messages: Vec<String> = report.issues.iter().map(|i| i.message()).collect();
        assert!(messages.contains(&"Sections are not ordered by release versions".to_string()));
    }

    #[test]
    fn test_untrusted_order_weakens_link_issues() {
        let text = "# Changelog\n\n## [1.0.0] - 2024-01-01\n\n- a\n\n## [2.0.0] - 2024-01-02\n\n- b\n\n\
                    [1.0.0]: https://github.com/acme/widgets/releases/tag/v1.0.0\n\
                    [2.0.0]: https://github.com/acme/widgets/compare/v1.0.0...v2.0.0\n";
        let report = check_text(text, &settings(), None);
        assert_eq!(
            codes(&report),
            [
                IssueCode::ReleaseOrdering,
                IssueCode::IncorrectReleaseLink,
                IssueCode::IncorrectReleaseLink
            ]
        );
        assert_eq!(report.issues[1].message(), "Potentially incorrect link for release `1.0.0`");
    }

    #[test]
    fn test_incorrect_link() {
        let text = "# Changelog\n\n## [1.0.0] - 2024-01-01\n\n- a\n\n[1.0.0]: https://example.com\n";
        let report = check_text(text, &settings(), None);
        assert_eq!(codes(&report), [IssueCode::MissingReleaseLink]);
        assert!(report.issues[0].message().starts_with("Incorrect link for release `1.0.0`"));
    }

    #[test]
    fn test_unexpected_link_when_links_disabled() {
        let mut settings = settings();
        settings.add_release_link = false;
        let text = "# Changelog\n\n## [Unreleased](https://x)\n\n- a\n";
        let report = check_text(text, &settings, None);
        assert_eq!(codes(&report), [IssueCode::UnexpectedReleaseLink]);
        assert_eq!(report.issues[0].message(), "Unexpected link for unreleased section");
    }

    #[test]
    fn test_unreleased_link_before_first_release() {
        let text = "# Changelog\n\n## [Unreleased](https://x)\n\n- a\n";
        let report = check_text(text, &settings(), None);
        assert_eq!(codes(&report), [IssueCode::UnexpectedReleaseLink]);
    }

    #[test]
    fn test_dates() {
        let mut settings = settings();
        settings.add_release_link = false;
        let report = check_text("# Changelog\n\n## 1.0.0\n\n- a\n", &settings, None);
        assert_eq!(codes(&report), [IssueCode::MissingReleaseDate]);

        let mut repo = RepoVersions::new();
        repo.insert("1.0.0".to_string(), repo_version("1.0.0", date(5)));
        let report = check_text("# Changelog\n\n## 1.0.0 - 2024-01-01\n\n- a\n", &settings, Some(&repo));
        assert_eq!(codes(&report), [IssueCode::IncorrectReleaseDate]);
        assert_eq!(
            report.issues[0].message(),
            "Release date for release `1.0.0` is different from commit date `2024-01-05`"
        );

        settings.add_release_date = false;
        let report = check_text("# Changelog\n\n## 1.0.0 - 2024-01-01\n\n- a\n", &settings, None);
        assert_eq!(codes(&report), [IssueCode::UnexpectedReleaseDate]);
    }

    #[test]
    fn test_empty_release_and_category() {
        let mut settings = settings();
        settings.add_release_link = false;
        let text = "# Changelog\n\n## 1.1.0 - 2024-01-02\n\n## 1.0.0 - 2024-01-01\n\n### Added\n\n### Fixed\n";
        let report = check_text(text, &settings, None);
        assert_eq!(codes(&report), [IssueCode::EmptyRelease, IssueCode::EmptyChangeCategory]);
        assert_eq!(report.issues[1].message(), "Sub-section `added` for release `1.0.0` is empty");
    }

    #[test]
    fn test_empty_pre_release_is_exempt() {
        let mut settings = settings();
        settings.add_release_link = false;
        let report = check_text("# Changelog\n\n## 1.0.0-rc.1 - 2024-01-01\n", &settings, None);
        assert!(report.is_empty(), "{:?}", report.issues);
    }

    #[test]
    fn test_duplicate_categories_and_order() {
        let mut settings = settings();
        settings.add_release_link = false;
        let text = "# Changelog\n\n## 1.0.0 - 2024-01-01\n\n### Fixed\n\n- a\n\n### Added\n\n- b\n\n### Fixed\n\n- c\n";
        let report = check_text(text, &settings, None);
        assert_eq!(
            codes(&report),
            [IssueCode::ChangeCategoryOrdering, IssueCode::DuplicateChangeCategories]
        );
        assert_eq!(
            report.issues[1].message(),
            "Found multiple sub-sections for change category `fixed` in release `1.0.0`"
        );
    }

    #[test]
    fn test_tag_reconciliation() {
        let mut settings = settings();
        settings.add_release_link = false;
        let mut repo = RepoVersions::new();
        for version in ["0.1.0", "0.2.0", "0.3.0-rc.1"] {
            repo.insert(version.to_string(), repo_version(version, date(1)));
        }
        let text = "# Changelog\n\n## 1.0.0 - 2024-01-01\n\n- a\n\n## 0.1.0 - 2024-01-01\n\n- b\n";
        let report = check_text(text, &settings, Some(&repo));
        assert_eq!(
            codes(&report),
            [IssueCode::MissingReleaseForTag, IssueCode::MissingTagForRelease]
        );
        assert!(report.issues.iter().all(|i| i.scope == IssueScope::External));
        assert_eq!(report.issues[0].message(), "Missing changelog sections for release `0.2.0`");
        assert_eq!(report.issues[1].message(), "Missing tags for release `1.0.0`");
    }

    #[test]
    fn test_join_more() {
        assert_eq!(join_more(&["b", "a"]), "`a`, `b`");
        let many = ["1", "2", "3", "4", "5", "6", "7"];
        assert_eq!(join_more(&many), "`1`, `2`, `3`, `4`, `5` (+2 more)");
    }
}

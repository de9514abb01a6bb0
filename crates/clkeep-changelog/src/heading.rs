//! Canonical section headings

use clkeep_core::Settings;

use crate::markdown::{Block, HeadingLink, HeadingRun};
use crate::model::{Section, SectionKind};

/// Flattened text of a section's canonical heading
///
/// Trivia sections have no canonical heading and produce an empty string.
pub fn heading_text(section: &Section, settings: &Settings) -> String {
    heading_runs(section, settings)
        .into_iter()
        .map(|run| run.text)
        .collect()
}

/// Canonical heading block of a section, with its link when links are enabled
pub fn heading_block(section: &Section, settings: &Settings) -> Block {
    let link = match (settings.add_release_link, section.link()) {
        (true, Some(href)) => Some(HeadingLink {
            href: href.to_string(),
            label: section_label_of(section),
        }),
        _ => None,
    };
    Block::heading(2, heading_runs(section, settings), link)
}

/// Reference label used for a section's link
pub fn section_label(section: &Section, settings: &Settings) -> Option<String> {
    match &section.kind {
        SectionKind::Trivia => None,
        SectionKind::Unreleased(_) => Some(settings.unreleased_name.clone()),
        SectionKind::Release(release) => {
            let (pre, post) = &settings.version_decorations;
            Some(format!("{}{}{}", pre, release.version, post))
        }
    }
}

fn section_label_of(section: &Section) -> Option<String> {
    match &section.kind {
        SectionKind::Trivia => None,
        SectionKind::Unreleased(u) => u.label.clone(),
        SectionKind::Release(r) => r.label.clone(),
    }
}

/// Split a section's canonical heading into runs, the version or unreleased
/// name being the linked one
fn heading_runs(section: &Section, settings: &Settings) -> Vec<HeadingRun> {
    let mut runs = Vec::new();
    match &section.kind {
        SectionKind::Trivia => {}
        SectionKind::Unreleased(_) => {
            let (pre, post) = &settings.unreleased_decorations;
            runs.push(HeadingRun::plain(pre.as_str()));
            runs.push(HeadingRun::linked(settings.unreleased_name.as_str()));
            runs.push(HeadingRun::plain(post.as_str()));
        }
        SectionKind::Release(release) => {
            let (pre, post) = &settings.release_decorations;
            let (version_pre, version_post) = &settings.version_decorations;
            runs.push(HeadingRun::plain(pre.as_str()));
            runs.push(HeadingRun::linked(format!("{}{}{}", version_pre, release.version, version_post)));
            if settings.add_release_date {
                if let Some(date) = release.date_text() {
                    let (date_pre, date_post) = &settings.release_date_decorations;
                    runs.push(HeadingRun::plain(format!("{}{}{}", date_pre, date, date_post)));
                }
            }
            if let Some(comment) = release.release_comment.as_deref().filter(|c| !c.is_empty()) {
                let (comment_pre, comment_post) = &settings.release_comment_decorations;
                runs.push(HeadingRun::plain(format!("{}{}{}", comment_pre, comment, comment_post)));
            }
            runs.push(HeadingRun::plain(post.as_str()));
        }
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Release, Unreleased};
    use crate::test_support::settings;
    use chrono::NaiveDate;

    fn release_section() -> Section {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let mut release = Release::new("1.2.0", None, "1.2.0").with_date(date);
        release.release_comment = Some("[YANKED]".to_string());
        Section::new(SectionKind::Release(release), vec![])
    }

    #[test]
    fn test_heading_text_release() {
        let settings = settings();
        assert_eq!(heading_text(&release_section(), &settings), "1.2.0 - 2024-03-01 - [YANKED]");
    }

    #[test]
    fn test_heading_text_without_dates() {
        let mut settings = settings();
        settings.add_release_date = false;
        assert_eq!(heading_text(&release_section(), &settings), "1.2.0 - [YANKED]");
    }

    #[test]
    fn test_heading_block_with_reference_link() {
        let settings = settings();
        let mut section = release_section();
        section.set_link(Some("https://x/1.2.0".to_string()), Some("1.2.0".to_string()));
        let block = heading_block(&section, &settings);
        assert_eq!(block.source(), "## [1.2.0] - 2024-03-01 - \\[YANKED\\]");
        let heading = block.as_heading().unwrap();
        assert_eq!(heading.text, "1.2.0 - 2024-03-01 - [YANKED]");
        assert_eq!(heading.link.as_ref().unwrap().href, "https://x/1.2.0");
    }

    #[test]
    fn test_heading_block_escapes_comment() {
        let settings = settings();
        let mut section = release_section();
        if let Some(release) = section.as_release_mut() {
            release.release_comment = Some("*breaking* snake_case".to_string());
        }
        let block = heading_block(&section, &settings);
        assert_eq!(block.source(), "## 1.2.0 - 2024-03-01 - \\*breaking\\* snake\\_case");
        assert_eq!(block.as_heading().unwrap().text, "1.2.0 - 2024-03-01 - *breaking* snake_case");
    }

    #[test]
    fn test_heading_block_unreleased() {
        let settings = settings();
        let mut section = Section::new(SectionKind::Unreleased(Unreleased::default()), vec![]);
        assert_eq!(heading_block(&section, &settings).source(), "## Unreleased");
        section.set_link(Some("https://x".to_string()), None);
        assert_eq!(heading_block(&section, &settings).source(), "## [Unreleased](https://x)");
    }

    #[test]
    fn test_section_label() {
        let mut settings = settings();
        settings.version_decorations = ("v".to_string(), String::new());
        assert_eq!(section_label(&release_section(), &settings).as_deref(), Some("v1.2.0"));
        let trivia = Section::new(SectionKind::Trivia, vec![]);
        assert_eq!(section_label(&trivia, &settings), None);
    }
}

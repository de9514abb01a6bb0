//! Changelog parser
//!
//! Splits a tokenized document into sections at level-two headings and into
//! subsections at level-three headings, then recognizes what each section and
//! subsection describes from its heading text. Malformed headings never fail
//! the parse; they are reported to [`Diagnostics`] and kept as trivia.

use chrono::NaiveDate;
use clkeep_core::config::Settings;
use clkeep_core::version::canonize_version;
use clkeep_core::{parse_version, Diagnostics, IssueCode, VersionFormat};
use regex::{Match, Regex};
use std::sync::LazyLock;
use tracing::{debug, instrument};

use crate::heading::heading_text;
use crate::markdown::{self, Block};
use crate::model::{
    CategoryKind, Changelog, Changes, Release, Section, SectionKind, SubSection, SubSectionKind,
    Unreleased,
};

/// Version literal inside a heading
static VERSION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\d+!)?\d+\.\d+\.\d+(?:[-+._]?[0-9a-z+.-]*)?").expect("Invalid regex")
});

/// Release date inside a heading
static DATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<year>\d{4})-(?P<month>\d{2})-(?P<day>\d{2})").expect("Invalid regex")
});

/// Parse changelog text
#[instrument(skip_all, fields(len = text.len()))]
pub fn parse(text: &str, settings: &Settings, diagnostics: &mut Diagnostics) -> Changelog {
    let document = markdown::tokenize(text);

    let mut sections = Vec::new();
    for (heading, content) in split_into_sections(document.blocks, 2) {
        let subsections = match heading {
            None => vec![SubSection::trivia(content)],
            Some(_) => split_into_sections(content, 3)
                .into_iter()
                .map(|(heading, content)| create_subsection(heading, content, settings, diagnostics))
                .collect(),
        };
        sections.push(create_section(heading, subsections, settings, diagnostics));
    }

    debug!(
        section_count = sections.len(),
        reference_count = document.references.len(),
        "parsed changelog"
    );

    Changelog {
        sections,
        references: document.references,
    }
}

/// Group blocks into segments starting at headings of the given level
///
/// Headings of a higher level (fewer `#`) close the current segment and start
/// a segment without a heading; deeper headings are ordinary content.
pub fn split_into_sections(blocks: Vec<Block>, level: usize) -> Vec<(Option<Block>, Vec<Block>)> {
    let mut segments = Vec::new();
    let mut heading: Option<Block> = None;
    let mut content: Vec<Block> = Vec::new();

    for block in blocks {
        let block_level = match block.heading_level() {
            Some(l) if l <= level => l,
            _ => {
                content.push(block);
                continue;
            }
        };

        if heading.is_some() || !content.is_empty() {
            segments.push((heading.take(), std::mem::take(&mut content)));
        }
        if block_level == level {
            heading = Some(block);
        } else {
            content.push(block);
        }
    }

    if heading.is_some() || !content.is_empty() {
        segments.push((heading, content));
    }
    segments
}

fn create_section(
    heading: Option<Block>,
    subsections: Vec<SubSection>,
    settings: &Settings,
    diagnostics: &mut Diagnostics,
) -> Section {
    let Some((text, link, position)) = heading.as_ref().and_then(|block| {
        block.as_heading().filter(|h| h.level == 2).map(|h| {
            (
                h.text.clone(),
                h.link.clone(),
                block.lines,
            )
        })
    }) else {
        return Section {
            kind: SectionKind::Trivia,
            heading,
            subsections,
        };
    };

    let (href, label) = match link {
        Some(link) => (Some(link.href).filter(|h| !h.is_empty()), link.label),
        None => (None, None),
    };

    if settings.unreleased_pattern.is_match(&text) {
        let section = Section {
            kind: SectionKind::Unreleased(Unreleased { link: href, label }),
            heading,
            subsections,
        };
        let canonical = heading_text(&section, settings);
        if text != canonical {
            diagnostics.issue(
                IssueCode::UnreleasedHeadingFormat,
                "Heading for unreleased changes isn't properly formatted, should be `%s`",
                &[canonical],
                position,
            );
        }
        return section;
    }

    let Some(version_match) = VERSION_REGEX.find(&text) else {
        diagnostics.issue(
            IssueCode::GeneralFormattingError,
            "Changelog section doesn't contain a release version",
            &[] as &[&str],
            position,
        );
        return Section {
            kind: SectionKind::Trivia,
            heading,
            subsections,
        };
    };

    let version = version_match.as_str().to_string();
    let format = settings.version_format;
    let parsed_version = parse_version(&version, format);
    if parsed_version.is_none() && format != VersionFormat::None {
        diagnostics.issue(
            IssueCode::InvalidVersion,
            "Version `%s` doesn't follow %s specification",
            &[version.as_str(), format.as_str()],
            position,
        );
    }
    let canonized_version = parsed_version
        .as_ref()
        .and_then(|v| canonize_version(v, format))
        .unwrap_or_else(|| version.clone());

    let date_match = DATE_REGEX.captures_iter(&text).find(|caps| {
        caps.get(0)
            .is_some_and(|m| m.end() <= version_match.start() || m.start() >= version_match.end())
    });
    let (release_date, release_date_raw) = match &date_match {
        None => (None, None),
        Some(caps) => {
            let raw = caps[0].to_string();
            match parse_date(&caps["year"], &caps["month"], &caps["day"]) {
                Ok(date) => (Some(date), Some(raw)),
                Err(reason) => {
                    diagnostics.issue(
                        IssueCode::InvalidReleaseDate,
                        "Incorrect release date `%s`: %s",
                        &[raw.as_str(), reason],
                        position,
                    );
                    (None, Some(raw))
                }
            }
        }
    };

    let date_match = date_match.and_then(|caps| caps.get(0));
    let split = split_heading(&text, version_match, date_match, settings);
    if split.unresolved_link {
        diagnostics.issue(
            IssueCode::ReleaseHeadingFormat,
            "Can't resolve version's link",
            &[] as &[&str],
            position,
        );
    }

    let (comment_pre, comment_post) = &settings.release_comment_decorations;
    let comment = split.suffix.strip_prefix(comment_pre.as_str()).unwrap_or(&split.suffix);
    let comment = comment.strip_suffix(comment_post.as_str()).unwrap_or(comment).trim();

    let release = Release {
        version,
        parsed_version,
        canonized_version,
        link: href,
        label,
        release_date,
        release_date_raw,
        release_comment: Some(comment.to_string()).filter(|c| !c.is_empty()),
    };
    let section = Section {
        kind: SectionKind::Release(release),
        heading,
        subsections,
    };

    if !split.unresolved_link {
        let canonical = heading_text(&section, settings);
        if canonical != text {
            let version = section.as_release().map(|r| r.version.clone()).unwrap_or_default();
            diagnostics.issue(
                IssueCode::ReleaseHeadingFormat,
                "Heading for release `%s` isn't properly formatted, should be `%s`",
                &[version, canonical],
                position,
            );
        }
    }

    section
}

fn parse_date(year: &str, month: &str, day: &str) -> Result<NaiveDate, &'static str> {
    let (Ok(year), Ok(month), Ok(day)) = (
        year.parse::<i32>(),
        month.parse::<u32>(),
        day.parse::<u32>(),
    ) else {
        return Err("date is out of range");
    };
    if year == 0 {
        return Err("year 0 is out of range");
    }
    if !(1..=12).contains(&month) {
        return Err("month must be in 1..12");
    }
    NaiveDate::from_ymd_opt(year, month, day).ok_or("day is out of range for month")
}

/// Heading text left around the version and date
struct HeadingSplit {
    suffix: String,
    unresolved_link: bool,
}

fn split_heading(
    text: &str,
    version: Match<'_>,
    date: Option<Match<'_>>,
    settings: &Settings,
) -> HeadingSplit {
    let version_pre = settings.version_decorations.0.as_str();
    let version_post = settings.version_decorations.1.as_str();

    match date {
        None => {
            let prefix = strip_suffix(&text[..version.start()], version_pre);
            let mut suffix = strip_prefix(&text[version.end()..], version_post);
            let unresolved_link = is_broken_link(&prefix, &suffix);
            if unresolved_link {
                suffix = strip_prefix(suffix.trim_start(), "]");
            }
            HeadingSplit {
                suffix,
                unresolved_link,
            }
        }
        Some(date) if version.end() <= date.start() => {
            let prefix = strip_suffix(&text[..version.start()], version_pre);
            let middle = strip_prefix(&text[version.end()..date.start()], version_post);
            let mut suffix = strip_prefix(&text[date.end()..], settings.release_date_decorations.1.as_str());
            let unresolved_link = is_broken_link(&prefix, &middle);
            if closes_bracket(&middle, &suffix) {
                suffix.remove(0);
            }
            HeadingSplit {
                suffix,
                unresolved_link,
            }
        }
        Some(date) => {
            let middle = strip_suffix(&text[date.end()..version.start()], version_pre);
            let mut suffix = strip_prefix(&text[version.end()..], version_post);
            let unresolved_link = is_broken_link(&middle, &suffix);
            if unresolved_link {
                suffix = strip_prefix(suffix.trim_start(), "]");
            }
            if closes_bracket(&middle, &suffix) {
                suffix.remove(0);
            }
            HeadingSplit {
                suffix,
                unresolved_link,
            }
        }
    }
}

fn strip_prefix(text: &str, affix: &str) -> String {
    text.strip_prefix(affix).unwrap_or(text).to_string()
}

fn strip_suffix(text: &str, affix: &str) -> String {
    text.strip_suffix(affix).unwrap_or(text).to_string()
}

/// A `[` left before the version and a `]` after it mean the version was
/// meant to be a link whose definition is missing
fn is_broken_link(prefix: &str, suffix: &str) -> bool {
    prefix.trim_end().ends_with('[') && suffix.trim_start().starts_with(']')
}

fn closes_bracket(middle: &str, suffix: &str) -> bool {
    middle.ends_with(['(', '[', '<', '{']) && suffix.starts_with([')', ']', '>', '}'])
}

fn create_subsection(
    heading: Option<Block>,
    content: Vec<Block>,
    settings: &Settings,
    diagnostics: &mut Diagnostics,
) -> SubSection {
    let Some((text, position)) = heading.as_ref().and_then(|block| {
        block
            .as_heading()
            .filter(|h| h.level == 3)
            .map(|h| (h.text.clone(), block.lines))
    }) else {
        return SubSection {
            kind: SubSectionKind::Trivia,
            heading,
            content,
        };
    };

    if let Some(category) = settings.detect_category(&text) {
        let title = settings.category_title(category).unwrap_or_default();
        if !title.is_empty() && title != text {
            diagnostics.issue(
                IssueCode::ChangeCategoryHeadingFormat,
                "Heading for change group isn't properly formatted, should be `%s`",
                &[title],
                position,
            );
        }
        return SubSection {
            kind: SubSectionKind::Changes(Changes {
                category: category.to_string(),
                category_kind: CategoryKind::Known,
                sort_key: settings.category_sort_key(category),
            }),
            heading,
            content,
        };
    }

    if !settings.allow_unknown_categories {
        diagnostics.issue(
            IssueCode::UnknownChangeCategory,
            "Unknown change group `%s`",
            &[text.as_str()],
            position,
        );
    }

    SubSection {
        kind: SubSectionKind::Changes(Changes {
            category: text.to_lowercase(),
            category_kind: CategoryKind::Unknown,
            sort_key: None,
        }),
        heading,
        content,
    }
}

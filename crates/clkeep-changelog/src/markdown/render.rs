//! Markdown rendering with configurable line wrapping
//!
//! Synthesized headings, lists and link reference definitions go through
//! `pulldown-cmark-to-cmark`. Paragraphs and list item bodies are reflowed
//! from their source with `textwrap`.

use clkeep_core::Wrapping;
use pulldown_cmark::{CowStr, Event, HeadingLevel, LinkType, Tag, TagEnd};
use pulldown_cmark_to_cmark::{Options as CmarkOptions, State};
use textwrap::{wrap, Options as WrapOptions, WordSeparator, WordSplitter};
use tracing::warn;

use super::{Block, BlockKind, HeadingLink, HeadingRun, LinkReference, List, ListItem};

/// Characters the serializer escapes when they start a text event
const SPECIAL_CHARS: &[char] = &['\\', '`', '*', '_', '[', ']', '<', '>'];

/// Render blocks separated by blank lines, followed by link references
pub fn render_blocks<'a, I>(blocks: I, references: &[LinkReference], wrapping: Wrapping) -> String
where
    I: IntoIterator<Item = &'a Block>,
{
    let mut parts: Vec<String> = blocks
        .into_iter()
        .map(|block| render_block(block, wrapping))
        .collect();

    if !references.is_empty() {
        parts.push(render_references(references));
    }

    if parts.is_empty() {
        return String::new();
    }

    let mut output = parts.join("\n\n");
    output.push('\n');
    output
}

/// Render link reference definitions, one per line
pub fn render_references(references: &[LinkReference]) -> String {
    let mut state = State::default();
    state.shortcuts = references
        .iter()
        .map(|r| (r.label.clone(), r.dest.clone(), r.title.clone().unwrap_or_default()))
        .collect();

    let mut output = String::new();
    if state.finalize(&mut output).is_err() {
        warn!(count = references.len(), "failed to render link reference definitions");
    }

    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Inline Markdown of a synthesized heading
///
/// Linked runs become links to `link`. Falls back to unescaped plain text
/// when the level is out of range.
pub(super) fn heading_source(level: usize, runs: &[HeadingRun], link: Option<&HeadingLink>) -> String {
    let plain: String = runs.iter().map(|run| run.text.as_str()).collect();
    let Ok(heading_level) = HeadingLevel::try_from(level) else {
        return format!("{} {}", "#".repeat(level), plain);
    };

    let mut events = vec![Event::Start(Tag::Heading {
        level: heading_level,
        id: None,
        classes: vec![],
        attrs: vec![],
    })];
    for run in runs.iter().filter(|run| !run.text.is_empty()) {
        match link {
            Some(link) if run.linked => {
                let (link_type, id) = match &link.label {
                    Some(label) if label.eq_ignore_ascii_case(&run.text) => (LinkType::Shortcut, CowStr::from("")),
                    Some(label) => (LinkType::Reference, CowStr::from(label.as_str())),
                    None => (LinkType::Inline, CowStr::from("")),
                };
                events.push(Event::Start(Tag::Link {
                    link_type,
                    dest_url: link.href.as_str().into(),
                    title: "".into(),
                    id,
                }));
                events.extend(text_events(&run.text));
                events.push(Event::End(TagEnd::Link));
            }
            _ => events.extend(text_events(&run.text)),
        }
    }
    events.push(Event::End(TagEnd::Heading(heading_level)));

    // Shortcut definitions are rendered with the document's references
    let mut output = String::new();
    match pulldown_cmark_to_cmark::cmark_resume_with_options(
        events.iter(),
        &mut output,
        None,
        CmarkOptions::default(),
    ) {
        Ok(_) => output.trim_matches('\n').to_string(),
        Err(_) => {
            warn!(heading = %plain, "failed to render heading");
            format!("{} {}", "#".repeat(level), plain)
        }
    }
}

/// Split text so that every special character starts its own event
fn text_events(text: &str) -> Vec<Event<'_>> {
    let mut events = Vec::new();
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if i > start && SPECIAL_CHARS.contains(&c) {
            events.push(Event::Text(text[start..i].into()));
            start = i;
        }
    }
    if start < text.len() {
        events.push(Event::Text(text[start..].into()));
    }
    events
}

fn render_block(block: &Block, wrapping: Wrapping) -> String {
    match &block.kind {
        BlockKind::Heading(_) | BlockKind::Other => block.source.clone(),
        BlockKind::Paragraph { hard_breaks } => {
            if *hard_breaks {
                return block.source.clone();
            }
            match wrapping {
                Wrapping::Keep => block.source.clone(),
                Wrapping::No => join_lines(&block.source),
                Wrapping::Width(width) => reflow(&join_lines(&block.source), width),
            }
        }
        BlockKind::List(list) => render_list(list, wrapping),
    }
}

fn render_list(list: &List, wrapping: Wrapping) -> String {
    let mut options = CmarkOptions::default();
    options.increment_ordered_list_bullets = true;
    match list.start {
        Some(_) => options.ordered_list_token = list.marker,
        None => options.list_token = list.marker,
    }

    let bodies: Vec<String> = list
        .items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let marker_width = match list.start {
                Some(start) => (start + i as u64).to_string().len() + 2,
                None => 2,
            };
            item_body(item, wrapping, marker_width)
        })
        .collect();

    let mut events = vec![Event::Start(Tag::List(list.start))];
    for body in &bodies {
        events.push(Event::Start(Tag::Item));
        if list.loose {
            events.push(Event::Start(Tag::Paragraph));
        }
        if !body.is_empty() {
            events.push(Event::InlineHtml(body.as_str().into()));
        }
        if list.loose {
            events.push(Event::End(TagEnd::Paragraph));
        }
        events.push(Event::End(TagEnd::Item));
    }
    events.push(Event::End(TagEnd::List(list.start.is_some())));

    let mut output = String::new();
    if pulldown_cmark_to_cmark::cmark_with_options(events.iter(), &mut output, options).is_err() {
        warn!(items = list.items.len(), "failed to render list");
        return bodies.join("\n");
    }

    output
        .trim_matches('\n')
        .split('\n')
        .map(|line| tidy_line(line, list.marker))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Item body with its lines joined or reflowed for the marker's width
fn item_body(item: &ListItem, wrapping: Wrapping, marker_width: usize) -> String {
    if !item.simple {
        return item.body.clone();
    }
    match wrapping {
        Wrapping::Keep => item.body.clone(),
        Wrapping::No => join_lines(&item.body),
        Wrapping::Width(width) => reflow(&join_lines(&item.body), width.saturating_sub(marker_width).max(1)),
    }
}

/// Drop indentation-only lines and the space after a bare marker
fn tidy_line(line: &str, marker: char) -> &str {
    let trimmed = line.trim_end();
    if trimmed.is_empty() {
        return "";
    }
    let bare_marker = trimmed.ends_with(marker)
        && trimmed[..trimmed.len() - marker.len_utf8()]
            .chars()
            .all(|c| c.is_ascii_digit());
    if bare_marker {
        trimmed
    } else {
        line
    }
}

fn join_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Wrap text to a width, falling back to a single line when a wrapped line
/// would start a new block
fn reflow(text: &str, width: usize) -> String {
    let options = WrapOptions::new(width)
        .break_words(false)
        .word_separator(WordSeparator::AsciiSpace)
        .word_splitter(WordSplitter::NoHyphenation);

    let lines = wrap(text, options);
    let unsafe_break = lines
        .iter()
        .skip(1)
        .any(|line| starts_block(line.trim_start()));
    if unsafe_break {
        return text.to_string();
    }

    lines.join("\n")
}

fn starts_block(line: &str) -> bool {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        return matches!(line[digits..].chars().next(), Some('.' | ')'));
    }
    matches!(
        line.chars().next(),
        Some('#' | '>' | '-' | '*' | '+' | '=' | '|' | '`' | '~' | '<' | '[')
    )
}

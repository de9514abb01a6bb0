//! Markdown block layer
//!
//! Splits a document into top-level blocks using `pulldown-cmark`. Each block
//! keeps its original source text and line range; headings and lists carry the
//! little structure the changelog model needs (level, flattened text, first
//! link, list items). Link reference definitions are collected separately and
//! re-emitted at the end of the document on render.

mod render;

pub use render::{render_blocks, render_references};

use clkeep_core::LineRange;
use pulldown_cmark::{Event, HeadingLevel, LinkType, Options, Parser, Tag, TagEnd};
use std::ops::Range;
use tracing::trace;

/// A top-level Markdown block
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub kind: BlockKind,
    source: String,
    /// Source lines, absent for synthesized blocks
    pub lines: Option<LineRange>,
}

/// What a block is, as far as changelog processing cares
#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    Heading(Heading),
    List(List),
    Paragraph { hard_breaks: bool },
    Other,
}

/// A heading with its flattened text
#[derive(Debug, Clone, PartialEq)]
pub struct Heading {
    pub level: usize,
    /// Concatenated literal text runs, trimmed
    pub text: String,
    /// First link found in the heading
    pub link: Option<HeadingLink>,
}

/// A link embedded in a heading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingLink {
    pub href: String,
    /// Reference label for `[text][label]` and `[text]` links
    pub label: Option<String>,
}

/// A piece of synthesized heading text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingRun {
    pub text: String,
    /// Whether the run is the text of the heading link
    pub linked: bool,
}

impl HeadingRun {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            linked: false,
        }
    }

    pub fn linked(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            linked: true,
        }
    }
}

/// A bullet or ordered list
#[derive(Debug, Clone, PartialEq)]
pub struct List {
    /// Start number for ordered lists
    pub start: Option<u64>,
    /// Bullet character, or the delimiter after the number of an ordered list
    pub marker: char,
    pub loose: bool,
    pub items: Vec<ListItem>,
}

/// One list item, with its marker and indentation removed
#[derive(Debug, Clone, PartialEq)]
pub struct ListItem {
    pub body: String,
    /// A single paragraph of inline content that can be reflowed
    pub simple: bool,
}

/// A link reference definition, `[label]: dest "title"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkReference {
    pub label: String,
    pub dest: String,
    pub title: Option<String>,
}

/// Result of tokenizing a document
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub blocks: Vec<Block>,
    pub references: Vec<LinkReference>,
}

impl Block {
    /// Synthesize a heading block from text runs
    ///
    /// Linked runs are wrapped in `link`; all runs are escaped.
    pub fn heading(level: usize, runs: Vec<HeadingRun>, link: Option<HeadingLink>) -> Self {
        let source = render::heading_source(level, &runs, link.as_ref());
        let text: String = runs.into_iter().map(|run| run.text).collect();
        Self {
            kind: BlockKind::Heading(Heading {
                level,
                text: text.trim().to_string(),
                link,
            }),
            source,
            lines: None,
        }
    }

    /// Synthesize a heading block containing plain text
    pub fn plain_heading(level: usize, text: &str) -> Self {
        Self::heading(level, vec![HeadingRun::plain(text)], None)
    }

    /// Synthesize a list block from item bodies
    pub fn bullet_list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items: Vec<ListItem> = items
            .into_iter()
            .map(|body| {
                let body = body.into();
                let simple = !body.contains('\n');
                ListItem { body, simple }
            })
            .collect();
        Self {
            kind: BlockKind::List(List {
                start: None,
                marker: '-',
                loose: false,
                items,
            }),
            source: String::new(),
            lines: None,
        }
    }

    /// Original Markdown of this block
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn as_heading(&self) -> Option<&Heading> {
        match &self.kind {
            BlockKind::Heading(heading) => Some(heading),
            _ => None,
        }
    }

    pub fn heading_level(&self) -> Option<usize> {
        self.as_heading().map(|h| h.level)
    }

    pub fn as_list(&self) -> Option<&List> {
        match &self.kind {
            BlockKind::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut List> {
        match &mut self.kind {
            BlockKind::List(list) => Some(list),
            _ => None,
        }
    }

    /// Whether the block mentions a reference label
    pub fn mentions(&self, label: &str) -> bool {
        let needle = format!("[{}]", label.to_lowercase());
        match &self.kind {
            BlockKind::Heading(heading) => {
                heading
                    .link
                    .as_ref()
                    .and_then(|l| l.label.as_deref())
                    .is_some_and(|l| l.eq_ignore_ascii_case(label))
                    || self.source.to_lowercase().contains(&needle)
            }
            BlockKind::List(list) => list
                .items
                .iter()
                .any(|item| item.body.to_lowercase().contains(&needle)),
            _ => self.source.to_lowercase().contains(&needle),
        }
    }
}

impl List {
    /// Whether two lists would render with the same kind of marker
    pub fn same_kind(&self, other: &List) -> bool {
        self.start.is_some() == other.start.is_some()
    }

    /// Append another list's items
    pub fn splice(&mut self, other: List) {
        self.loose |= other.loose;
        self.items.extend(other.items);
    }
}

/// Tokenize a Markdown document into top-level blocks
pub fn tokenize(text: &str) -> Document {
    let text = text.replace("\r\n", "\n");
    let index = LineIndex::new(&text);

    let parser = Parser::new_ext(&text, Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH);

    let mut references: Vec<(usize, LinkReference)> = parser
        .reference_definitions()
        .iter()
        .map(|(label, def)| {
            (
                def.span.start,
                LinkReference {
                    label: label.to_string(),
                    dest: def.dest.to_string(),
                    title: def.title.as_ref().map(|t| t.to_string()),
                },
            )
        })
        .collect();
    references.sort_by_key(|(start, _)| *start);

    let mut blocks = Vec::new();
    let mut builder: Option<BlockBuilder> = None;
    let mut depth = 0usize;

    for (event, range) in parser.into_offset_iter() {
        match event {
            Event::Start(tag) => {
                if depth == 0 {
                    builder = Some(BlockBuilder::new(&tag, range));
                } else if let Some(b) = builder.as_mut() {
                    b.start(&tag, depth, range);
                }
                depth += 1;
            }
            Event::End(tag) => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    if let Some(b) = builder.take() {
                        blocks.push(b.finish(&text, &index));
                    }
                } else if let Some(b) = builder.as_mut() {
                    b.end(tag);
                }
            }
            other => {
                if depth == 0 {
                    blocks.push(Block {
                        kind: BlockKind::Other,
                        source: block_source(&text, &range),
                        lines: Some(index.lines(&range)),
                    });
                } else if let Some(b) = builder.as_mut() {
                    b.event(other);
                }
            }
        }
    }

    trace!(blocks = blocks.len(), references = references.len(), "tokenized document");

    Document {
        blocks,
        references: references.into_iter().map(|(_, r)| r).collect(),
    }
}

enum Pending {
    Heading {
        level: usize,
        text: String,
        link: Option<HeadingLink>,
        link_text: String,
        in_link: bool,
    },
    List {
        start: Option<u64>,
        loose: bool,
        items: Vec<PendingItem>,
    },
    Paragraph {
        hard_breaks: bool,
    },
    Other,
}

struct PendingItem {
    range: Range<usize>,
    paragraphs: usize,
    simple: bool,
}

struct BlockBuilder {
    range: Range<usize>,
    pending: Pending,
}

impl BlockBuilder {
    fn new(tag: &Tag<'_>, range: Range<usize>) -> Self {
        let pending = match tag {
            Tag::Heading { level, .. } => Pending::Heading {
                level: heading_level(*level),
                text: String::new(),
                link: None,
                link_text: String::new(),
                in_link: false,
            },
            Tag::List(start) => Pending::List {
                start: *start,
                loose: false,
                items: Vec::new(),
            },
            Tag::Paragraph => Pending::Paragraph { hard_breaks: false },
            _ => Pending::Other,
        };
        Self { range, pending }
    }

    fn start(&mut self, tag: &Tag<'_>, depth: usize, range: Range<usize>) {
        match &mut self.pending {
            Pending::Heading { link, in_link, .. } => {
                if let Tag::Link {
                    link_type,
                    dest_url,
                    id,
                    ..
                } = tag
                {
                    if link.is_none() {
                        let label = match link_type {
                            LinkType::Reference | LinkType::Collapsed | LinkType::Shortcut => {
                                Some(id.to_string())
                            }
                            _ => None,
                        };
                        *link = Some(HeadingLink {
                            href: dest_url.to_string(),
                            label,
                        });
                        *in_link = true;
                    }
                }
            }
            Pending::List { loose, items, .. } => {
                if depth == 1 {
                    if let Tag::Item = tag {
                        items.push(PendingItem {
                            range,
                            paragraphs: 0,
                            simple: true,
                        });
                    }
                    return;
                }
                let Some(item) = items.last_mut() else {
                    return;
                };
                match tag {
                    Tag::Paragraph => {
                        if depth == 2 {
                            *loose = true;
                        }
                        item.paragraphs += 1;
                        if item.paragraphs > 1 {
                            item.simple = false;
                        }
                    }
                    Tag::Emphasis
                    | Tag::Strong
                    | Tag::Strikethrough
                    | Tag::Link { .. }
                    | Tag::Image { .. } => {}
                    _ => item.simple = false,
                }
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        if let (Pending::Heading { in_link, .. }, TagEnd::Link) = (&mut self.pending, tag) {
            *in_link = false;
        }
    }

    fn event(&mut self, event: Event<'_>) {
        match &mut self.pending {
            Pending::Heading {
                text,
                link_text,
                in_link,
                ..
            } => {
                if let Event::Text(t) = &event {
                    text.push_str(t);
                    if *in_link {
                        link_text.push_str(t);
                    }
                }
            }
            Pending::List { items, .. } => {
                if let (Some(item), Event::HardBreak | Event::Rule | Event::Html(_)) =
                    (items.last_mut(), &event)
                {
                    item.simple = false;
                }
            }
            Pending::Paragraph { hard_breaks } => {
                if let Event::HardBreak = event {
                    *hard_breaks = true;
                }
            }
            Pending::Other => {}
        }
    }

    fn finish(self, text: &str, index: &LineIndex) -> Block {
        let source = block_source(text, &self.range);
        let lines = Some(index.lines(&self.range));
        let kind = match self.pending {
            Pending::Heading {
                level,
                text: heading_text,
                link,
                link_text,
                ..
            } => {
                let link = link.map(|mut link| {
                    if link.label.as_deref() == Some("") {
                        link.label = Some(link_text.trim().to_string());
                    }
                    link
                });
                BlockKind::Heading(Heading {
                    level,
                    text: heading_text.trim().to_string(),
                    link,
                })
            }
            Pending::List {
                start,
                loose,
                items,
            } => {
                let mut marker = if start.is_some() { '.' } else { '-' };
                let items = items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| {
                        let (item_marker, body) = split_item(&block_source(text, &item.range));
                        if i == 0 {
                            if let Some(m) = item_marker {
                                marker = m;
                            }
                        }
                        ListItem {
                            body,
                            simple: item.simple,
                        }
                    })
                    .collect();
                BlockKind::List(List {
                    start,
                    marker,
                    loose,
                    items,
                })
            }
            Pending::Paragraph { hard_breaks } => BlockKind::Paragraph { hard_breaks },
            Pending::Other => BlockKind::Other,
        };
        Block {
            kind,
            source,
            lines,
        }
    }
}

fn heading_level(level: HeadingLevel) -> usize {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Source of a block, from the start of its first line
fn block_source(text: &str, range: &Range<usize>) -> String {
    let start = text[..range.start].rfind('\n').map_or(0, |i| i + 1);
    text[start..range.end.min(text.len())]
        .trim_end_matches('\n')
        .to_string()
}

/// Split a list item into its marker character and dedented body
fn split_item(source: &str) -> (Option<char>, String) {
    let indent = source.len() - source.trim_start_matches(' ').len();
    let rest = &source[indent..];

    let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    let (marker, marker_len) = match rest.chars().nth(digits) {
        Some(c @ ('.' | ')')) if digits > 0 => (Some(c), digits + 1),
        Some(c @ ('-' | '*' | '+')) if digits == 0 => (Some(c), 1),
        _ => (None, 0),
    };

    let after = &rest[marker_len..];
    let first_line = after.split('\n').next().unwrap_or_default();
    let spaces = first_line.len() - first_line.trim_start_matches(' ').len();
    let padding = if first_line.trim().is_empty() || spaces > 4 {
        1
    } else {
        spaces
    };
    let content_indent = indent + marker_len + padding;

    let mut lines = source.split('\n');
    let mut body = Vec::new();
    if lines.next().is_some() {
        body.push(first_line.get(padding.min(first_line.len())..).unwrap_or_default());
    }
    for line in lines {
        let leading = line.len() - line.trim_start_matches(' ').len();
        body.push(&line[leading.min(content_indent)..]);
    }

    let body = body.join("\n");
    (marker, body.trim_matches('\n').trim_end().to_string())
}

/// Byte offset to line number mapping
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(text: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { starts }
    }

    fn line_of(&self, offset: usize) -> usize {
        self.starts.partition_point(|&s| s <= offset).saturating_sub(1)
    }

    fn lines(&self, range: &Range<usize>) -> LineRange {
        let start = self.line_of(range.start);
        let end = self.line_of(range.end.saturating_sub(1).max(range.start)) + 1;
        LineRange::new(start, end)
    }
}

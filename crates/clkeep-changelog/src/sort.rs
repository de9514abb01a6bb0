//! Ordering and merging of sections and subsections

use clkeep_core::{LineRange, Version};
use std::cmp::Ordering;
use tracing::trace;

use crate::markdown::BlockKind;
use crate::model::{Section, SectionKind, SubSection};

/// Sort items that may lack a key
///
/// Items with a key are stably sorted by it. Items without one keep their
/// relative order and are interleaved with the sorted items by source
/// position, so they stay close to where they were. Items without a position
/// go after positioned ones.
pub fn sorted_by_key<T, K, F, P>(items: Vec<T>, key: F, position: P, reverse: bool) -> Vec<T>
where
    K: Ord,
    F: Fn(&T) -> Option<K>,
    P: Fn(&T) -> Option<LineRange>,
{
    let mut orderable: Vec<(K, T)> = Vec::new();
    let mut unorderable: Vec<T> = Vec::new();

    for item in items {
        match key(&item) {
            Some(k) => orderable.push((k, item)),
            None => unorderable.push(item),
        }
    }

    if reverse {
        orderable.sort_by(|a, b| b.0.cmp(&a.0));
    } else {
        orderable.sort_by(|a, b| a.0.cmp(&b.0));
    }

    if unorderable.is_empty() {
        return orderable.into_iter().map(|(_, item)| item).collect();
    }
    if orderable.is_empty() {
        return unorderable;
    }

    let rank = |item: &T| {
        position(item).map_or((usize::MAX, 0), |p| (p.start, p.end))
    };

    let mut result = Vec::with_capacity(orderable.len() + unorderable.len());
    let mut left = orderable.into_iter().map(|(_, item)| item).peekable();
    let mut right = unorderable.into_iter().peekable();

    loop {
        let take_left = match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => rank(l).cmp(&rank(r)) != Ordering::Greater,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        let next = if take_left { left.next() } else { right.next() };
        result.extend(next);
    }

    result
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum SectionKey {
    Release(Version),
    Unreleased,
}

fn section_key(section: &Section) -> Option<SectionKey> {
    match &section.kind {
        SectionKind::Unreleased(_) => Some(SectionKey::Unreleased),
        SectionKind::Release(release) => release.parsed_version.clone().map(SectionKey::Release),
        SectionKind::Trivia => None,
    }
}

/// Sort sections: unreleased first, then releases by descending version
pub fn sorted_sections(sections: Vec<Section>) -> Vec<Section> {
    trace!(count = sections.len(), "sorting sections");
    sorted_by_key(
        sections,
        section_key,
        Section::position,
        true,
    )
}

/// Sort subsections by preferred category order
pub fn sorted_subsections(subsections: Vec<SubSection>) -> Vec<SubSection> {
    sorted_by_key(subsections, SubSection::sort_key, SubSection::position, false)
}

/// Merge another section's subsections into the target
///
/// Subsections are grouped by category in first-seen order; subsections of
/// the same category are merged with [`merge_subsections`].
pub fn merge_sections(target: &mut Section, other: Section) {
    let mut merged: Vec<SubSection> = Vec::new();
    let incoming = std::mem::take(&mut target.subsections)
        .into_iter()
        .chain(other.subsections);
    for subsection in incoming {
        match merged
            .iter_mut()
            .find(|s| s.category() == subsection.category())
        {
            Some(existing) => merge_subsections(existing, subsection),
            None => merged.push(subsection),
        }
    }
    target.subsections = merged;
}

/// Append another subsection's content to the target
///
/// When the target ends with a list and the other subsection starts with a
/// list of the same kind, their items are joined into one list.
pub fn merge_subsections(target: &mut SubSection, other: SubSection) {
    let mut incoming = other.content.into_iter().peekable();
    if let Some(last) = target.content.last_mut().and_then(|b| b.as_list_mut()) {
        let first = incoming.next_if(|b| b.as_list().is_some_and(|l| l.same_kind(last)));
        if let Some(BlockKind::List(list)) = first.map(|b| b.kind) {
            last.splice(list);
        }
    }
    target.content.extend(incoming);
}

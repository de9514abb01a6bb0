//! clkeep changelog - keep-a-changelog document processing
//!
//! This crate turns changelog Markdown into a typed document model and back:
//! - Parsing sections, releases and change categories from headings
//! - Checking the document against formatting, ordering and link rules
//! - Fixing the document into canonical shape and rendering it
//! - Release workflows: finding entries, bumping versions, synthesizing
//!   releases from the unreleased section and commit trailers

pub mod check;
pub mod fix;
pub mod heading;
pub mod markdown;
pub mod model;
pub mod parser;
pub mod release;
pub mod render;
pub mod sort;
pub mod tags;
pub mod trailers;

pub use check::check;
pub use fix::fix;
pub use model::{
    CategoryKind, Changelog, Changes, Release, RepoVersion, RepoVersions, Section, SectionKind,
    SubSection, SubSectionKind, Unreleased,
};
pub use parser::parse;
pub use release::{
    bump_release, bump_version, find_entry, find_latest_version, find_sections, BumpMode,
    BumpRequest, EntryInfo, PreReleaseKind, SectionQuery,
};
pub use render::{render, render_sections};
pub use sort::{merge_sections, merge_subsections, sorted_by_key};
pub use tags::{check_tag, repo_versions_from_tags, Tag};
pub use trailers::{harvest_trailers, merge_into_unreleased, HarvestedChanges};

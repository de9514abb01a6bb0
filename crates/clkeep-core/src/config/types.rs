//! Configuration types

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::issue::{IssueCode, IssueSeverity};
use crate::version::VersionFormat;

use super::defaults;

/// User-facing configuration
///
/// Tables are replaced wholesale when set; `extra_*` fields are merged on top
/// of them by [`Config::resolve`](crate::config::Config::resolve).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Max line width for wrapping paragraphs
    pub format_wrapping: Wrapping,

    /// Known change categories, in preferred order
    pub change_categories: Vec<CategoryDef>,

    /// Categories appended to `change_categories`
    pub extra_change_categories: Vec<CategoryDef>,

    /// Regular expressions detecting change categories from headings
    pub change_categories_map: Vec<CategoryPattern>,

    /// Patterns appended to `change_categories_map`
    pub extra_change_categories_map: Vec<CategoryPattern>,

    /// Categories that warrant a patch bump
    pub bump_patch_categories: BTreeSet<String>,

    /// Categories that warrant a minor bump
    pub bump_minor_categories: BTreeSet<String>,

    /// Categories that warrant a major bump
    pub bump_major_categories: BTreeSet<String>,

    pub extra_bump_patch_categories: BTreeSet<String>,
    pub extra_bump_minor_categories: BTreeSet<String>,
    pub extra_bump_major_categories: BTreeSet<String>,

    /// Title of the unreleased section
    pub unreleased_name: String,

    /// Text placed around `unreleased_name`, outside of its link
    pub unreleased_decorations: (String, String),

    /// Regular expression detecting the unreleased section
    pub unreleased_pattern: String,

    /// Text placed around the whole release heading
    pub release_decorations: (String, String),

    /// Text placed around the release date
    pub release_date_decorations: (String, String),

    /// Text placed around the release version, inside of its link
    pub version_decorations: (String, String),

    /// Text placed around the release comment
    pub release_comment_decorations: (String, String),

    /// Whether releases must carry a date
    pub add_release_date: bool,

    /// Whether releases must carry a link
    pub add_release_link: bool,

    /// Predefined link templates
    pub release_link_preset: Option<ReleaseLinkPreset>,

    /// Link between two releases, uses `{tag}` and `{prev_tag}`
    pub release_link_template: Option<String>,

    /// Link for the unreleased section, uses `{prev_tag}`
    pub release_link_template_last: Option<String>,

    /// Link for the first release, uses `{tag}`
    pub release_link_template_first: Option<String>,

    /// Extra variables available in link templates
    pub release_link_template_vars: BTreeMap<String, String>,

    /// Whether repository tags take part in checks
    pub check_repo_tags: bool,

    /// Prefix of release tags
    pub tag_prefix: String,

    /// Versioning schema
    pub version_format: VersionFormat,

    /// Don't complain about missing releases before this version
    pub ignore_missing_releases_before: Option<String>,

    /// Don't complain about missing releases matching this regular expression
    pub ignore_missing_releases_regexp: Option<String>,

    /// Severity overrides per issue code
    pub severity: HashMap<IssueCode, IssueSeverity>,

    /// Number of levels every issue severity is raised by
    pub strictness: u8,

    /// Don't report headings of unrecognized change categories
    pub allow_unknown_categories: bool,

    /// Generate detection patterns from category names and titles
    pub auto_detect_maps: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            format_wrapping: Wrapping::Width(90),
            change_categories: defaults::change_categories(),
            extra_change_categories: Vec::new(),
            change_categories_map: defaults::change_categories_map(),
            extra_change_categories_map: Vec::new(),
            bump_patch_categories: defaults::category_set(&[
                "security",
                "deprecated",
                "performance",
                "fixed",
            ]),
            bump_minor_categories: defaults::category_set(&["added", "changed", "removed"]),
            bump_major_categories: defaults::category_set(&["breaking"]),
            extra_bump_patch_categories: BTreeSet::new(),
            extra_bump_minor_categories: BTreeSet::new(),
            extra_bump_major_categories: BTreeSet::new(),
            unreleased_name: "Unreleased".to_string(),
            unreleased_decorations: (String::new(), String::new()),
            unreleased_pattern: "(?i)unreleased".to_string(),
            release_decorations: (String::new(), String::new()),
            release_date_decorations: (" - ".to_string(), String::new()),
            version_decorations: (String::new(), String::new()),
            release_comment_decorations: (" - ".to_string(), String::new()),
            add_release_date: true,
            add_release_link: true,
            release_link_preset: None,
            release_link_template: None,
            release_link_template_last: None,
            release_link_template_first: None,
            release_link_template_vars: BTreeMap::new(),
            check_repo_tags: true,
            tag_prefix: "v".to_string(),
            version_format: VersionFormat::Semver,
            ignore_missing_releases_before: None,
            ignore_missing_releases_regexp: Some(r"(?i)dev|b|beta|a|alpha|rc|post".to_string()),
            severity: HashMap::new(),
            strictness: 0,
            allow_unknown_categories: false,
            auto_detect_maps: true,
        }
    }
}

/// A change category: configuration key and heading title
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDef {
    pub name: String,
    /// Empty title leaves headings untouched
    #[serde(default)]
    pub title: String,
}

impl CategoryDef {
    /// Create a new category definition
    pub fn new(name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
        }
    }
}

/// Regular expression mapping heading text to a category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryPattern {
    pub pattern: String,
    pub category: String,
}

impl CategoryPattern {
    /// Create a new category pattern
    pub fn new(pattern: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            category: category.into(),
        }
    }
}

/// Line wrapping mode for rendered Markdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WrappingRepr", into = "WrappingRepr")]
pub enum Wrapping {
    /// Reflow paragraphs to the given width
    Width(usize),
    /// Put every paragraph on a single line
    No,
    /// Keep original line breaks
    Keep,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum WrappingRepr {
    Width(usize),
    Keyword(String),
}

impl TryFrom<WrappingRepr> for Wrapping {
    type Error = String;

    fn try_from(repr: WrappingRepr) -> Result<Self, Self::Error> {
        match repr {
            WrappingRepr::Width(0) => Err("wrapping width must be greater than zero".to_string()),
            WrappingRepr::Width(width) => Ok(Self::Width(width)),
            WrappingRepr::Keyword(kw) => match kw.to_lowercase().as_str() {
                "no" => Ok(Self::No),
                "keep" => Ok(Self::Keep),
                _ => Err(format!(
                    "unknown wrapping mode '{}', expected a number, 'no', or 'keep'",
                    kw
                )),
            },
        }
    }
}

impl From<Wrapping> for WrappingRepr {
    fn from(wrapping: Wrapping) -> Self {
        match wrapping {
            Wrapping::Width(width) => Self::Width(width),
            Wrapping::No => Self::Keyword("no".to_string()),
            Wrapping::Keep => Self::Keyword("keep".to_string()),
        }
    }
}

/// Predefined release link templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseLinkPreset {
    /// Compare and tag pages on GitHub, needs the `repo` variable
    Github,
    /// Compare and tag pages on GitLab, needs the `repo` variable
    Gitlab,
    /// No links
    None,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.format_wrapping, Wrapping::Width(90));
        assert_eq!(config.change_categories[0].name, "breaking");
        assert_eq!(config.tag_prefix, "v");
        assert!(config.bump_major_categories.contains("breaking"));
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: Config = toml::from_str(
            r#"
            format_wrapping = "keep"
            version_format = "python-semver"
            release_link_preset = "github"
            unreleased_decorations = ["", " (pending)"]

            [release_link_template_vars]
            repo = "acme/widgets"

            [[extra_change_categories]]
            name = "docs"
            title = "Documentation"
            "#,
        )
        .unwrap();

        assert_eq!(config.format_wrapping, Wrapping::Keep);
        assert_eq!(config.version_format, VersionFormat::PythonSemver);
        assert_eq!(config.release_link_preset, Some(ReleaseLinkPreset::Github));
        assert_eq!(config.unreleased_decorations.1, " (pending)");
        assert_eq!(config.extra_change_categories[0].title, "Documentation");
        assert_eq!(config.change_categories.len(), 8);
    }

    #[test]
    fn test_wrapping_values() {
        #[derive(Deserialize)]
        struct W {
            w: Wrapping,
        }
        assert_eq!(toml::from_str::<W>("w = 72").unwrap().w, Wrapping::Width(72));
        assert_eq!(toml::from_str::<W>("w = \"no\"").unwrap().w, Wrapping::No);
        assert!(toml::from_str::<W>("w = 0").is_err());
        assert!(toml::from_str::<W>("w = \"wide\"").is_err());
    }
}

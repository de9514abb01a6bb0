//! Default configuration values

use regex::escape;
use std::collections::BTreeSet;

use super::links::LinkTemplates;
use super::types::{CategoryDef, CategoryPattern, ReleaseLinkPreset};

/// Default change categories, in preferred order
pub fn change_categories() -> Vec<CategoryDef> {
    [
        ("breaking", "Breaking"),
        ("security", "Security"),
        ("added", "Added"),
        ("changed", "Changed"),
        ("deprecated", "Deprecated"),
        ("removed", "Removed"),
        ("performance", "Performance"),
        ("fixed", "Fixed"),
    ]
    .into_iter()
    .map(|(name, title)| CategoryDef::new(name, title))
    .collect()
}

/// Default detection patterns for change categories
pub fn change_categories_map() -> Vec<CategoryPattern> {
    [
        ("security", "security"),
        ("break|breaking|breaks", "breaking"),
        ("add|added|adds", "added"),
        ("change|changed|changes", "changed"),
        ("deprecate|deprecated|deprecates", "deprecated"),
        ("remove|removed|removes", "removed"),
        ("perf|performance", "performance"),
        ("fix|fixed|fixes", "fixed"),
    ]
    .into_iter()
    .map(|(words, category)| CategoryPattern::new(category_regex(words), category))
    .collect()
}

/// Case-insensitive whole-word pattern for a category heading
pub fn category_regex(words: &str) -> String {
    format!(r"(?i)\b({})\b", words)
}

/// Detection patterns derived from category names and titles
pub fn auto_detect_patterns(categories: &[CategoryDef]) -> Vec<CategoryPattern> {
    let mut patterns: Vec<CategoryPattern> = Vec::new();
    for category in categories {
        let name = category.name.trim().to_lowercase();
        let title = category.title.trim().to_lowercase();
        for word in [name, title] {
            if word.is_empty() {
                continue;
            }
            let pattern = category_regex(&escape(&word));
            if !patterns.iter().any(|p| p.pattern == pattern) {
                patterns.push(CategoryPattern::new(pattern, category.name.clone()));
            }
        }
    }
    patterns
}

/// Build a category set from string literals
pub fn category_set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

impl ReleaseLinkPreset {
    /// Templates and default variables of the preset
    pub fn templates(&self) -> LinkTemplates {
        match self {
            Self::Github => LinkTemplates::new(
                "https://{host}/{repo}/compare/{prev_tag}...{tag}",
                "https://{host}/{repo}/compare/{prev_tag}...HEAD",
                "https://{host}/{repo}/releases/tag/{tag}",
            )
            .with_var("host", "github.com"),
            Self::Gitlab => LinkTemplates::new(
                "https://{host}/{repo}/-/compare/{prev_tag}...{tag}",
                "https://{host}/{repo}/-/compare/{prev_tag}...HEAD",
                "https://{host}/{repo}/-/tags/{tag}",
            )
            .with_var("host", "gitlab.com"),
            Self::None => LinkTemplates::default(),
        }
    }
}

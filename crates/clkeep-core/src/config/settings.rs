//! Resolved configuration

use regex::Regex;
use std::collections::BTreeSet;
use tracing::{debug, instrument};

use crate::error::{ConfigError, Result};
use crate::issue::{Diagnostics, SeverityPolicy};
use crate::version::{parse_version, Version, VersionFormat};

use super::defaults;
use super::links::LinkTemplates;
use super::types::{CategoryDef, Config, Wrapping};
use super::validation;

/// A compiled category detection pattern
#[derive(Debug, Clone)]
pub struct CategoryMatcher {
    pub regex: Regex,
    pub category: String,
}

/// Fully resolved, immutable configuration
///
/// Built once by [`Config::resolve`] and passed by reference everywhere else.
#[derive(Debug, Clone)]
pub struct Settings {
    pub format_wrapping: Wrapping,
    /// Known categories in preferred order, defaults followed by extras
    pub change_categories: Vec<CategoryDef>,
    /// Detection patterns, tried in order
    pub change_categories_map: Vec<CategoryMatcher>,
    pub bump_patch_categories: BTreeSet<String>,
    pub bump_minor_categories: BTreeSet<String>,
    pub bump_major_categories: BTreeSet<String>,
    pub unreleased_name: String,
    pub unreleased_decorations: (String, String),
    pub unreleased_pattern: Regex,
    pub release_decorations: (String, String),
    pub release_date_decorations: (String, String),
    pub version_decorations: (String, String),
    pub release_comment_decorations: (String, String),
    pub add_release_date: bool,
    pub add_release_link: bool,
    pub link_templates: LinkTemplates,
    pub check_repo_tags: bool,
    pub tag_prefix: String,
    pub version_format: VersionFormat,
    pub ignore_missing_releases_before: Option<Version>,
    pub ignore_missing_releases_regexp: Option<Regex>,
    pub severity: SeverityPolicy,
    pub allow_unknown_categories: bool,
}

impl Config {
    /// Merge defaults, user values, and `extra_*` additions into [`Settings`]
    ///
    /// Fails on any contradiction: unknown categories in maps or bump sets,
    /// reserved or undefined template variables, a version floor that doesn't
    /// parse, or a regular expression that doesn't compile.
    #[instrument(skip(self), fields(version_format = %self.version_format))]
    pub fn resolve(&self) -> Result<Settings> {
        debug!("resolving configuration");

        validation::validate_config(self)?;

        let mut change_categories = self.change_categories.clone();
        for extra in &self.extra_change_categories {
            match change_categories.iter_mut().find(|c| c.name == extra.name) {
                Some(existing) => existing.title = extra.title.clone(),
                None => change_categories.push(extra.clone()),
            }
        }

        let mut patterns = self.change_categories_map.clone();
        patterns.extend(self.extra_change_categories_map.iter().cloned());
        if self.auto_detect_maps {
            for pattern in defaults::auto_detect_patterns(&change_categories) {
                if !patterns.iter().any(|p| p.pattern == pattern.pattern) {
                    debug!(category = %pattern.category, pattern = %pattern.pattern, "adding detection pattern");
                    patterns.push(pattern);
                }
            }
        }

        let change_categories_map = patterns
            .into_iter()
            .map(|p| {
                Ok(CategoryMatcher {
                    regex: compile("change_categories_map", &p.pattern)?,
                    category: p.category,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let unreleased_pattern = compile("unreleased_pattern", &self.unreleased_pattern)?;
        let ignore_missing_releases_regexp = self
            .ignore_missing_releases_regexp
            .as_deref()
            .map(|p| compile("ignore_missing_releases_regexp", p))
            .transpose()?;

        let ignore_missing_releases_before = match &self.ignore_missing_releases_before {
            None => None,
            Some(_) if self.version_format == VersionFormat::None => {
                return Err(ConfigError::InvalidValue {
                    field: "ignore_missing_releases_before".to_string(),
                    message: "can't be used with version_format none".to_string(),
                }
                .into());
            }
            Some(floor) => Some(parse_version(floor, self.version_format).ok_or_else(|| {
                ConfigError::InvalidValue {
                    field: "ignore_missing_releases_before".to_string(),
                    message: format!("doesn't follow {} specification", self.version_format),
                }
            })?),
        };

        let link_templates = self.link_templates()?;

        let union = |a: &BTreeSet<String>, b: &BTreeSet<String>| -> BTreeSet<String> {
            a.union(b).cloned().collect()
        };

        let settings = Settings {
            format_wrapping: self.format_wrapping,
            change_categories,
            change_categories_map,
            bump_patch_categories: union(&self.bump_patch_categories, &self.extra_bump_patch_categories),
            bump_minor_categories: union(&self.bump_minor_categories, &self.extra_bump_minor_categories),
            bump_major_categories: union(&self.bump_major_categories, &self.extra_bump_major_categories),
            unreleased_name: self.unreleased_name.clone(),
            unreleased_decorations: self.unreleased_decorations.clone(),
            unreleased_pattern,
            release_decorations: self.release_decorations.clone(),
            release_date_decorations: self.release_date_decorations.clone(),
            version_decorations: self.version_decorations.clone(),
            release_comment_decorations: self.release_comment_decorations.clone(),
            add_release_date: self.add_release_date,
            add_release_link: self.add_release_link,
            link_templates,
            check_repo_tags: self.check_repo_tags,
            tag_prefix: self.tag_prefix.clone(),
            version_format: self.version_format,
            ignore_missing_releases_before,
            ignore_missing_releases_regexp,
            severity: SeverityPolicy {
                overrides: self.severity.clone(),
                strictness: self.strictness,
            },
            allow_unknown_categories: self.allow_unknown_categories,
        };

        debug!(
            categories = settings.change_categories.len(),
            patterns = settings.change_categories_map.len(),
            "configuration resolved"
        );
        Ok(settings)
    }

    fn link_templates(&self) -> Result<LinkTemplates> {
        if !self.add_release_link {
            return Ok(LinkTemplates::default());
        }

        let mut templates = LinkTemplates {
            template: self.release_link_template.clone().unwrap_or_default(),
            template_last: self.release_link_template_last.clone().unwrap_or_default(),
            template_first: self.release_link_template_first.clone().unwrap_or_default(),
            vars: self.release_link_template_vars.clone(),
        };

        if templates.is_unresolved() {
            if let Some(preset) = self.release_link_preset {
                templates.fill_from(preset.templates());
            }
        }
        if templates.is_unresolved() {
            return Err(ConfigError::MissingLinkTemplates.into());
        }

        let unknown = templates.unknown_vars();
        if !unknown.is_empty() {
            return Err(ConfigError::UnknownTemplateVars(
                unknown.into_iter().collect::<Vec<_>>().join(", "),
            )
            .into());
        }

        Ok(templates)
    }
}

fn compile(field: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| {
        ConfigError::InvalidRegex {
            field: field.to_string(),
            source,
        }
        .into()
    })
}

impl Settings {
    /// A fresh issue collector using this configuration's severities
    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics::new(self.severity.clone())
    }

    /// Heading title of a known category
    pub fn category_title(&self, category: &str) -> Option<&str> {
        self.change_categories
            .iter()
            .find(|c| c.name == category)
            .map(|c| c.title.as_str())
    }

    /// Position of a category in the preferred order
    pub fn category_sort_key(&self, category: &str) -> Option<usize> {
        self.change_categories.iter().position(|c| c.name == category)
    }

    /// First category whose pattern matches the text
    pub fn detect_category(&self, text: &str) -> Option<&str> {
        self.change_categories_map
            .iter()
            .find(|m| m.regex.is_match(text))
            .map(|m| m.category.as_str())
    }

    /// Whether a missing release or tag for this version shouldn't be reported
    ///
    /// Versions below `ignore_missing_releases_before` and versions matching
    /// `ignore_missing_releases_regexp` are exempt; unparsed versions are
    /// exempt as well.
    pub fn is_exempt(&self, parsed: Option<&Version>, text: &str) -> bool {
        let Some(parsed) = parsed else {
            return true;
        };
        if let Some(floor) = &self.ignore_missing_releases_before {
            if parsed < floor {
                return true;
            }
        }
        match &self.ignore_missing_releases_regexp {
            Some(regex) => regex.is_match(text),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{CategoryPattern, ReleaseLinkPreset};
    use crate::error::KeeperError;

    fn config() -> Config {
        Config {
            release_link_preset: Some(ReleaseLinkPreset::Github),
            release_link_template_vars: [("repo".to_string(), "acme/widgets".to_string())]
                .into_iter()
                .collect(),
            ..Config::default()
        }
    }

    #[test]
    fn test_resolve_defaults_with_preset() {
        let settings = config().resolve().unwrap();
        assert_eq!(settings.category_sort_key("breaking"), Some(0));
        assert_eq!(settings.category_title("fixed"), Some("Fixed"));
        assert_eq!(settings.detect_category("Bug fixes"), Some("fixed"));
        assert_eq!(settings.detect_category("Security"), Some("security"));
        assert_eq!(settings.link_templates.vars["host"], "github.com");
    }

    #[test]
    fn test_resolve_requires_link_templates() {
        let err = Config::default().resolve().unwrap_err();
        assert!(matches!(
            err,
            KeeperError::Config(ConfigError::MissingLinkTemplates)
        ));

        let config = Config {
            add_release_link: false,
            ..Config::default()
        };
        assert!(config.resolve().is_ok());
    }

    #[test]
    fn test_resolve_extra_categories() {
        let mut config = config();
        config.extra_change_categories.push(CategoryDef::new("docs", "Documentation"));
        config.extra_bump_patch_categories.insert("docs".to_string());
        let settings = config.resolve().unwrap();
        assert_eq!(settings.category_sort_key("docs"), Some(8));
        assert_eq!(settings.detect_category("Documentation"), Some("docs"));
        assert!(settings.bump_patch_categories.contains("docs"));
        assert!(settings.bump_patch_categories.contains("fixed"));
    }

    #[test]
    fn test_auto_detect_can_be_disabled() {
        let mut config = config();
        config.auto_detect_maps = false;
        config.extra_change_categories.push(CategoryDef::new("docs", "Documentation"));
        let settings = config.resolve().unwrap();
        assert_eq!(settings.detect_category("Documentation"), None);
        assert_eq!(settings.detect_category("Added"), Some("added"));
    }

    #[test]
    fn test_resolve_unknown_template_var() {
        let mut config = config();
        config.release_link_template_first = Some("https://{host}/{project}/{tag}".to_string());
        let err = config.resolve().unwrap_err();
        assert!(err.to_string().contains("project"));
    }

    #[test]
    fn test_resolve_version_floor() {
        let mut config = config();
        config.ignore_missing_releases_before = Some("1.0.0".to_string());
        let settings = config.resolve().unwrap();
        let old = parse_version("0.9.0", VersionFormat::Semver).unwrap();
        let new = parse_version("1.2.0", VersionFormat::Semver).unwrap();
        assert!(settings.is_exempt(Some(&old), "0.9.0"));
        assert!(!settings.is_exempt(Some(&new), "1.2.0"));
        assert!(settings.is_exempt(None, "garbage"));

        config.ignore_missing_releases_before = Some("one".to_string());
        assert!(config.resolve().is_err());

        config.ignore_missing_releases_before = Some("1.0.0".to_string());
        config.version_format = VersionFormat::None;
        assert!(config.resolve().is_err());
    }

    #[test]
    fn test_resolve_invalid_regex() {
        let mut config = config();
        config
            .extra_change_categories_map
            .push(CategoryPattern::new("(unclosed", "added"));
        let err = config.resolve().unwrap_err();
        assert!(matches!(
            err,
            KeeperError::Config(ConfigError::InvalidRegex { .. })
        ));
    }
}

//! Configuration validation

use std::collections::BTreeSet;
use tracing::debug;

use crate::error::{ConfigError, Result};

use super::types::Config;

/// Validate cross-field consistency of a configuration
pub fn validate_config(config: &Config) -> Result<()> {
    debug!("validating configuration");
    validate_template_vars(config)?;
    validate_categories(config)?;
    validate_decorations(config)?;
    debug!("configuration validation passed");
    Ok(())
}

fn validate_template_vars(config: &Config) -> Result<()> {
    for reserved in ["tag", "prev_tag"] {
        if config.release_link_template_vars.contains_key(reserved) {
            return Err(ConfigError::InvalidValue {
                field: "release_link_template_vars".to_string(),
                message: format!("can't contain key '{}'", reserved),
            }
            .into());
        }
    }
    Ok(())
}

fn validate_categories(config: &Config) -> Result<()> {
    let known: BTreeSet<&str> = config
        .change_categories
        .iter()
        .chain(&config.extra_change_categories)
        .map(|c| c.name.as_str())
        .collect();

    if let Some(empty) = known.iter().find(|name| name.trim().is_empty()) {
        return Err(ConfigError::InvalidValue {
            field: "change_categories".to_string(),
            message: format!("category name '{}' can't be empty", empty),
        }
        .into());
    }

    let maps = config
        .change_categories_map
        .iter()
        .chain(&config.extra_change_categories_map)
        .map(|p| ("change_categories_map", &p.category));

    let bumps = [
        ("bump_patch_categories", &config.bump_patch_categories),
        ("bump_minor_categories", &config.bump_minor_categories),
        ("bump_major_categories", &config.bump_major_categories),
        ("extra_bump_patch_categories", &config.extra_bump_patch_categories),
        ("extra_bump_minor_categories", &config.extra_bump_minor_categories),
        ("extra_bump_major_categories", &config.extra_bump_major_categories),
    ]
    .into_iter()
    .flat_map(|(field, set)| set.iter().map(move |c| (field, c)));

    for (field, category) in maps.chain(bumps) {
        if !known.contains(category.as_str()) {
            return Err(ConfigError::UnknownCategory {
                field: field.to_string(),
                category: category.clone(),
            }
            .into());
        }
    }

    Ok(())
}

fn validate_decorations(config: &Config) -> Result<()> {
    if config.unreleased_name.trim().is_empty() {
        return Err(ConfigError::InvalidValue {
            field: "unreleased_name".to_string(),
            message: "unreleased name can't be empty".to_string(),
        }
        .into());
    }
    Ok(())
}

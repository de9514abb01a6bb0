//! Error types for clkeep
//!
//! Problems found in a changelog document are never errors, they are reported
//! as [`Issue`](crate::issue::Issue)s. Errors cover configuration contradictions
//! and workflow preconditions only.

use thiserror::Error;

/// Result type alias using KeeperError
pub type Result<T> = std::result::Result<T, KeeperError>;

/// Main error type for clkeep operations
#[derive(Debug, Error)]
pub enum KeeperError {
    /// Configuration-related errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Version-related errors
    #[error(transparent)]
    Version(#[from] VersionError),

    /// Release workflow errors
    #[error(transparent)]
    Release(#[from] ReleaseError),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {message}")]
    InvalidValue { field: String, message: String },

    /// A table refers to a category that doesn't exist
    #[error("{field} has an entry for category '{category}', which is missing from change_categories")]
    UnknownCategory { field: String, category: String },

    /// A regular expression failed to compile
    #[error("Invalid regular expression in {field}: {source}")]
    InvalidRegex {
        field: String,
        #[source]
        source: regex::Error,
    },

    /// Link templates use variables that aren't defined
    #[error("Some variables used in link templates are missing from release_link_template_vars: {0}")]
    UnknownTemplateVars(String),

    /// Link generation is enabled but no templates are available
    #[error("Can't build release links: set release_link_preset or all of release_link_template, release_link_template_last, release_link_template_first, or set add_release_link to false")]
    MissingLinkTemplates,
}

/// Version-related errors
#[derive(Debug, Error)]
pub enum VersionError {
    /// Failed to parse version
    #[error("Version '{0}' doesn't follow {1} specification")]
    ParseFailed(String, String),

    /// Operation isn't available for the selected versioning schema
    #[error("{0}")]
    Unsupported(String),

    /// Tag name doesn't start with the configured prefix
    #[error("Tag '{tag}' should start with '{prefix}'")]
    MissingTagPrefix { tag: String, prefix: String },

    /// Tag name doesn't carry a valid version
    #[error("Tag '{0}' doesn't follow {1} specification")]
    InvalidTag(String, String),
}

/// Release workflow errors
#[derive(Debug, Error)]
pub enum ReleaseError {
    /// There is nothing to bump from
    #[error("No previous release to bump")]
    NoPreviousRelease,

    /// The latest version can't be determined
    #[error("Can't determine the latest version because {0}")]
    LatestVersionUnknown(String),

    /// A release with this version is already present
    #[error("Release {version} already exists{}", .line.map(|l| format!(" on line {}", l)).unwrap_or_default())]
    AlreadyExists { version: String, line: Option<usize> },

    /// Changelog content doesn't say which component to bump
    #[error("Can't determine which version component to bump: changelog for unreleased version doesn't have change categories from bump_major_categories, bump_minor_categories, or bump_patch_categories")]
    CannotSuggestBump,

    /// Bump request can't be applied to the latest version
    #[error("{0}")]
    InvalidBump(String),

    /// Requested entry wasn't found
    #[error("Can't find changelog entry for version {0}")]
    EntryNotFound(String),
}

impl KeeperError {
    /// Create a new "other" error with a message
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Self::Other(msg.into())
    }
}

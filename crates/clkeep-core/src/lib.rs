//! clkeep core - shared foundations for changelog maintenance
//!
//! This crate provides error handling, configuration resolution, the version
//! abstraction over the supported versioning schemas, and the issue taxonomy
//! used to report problems found in changelogs.

pub mod config;
pub mod error;
pub mod issue;
pub mod version;

pub use config::{Config, Settings, Wrapping};
pub use error::{KeeperError, Result};
pub use issue::{Diagnostics, Issue, IssueCode, IssueScope, IssueSeverity, LineRange, Report};
pub use version::{canonize_version, parse_version, Version, VersionFormat};

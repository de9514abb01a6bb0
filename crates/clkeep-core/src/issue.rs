//! Issue taxonomy and diagnostics collection

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Stable issue codes
///
/// Declaration order defines the order of issues in a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IssueCode {
    /// A formatting error related to the general structure of the changelog
    GeneralFormattingError,
    /// Release version doesn't follow the selected versioning schema
    InvalidVersion,
    /// Tag doesn't follow the selected versioning schema
    InvalidTag,
    /// A tag has no associated release
    MissingReleaseForTag,
    /// A release has no associated tag
    MissingTagForRelease,
    /// Releases are not ordered by version
    ReleaseOrdering,
    /// Heading of the unreleased section isn't canonical
    UnreleasedHeadingFormat,
    /// Heading of a release section isn't canonical
    ReleaseHeadingFormat,
    /// Release date isn't a valid calendar date
    InvalidReleaseDate,
    /// Release date is required but absent
    MissingReleaseDate,
    /// Release date is present but dates are disabled
    UnexpectedReleaseDate,
    /// Release link is absent or wrong
    MissingReleaseLink,
    /// Release link is present but links are disabled
    UnexpectedReleaseLink,
    /// Release date doesn't match the tag's commit date
    IncorrectReleaseDate,
    /// Release link may be wrong, document order couldn't be trusted
    IncorrectReleaseLink,
    /// Several sections describe the same release
    DuplicateReleases,
    /// Release section has no content
    EmptyRelease,
    /// Change categories are not in the configured order
    ChangeCategoryOrdering,
    /// Heading of a change category isn't canonical
    ChangeCategoryHeadingFormat,
    /// Change category heading wasn't recognized
    UnknownChangeCategory,
    /// Several sub-sections describe the same category
    DuplicateChangeCategories,
    /// Change category has no content
    EmptyChangeCategory,
}

impl IssueCode {
    /// Severity used unless configuration overrides it
    pub fn default_severity(&self) -> IssueSeverity {
        match self {
            Self::InvalidVersion
            | Self::ReleaseOrdering
            | Self::InvalidReleaseDate
            | Self::DuplicateReleases
            | Self::DuplicateChangeCategories
            | Self::EmptyChangeCategory => IssueSeverity::Error,
            Self::MissingReleaseForTag | Self::MissingTagForRelease | Self::IncorrectReleaseDate => {
                IssueSeverity::WeakWarning
            }
            _ => IssueSeverity::Warning,
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Issue severity, from most to least severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueSeverity {
    Error,
    Warning,
    WeakWarning,
    Info,
    None,
}

impl IssueSeverity {
    /// Numeric level, `Error` is the highest
    pub fn level(&self) -> u8 {
        match self {
            Self::Error => 4,
            Self::Warning => 3,
            Self::WeakWarning => 2,
            Self::Info => 1,
            Self::None => 0,
        }
    }

    fn from_level(level: u8) -> Self {
        match level {
            0 => Self::None,
            1 => Self::Info,
            2 => Self::WeakWarning,
            3 => Self::Warning,
            _ => Self::Error,
        }
    }

    /// Raise severity by the given number of levels, capped at `Error`
    ///
    /// `None` stays `None`.
    pub fn escalate(self, by: u8) -> Self {
        if self == Self::None {
            return self;
        }
        Self::from_level(self.level().saturating_add(by).min(Self::Error.level()))
    }
}

impl fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::WeakWarning => "weak warning",
            Self::Info => "info",
            Self::None => "none",
        };
        write!(f, "{}", s)
    }
}

/// Where an issue originates
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueScope {
    /// The changelog file
    Changelog,
    /// Repository state, e.g. tags
    External,
}

/// Range of 0-based source lines, end exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    /// Create a new line range
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// 1-based number of the first line
    pub fn first_line(&self) -> usize {
        self.start + 1
    }
}

/// A single finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub code: IssueCode,
    /// Message with `%s` placeholders
    pub template: String,
    /// Values for the placeholders, in order
    pub args: Vec<String>,
    pub position: Option<LineRange>,
    pub scope: IssueScope,
    pub severity: IssueSeverity,
}

impl Issue {
    /// Message with all placeholders substituted
    pub fn message(&self) -> String {
        let mut out = String::with_capacity(self.template.len());
        let mut args = self.args.iter();
        let mut rest = self.template.as_str();
        while let Some(idx) = rest.find("%s") {
            out.push_str(&rest[..idx]);
            match args.next() {
                Some(arg) => out.push_str(arg),
                None => out.push_str("%s"),
            }
            rest = &rest[idx + 2..];
        }
        out.push_str(rest);
        out
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(pos) => write!(
                f,
                "{} on line {}: {} [{}]",
                self.severity,
                pos.first_line(),
                self.message(),
                self.code
            ),
            None => write!(f, "{}: {} [{}]", self.severity, self.message(), self.code),
        }
    }
}

/// Severity overrides and escalation applied to every reported issue
#[derive(Debug, Clone, Default)]
pub struct SeverityPolicy {
    pub overrides: HashMap<IssueCode, IssueSeverity>,
    pub strictness: u8,
}

impl SeverityPolicy {
    /// Final severity for an issue code
    pub fn resolve(&self, code: IssueCode) -> IssueSeverity {
        self.overrides
            .get(&code)
            .copied()
            .unwrap_or_else(|| code.default_severity())
            .escalate(self.strictness)
    }
}

/// Collects issues found while parsing and checking a changelog
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    policy: SeverityPolicy,
    issues: Vec<Issue>,
    has_errors: bool,
}

impl Diagnostics {
    /// Create a collector with the given severity policy
    pub fn new(policy: SeverityPolicy) -> Self {
        Self {
            policy,
            issues: Vec::new(),
            has_errors: false,
        }
    }

    /// Report an issue in the changelog file
    pub fn issue<A: ToString>(
        &mut self,
        code: IssueCode,
        template: impl Into<String>,
        args: &[A],
        position: Option<LineRange>,
    ) {
        self.push(code, template.into(), args, position, IssueScope::Changelog);
    }

    /// Report an issue with the repository state
    pub fn external<A: ToString>(&mut self, code: IssueCode, template: impl Into<String>, args: &[A]) {
        self.push(code, template.into(), args, None, IssueScope::External);
    }

    fn push<A: ToString>(
        &mut self,
        code: IssueCode,
        template: String,
        args: &[A],
        position: Option<LineRange>,
        scope: IssueScope,
    ) {
        let severity = self.policy.resolve(code);
        if severity == IssueSeverity::None {
            debug!(%code, "issue suppressed");
            return;
        }
        if severity.level() >= IssueSeverity::Error.level() {
            self.has_errors = true;
        }
        self.issues.push(Issue {
            code,
            template,
            args: args.iter().map(|a| a.to_string()).collect(),
            position,
            scope,
            severity,
        });
    }

    /// Whether any reported issue reached `Error` severity
    pub fn has_errors(&self) -> bool {
        self.has_errors
    }

    /// Issues in the order they were reported
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    /// Forget all collected issues, keeping the policy
    pub fn clear(&mut self) {
        self.issues.clear();
        self.has_errors = false;
    }

    /// Finish collection and sort issues for reporting
    pub fn into_report(self) -> Report {
        let mut issues = self.issues;
        issues.sort_by_key(|i| (i.code, i.scope, i.position.unwrap_or(LineRange::new(0, 0))));
        Report {
            issues,
            has_errors: self.has_errors,
        }
    }
}

/// Sorted list of issues
#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    pub issues: Vec<Issue>,
    has_errors: bool,
}

impl Report {
    /// Whether any issue reached `Error` severity
    pub fn has_errors(&self) -> bool {
        self.has_errors
    }

    /// Whether the report contains no issues
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Issues with the given code
    pub fn with_code(&self, code: IssueCode) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |i| i.code == code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_substitution() {
        let mut diagnostics = Diagnostics::default();
        diagnostics.issue(
            IssueCode::InvalidVersion,
            "Version `%s` doesn't follow %s specification",
            &["1.x", "semver"],
            Some(LineRange::new(2, 3)),
        );
        let issue = &diagnostics.issues()[0];
        assert_eq!(issue.message(), "Version `1.x` doesn't follow semver specification");
        assert_eq!(
            issue.to_string(),
            "error on line 3: Version `1.x` doesn't follow semver specification [InvalidVersion]"
        );
    }

    #[test]
    fn test_default_severity() {
        assert_eq!(IssueCode::DuplicateReleases.default_severity(), IssueSeverity::Error);
        assert_eq!(
            IssueCode::MissingTagForRelease.default_severity(),
            IssueSeverity::WeakWarning
        );
        assert_eq!(IssueCode::EmptyRelease.default_severity(), IssueSeverity::Warning);
    }

    #[test]
    fn test_escalation_is_capped() {
        assert_eq!(IssueSeverity::Info.escalate(1), IssueSeverity::WeakWarning);
        assert_eq!(IssueSeverity::Warning.escalate(5), IssueSeverity::Error);
        assert_eq!(IssueSeverity::None.escalate(3), IssueSeverity::None);
    }

    #[test]
    fn test_suppressed_issues_are_dropped() {
        let mut overrides = HashMap::new();
        overrides.insert(IssueCode::EmptyRelease, IssueSeverity::None);
        let mut diagnostics = Diagnostics::new(SeverityPolicy {
            overrides,
            strictness: 1,
        });
        diagnostics.issue(IssueCode::EmptyRelease, "empty", &[] as &[&str], None);
        diagnostics.issue(IssueCode::MissingReleaseLink, "link", &[] as &[&str], None);
        assert_eq!(diagnostics.issues().len(), 1);
        assert_eq!(diagnostics.issues()[0].severity, IssueSeverity::Error);
        assert!(diagnostics.has_errors());
    }

    #[test]
    fn test_report_ordering() {
        let mut diagnostics = Diagnostics::default();
        diagnostics.issue(
            IssueCode::EmptyRelease,
            "b",
            &[] as &[&str],
            Some(LineRange::new(9, 10)),
        );
        diagnostics.issue(
            IssueCode::EmptyRelease,
            "a",
            &[] as &[&str],
            Some(LineRange::new(4, 5)),
        );
        diagnostics.external(IssueCode::InvalidTag, "tag", &["v1"]);
        let report = diagnostics.into_report();
        let templates: Vec<_> = report.issues.iter().map(|i| i.template.as_str()).collect();
        assert_eq!(templates, ["tag", "a", "b"]);
        assert!(!report.has_errors());
    }

    #[test]
    fn test_severity_from_toml() {
        #[derive(Deserialize)]
        struct Table {
            severity: HashMap<IssueCode, IssueSeverity>,
        }
        let table: Table =
            toml::from_str("[severity]\nEmptyRelease = \"weak-warning\"\n").unwrap();
        assert_eq!(
            table.severity.get(&IssueCode::EmptyRelease),
            Some(&IssueSeverity::WeakWarning)
        );
    }
}

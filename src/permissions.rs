//! Loading restricted command names from the host's permission settings.
//!
//! The host keeps its permission lists in a JSON settings file:
//!
//! ```json
//! { "permissions": { "deny": ["Bash(curl:*)"], "ask": ["Bash(git push)"] } }
//! ```
//!
//! Entries in both `deny` and `ask` become restricted names; entries that are
//! not of the form `Bash(name)` or `Bash(name:*)` are ignored. When the file is
//! missing, unreadable, malformed, or yields no names at all, the built-in
//! [`FALLBACK_COMMANDS`] list is used instead. The two are never merged.
//!
//! The file is re-read on every [`PermissionLoader::load`] call because the
//! host may edit it between invocations.

use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::restricted::{RestrictedMatcher, RestrictedPattern, RestrictionSource};

/// Names restricted when no usable permission settings exist.
pub const FALLBACK_COMMANDS: [&str; 9] = [
    "curl", "wget", "nc", "ssh", "scp", "sudo", "eval", "chmod", "chown",
];

static BASH_ENTRY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Bash\(([^:)]+)(?::\*)?\)$").expect("permission entry regex compiles")
});

/// Extract the command name from a `Bash(name)` or `Bash(name:*)` entry.
#[must_use]
pub fn parse_permission_entry(entry: &str) -> Option<&str> {
    BASH_ENTRY_RE
        .captures(entry)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Why the built-in list was used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// No settings file at the configured path.
    Missing,
    /// The file exists but could not be read.
    Unreadable,
    /// The file is not valid JSON of the expected shape.
    Malformed,
    /// The file parsed but contains no `Bash(...)` entries.
    Empty,
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Missing => "settings file not found",
            Self::Unreadable => "settings file unreadable",
            Self::Malformed => "settings file malformed",
            Self::Empty => "no Bash entries in deny/ask",
        };
        f.write_str(text)
    }
}

/// Provenance of the restricted names used for one evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionSource {
    Configured {
        path: Option<PathBuf>,
        deny: usize,
        ask: usize,
    },
    Fallback(FallbackReason),
}

impl PermissionSource {
    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

impl fmt::Display for PermissionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configured { path, deny, ask } => {
                write!(f, "configured ({deny} deny, {ask} ask")?;
                if let Some(path) = path {
                    write!(f, " from {}", path.display())?;
                }
                f.write_str(")")
            }
            Self::Fallback(reason) => write!(f, "built-in fallback ({reason})"),
        }
    }
}

/// Result of one load: the matcher plus where its names came from.
#[derive(Debug, Clone)]
pub struct LoadedPermissions {
    pub matcher: RestrictedMatcher,
    pub source: PermissionSource,
}

impl LoadedPermissions {
    /// The built-in list, tagged with why it was chosen.
    #[must_use]
    pub fn fallback(reason: FallbackReason) -> Self {
        tracing::debug!(%reason, "using built-in restricted command list");
        let patterns = FALLBACK_COMMANDS
            .iter()
            .filter_map(|name| RestrictedPattern::new(name, RestrictionSource::Builtin))
            .collect();
        Self {
            matcher: RestrictedMatcher::new(patterns),
            source: PermissionSource::Fallback(reason),
        }
    }

    /// Build from raw `deny`/`ask` entries; falls back when neither yields a name.
    #[must_use]
    pub fn from_entries(deny: &[String], ask: &[String], path: Option<PathBuf>) -> Self {
        let deny_patterns: Vec<_> = deny
            .iter()
            .filter_map(|entry| parse_permission_entry(entry))
            .filter_map(|name| RestrictedPattern::new(name, RestrictionSource::Deny))
            .collect();
        let ask_patterns: Vec<_> = ask
            .iter()
            .filter_map(|entry| parse_permission_entry(entry))
            .filter_map(|name| RestrictedPattern::new(name, RestrictionSource::Ask))
            .collect();

        if deny_patterns.is_empty() && ask_patterns.is_empty() {
            return Self::fallback(FallbackReason::Empty);
        }

        let source = PermissionSource::Configured {
            path,
            deny: deny_patterns.len(),
            ask: ask_patterns.len(),
        };
        let mut patterns = deny_patterns;
        patterns.extend(ask_patterns);
        Self {
            matcher: RestrictedMatcher::new(patterns),
            source,
        }
    }
}

/// Supplies restricted names to the evaluator.
pub trait PermissionLoader {
    fn load(&self) -> LoadedPermissions;
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HostSettings {
    permissions: PermissionLists,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PermissionLists {
    deny: Vec<String>,
    ask: Vec<String>,
}

/// Reads the host's JSON settings file on every load.
#[derive(Debug, Clone)]
pub struct SettingsFile {
    path: PathBuf,
}

impl SettingsFile {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PermissionLoader for SettingsFile {
    fn load(&self) -> LoadedPermissions {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return LoadedPermissions::fallback(FallbackReason::Missing);
            }
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "cannot read settings");
                return LoadedPermissions::fallback(FallbackReason::Unreadable);
            }
        };

        let settings: HostSettings = match serde_json::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "cannot parse settings");
                return LoadedPermissions::fallback(FallbackReason::Malformed);
            }
        };

        LoadedPermissions::from_entries(
            &settings.permissions.deny,
            &settings.permissions.ask,
            Some(self.path.clone()),
        )
    }
}

/// Fixed lists, for tests and offline evaluation.
#[derive(Debug, Clone, Default)]
pub struct StaticPermissions {
    pub deny: Vec<String>,
    pub ask: Vec<String>,
}

impl StaticPermissions {
    /// Deny-list the given bare command names.
    #[must_use]
    pub fn deny<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            deny: names
                .into_iter()
                .map(|name| format!("Bash({}:*)", name.as_ref()))
                .collect(),
            ask: Vec::new(),
        }
    }
}

impl PermissionLoader for StaticPermissions {
    fn load(&self) -> LoadedPermissions {
        LoadedPermissions::from_entries(&self.deny, &self.ask, None)
    }
}

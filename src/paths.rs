//! Workspace root discovery, operand path resolution, and containment.
//!
//! Operand tokens pulled out of a command are resolved the way the shell would
//! see them from the command's working directory: a leading `~` expands to the
//! home directory, relative tokens are joined to the cwd, and `.`, `..` and
//! symlinks are collapsed.
//!
//! Resolution never fails. When the filesystem cannot answer (a missing
//! intermediate directory, a permission error) the deepest ancestor that does
//! exist is canonicalized and the remaining components are appended lexically.
//! If even that is impossible the lexically normalized join is used as-is.

use std::env;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Environment variable the host sets to the project directory.
pub const WORKSPACE_ENV: &str = "CLAUDE_PROJECT_DIR";

/// The null device is always treated as inside the workspace.
pub const DEV_NULL: &str = "/dev/null";

/// Determine the workspace root: `$CLAUDE_PROJECT_DIR` when set and non-empty,
/// otherwise the process working directory.
#[must_use]
pub fn workspace_root_from_env() -> PathBuf {
    match env::var_os(WORKSPACE_ENV) {
        Some(value) if !value.is_empty() => PathBuf::from(value),
        _ => env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// An operand after expansion, joining, and (best-effort) canonicalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Absolute path as far as it could be resolved.
    pub path: PathBuf,
    /// `false` when canonicalization of the full path failed and part of it
    /// is only lexically normalized.
    pub canonical: bool,
}

/// Expand a leading `~` or `~/` to the home directory.
///
/// `~user` forms are left untouched.
#[must_use]
pub fn expand_home(token: &str) -> PathBuf {
    let rest = if token == "~" {
        Some("")
    } else {
        token.strip_prefix("~/")
    };

    match (rest, dirs::home_dir()) {
        (Some(""), Some(home)) => home,
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(token),
    }
}

/// Resolve `token` as seen from `cwd`.
#[must_use]
pub fn resolve(token: &str, cwd: &Path) -> ResolvedPath {
    resolve_path(&expand_home(token), cwd)
}

/// Resolve a path that needs no `~` expansion. Works on any OS path, UTF-8
/// or not.
#[must_use]
pub fn resolve_path(path: &Path, cwd: &Path) -> ResolvedPath {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };

    match fs::canonicalize(&joined) {
        Ok(path) => ResolvedPath {
            path,
            canonical: true,
        },
        Err(_) => ResolvedPath {
            path: canonicalize_existing_prefix(&normalize_lexically(&joined)),
            canonical: false,
        },
    }
}

/// Collapse `.` and `..` without touching the filesystem.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else if !out.has_root() {
                    // `/..` stays `/`; only relative paths keep a leading `..`
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Canonicalize the deepest existing ancestor and re-append the rest.
fn canonicalize_existing_prefix(path: &Path) -> PathBuf {
    let mut tail = Vec::new();
    let mut current = path;

    loop {
        if let Ok(mut base) = fs::canonicalize(current) {
            for component in tail.iter().rev() {
                base.push(component);
            }
            return base;
        }
        match (current.parent(), current.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                current = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}

/// The directory tree the guard protects.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    canonical_root: PathBuf,
}

impl Workspace {
    /// Build a workspace from its root as configured (not necessarily canonical).
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let base = env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        let canonical_root = resolve_path(&root, &base).path;
        Self {
            root,
            canonical_root,
        }
    }

    /// Workspace root as configured; this is what block messages show.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Final component of the configured root (the project directory name).
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.root.file_name().and_then(|name| name.to_str())
    }

    /// Whether an already resolved path lies inside (or is) the workspace root.
    #[must_use]
    pub fn contains(&self, resolved: &ResolvedPath) -> bool {
        resolved.path == Path::new(DEV_NULL) || resolved.path.starts_with(&self.canonical_root)
    }

    /// Resolve `token` from `cwd` and test containment.
    #[must_use]
    pub fn contains_token(&self, token: &str, cwd: &Path) -> bool {
        token == DEV_NULL || self.contains(&resolve(token, cwd))
    }
}

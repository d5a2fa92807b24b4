//! Operand and dangerous-reference extraction.
//!
//! Two independent scans over raw command text:
//!
//! - **Operand rules** pick out the token each file-mutating idiom (output
//!   redirection, `rm`, `mv`, `cp`, `touch`, `mkdir`, `chmod`, `chown`,
//!   `sed -i`) would write to. Tokens beginning with `$` or a backtick are
//!   dropped: their value is unknowable statically, and reporting them would
//!   block far more legitimate commands than it would catch.
//! - **Dangerous references** flag literal mentions of system directories,
//!   the home directory, and `/tmp`, regardless of which command uses them.
//!
//! Both scans are regex approximations and never fail: unmatched or malformed
//! text simply produces no findings.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Which idiom produced a [`PathOperand`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandContext {
    OutputRedirect,
    RmTarget,
    MvDestination,
    CpDestination,
    TouchTarget,
    MkdirTarget,
    ChmodTarget,
    ChownTarget,
    SedInPlaceTarget,
}

impl OperandContext {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::OutputRedirect => "output redirect",
            Self::RmTarget => "rm target",
            Self::MvDestination => "mv destination",
            Self::CpDestination => "cp destination",
            Self::TouchTarget => "touch target",
            Self::MkdirTarget => "mkdir target",
            Self::ChmodTarget => "chmod target",
            Self::ChownTarget => "chown target",
            Self::SedInPlaceTarget => "sed -i target",
        }
    }
}

impl fmt::Display for OperandContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A path-like token and the idiom it was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathOperand<'a> {
    pub token: &'a str,
    pub context: OperandContext,
}

struct OperandRule {
    context: OperandContext,
    regex: Regex,
}

/// Capture group 1 of every rule is the affected path.
static OPERAND_RULES: LazyLock<Vec<OperandRule>> = LazyLock::new(|| {
    const TOKEN: &str = r"([^\s;&|]+)";
    let rules = [
        (OperandContext::OutputRedirect, format!(r">{{1,2}}\s*{TOKEN}")),
        (
            OperandContext::RmTarget,
            format!(r"\brm\s+(?:-[rfivd]+\s+)*{TOKEN}"),
        ),
        (
            OperandContext::MvDestination,
            format!(r"\bmv\s+(?:-[fivn]+\s+)*[^\s]+\s+{TOKEN}"),
        ),
        (
            OperandContext::CpDestination,
            format!(r"\bcp\s+(?:-[rfivn]+\s+)*[^\s]+\s+{TOKEN}"),
        ),
        (OperandContext::TouchTarget, format!(r"\btouch\s+{TOKEN}")),
        (
            OperandContext::MkdirTarget,
            format!(r"\bmkdir\s+(?:-p+\s+)*{TOKEN}"),
        ),
        (
            OperandContext::ChmodTarget,
            format!(r"\bchmod\s+[^\s]+\s+{TOKEN}"),
        ),
        (
            OperandContext::ChownTarget,
            format!(r"\bchown\s+[^\s]+\s+{TOKEN}"),
        ),
        (
            OperandContext::SedInPlaceTarget,
            format!(r"\bsed\s+-i[^\s]*\s+[^\s]+\s+{TOKEN}"),
        ),
    ];

    rules
        .into_iter()
        .map(|(context, pattern)| OperandRule {
            context,
            regex: Regex::new(&pattern).expect("operand rule regex compiles"),
        })
        .collect()
});

/// Tokens whose value only exists at run time.
fn is_dynamic(token: &str) -> bool {
    token.starts_with('$') || token.starts_with('`')
}

/// Extract every statically known operand, grouped by rule in rule order.
#[must_use]
pub fn extract_operands(command: &str) -> Vec<PathOperand<'_>> {
    let mut operands = Vec::new();
    for rule in OPERAND_RULES.iter() {
        for caps in rule.regex.captures_iter(command) {
            let Some(token) = caps.get(1).map(|m| m.as_str()) else {
                continue;
            };
            if !is_dynamic(token) {
                operands.push(PathOperand {
                    token,
                    context: rule.context,
                });
            }
        }
    }
    operands
}

/// `>`/`>>` followed by a file target. A `>` right after a digit or `&`
/// (`2>`, `&>`) does not count, nor does a duplication such as `>&2`.
static OUTPUT_REDIRECT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^0-9&])>{1,2}\s*[^\s>&]").expect("output redirect regex compiles")
});

/// File-descriptor duplication such as `2>&1`.
static STREAM_MERGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]*>&[0-9]+$").expect("stream merge regex compiles"));

/// Whether the command writes stdout to a file.
#[must_use]
pub fn has_output_redirect(command: &str) -> bool {
    OUTPUT_REDIRECT_RE.is_match(command)
}

/// Whether `token` is a descriptor merge like `2>&1` rather than a path.
#[must_use]
pub fn is_stream_merge(token: &str) -> bool {
    STREAM_MERGE_RE.is_match(token)
}

/// Raw redirect targets, including dynamic ones such as `$OUT`.
#[must_use]
pub fn redirect_targets(command: &str) -> Vec<&str> {
    OPERAND_RULES
        .iter()
        .filter(|rule| rule.context == OperandContext::OutputRedirect)
        .flat_map(|rule| rule.regex.captures_iter(command))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect()
}

// ============================================================================
// Dangerous references
// ============================================================================

/// System directories whose mention alone blocks a command.
pub const SYSTEM_DIRECTORIES: [&str; 9] = [
    "/etc", "/usr", "/var", "/bin", "/sbin", "/lib", "/opt", "/root", "/boot",
];

/// A literal reference that escapes the workspace regardless of resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DangerousReference {
    SystemDirectory(&'static str),
    HomeDirectory,
    TempDirectory,
}

static SYSTEM_DIRECTORY_RES: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    SYSTEM_DIRECTORIES
        .iter()
        .map(|dir| {
            // A whole path segment: not `/usr` inside `/home/x/usr`, not `/lib` in `/library`.
            let pattern = format!(
                r#"(?:^|[^/\w]){}(?:/|\s|$|[;&|)'"`])"#,
                regex::escape(dir)
            );
            (
                *dir,
                Regex::new(&pattern).expect("system directory regex compiles"),
            )
        })
        .collect()
});

/// A bare `~`; `~/path` is left to operand resolution.
static HOME_TILDE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\W)~(?:[^/]|$)").expect("home tilde regex compiles"));

static HOME_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$HOME\b").expect("home variable regex compiles"));

static TEMP_DIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^\w/])/tmp\b").expect("temp dir regex compiles"));

/// Scan `command` for literal references outside the workspace.
///
/// `workspace_name` is the final component of the workspace root; a `~`
/// reference followed somewhere by that name is taken to point back into the
/// workspace and is not reported.
#[must_use]
pub fn find_dangerous_references(
    command: &str,
    workspace_name: Option<&str>,
) -> Vec<DangerousReference> {
    let mut found: Vec<DangerousReference> = SYSTEM_DIRECTORY_RES
        .iter()
        .filter(|(_, regex)| regex.is_match(command))
        .map(|(dir, _)| DangerousReference::SystemDirectory(*dir))
        .collect();

    let mentions_home = HOME_TILDE_RE.is_match(command) || HOME_VAR_RE.is_match(command);
    if mentions_home && !tilde_reaches_workspace(command, workspace_name) {
        found.push(DangerousReference::HomeDirectory);
    }

    if TEMP_DIR_RE.is_match(command) {
        found.push(DangerousReference::TempDirectory);
    }

    found
}

fn tilde_reaches_workspace(command: &str, workspace_name: Option<&str>) -> bool {
    let Some(name) = workspace_name.filter(|name| !name.is_empty()) else {
        return false;
    };
    command
        .find('~')
        .is_some_and(|idx| command[idx..].contains(name))
}

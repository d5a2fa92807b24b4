//! Claude Code `PreToolUse` hook protocol.
//!
//! Input is one JSON object on stdin. Output is one of:
//!
//! - nothing (exit 0),
//! - a JSON object on stdout (exit 0),
//! - a plain-text block message on stderr (exit 2).
//!
//! [`render`] maps a [`Verdict`] to a [`HookResponse`] without touching any
//! stream, so every encoding can be tested directly; [`HookResponse::emit`]
//! does the writing.

use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::io::{self, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::evaluator::{Issue, Verdict};

/// Exit code that tells the host to refuse the tool call.
pub const EXIT_BLOCK: i32 = 2;

/// Exit code for an unusable payload.
pub const EXIT_PROTOCOL_ERROR: i32 = 1;

/// Input structure from the `PreToolUse` hook.
#[derive(Debug, Deserialize)]
pub struct HookInput {
    /// The name of the tool being invoked (e.g., "Bash", "Read", "Write").
    pub tool_name: Option<String>,

    /// Tool-specific input parameters.
    pub tool_input: Option<ToolInput>,

    /// Working directory the command would run in.
    pub cwd: Option<String>,
}

/// Tool-specific input containing the command to execute.
#[derive(Debug, Deserialize)]
pub struct ToolInput {
    /// The command string (for Bash tools).
    pub command: Option<serde_json::Value>,
}

/// A parsed payload plus the raw JSON it came from (kept for the audit log).
#[derive(Debug)]
pub struct HookRequest {
    pub input: HookInput,
    pub payload: serde_json::Value,
}

impl HookRequest {
    /// Bash command to evaluate, if this is a non-empty Bash invocation.
    #[must_use]
    pub fn command(&self) -> Option<String> {
        extract_command(&self.input)
    }

    /// The payload's `cwd`, or `fallback` when absent or empty.
    #[must_use]
    pub fn cwd_or(&self, fallback: &Path) -> PathBuf {
        match self.input.cwd.as_deref() {
            Some(cwd) if !cwd.is_empty() => PathBuf::from(cwd),
            _ => fallback.to_path_buf(),
        }
    }
}

/// Error type for reading and parsing hook input.
#[derive(Debug)]
pub enum HookReadError {
    /// Failed to read from stdin.
    Io(io::Error),
    /// Input exceeded the configured size limit.
    InputTooLarge(usize),
    /// Failed to parse JSON input.
    Json(serde_json::Error),
}

impl fmt::Display for HookReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "Failed to read input: {e}"),
            Self::InputTooLarge(limit) => write!(f, "Input exceeds {limit} bytes"),
            Self::Json(e) => write!(f, "Invalid JSON input: {e}"),
        }
    }
}

impl std::error::Error for HookReadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::InputTooLarge(_) => None,
        }
    }
}

impl From<io::Error> for HookReadError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for HookReadError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

/// Read and parse a hook payload from `reader`.
///
/// # Errors
///
/// Returns [`HookReadError::Io`] if the reader fails,
/// [`HookReadError::InputTooLarge`] if more than `max_bytes` are available, or
/// [`HookReadError::Json`] if the input is not a JSON object of the expected
/// shape.
pub fn parse_hook_input<R: Read>(reader: R, max_bytes: usize) -> Result<HookRequest, HookReadError> {
    let mut input = String::with_capacity(256);
    // Read up to limit + 1 to detect overflow
    reader
        .take(max_bytes as u64 + 1)
        .read_to_string(&mut input)?;

    if input.len() > max_bytes {
        return Err(HookReadError::InputTooLarge(max_bytes));
    }

    let payload: serde_json::Value = serde_json::from_str(&input)?;
    let input = HookInput::deserialize(&payload)?;
    Ok(HookRequest { input, payload })
}

/// Read and parse hook input from stdin.
///
/// # Errors
///
/// See [`parse_hook_input`].
pub fn read_hook_input(max_bytes: usize) -> Result<HookRequest, HookReadError> {
    parse_hook_input(io::stdin().lock(), max_bytes)
}

/// Extract the command string from hook input.
#[must_use]
pub fn extract_command(input: &HookInput) -> Option<String> {
    // Only process Bash tool invocations
    if input.tool_name.as_deref() != Some("Bash") {
        return None;
    }

    let tool_input = input.tool_input.as_ref()?;
    let command_value = tool_input.command.as_ref()?;

    match command_value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

// ============================================================================
// Response encodings
// ============================================================================

/// How verdicts are encoded on stdout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// `{"decision": "approve", ...}` / `{"reason": ...}`, blocks via exit 2.
    #[default]
    Decision,
    /// `{"hookSpecificOutput": {"permissionDecision": ...}}`, always exit 0.
    HookSpecific,
    /// Like [`OutputFormat::Decision`], but a defer is sent as
    /// `{"decision": "block", "reason": ...}` so the reason reaches the model
    /// and it can rephrase or ask the user.
    Review,
}

impl OutputFormat {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Decision => "decision",
            Self::HookSpecific => "hook_specific",
            Self::Review => "review",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "decision" => Ok(Self::Decision),
            "hook_specific" => Ok(Self::HookSpecific),
            "review" => Ok(Self::Review),
            other => Err(format!("unknown output format '{other}'")),
        }
    }
}

/// Output structure in the `decision` and `review` formats. `decision` is
/// absent on a plain defer.
#[derive(Debug, Serialize)]
pub struct DecisionOutput<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<&'static str>,
    pub reason: Cow<'a, str>,
}

/// Output structure in the `hook_specific` format.
#[derive(Debug, Serialize)]
pub struct HookOutput<'a> {
    /// Hook-specific output with the decision.
    #[serde(rename = "hookSpecificOutput")]
    pub hook_specific_output: HookSpecificOutput<'a>,
}

/// Hook-specific output with decision and reason.
#[derive(Debug, Serialize)]
pub struct HookSpecificOutput<'a> {
    /// Always "`PreToolUse`" for this hook.
    #[serde(rename = "hookEventName")]
    pub hook_event_name: &'static str,

    /// The permission decision: "allow", "deny", or "ask".
    #[serde(rename = "permissionDecision")]
    pub permission_decision: &'static str,

    /// Human-readable explanation of the decision.
    #[serde(rename = "permissionDecisionReason")]
    pub permission_decision_reason: Cow<'a, str>,
}

/// Everything that shapes the response besides the verdict.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub format: OutputFormat,
    /// Defer by saying nothing instead of `{"reason": ...}`.
    pub silent_defer: bool,
    /// Shown in block messages.
    pub workspace_root: PathBuf,
}

/// What the process writes and how it exits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookResponse {
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub exit_code: i32,
}

impl HookResponse {
    /// Exit 0 with no output.
    #[must_use]
    pub fn silent() -> Self {
        Self::default()
    }

    /// Write both streams. The first stderr line is highlighted when colors
    /// are enabled.
    ///
    /// # Errors
    ///
    /// Returns any I/O error from stdout or stderr.
    pub fn emit(&self) -> io::Result<()> {
        if let Some(out) = &self.stdout {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            writeln!(handle, "{out}")?;
            handle.flush()?;
        }
        if let Some(err) = &self.stderr {
            let stderr = io::stderr();
            let mut handle = stderr.lock();
            let (header, rest) = err.split_once('\n').unwrap_or((err.as_str(), ""));
            writeln!(handle, "{}", header.red().bold())?;
            if !rest.is_empty() {
                writeln!(handle, "{rest}")?;
            }
        }
        Ok(())
    }
}

/// Configure colored output based on TTY detection.
pub fn configure_colors() {
    if !io::stderr().is_terminal() {
        colored::control::set_override(false);
    }
}

/// Plain-text message listing every issue.
#[must_use]
pub fn format_block_message(issues: &[Issue], workspace_root: &Path) -> String {
    let mut msg = String::from("Workspace Protection: Command blocked\n\nIssues detected:\n");
    for issue in issues {
        msg.push_str("  - ");
        msg.push_str(&issue.to_string());
        msg.push('\n');
    }
    msg.push_str(&format!("\nWorkspace: {}\n", workspace_root.display()));
    msg.push_str("Modify the command to use workspace-relative paths.");
    msg
}

fn to_json<T: Serialize>(value: &T) -> String {
    // Only string fields: serialization cannot fail.
    serde_json::to_string(value).unwrap_or_default()
}

fn hook_specific(decision: &'static str, reason: &str) -> String {
    to_json(&HookOutput {
        hook_specific_output: HookSpecificOutput {
            hook_event_name: "PreToolUse",
            permission_decision: decision,
            permission_decision_reason: Cow::Borrowed(reason),
        },
    })
}

/// Encode `verdict` for the host.
#[must_use]
pub fn render(verdict: &Verdict, options: &RenderOptions) -> HookResponse {
    match (options.format, verdict) {
        (_, Verdict::PassThrough) => HookResponse::silent(),

        (OutputFormat::Decision | OutputFormat::Review, Verdict::Block(issues)) => HookResponse {
            stdout: None,
            stderr: Some(format_block_message(issues, &options.workspace_root)),
            exit_code: EXIT_BLOCK,
        },
        (OutputFormat::Decision | OutputFormat::Review, Verdict::Allow(reason)) => HookResponse {
            stdout: Some(to_json(&DecisionOutput {
                decision: Some("approve"),
                reason: Cow::Borrowed(reason.as_str()),
            })),
            ..HookResponse::default()
        },
        (OutputFormat::Decision | OutputFormat::Review, Verdict::Defer(_))
            if options.silent_defer =>
        {
            HookResponse::silent()
        }
        (OutputFormat::Decision, Verdict::Defer(reason)) => HookResponse {
            stdout: Some(to_json(&DecisionOutput {
                decision: None,
                reason: Cow::Borrowed(reason.as_str()),
            })),
            ..HookResponse::default()
        },
        (OutputFormat::Review, Verdict::Defer(reason)) => HookResponse {
            stdout: Some(to_json(&DecisionOutput {
                decision: Some("block"),
                reason: Cow::Borrowed(reason.as_str()),
            })),
            ..HookResponse::default()
        },

        (OutputFormat::HookSpecific, Verdict::Block(issues)) => HookResponse {
            stdout: Some(hook_specific(
                "deny",
                &format_block_message(issues, &options.workspace_root),
            )),
            ..HookResponse::default()
        },
        (OutputFormat::HookSpecific, Verdict::Allow(reason)) => HookResponse {
            stdout: Some(hook_specific("allow", reason.as_str())),
            ..HookResponse::default()
        },
        (OutputFormat::HookSpecific, Verdict::Defer(reason)) => HookResponse {
            stdout: Some(hook_specific("ask", reason.as_str())),
            ..HookResponse::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options(format: OutputFormat) -> RenderOptions {
        RenderOptions {
            format,
            silent_defer: false,
            workspace_root: PathBuf::from("/work/app"),
        }
    }

    fn stdout_json(response: &HookResponse) -> serde_json::Value {
        serde_json::from_str(response.stdout.as_deref().unwrap()).unwrap()
    }

    #[test]
    fn test_parse_valid_bash_input() {
        let json = r#"{"tool_name": "Bash", "tool_input": {"command": "git status"}, "cwd": "/work/app"}"#;
        let request = parse_hook_input(json.as_bytes(), 1024).unwrap();
        assert_eq!(request.command(), Some("git status".to_string()));
        assert_eq!(request.cwd_or(Path::new("/")), PathBuf::from("/work/app"));
        assert_eq!(request.payload["cwd"], "/work/app");
    }

    #[test]
    fn test_missing_cwd_uses_fallback() {
        let json = r#"{"tool_name": "Bash", "tool_input": {"command": "ls"}}"#;
        let request = parse_hook_input(json.as_bytes(), 1024).unwrap();
        assert_eq!(request.cwd_or(Path::new("/srv")), PathBuf::from("/srv"));
    }

    #[test]
    fn test_extract_command_non_bash() {
        let json = r#"{"tool_name": "Read", "tool_input": {"file_path": "/tmp/foo"}}"#;
        let request = parse_hook_input(json.as_bytes(), 1024).unwrap();
        assert_eq!(request.command(), None);
    }

    #[test]
    fn test_extract_command_empty() {
        for command in [json!(""), json!("   "), json!(null), json!(42)] {
            let payload = json!({"tool_name": "Bash", "tool_input": {"command": command}});
            let request = parse_hook_input(payload.to_string().as_bytes(), 1024).unwrap();
            assert_eq!(request.command(), None, "{payload}");
        }
    }

    #[test]
    fn test_invalid_json_is_error() {
        let err = parse_hook_input("not json".as_bytes(), 1024).unwrap_err();
        assert!(matches!(err, HookReadError::Json(_)));
        assert!(err.to_string().starts_with("Invalid JSON input: "));
    }

    #[test]
    fn test_wrong_field_type_is_error() {
        let err = parse_hook_input(r#"{"tool_name": 7}"#.as_bytes(), 1024).unwrap_err();
        assert!(matches!(err, HookReadError::Json(_)));
    }

    #[test]
    fn test_input_too_large() {
        let json = r#"{"tool_name": "Bash", "tool_input": {"command": "ls"}}"#;
        let err = parse_hook_input(json.as_bytes(), 10).unwrap_err();
        assert!(matches!(err, HookReadError::InputTooLarge(10)));
    }

    #[test]
    fn test_block_message_format() {
        let msg = format_block_message(
            &[Issue::SystemDirectory("/etc"), Issue::TempDirectory],
            Path::new("/work/app"),
        );
        assert_eq!(
            msg,
            "Workspace Protection: Command blocked\n\n\
             Issues detected:\n  \
             - System directory reference: /etc\n  \
             - Temporary directory reference (/tmp)\n\n\
             Workspace: /work/app\n\
             Modify the command to use workspace-relative paths."
        );
    }

    #[test]
    fn test_render_decision_block() {
        let response = render(
            &Verdict::Block(vec![Issue::HomeDirectory]),
            &options(OutputFormat::Decision),
        );
        assert_eq!(response.exit_code, EXIT_BLOCK);
        assert!(response.stdout.is_none());
        assert!(
            response
                .stderr
                .unwrap()
                .contains("  - Home directory reference (~)\n")
        );
    }

    #[test]
    fn test_render_decision_allow() {
        let response = render(
            &Verdict::Allow("Echo command without redirect".into()),
            &options(OutputFormat::Decision),
        );
        assert_eq!(response.exit_code, 0);
        assert_eq!(
            stdout_json(&response),
            json!({"decision": "approve", "reason": "Echo command without redirect"})
        );
    }

    #[test]
    fn test_render_decision_defer() {
        let verdict = Verdict::Defer("Command contains output redirect".into());
        let response = render(&verdict, &options(OutputFormat::Decision));
        assert_eq!(
            stdout_json(&response),
            json!({"reason": "Command contains output redirect"})
        );

        let mut silent = options(OutputFormat::Decision);
        silent.silent_defer = true;
        assert_eq!(render(&verdict, &silent), HookResponse::silent());
    }

    #[test]
    fn test_render_review_defer_blocks_for_review() {
        let opts = options(OutputFormat::Review);
        let verdict = Verdict::Defer("Command contains output redirect".into());

        let response = render(&verdict, &opts);
        assert_eq!(response.exit_code, 0);
        assert_eq!(
            stdout_json(&response),
            json!({"decision": "block", "reason": "Command contains output redirect"})
        );

        // allow and block keep the decision encoding
        let allow = render(&Verdict::Allow("ok".into()), &opts);
        assert_eq!(stdout_json(&allow)["decision"], "approve");
        let block = render(&Verdict::Block(vec![Issue::HomeDirectory]), &opts);
        assert_eq!(block.exit_code, EXIT_BLOCK);
    }

    #[test]
    fn test_render_pass_through_is_silent() {
        for format in [
            OutputFormat::Decision,
            OutputFormat::HookSpecific,
            OutputFormat::Review,
        ] {
            assert_eq!(
                render(&Verdict::PassThrough, &options(format)),
                HookResponse::silent()
            );
        }
    }

    #[test]
    fn test_render_hook_specific() {
        let opts = options(OutputFormat::HookSpecific);

        let deny = render(&Verdict::Block(vec![Issue::TempDirectory]), &opts);
        assert_eq!(deny.exit_code, 0);
        let value = stdout_json(&deny);
        assert_eq!(value["hookSpecificOutput"]["hookEventName"], "PreToolUse");
        assert_eq!(value["hookSpecificOutput"]["permissionDecision"], "deny");
        assert!(
            value["hookSpecificOutput"]["permissionDecisionReason"]
                .as_str()
                .unwrap()
                .contains("Temporary directory reference (/tmp)")
        );

        let allow = render(&Verdict::Allow("ok".into()), &opts);
        assert_eq!(stdout_json(&allow)["hookSpecificOutput"]["permissionDecision"], "allow");

        let ask = render(&Verdict::Defer("redirect".into()), &opts);
        assert_eq!(stdout_json(&ask)["hookSpecificOutput"]["permissionDecision"], "ask");
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("decision".parse(), Ok(OutputFormat::Decision));
        assert_eq!("hook-specific".parse(), Ok(OutputFormat::HookSpecific));
        assert_eq!("HOOK_SPECIFIC".parse(), Ok(OutputFormat::HookSpecific));
        assert_eq!("review".parse(), Ok(OutputFormat::Review));
        assert_eq!(OutputFormat::Review.as_str(), "review");
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}

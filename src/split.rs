//! Best-effort lexical splitting of a command line into sub-commands.
//!
//! This is deliberately not a shell parser. Operators are recognised wherever
//! they appear, including inside quotes, so `echo "a | b"` yields two
//! segments. The splitter can therefore over-split quoted text and
//! under-split constructs it does not know about (subshells, here-docs,
//! command substitution). Every consumer treats its output as a hint about
//! where commands start, never as ground truth.
//!
//! Recognised operators:
//!
//! | Token | [`Operator`]              |
//! |-------|---------------------------|
//! | `\|`  | [`Operator::Pipe`]        |
//! | `\|&` | [`Operator::PipeStderr`]  |
//! | `&&`  | [`Operator::And`]         |
//! | `\|\|`| [`Operator::Or`]          |
//! | `;`   | [`Operator::Sequence`]    |
//! | `&`   | [`Operator::Background`]  |
//!
//! A lone `&` only counts when it is not part of a redirection such as
//! `2>&1`, `>&2` or `&>file`.

use memchr::memchr3;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// The shell operator that precedes a sub-command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// First segment of the command line.
    None,
    Pipe,
    PipeStderr,
    And,
    Or,
    Sequence,
    Background,
}

impl Operator {
    /// The operator as it appears in shell source (empty for [`Operator::None`]).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Pipe => "|",
            Self::PipeStderr => "|&",
            Self::And => "&&",
            Self::Or => "||",
            Self::Sequence => ";",
            Self::Background => "&",
        }
    }

    /// `true` for every segment the host's prefix matcher does not inspect.
    #[must_use]
    pub const fn is_chained(self) -> bool {
        !matches!(self, Self::None)
    }

    fn from_token(token: &str) -> Self {
        match token {
            "|" => Self::Pipe,
            "|&" => Self::PipeStderr,
            "&&" => Self::And,
            "||" => Self::Or,
            ";" => Self::Sequence,
            "&" => Self::Background,
            _ => Self::None,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("(start)"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// One segment of a command line and the operator that introduced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubCommand<'a> {
    /// Segment text, trimmed.
    pub text: &'a str,
    pub operator: Operator,
}

/// Longest tokens first so `||` is never read as two pipes. A lone `&` still
/// has to pass [`is_background`].
static OPERATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\|\||\|&|&&|\||;|&").expect("operator regex compiles"));

/// A lone `&` at `idx` is a background operator unless it belongs to a
/// redirection (`2>&1`, `>&2`, `&>file`, `<&3`).
fn is_background(bytes: &[u8], idx: usize) -> bool {
    let before = idx.checked_sub(1).map(|i| bytes[i]);
    let after = bytes.get(idx + 1).copied();
    !matches!(before, Some(b'<' | b'>' | b'&')) && !matches!(after, Some(b'>' | b'&'))
}

/// Split `command` into ordered sub-commands.
///
/// Empty and whitespace-only segments are dropped; the operator in front of a
/// dropped segment is superseded by the next one.
#[must_use]
pub fn split_command(command: &str) -> Vec<SubCommand<'_>> {
    let mut segments = Vec::new();

    if memchr3(b'|', b'&', b';', command.as_bytes()).is_none() {
        push_segment(&mut segments, command, Operator::None);
        return segments;
    }

    let mut start = 0;
    let mut pending = Operator::None;
    for found in OPERATOR_RE.find_iter(command) {
        if found.as_str() == "&" && !is_background(command.as_bytes(), found.start()) {
            continue;
        }
        push_segment(&mut segments, &command[start..found.start()], pending);
        pending = Operator::from_token(found.as_str());
        start = found.end();
    }
    push_segment(&mut segments, &command[start..], pending);

    segments
}

fn push_segment<'a>(segments: &mut Vec<SubCommand<'a>>, raw: &'a str, operator: Operator) {
    let text = raw.trim();
    if !text.is_empty() {
        segments.push(SubCommand { text, operator });
    }
}

//! Append-only audit log of hook invocations.
//!
//! One line per invocation:
//!
//! ```text
//! [2026-01-15T12:30:45.123Z] BLOCK System directory reference: /etc -- payload: {"cwd":"/w",...
//! ```
//!
//! Each line is formatted in full and handed to a single `write_all` on a
//! file opened with `O_APPEND`, so concurrent hooks never interleave within a
//! line. No locking is done beyond that.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Whether the audit log is written.
    pub enabled: bool,
    /// Path to log file, relative to the workspace root. Supports ~ expansion.
    pub file: String,
    /// Payload JSON is cut to this many characters.
    pub payload_max_chars: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            file: ".claude/hooks/debug.log".to_string(),
            payload_max_chars: 200,
        }
    }
}

/// Writes audit lines to one file.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
    payload_max_chars: usize,
}

impl AuditLog {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, payload_max_chars: usize) -> Self {
        Self {
            path: path.into(),
            payload_max_chars,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line for this invocation.
    ///
    /// # Errors
    ///
    /// Returns an error if the log directory cannot be created or the file
    /// cannot be opened or written. Callers treat this as non-fatal.
    pub fn record(&self, payload: &serde_json::Value, label: &str, reason: &str) -> io::Result<()> {
        let line = format_entry(
            Utc::now(),
            label,
            reason,
            &payload.to_string(),
            self.payload_max_chars,
        );
        let mut file = open_log_file(&self.path)?;
        file.write_all(line.as_bytes())
    }
}

/// Format one newline-terminated audit line.
#[must_use]
pub fn format_entry(
    timestamp: DateTime<Utc>,
    label: &str,
    reason: &str,
    payload: &str,
    payload_max_chars: usize,
) -> String {
    format!(
        "[{}] {label} {} -- payload: {}\n",
        timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        single_line(reason),
        truncate_chars(payload, payload_max_chars),
    )
}

fn single_line(text: &str) -> String {
    text.replace(['\n', '\r'], " ")
}

/// Cut at a character boundary, never inside a multi-byte sequence.
fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

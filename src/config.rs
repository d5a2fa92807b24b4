//! Guard configuration.
//!
//! Supports layered configuration from multiple sources:
//! 1. Environment variables (highest priority)
//! 2. File named by `WSGUARD_CONFIG`
//! 3. Project config (`.wsguard.toml` in the workspace root)
//! 4. User config (`~/.config/wsguard/config.toml`)
//! 5. Compiled defaults (lowest priority)
//!
//! This is the guard's own behaviour. The restricted command names come from
//! the host's settings file, whose location is `general.settings_file`.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::evaluator::DEFAULT_SAFE_SINKS;
use crate::hook::OutputFormat;
use crate::logging::LoggingConfig;
use crate::paths::expand_home;

/// Environment variable prefix for all config options.
const ENV_PREFIX: &str = "WSGUARD";

/// Default config file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Project-level config file name.
pub const PROJECT_CONFIG_NAME: &str = ".wsguard.toml";

/// Default upper bound on the hook payload size.
pub const DEFAULT_MAX_INPUT_BYTES: usize = 256 * 1024;

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings.
    pub general: GeneralConfig,

    /// Redirect handling.
    pub redirects: RedirectsConfig,

    /// Audit log settings.
    pub logging: LoggingConfig,
}

/// General configuration options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Host permission settings, relative to the workspace root.
    pub settings_file: String,

    /// Response encoding.
    pub output_format: OutputFormat,

    /// Defer with no output instead of `{"reason": ...}`.
    pub silent_defer: bool,

    /// Payloads larger than this are rejected.
    pub max_input_bytes: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            settings_file: ".claude/settings.json".to_string(),
            output_format: OutputFormat::Decision,
            silent_defer: false,
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
        }
    }
}

/// Redirect targets that are allowed without asking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedirectsConfig {
    /// Relative entries are anchored at the workspace root.
    pub safe_sinks: Vec<String>,
}

impl Default for RedirectsConfig {
    fn default() -> Self {
        Self {
            safe_sinks: DEFAULT_SAFE_SINKS.iter().map(ToString::to_string).collect(),
        }
    }
}

impl Config {
    /// Load configuration from all sources for the given workspace.
    ///
    /// Unreadable or unparsable files are skipped.
    #[must_use]
    pub fn load(workspace_root: &Path) -> Self {
        let mut config = Self::default();

        if let Some(user_config) = Self::load_user_config() {
            config.merge(user_config);
        }

        if let Some(project_config) =
            Self::load_from_file(&workspace_root.join(PROJECT_CONFIG_NAME))
        {
            config.merge(project_config);
        }

        // WSGUARD_CONFIG=/path/to/config.toml
        if let Ok(path) = env::var(format!("{ENV_PREFIX}_CONFIG")) {
            if let Some(explicit) = Self::load_from_file(&expand_home(&path)) {
                config.merge(explicit);
            }
        }

        // Apply environment variable overrides (highest priority)
        config.apply_env_overrides();

        config
    }

    /// Load configuration from a specific file.
    #[must_use]
    pub fn load_from_file(path: &Path) -> Option<Self> {
        let content = fs::read_to_string(path).ok()?;
        match toml::from_str(&content) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "ignoring invalid config");
                None
            }
        }
    }

    /// Path of the user configuration file.
    #[must_use]
    pub fn user_config_path() -> Option<PathBuf> {
        Some(dirs::config_dir()?.join("wsguard").join(CONFIG_FILE_NAME))
    }

    fn load_user_config() -> Option<Self> {
        Self::load_from_file(&Self::user_config_path()?)
    }

    /// Merge another config into this one (other takes priority).
    ///
    /// Only values that differ from the compiled defaults override.
    fn merge(&mut self, other: Self) {
        let general_defaults = GeneralConfig::default();
        if other.general.settings_file != general_defaults.settings_file {
            self.general.settings_file = other.general.settings_file;
        }
        if other.general.output_format != general_defaults.output_format {
            self.general.output_format = other.general.output_format;
        }
        if other.general.silent_defer {
            self.general.silent_defer = true;
        }
        if other.general.max_input_bytes != general_defaults.max_input_bytes {
            self.general.max_input_bytes = other.general.max_input_bytes;
        }

        if other.redirects != RedirectsConfig::default() {
            self.redirects = other.redirects;
        }

        let logging_defaults = LoggingConfig::default();
        if !other.logging.enabled {
            self.logging.enabled = false;
        }
        if other.logging.file != logging_defaults.file {
            self.logging.file = other.logging.file;
        }
        if other.logging.payload_max_chars != logging_defaults.payload_max_chars {
            self.logging.payload_max_chars = other.logging.payload_max_chars;
        }
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        // WSGUARD_OUTPUT_FORMAT=hook_specific
        if let Ok(format) = env::var(format!("{ENV_PREFIX}_OUTPUT_FORMAT")) {
            match format.parse() {
                Ok(format) => self.general.output_format = format,
                Err(e) => tracing::debug!(error = %e, "ignoring {ENV_PREFIX}_OUTPUT_FORMAT"),
            }
        }

        // WSGUARD_SETTINGS_FILE=.claude/settings.local.json
        if let Ok(path) = env::var(format!("{ENV_PREFIX}_SETTINGS_FILE")) {
            self.general.settings_file = path;
        }

        // WSGUARD_SILENT_DEFER=1
        if env::var(format!("{ENV_PREFIX}_SILENT_DEFER")).is_ok() {
            self.general.silent_defer = true;
        }

        // WSGUARD_LOG_FILE=~/.local/state/wsguard.log
        if let Ok(path) = env::var(format!("{ENV_PREFIX}_LOG_FILE")) {
            self.logging.file = path;
        }

        // WSGUARD_NO_LOG=1
        if env::var(format!("{ENV_PREFIX}_NO_LOG")).is_ok() {
            self.logging.enabled = false;
        }
    }

    /// Host settings file for `workspace_root`.
    #[must_use]
    pub fn settings_path(&self, workspace_root: &Path) -> PathBuf {
        anchor(&self.general.settings_file, workspace_root)
    }

    /// Audit log file for `workspace_root`, or `None` when logging is off.
    #[must_use]
    pub fn log_path(&self, workspace_root: &Path) -> Option<PathBuf> {
        self.logging
            .enabled
            .then(|| anchor(&self.logging.file, workspace_root))
    }

    /// Generate a sample configuration string with comments.
    #[must_use]
    pub fn generate_sample_config() -> String {
        format!(
            r#"# wsguard configuration
#
# Layers (later wins): ~/.config/wsguard/config.toml, <workspace>/.wsguard.toml,
# $WSGUARD_CONFIG, then WSGUARD_* environment variables.

[general]
# Host permission settings; Bash(...) entries in permissions.deny and
# permissions.ask are treated as restricted commands.
settings_file = ".claude/settings.json"

# "decision"      -> {{"decision": "approve"}} / {{"reason": ...}}, blocks exit 2
# "hook_specific" -> {{"hookSpecificOutput": {{"permissionDecision": ...}}}}
# "review"        -> like "decision", but defers become {{"decision": "block"}}
#                    so the reason goes back to the model
output_format = "decision"

# Defer by printing nothing instead of {{"reason": ...}}
silent_defer = false

max_input_bytes = {DEFAULT_MAX_INPUT_BYTES}

[redirects]
# Output redirects to these targets are approved without asking.
# Relative entries are anchored at the workspace root. A descriptor merge
# such as "2>&1" approves every redirect in a command that contains it.
safe_sinks = [".cache/claude-status.txt", "/dev/null", "2>&1"]

[logging]
enabled = true
# Relative to the workspace root; ~ is expanded.
file = ".claude/hooks/debug.log"
payload_max_chars = 200
"#
        )
    }
}

/// Expand `~` and anchor relative paths at `root`.
fn anchor(path: &str, root: &Path) -> PathBuf {
    let expanded = expand_home(path);
    if expanded.is_absolute() {
        expanded
    } else {
        root.join(expanded)
    }
}

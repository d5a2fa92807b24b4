//! CLI argument parsing and command handling.
//!
//! With no subcommand the binary runs as a hook (see `main.rs`). The
//! subcommands here evaluate commands offline and manage configuration.

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};

use crate::config::{Config, PROJECT_CONFIG_NAME};
use crate::evaluator::{Evaluation, Evaluator, Verdict};
use crate::paths::{Workspace, workspace_root_from_env};
use crate::permissions::{PermissionLoader, SettingsFile};
use crate::split::split_command;

/// Workspace protection hook for Claude Code Bash commands.
///
/// Blocks commands that reach outside the project directory or hide
/// restricted commands behind pipes and chains.
#[derive(Parser, Debug)]
#[command(name = "wsguard")]
#[command(version, about, long_about = None)]
#[command(after_help = "Run without a subcommand to read a PreToolUse payload from stdin.")]
pub struct Cli {
    /// Subcommand to run (omit to run in hook mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate a command and show the verdict
    #[command(name = "test")]
    Test {
        /// Command to evaluate
        command: String,

        /// Directory the command would run in (defaults to the workspace root)
        #[arg(long)]
        cwd: Option<PathBuf>,

        /// Workspace root (defaults to $CLAUDE_PROJECT_DIR or the current directory)
        #[arg(long, short)]
        workspace: Option<PathBuf>,

        /// Output format (pretty or json)
        #[arg(long, short, value_enum, default_value_t = TestFormat::Pretty)]
        format: TestFormat,
    },

    /// Show the effective configuration
    #[command(name = "config")]
    ShowConfig {
        /// Workspace root (defaults to $CLAUDE_PROJECT_DIR or the current directory)
        #[arg(long, short)]
        workspace: Option<PathBuf>,
    },

    /// Generate a sample configuration file
    #[command(name = "init")]
    Init {
        /// Output path (defaults to stdout)
        #[arg(short, long)]
        output: Option<String>,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

/// Output format for the test command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TestFormat {
    /// Human-readable output
    #[default]
    Pretty,
    /// Structured JSON output
    Json,
}

/// Run a subcommand.
///
/// # Errors
///
/// Returns an error if output cannot be serialized or a file cannot be written.
pub fn run_command(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Some(Command::Test {
            command,
            cwd,
            workspace,
            format,
        }) => {
            let root = workspace.unwrap_or_else(workspace_root_from_env);
            test_command(&command, &root, cwd.as_deref(), format)?;
        }
        Some(Command::ShowConfig { workspace }) => {
            let root = workspace.unwrap_or_else(workspace_root_from_env);
            show_config(&root)?;
        }
        Some(Command::Init { output, force }) => {
            init_config(output, force)?;
        }
        None => {}
    }
    Ok(())
}

/// Build the evaluator hook mode uses for `workspace_root`.
#[must_use]
pub fn build_evaluator(config: &Config, workspace_root: &Path) -> Evaluator<SettingsFile> {
    Evaluator::new(
        Workspace::new(workspace_root),
        SettingsFile::new(config.settings_path(workspace_root)),
    )
    .with_safe_sinks(config.redirects.safe_sinks.clone())
}

fn test_command(
    command: &str,
    workspace_root: &Path,
    cwd: Option<&Path>,
    format: TestFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(workspace_root);
    let evaluator = build_evaluator(&config, workspace_root);
    let cwd = cwd.unwrap_or(workspace_root);
    let evaluation = evaluator.evaluate(command, cwd);

    match format {
        TestFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&test_report_json(command, cwd, &evaluation))?
            );
        }
        TestFormat::Pretty => print_test_report(command, workspace_root, cwd, &evaluation),
    }
    Ok(())
}

fn test_report_json(command: &str, cwd: &Path, evaluation: &Evaluation) -> serde_json::Value {
    let subcommands: Vec<_> = split_command(command)
        .iter()
        .map(|sub| serde_json::json!({"operator": sub.operator.as_str(), "text": sub.text}))
        .collect();
    let issues: Vec<_> = match &evaluation.verdict {
        Verdict::Block(issues) => issues
            .iter()
            .map(|issue| serde_json::json!({"kind": issue.kind(), "message": issue.to_string()}))
            .collect(),
        _ => Vec::new(),
    };
    let reason = match &evaluation.verdict {
        Verdict::Allow(reason) | Verdict::Defer(reason) => Some(reason.as_str()),
        Verdict::Block(_) | Verdict::PassThrough => None,
    };

    serde_json::json!({
        "command": command,
        "cwd": cwd.display().to_string(),
        "verdict": evaluation.verdict.label().to_ascii_lowercase(),
        "reason": reason,
        "issues": issues,
        "subcommands": subcommands,
        "permissions": evaluation.permissions.to_string(),
        "fallback": evaluation.permissions.is_fallback(),
    })
}

fn print_test_report(command: &str, workspace_root: &Path, cwd: &Path, evaluation: &Evaluation) {
    println!("Command:   {command}");
    println!("Workspace: {}", workspace_root.display());
    println!("Cwd:       {}", cwd.display());
    println!();

    println!("Sub-commands:");
    for sub in split_command(command) {
        println!("  {:>7}  {}", sub.operator.to_string().bright_black(), sub.text);
    }
    println!();

    match &evaluation.verdict {
        Verdict::Block(issues) => {
            println!("Result: {}", "BLOCKED".red().bold());
            for issue in issues {
                println!("  - {issue}");
            }
        }
        Verdict::Allow(reason) => println!("Result: {} ({reason})", "ALLOWED".green().bold()),
        Verdict::Defer(reason) => println!("Result: {} ({reason})", "DEFERRED".yellow().bold()),
        Verdict::PassThrough => println!("Result: {}", "NO OPINION".bright_black()),
    }
    println!();
    println!("Restricted commands: {}", evaluation.permissions);
}

fn show_config(workspace_root: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(workspace_root);
    let settings_path = config.settings_path(workspace_root);
    let loaded = SettingsFile::new(&settings_path).load();

    println!("Config sources (lowest → highest priority):");
    if let Some(user_cfg) = Config::user_config_path().filter(|p| p.exists()) {
        println!("  - user: {}", user_cfg.display());
    }
    let project_cfg = workspace_root.join(PROJECT_CONFIG_NAME);
    if project_cfg.exists() {
        println!("  - project: {}", project_cfg.display());
    }
    if let Ok(explicit) = std::env::var("WSGUARD_CONFIG") {
        println!("  - WSGUARD_CONFIG: {explicit}");
    }
    println!();

    println!("Workspace:     {}", workspace_root.display());
    println!("Settings file: {}", settings_path.display());
    println!("Restricted:    {}", loaded.source);
    let names: Vec<_> = loaded
        .matcher
        .patterns()
        .iter()
        .map(|p| format!("{} ({})", p.name(), p.source().label()))
        .collect();
    println!("               {}", names.join(", "));
    match config.log_path(workspace_root) {
        Some(path) => println!("Audit log:     {}", path.display()),
        None => println!("Audit log:     disabled"),
    }
    println!();
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn init_config(output: Option<String>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let sample = Config::generate_sample_config();

    match output {
        Some(path) => {
            let path = Path::new(&path);
            if path.exists() && !force {
                return Err(
                    format!("File exists: {}. Use --force to overwrite.", path.display()).into(),
                );
            }

            // Create parent directories if needed
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }

            std::fs::write(path, sample)?;
            println!("Configuration written to: {}", path.display());
        }
        None => {
            print!("{sample}");
        }
    }
    Ok(())
}

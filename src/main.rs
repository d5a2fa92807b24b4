#![forbid(unsafe_code)]
//! Workspace guard hook for Claude Code.
//!
//! Runs before every Bash command and keeps its effects inside the project
//! directory.
//!
//! Exit behavior (default `decision` output format):
//!   - Exit 2 with a message on stderr = block
//!   - Exit 0 with `{"decision": "approve", ...}` = allow
//!   - Exit 0 with `{"reason": ...}` or no output = host decides
//!   - Exit 1 = the payload could not be read

use clap::Parser;
use workspace_guard::cli::{self, Cli};
use workspace_guard::config::Config;
use workspace_guard::hook::{self, EXIT_PROTOCOL_ERROR, RenderOptions};
use workspace_guard::logging::AuditLog;
use workspace_guard::paths::workspace_root_from_env;

fn main() {
    // Configure colors based on TTY detection
    hook::configure_colors();

    // If parsing fails (e.g., unknown flags), print the clap error and exit
    // instead of falling into hook mode and blocking on stdin.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version also land here, with exit code 0.
            let code = if e.use_stderr() { 2 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    if cli.command.is_some() {
        if let Err(e) = cli::run_command(cli) {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
        return;
    }

    std::process::exit(run_hook());
}

/// One hook invocation. Returns the process exit code.
fn run_hook() -> i32 {
    let workspace_root = workspace_root_from_env();
    let config = Config::load(&workspace_root);
    let audit = config
        .log_path(&workspace_root)
        .map(|path| AuditLog::new(path, config.logging.payload_max_chars));

    let request = match hook::read_hook_input(config.general.max_input_bytes) {
        Ok(request) => request,
        Err(e) => {
            eprintln!("Hook error: {e}");
            return EXIT_PROTOCOL_ERROR;
        }
    };

    let Some(command) = request.command() else {
        let reason = if request.input.tool_name.as_deref() == Some("Bash") {
            "empty command"
        } else {
            "not a Bash command"
        };
        record(audit.as_ref(), &request.payload, "SKIP", reason);
        return 0;
    };

    let fallback_cwd = std::env::current_dir().unwrap_or_else(|_| workspace_root.clone());
    let cwd = request.cwd_or(&fallback_cwd);

    let evaluator = cli::build_evaluator(&config, &workspace_root);
    let evaluation = evaluator.evaluate(&command, &cwd);
    record(
        audit.as_ref(),
        &request.payload,
        evaluation.verdict.label(),
        &evaluation.verdict.reason(),
    );

    let response = hook::render(
        &evaluation.verdict,
        &RenderOptions {
            format: config.general.output_format,
            silent_defer: config.general.silent_defer,
            workspace_root: workspace_root.clone(),
        },
    );
    // A closed pipe must not turn a block into an allow; keep the exit code.
    let _ = response.emit();
    response.exit_code
}

fn record(audit: Option<&AuditLog>, payload: &serde_json::Value, label: &str, reason: &str) {
    if let Some(audit) = audit {
        if let Err(e) = audit.record(payload, label, reason) {
            tracing::debug!(path = %audit.path().display(), error = %e, "audit log write failed");
        }
    }
}

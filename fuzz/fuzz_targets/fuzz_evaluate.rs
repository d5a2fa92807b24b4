//! Fuzz target for the evaluator entry point.
//!
//! Feeds arbitrary command strings through a full evaluation to find:
//! - Panics from unexpected input
//! - Regex catastrophic backtracking
//! - Slicing on non-character boundaries

#![no_main]

use libfuzzer_sys::fuzz_target;

use std::path::PathBuf;
use std::sync::LazyLock;
use workspace_guard::evaluator::Evaluator;
use workspace_guard::hook::{OutputFormat, RenderOptions, render};
use workspace_guard::paths::Workspace;
use workspace_guard::permissions::StaticPermissions;

static ROOT: LazyLock<PathBuf> = LazyLock::new(std::env::temp_dir);

static EVALUATOR: LazyLock<Evaluator<StaticPermissions>> = LazyLock::new(|| {
    Evaluator::new(
        Workspace::new(ROOT.as_path()),
        StaticPermissions::deny(["curl", "wget", "git push", "c++"]),
    )
});

fuzz_target!(|data: &[u8]| {
    if let Ok(command) = std::str::from_utf8(data) {
        // Skip extremely large inputs to avoid timeout (not a real bug)
        if command.len() > 10_000 {
            return;
        }

        let evaluation = EVALUATOR.evaluate(command, &ROOT);

        for format in [
            OutputFormat::Decision,
            OutputFormat::HookSpecific,
            OutputFormat::Review,
        ] {
            let _ = render(
                &evaluation.verdict,
                &RenderOptions {
                    format,
                    silent_defer: false,
                    workspace_root: ROOT.clone(),
                },
            );
        }
    }
});

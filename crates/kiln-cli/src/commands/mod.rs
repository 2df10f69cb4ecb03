pub mod check;
pub mod completions;
pub mod deps;
pub mod generate;
pub mod init;
pub mod man_pages;
pub mod order;
pub mod plan;
pub mod validate;

use indicatif::{ProgressBar, ProgressStyle};
use kiln_core::CoreError;
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_MANIFEST_ERROR: u8 = 2;
pub const EXIT_OUTPUT_ERROR: u8 = 3;

/// Error message prefixes that mean the manifest itself must be fixed.
const MANIFEST_PREFIXES: &[&str] = &[
    "manifest error:",
    "graph error:",
    "hardening error:",
    "selection error:",
    "generate error:",
];

pub fn exit_code_for(msg: &str) -> u8 {
    if MANIFEST_PREFIXES.iter().any(|p| msg.starts_with(p)) {
        EXIT_MANIFEST_ERROR
    } else if msg.starts_with("output error:") {
        EXIT_OUTPUT_ERROR
    } else {
        EXIT_FAILURE
    }
}

pub fn core_err(e: impl Into<CoreError>) -> String {
    e.into().to_string()
}

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_spinner())
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        style("{spinner:.cyan} {msg}")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(style("{msg}"));
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(style("{msg}"));
    pb.finish_with_message(format!("✗ {msg}"));
}

pub fn colorize_status(status: &str) -> String {
    use console::Style;
    match status {
        "ok" | "clean" | "written" => Style::new().green().apply_to(status).to_string(),
        "drift" | "missing" | "modified" => Style::new().red().bold().apply_to(status).to_string(),
        "stale" | "disabled" | "unchanged" => Style::new().yellow().apply_to(status).to_string(),
        "pruned" | "skipped" => Style::new().dim().apply_to(status).to_string(),
        other => other.to_owned(),
    }
}

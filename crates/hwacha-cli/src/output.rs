// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! CLI output formatting with colors and styling.
//!
//! Respects NO_COLOR and FORCE_COLOR environment variables.

use colored::{ColoredString, Colorize};

/// Initialize color support based on environment.
pub fn init() {
    if std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    } else if std::env::var("FORCE_COLOR").is_ok() {
        colored::control::set_override(true);
    }
}

pub fn error_label() -> ColoredString {
    "error".red().bold()
}

pub fn banner_ok(phase: &str) -> String {
    format!("{} {} {}", "===".dimmed(), format!("{} OK", phase).green().bold(), "===".dimmed())
}

pub fn banner_fail(phase: &str) -> String {
    format!("{} {} {}", "===".dimmed(), format!("{} FAILED", phase).red().bold(), "===".dimmed())
}

pub fn title(name: &str) -> ColoredString {
    name.bold()
}

pub fn section_header(header: &str) -> ColoredString {
    header.yellow().bold()
}

pub fn command(name: &str) -> ColoredString {
    name.green()
}

pub fn kernel_name(name: &str) -> ColoredString {
    name.cyan()
}

pub fn file_path(path: &str) -> ColoredString {
    path.underline()
}

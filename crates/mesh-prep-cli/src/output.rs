//! Output helpers shared by subcommands.

use colored::Colorize;
use serde::Serialize;

use crate::OutputFormat;

/// Print `value` as pretty JSON when JSON output is selected.
pub fn print<T: Serialize>(value: &T, format: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    if let OutputFormat::Json = format {
        match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("{}: failed to serialize output: {}", "Error".red().bold(), e),
        }
    }
}

pub fn success(message: &str, quiet: bool) {
    if !quiet {
        println!("{} {}", "✓".green().bold(), message);
    }
}

pub fn failure(message: &str, quiet: bool) {
    if !quiet {
        println!("{} {}", "✗".red().bold(), message);
    }
}

pub fn yes_no(value: bool) -> colored::ColoredString {
    if value {
        "yes".green()
    } else {
        "NO".red().bold()
    }
}

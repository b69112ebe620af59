//! Output helpers shared by the subcommands.

use std::io::Write;
use std::sync::Mutex;

use colored::Colorize;
use ligament_net::ProgressObserver;
use serde::Serialize;

use crate::OutputFormat;

/// Print a serializable result as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T, quiet: bool) {
    if quiet {
        return;
    }
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("{}: failed to serialize output: {}", "Error".red().bold(), e),
    }
}

/// Print a success line (text mode only).
pub fn success(message: &str, format: OutputFormat, quiet: bool) {
    if quiet || matches!(format, OutputFormat::Json) {
        return;
    }
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an informational line to stderr (text mode only).
pub fn info(message: &str, format: OutputFormat, quiet: bool) {
    if quiet || matches!(format, OutputFormat::Json) {
        return;
    }
    eprintln!("{} {}", "→".cyan(), message);
}

/// Print a warning line to stderr.
pub fn warning(message: &str, quiet: bool) {
    if quiet {
        return;
    }
    eprintln!("{}: {}", "Warning".yellow().bold(), message);
}

/// Single-line progress display on stderr.
///
/// Redraws the current line on every update and ends it once 100% is reached.
pub struct TerminalProgress {
    last: Mutex<Option<(String, u8)>>,
}

impl TerminalProgress {
    pub fn new() -> Self {
        Self {
            last: Mutex::new(None),
        }
    }
}

impl ProgressObserver for TerminalProgress {
    fn on_progress(&self, phase: &str, percent: u8) {
        let mut last = match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if last.as_ref().is_some_and(|(p, pct)| p == phase && *pct == percent) {
            return;
        }
        *last = Some((phase.to_string(), percent));

        let mut stderr = std::io::stderr().lock();
        let _ = write!(
            stderr,
            "\r\x1b[2K{} {}",
            format!("{:>3}%", percent).cyan().bold(),
            phase
        );
        if percent >= 100 {
            let _ = writeln!(stderr);
        }
        let _ = stderr.flush();
    }
}

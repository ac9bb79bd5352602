//! Terminal-facing status observer.

use std::io::{IsTerminal, Write};

use batchflow_core::{ERROR_MARKER, OutputObserver};

use crate::colors;

/// Prints status lines as they arrive, painting error-marked lines red
/// when attached to a terminal.
pub struct ConsoleObserver {
    color: bool,
}

impl ConsoleObserver {
    pub fn new() -> Self {
        Self {
            color: std::io::stderr().is_terminal(),
        }
    }
}

impl Default for ConsoleObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputObserver for ConsoleObserver {
    fn notify(&self, line: &str) {
        if line.contains(ERROR_MARKER) {
            if self.color {
                eprintln!("{}{line}{}", colors::RED, colors::RESET);
            } else {
                eprintln!("{line}");
            }
        } else {
            println!("{line}");
        }
    }
}

/// Flush buffered status output before the process exits.
pub fn flush() {
    std::io::stdout().flush().ok();
    std::io::stderr().flush().ok();
}

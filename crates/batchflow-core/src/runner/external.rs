//! External-process interpreter runner.
//!
//! Spawns an installed CPython interpreter on the script file, pipes its
//! output back through the observer, and blocks until it exits.

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use crate::discovery;
use crate::observer::{ERROR_MARKER, SharedObserver};

use super::ScriptRunner;

/// Runs a script by spawning an installed CPython interpreter.
pub struct ExternalRunner {
    binding: Binding,
    observer: SharedObserver,
}

enum Binding {
    /// Pinned to one discovered install.
    Version { key: String, install: PathBuf },
    /// Latest discovered install, resolved at call time.
    Latest {
        discovered: BTreeMap<String, PathBuf>,
    },
}

impl ExternalRunner {
    /// Runner pinned to one discovered interpreter install.
    pub fn new(key: String, install: PathBuf, observer: SharedObserver) -> Self {
        Self {
            binding: Binding::Version { key, install },
            observer,
        }
    }

    /// Runner that picks the latest discovered install each call, falling
    /// back to whatever `python3` is on `PATH`.
    pub fn unversioned(discovered: BTreeMap<String, PathBuf>, observer: SharedObserver) -> Self {
        Self {
            binding: Binding::Latest { discovered },
            observer,
        }
    }

    fn resolve_interpreter(&self) -> Option<PathBuf> {
        match &self.binding {
            Binding::Version { key, install } => interpreter_in(install, key),
            Binding::Latest { discovered } => discovery::latest_version(discovered)
                .and_then(|(key, install)| interpreter_in(install, key))
                .or_else(|| which::which("python3").ok())
                .or_else(|| which::which("python").ok()),
        }
    }

    fn label(&self) -> String {
        match &self.binding {
            Binding::Version { key, .. } => format!("python {key}"),
            Binding::Latest { .. } => "python (latest)".to_string(),
        }
    }
}

impl ScriptRunner for ExternalRunner {
    fn execute_script(&self, script: &Path, args: &[String]) -> bool {
        let Some(interpreter) = self.resolve_interpreter() else {
            self.observer.notify(&format!(
                "{ERROR_MARKER} no installed interpreter matches {}",
                self.label()
            ));
            return false;
        };

        let mut child = match Command::new(&interpreter)
            .arg(script)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(err) => {
                self.observer.notify(&format!(
                    "{ERROR_MARKER} failed to start {}: {err}",
                    interpreter.display()
                ));
                return false;
            }
        };

        // Drain stderr on a helper thread so neither pipe can fill up and
        // stall the child; the caller still only advances once everything
        // has been consumed and the process has exited.
        let stderr_thread = child.stderr.take().map(|stream| {
            let observer = self.observer.clone();
            thread::spawn(move || {
                for line in BufReader::new(stream).lines().map_while(|line| line.ok()) {
                    observer.notify(&format!("{ERROR_MARKER} [python] {line}"));
                }
            })
        });
        if let Some(stdout) = child.stdout.take() {
            for line in BufReader::new(stdout).lines().map_while(|line| line.ok()) {
                self.observer.notify(&format!("[python] {line}"));
            }
        }
        if let Some(handle) = stderr_thread {
            let _ = handle.join();
        }

        match child.wait() {
            Ok(status) if status.success() => true,
            Ok(status) => {
                self.observer.notify(&format!(
                    "{ERROR_MARKER} script {} exited with {status}",
                    script.display()
                ));
                false
            }
            Err(err) => {
                self.observer.notify(&format!(
                    "{ERROR_MARKER} failed to wait for {}: {err}",
                    interpreter.display()
                ));
                false
            }
        }
    }
}

/// Probe well-known interpreter executable names inside an install
/// directory. Registry installs carry `python.exe`; PATH-scanned installs
/// carry versioned names like `python3.11`.
fn interpreter_in(install: &Path, key: &str) -> Option<PathBuf> {
    let mut names = Vec::new();
    if key.len() >= 2 && key.chars().all(|c| c.is_ascii_digit()) {
        // Normalized keys carry no separator; the leading digit is the
        // major version ("311" probes python3.11).
        let (major, minor) = key.split_at(1);
        names.push(format!("python{major}.{minor}"));
        names.push(format!("python{key}"));
    }
    names.extend([
        "python.exe".to_string(),
        "python3".to_string(),
        "python".to_string(),
    ]);
    names
        .into_iter()
        .map(|name| install.join(name))
        .find(|candidate| candidate.is_file())
}

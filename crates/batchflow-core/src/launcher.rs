//! Sequential batch-processor launcher.
//!
//! Invokes the external batch-processing executable once per settings
//! file, in order, streaming its output through the observer and pacing
//! successive launches by a fixed interval.

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::observer::{ERROR_MARKER, SharedObserver};

/// Launches the batch processor across an ordered list of settings files.
pub struct SubprocessLauncher {
    executable: PathBuf,
    start_interval: Duration,
    setting_files: Vec<PathBuf>,
    observer: SharedObserver,
}

impl std::fmt::Debug for SubprocessLauncher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubprocessLauncher")
            .field("executable", &self.executable)
            .field("start_interval", &self.start_interval)
            .field("setting_files", &self.setting_files)
            .finish_non_exhaustive()
    }
}

impl SubprocessLauncher {
    /// Validates the configuration before any launch is attempted: the
    /// executable path and at least one settings file must be supplied.
    pub fn new(
        executable: PathBuf,
        start_interval_seconds: u64,
        setting_files: Vec<PathBuf>,
        observer: SharedObserver,
    ) -> Result<Self> {
        if executable.as_os_str().is_empty() {
            return Err(Error::Config(
                "batch-processor executable path is not set".to_string(),
            ));
        }
        if setting_files.is_empty() {
            return Err(Error::Config(
                "run group has no settings files".to_string(),
            ));
        }
        Ok(Self {
            executable,
            start_interval: Duration::from_secs(start_interval_seconds),
            setting_files,
            observer,
        })
    }

    /// Run every configured settings file in order, waiting for each
    /// process to exit before the next starts.
    ///
    /// A nonzero exit code is reported but does not stop the loop; only a
    /// failure to start or wait on the executable does.
    pub fn launch_and_wait(&self) -> Result<()> {
        let total = self.setting_files.len();
        for (index, settings_file) in self.setting_files.iter().enumerate() {
            let launch_no = index + 1;
            self.observer.notify(&format!(
                "starting batch processor {launch_no}/{total} with settings file {}",
                settings_file.display()
            ));
            self.launch_one(launch_no, settings_file)?;

            // Pacing between launches, never after the last one. This
            // staggers load on the executable, it is not a timeout.
            if launch_no < total {
                self.observer.notify(&format!(
                    "waiting {}s before next launch",
                    self.start_interval.as_secs()
                ));
                thread::sleep(self.start_interval);
            }
        }
        Ok(())
    }

    fn launch_one(&self, launch_no: usize, settings_file: &Path) -> Result<()> {
        let mut child = Command::new(&self.executable)
            .arg("--settings_file")
            .arg(settings_file)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                Error::Launch(format!(
                    "failed to start {}: {err}",
                    self.executable.display()
                ))
            })?;

        // stderr drains on a helper thread so a chatty process cannot
        // deadlock against a full pipe while we read stdout.
        let stderr_thread = child.stderr.take().map(|stream| {
            let observer = self.observer.clone();
            thread::spawn(move || {
                for line in BufReader::new(stream).lines().map_while(|line| line.ok()) {
                    observer.notify(&format!("{ERROR_MARKER} [{launch_no}] {line}"));
                }
            })
        });
        if let Some(stdout) = child.stdout.take() {
            for line in BufReader::new(stdout).lines().map_while(|line| line.ok()) {
                self.observer.notify(&format!("[{launch_no}] {line}"));
            }
        }
        if let Some(handle) = stderr_thread {
            let _ = handle.join();
        }

        let status = child.wait().map_err(|err| {
            Error::Launch(format!(
                "failed to wait for {}: {err}",
                self.executable.display()
            ))
        })?;
        match status.code() {
            Some(0) => self
                .observer
                .notify(&format!("[{launch_no}] batch processor exited with code 0")),
            Some(code) => self.observer.notify(&format!(
                "{ERROR_MARKER} [{launch_no}] batch processor exited with code {code}"
            )),
            None => self.observer.notify(&format!(
                "{ERROR_MARKER} [{launch_no}] batch processor terminated by a signal"
            )),
        }
        Ok(())
    }
}

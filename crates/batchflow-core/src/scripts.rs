//! Ordered script batches and run-group execution.
//!
//! The service validates and dispatches script descriptors against the
//! runner registry, failing fast on the first problem, and sequences one
//! run group: optional pre-script, the batch-processor launches, optional
//! post-script.

use std::path::Path;

use crate::config::{LauncherSettings, RunGroup, ScriptDescriptor};
use crate::launcher::SubprocessLauncher;
use crate::observer::{ERROR_MARKER, SharedObserver};
use crate::runner::RunnerRegistry;

/// Runs ordered script batches against the runner registry.
pub struct ScriptExecutionService {
    observer: SharedObserver,
}

impl ScriptExecutionService {
    pub fn new(observer: SharedObserver) -> Self {
        Self { observer }
    }

    /// Execute descriptors in order.
    ///
    /// The batch passes only if every script passes. A descriptor with a
    /// missing required field, a version with no registered runner, or a
    /// failing script each stop the batch immediately; later descriptors
    /// are never invoked.
    pub fn run_scripts(&self, descriptors: &[ScriptDescriptor], registry: &RunnerRegistry) -> bool {
        for descriptor in descriptors {
            if !descriptor.is_complete() {
                self.observer.notify(&format!(
                    "{ERROR_MARKER} script entry is missing its runtime version or file path \
                     (version: {:?}, path: {:?})",
                    descriptor.version, descriptor.script_file_path
                ));
                return false;
            }
            let Some(runner) = registry.get(&descriptor.version) else {
                self.observer.notify(&format!(
                    "{ERROR_MARKER} no runtime registered for version {} (script {})",
                    descriptor.version, descriptor.script_file_path
                ));
                return false;
            };

            self.observer
                .notify(&format!("running script {}", descriptor.script_file_path));
            if !runner.execute_script(Path::new(&descriptor.script_file_path), &descriptor.args) {
                self.observer.notify(&format!(
                    "{ERROR_MARKER} script {} failed",
                    descriptor.script_file_path
                ));
                return false;
            }
            self.observer
                .notify(&format!("script {} finished", descriptor.script_file_path));
        }
        true
    }

    /// One run group: optional pre-script, one batch-processor launch per
    /// settings file, optional post-script.
    ///
    /// A failing pre-script skips the launches; launch and post-script
    /// failures are attributed in the reported message. Nonzero processor
    /// exit codes do not fail the group (the launcher only reports them).
    pub fn run_batch_processor_group(
        &self,
        group: &RunGroup,
        settings: &LauncherSettings,
        registry: &RunnerRegistry,
    ) -> bool {
        if let Some(pre) = &group.pre_script {
            if !self.run_scripts(std::slice::from_ref(pre), registry) {
                self.observer.notify(&format!(
                    "{ERROR_MARKER} pre-group script {} failed, skipping batch processor",
                    pre.script_file_path
                ));
                return false;
            }
        } else {
            self.observer.notify("no pre-group script specified");
        }

        let launcher = SubprocessLauncher::new(
            settings.batch_processor_path.clone(),
            group.start_interval,
            group.setting_files.clone(),
            self.observer.clone(),
        );
        let launched = launcher.and_then(|launcher| launcher.launch_and_wait());
        if let Err(err) = launched {
            self.observer.notify(&format!("{ERROR_MARKER} {err}"));
            return false;
        }

        if let Some(post) = &group.post_script {
            if !self.run_scripts(std::slice::from_ref(post), registry) {
                self.observer.notify(&format!(
                    "{ERROR_MARKER} post-group script {} failed",
                    post.script_file_path
                ));
                return false;
            }
        } else {
            self.observer.notify("no post-group script specified");
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::OutputObserver;
    use crate::runner::ScriptRunner;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl OutputObserver for Recorder {
        fn notify(&self, line: &str) {
            self.0.lock().unwrap().push(line.to_string());
        }
    }

    impl Recorder {
        fn lines(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    /// Runner that records how often it ran and returns a fixed result.
    struct MockRunner {
        calls: Arc<AtomicUsize>,
        result: bool,
    }

    impl MockRunner {
        fn boxed(result: bool) -> (Box<dyn ScriptRunner>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Box::new(Self {
                    calls: calls.clone(),
                    result,
                }),
                calls,
            )
        }
    }

    impl ScriptRunner for MockRunner {
        fn execute_script(&self, _script: &Path, _args: &[String]) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result
        }
    }

    fn descriptor(version: &str, path: &str) -> ScriptDescriptor {
        ScriptDescriptor {
            version: version.to_string(),
            script_file_path: path.to_string(),
            args: Vec::new(),
        }
    }

    #[test]
    fn batch_passes_when_every_script_passes() {
        let (runner, calls) = MockRunner::boxed(true);
        let registry = RunnerRegistry::from_runners([("39".to_string(), runner)]);
        let service = ScriptExecutionService::new(Arc::new(Recorder::default()));

        let batch = [descriptor("39", "a.py"), descriptor("3.9", "b.py")];
        assert!(service.run_scripts(&batch, &registry));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn batch_stops_at_first_failing_script() {
        let (failing, failing_calls) = MockRunner::boxed(false);
        let (passing, passing_calls) = MockRunner::boxed(true);
        let registry = RunnerRegistry::from_runners([
            ("27".to_string(), failing),
            ("39".to_string(), passing),
        ]);
        let service = ScriptExecutionService::new(Arc::new(Recorder::default()));

        let batch = [
            descriptor("27", "fails.py"),
            descriptor("39", "never_runs.py"),
        ];
        assert!(!service.run_scripts(&batch, &registry));
        assert_eq!(failing_calls.load(Ordering::SeqCst), 1);
        assert_eq!(passing_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn incomplete_descriptor_fails_without_invoking_any_runner() {
        let (runner, calls) = MockRunner::boxed(true);
        let registry = RunnerRegistry::from_runners([("39".to_string(), runner)]);
        let service = ScriptExecutionService::new(Arc::new(Recorder::default()));

        assert!(!service.run_scripts(&[descriptor("", "a.py")], &registry));
        assert!(!service.run_scripts(&[descriptor("39", "")], &registry));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unknown_version_fails_the_whole_batch() {
        let (runner, calls) = MockRunner::boxed(true);
        let registry = RunnerRegistry::from_runners([("39".to_string(), runner)]);
        let recorder = Arc::new(Recorder::default());
        let service = ScriptExecutionService::new(recorder.clone());

        let batch = [descriptor("2.7", "missing.py"), descriptor("39", "b.py")];
        assert!(!service.run_scripts(&batch, &registry));
        // The later descriptor is never reached.
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(
            recorder
                .lines()
                .iter()
                .any(|line| line.contains("no runtime registered"))
        );
    }

    #[test]
    fn empty_batch_passes() {
        let registry = RunnerRegistry::from_runners([]);
        let service = ScriptExecutionService::new(Arc::new(Recorder::default()));
        assert!(service.run_scripts(&[], &registry));
    }

    #[cfg(unix)]
    mod group {
        use super::*;
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use std::path::PathBuf;

        /// Fake batch processor: appends one line per invocation to a
        /// side file so tests can count launches.
        fn fake_processor(dir: &Path) -> (PathBuf, PathBuf) {
            let log = dir.join("launches.log");
            let exe = dir.join("processor.sh");
            fs::write(
                &exe,
                format!("#!/bin/sh\necho \"$2\" >> \"{}\"\n", log.display()),
            )
            .unwrap();
            fs::set_permissions(&exe, fs::Permissions::from_mode(0o755)).unwrap();
            (exe, log)
        }

        fn launches(log: &Path) -> usize {
            fs::read_to_string(log)
                .map(|text| text.lines().count())
                .unwrap_or(0)
        }

        fn group(
            pre: Option<ScriptDescriptor>,
            post: Option<ScriptDescriptor>,
            files: usize,
        ) -> RunGroup {
            RunGroup {
                start_interval: 0,
                pre_script: pre,
                post_script: post,
                setting_files: (0..files)
                    .map(|index| PathBuf::from(format!("settings_{index}.json")))
                    .collect(),
            }
        }

        fn settings(exe: PathBuf) -> LauncherSettings {
            LauncherSettings {
                batch_processor_path: exe,
                embedded_engines: Vec::new(),
                extra_search_paths: Vec::new(),
            }
        }

        #[test]
        fn group_without_pre_script_reports_and_launches() {
            let dir = tempfile::TempDir::new().unwrap();
            let (exe, log) = fake_processor(dir.path());
            let recorder = Arc::new(Recorder::default());
            let service = ScriptExecutionService::new(recorder.clone());
            let registry = RunnerRegistry::from_runners([]);

            let passed = service.run_batch_processor_group(
                &group(None, None, 2),
                &settings(exe),
                &registry,
            );
            assert!(passed);
            assert_eq!(launches(&log), 2);
            assert!(
                recorder
                    .lines()
                    .iter()
                    .any(|line| line.contains("no pre-group script specified"))
            );
        }

        #[test]
        fn failing_pre_script_skips_the_batch_processor() {
            let dir = tempfile::TempDir::new().unwrap();
            let (exe, log) = fake_processor(dir.path());
            let (failing, _) = MockRunner::boxed(false);
            let registry = RunnerRegistry::from_runners([("39".to_string(), failing)]);
            let service = ScriptExecutionService::new(Arc::new(Recorder::default()));

            let passed = service.run_batch_processor_group(
                &group(Some(descriptor("39", "pre.py")), None, 2),
                &settings(exe),
                &registry,
            );
            assert!(!passed);
            assert_eq!(launches(&log), 0);
        }

        #[test]
        fn missing_post_script_runtime_fails_after_the_launches() {
            let dir = tempfile::TempDir::new().unwrap();
            let (exe, log) = fake_processor(dir.path());
            let registry = RunnerRegistry::from_runners([]);
            let recorder = Arc::new(Recorder::default());
            let service = ScriptExecutionService::new(recorder.clone());

            let passed = service.run_batch_processor_group(
                &group(None, Some(descriptor("3.9", "post.py")), 2),
                &settings(exe),
                &registry,
            );
            // The launches already happened; the missing runtime only
            // fails the group afterwards.
            assert!(!passed);
            assert_eq!(launches(&log), 2);
            assert!(
                recorder
                    .lines()
                    .iter()
                    .any(|line| line.contains("no runtime registered"))
            );
        }

        #[test]
        fn nonzero_processor_exit_does_not_fail_the_group() {
            let dir = tempfile::TempDir::new().unwrap();
            let exe = dir.path().join("failing.sh");
            fs::write(&exe, "#!/bin/sh\nexit 7\n").unwrap();
            fs::set_permissions(&exe, fs::Permissions::from_mode(0o755)).unwrap();

            let recorder = Arc::new(Recorder::default());
            let service = ScriptExecutionService::new(recorder.clone());
            let registry = RunnerRegistry::from_runners([]);

            let passed = service.run_batch_processor_group(
                &group(None, None, 1),
                &settings(exe),
                &registry,
            );
            assert!(passed);
            assert!(
                recorder
                    .lines()
                    .iter()
                    .any(|line| line.contains("exited with code 7"))
            );
        }
    }
}

//! In-process Python engine runner.
//!
//! Runs scripts on the RustPython engine inside this process instead of
//! spawning an interpreter. A fresh engine is constructed per script and
//! torn down with it, so scripts cannot leak state into each other.

use std::fs;
use std::path::{Path, PathBuf};

use rustpython::InterpreterConfig;
use rustpython::vm::{
    self, AsObject, PyResult, TryFromObject, VirtualMachine, builtins::PyBaseExceptionRef,
    scope::Scope,
};

use crate::observer::{ERROR_MARKER, SharedObserver};

use super::ScriptRunner;

/// Source label for engine output forwarded to the observer.
const OUTPUT_TAG: &str = "[embedded python]";

/// Routes the engine's stdout/stderr into an in-memory sink. Runs in its
/// own scope so the script scope stays clean; `sys` is interpreter-wide,
/// so the script still writes into the sink.
const CAPTURE_BOOTSTRAP: &str = "import io\nimport sys\nsink = io.StringIO()\nsys.stdout = sink\nsys.stderr = sink\n";
const CAPTURE_READBACK: &str = "sink.getvalue()";

/// Runs a script on the in-process engine.
pub struct EmbeddedRunner {
    library_dir: PathBuf,
    extra_search_paths: Vec<PathBuf>,
    observer: SharedObserver,
}

impl EmbeddedRunner {
    /// `library_dir` is the engine's standard-library directory reported
    /// by discovery; `extra_search_paths` are operator-configured
    /// additions appended after it.
    pub fn new(
        library_dir: PathBuf,
        extra_search_paths: Vec<PathBuf>,
        observer: SharedObserver,
    ) -> Self {
        Self {
            library_dir,
            extra_search_paths,
            observer,
        }
    }

    /// Search paths and argv must be in place before the engine runs the
    /// script. Path order: script directory, standard library, extras.
    fn settings_for(&self, script: &Path, args: &[String]) -> vm::Settings {
        let mut settings = vm::Settings::default();
        if let Some(dir) = script.parent() {
            settings.path_list.push(dir.display().to_string());
        }
        settings
            .path_list
            .push(self.library_dir.display().to_string());
        settings.path_list.extend(
            self.extra_search_paths
                .iter()
                .map(|path| path.display().to_string()),
        );
        if !args.is_empty() {
            // argv[0] is the script itself.
            settings.argv = std::iter::once(script.display().to_string())
                .chain(args.iter().cloned())
                .collect();
        }
        settings
    }
}

impl ScriptRunner for EmbeddedRunner {
    fn execute_script(&self, script: &Path, args: &[String]) -> bool {
        let source = match fs::read_to_string(script) {
            Ok(source) => source,
            Err(err) => {
                self.observer.notify(&format!(
                    "{ERROR_MARKER} cannot read script {}: {err}",
                    script.display()
                ));
                return false;
            }
        };

        let interpreter = InterpreterConfig::new()
            .settings(self.settings_for(script, args))
            .init_stdlib()
            .interpreter();

        let (passed, captured) = interpreter.enter(|vm| {
            let capture = match redirect_streams(vm) {
                Ok(capture) => Some(capture),
                Err(_) => {
                    self.observer
                        .notify(&format!("{ERROR_MARKER} engine output capture unavailable"));
                    None
                }
            };

            let result = run_source(vm, &source, script);
            let captured = capture.and_then(|capture| sink_contents(vm, &capture));

            let passed = match result {
                Ok(()) => true,
                Err(exc) => match system_exit_code(vm, &exc) {
                    // An explicit zero exit is success, nothing further.
                    Some(0) => true,
                    Some(code) => {
                        self.observer.notify(&format!(
                            "{ERROR_MARKER} script {} exited with code {code}",
                            script.display()
                        ));
                        false
                    }
                    None => {
                        let mut rendered = String::new();
                        if vm.write_exception(&mut rendered, &exc).is_ok() {
                            self.observer
                                .notify(&format!("{ERROR_MARKER} {}", rendered.trim_end()));
                        } else {
                            self.observer.notify(&format!(
                                "{ERROR_MARKER} script {} raised an unprintable error",
                                script.display()
                            ));
                        }
                        false
                    }
                },
            };
            (passed, captured)
        });

        // Engine output is buffered in memory during the run and
        // forwarded once the script has finished.
        if let Some(text) = captured {
            for line in text.lines() {
                self.observer.notify(&format!("{OUTPUT_TAG} {line}"));
            }
        }
        passed
    }
}

/// Compile and run the script file in a fresh module scope with
/// `__file__` pointing at it.
fn run_source(vm: &VirtualMachine, source: &str, script: &Path) -> PyResult<()> {
    let path = script.display().to_string();
    let scope = vm.new_scope_with_builtins();
    scope
        .globals
        .set_item("__file__", vm.new_pyobj(path.clone()), vm)?;
    let code = vm
        .compile(source, vm::compiler::Mode::Exec, path)
        .map_err(|err| vm.new_syntax_error(&err, Some(source)))?;
    vm.run_code_obj(code, scope)?;
    Ok(())
}

/// Install the in-memory output sink, returning the scope that owns it.
fn redirect_streams(vm: &VirtualMachine) -> PyResult<Scope> {
    let scope = vm.new_scope_with_builtins();
    let code = vm
        .compile(
            CAPTURE_BOOTSTRAP,
            vm::compiler::Mode::Exec,
            "<output-capture>".to_owned(),
        )
        .map_err(|err| vm.new_syntax_error(&err, Some(CAPTURE_BOOTSTRAP)))?;
    vm.run_code_obj(code, scope.clone())?;
    Ok(scope)
}

/// Everything the script wrote to either stream, as UTF-8 text.
fn sink_contents(vm: &VirtualMachine, capture: &Scope) -> Option<String> {
    let code = vm
        .compile(
            CAPTURE_READBACK,
            vm::compiler::Mode::Eval,
            "<output-capture>".to_owned(),
        )
        .ok()?;
    let value = vm.run_code_obj(code, capture.clone()).ok()?;
    let text = value.str(vm).ok()?;
    let text = text.as_str();
    (!text.is_empty()).then(|| text.to_owned())
}

/// Exit code of a `SystemExit`, or `None` for any other exception.
///
/// `sys.exit()` and `sys.exit(None)` count as zero; a non-integer code
/// counts as failure, matching interpreter behavior.
fn system_exit_code(vm: &VirtualMachine, exc: &PyBaseExceptionRef) -> Option<i32> {
    if !exc.fast_isinstance(vm.ctx.exceptions.system_exit) {
        return None;
    }
    let args = exc.args();
    match args.as_slice() {
        [] => Some(0),
        [code] if vm.is_none(code) => Some(0),
        [code] => Some(i32::try_from_object(vm, code.clone()).unwrap_or(1)),
        _ => Some(1),
    }
}

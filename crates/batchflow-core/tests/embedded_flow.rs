//! Flow execution against the in-process engine.
//!
//! Builds a real registry (no discovered interpreters, one embedded
//! install) and runs scripts through the whole orchestrator.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use batchflow_core::{
    EMBEDDED_FAMILY, EmbeddedInstall, FlowConfiguration, FlowOrchestrator, LauncherSettings,
    OutputObserver, RunnerRegistry, ScriptDescriptor, SharedObserver,
};

#[derive(Default)]
struct Recorder(Mutex<Vec<String>>);

impl OutputObserver for Recorder {
    fn notify(&self, line: &str) {
        self.0.lock().unwrap().push(line.to_string());
    }
}

/// Engine install with an empty `Lib` directory plus launcher settings
/// pointing at it.
fn engine_fixture(dir: &Path) -> LauncherSettings {
    let install = dir.join("engine34");
    fs::create_dir_all(install.join("Lib")).unwrap();
    LauncherSettings {
        batch_processor_path: PathBuf::from("processor"),
        embedded_engines: vec![EmbeddedInstall {
            version: "3.4".into(),
            install_path: install,
        }],
        extra_search_paths: Vec::new(),
    }
}

fn registry_for(settings: &LauncherSettings, observer: SharedObserver) -> RunnerRegistry {
    RunnerRegistry::build(&BTreeMap::new(), settings, observer).unwrap()
}

fn engine_script(version: &str, path: &Path) -> ScriptDescriptor {
    ScriptDescriptor {
        version: version.to_string(),
        script_file_path: path.display().to_string(),
        args: Vec::new(),
    }
}

#[test]
fn pre_flow_script_runs_on_the_embedded_engine() {
    let dir = tempfile::TempDir::new().unwrap();
    let settings = engine_fixture(dir.path());
    let script = dir.path().join("prepare.py");
    fs::write(&script, "print('prepared')\n").unwrap();

    let recorder = Arc::new(Recorder::default());
    let registry = registry_for(&settings, recorder.clone());

    let flow = FlowConfiguration {
        pre_flow_scripts: vec![engine_script(EMBEDDED_FAMILY, &script)],
        ..Default::default()
    };
    FlowOrchestrator::new(recorder.clone())
        .launch(&settings, &flow, &registry)
        .unwrap();

    let lines = recorder.0.lock().unwrap();
    assert!(lines.iter().any(|line| line.contains("prepared")));
    assert!(lines.iter().any(|line| line == "flow finished"));
}

#[test]
fn failing_embedded_script_aborts_the_flow() {
    let dir = tempfile::TempDir::new().unwrap();
    let settings = engine_fixture(dir.path());
    let script = dir.path().join("bail.py");
    fs::write(&script, "import sys\nsys.exit(2)\n").unwrap();

    let recorder = Arc::new(Recorder::default());
    let registry = registry_for(&settings, recorder.clone());

    let flow = FlowConfiguration {
        pre_flow_scripts: vec![engine_script(EMBEDDED_FAMILY, &script)],
        ..Default::default()
    };
    let err = FlowOrchestrator::new(recorder)
        .launch(&settings, &flow, &registry)
        .unwrap_err();
    assert!(err.to_string().contains("pre-flow"));
}

#[test]
fn engine_lookup_ignores_version_separators_in_the_family_key() {
    let dir = tempfile::TempDir::new().unwrap();
    let settings = engine_fixture(dir.path());
    let recorder: SharedObserver = Arc::new(Recorder::default());
    let registry = registry_for(&settings, recorder);

    // The family name carries no separators, so normalization leaves it
    // untouched; both spellings address the same entry.
    assert!(registry.get(EMBEDDED_FAMILY).is_some());
    assert!(registry.get("rustpython").is_some());
    assert!(registry.get("pypy").is_none());
}

//! Flow configuration and launcher settings documents.
//!
//! Both documents are JSON, loaded once at process start and read-only
//! afterwards. The flow configuration describes what to run; the launcher
//! settings describe the batch-processor executable and the embedded
//! engine installs.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

/// One script to run: which runtime version, which file, which arguments.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScriptDescriptor {
    /// Runtime-version string, e.g. `"3.11"`, `"311"` or a family name
    /// like `"rustpython"`. Separators are stripped at lookup time.
    pub version: String,
    /// Path of the script file to execute.
    pub script_file_path: String,
    /// Arguments passed to the script, in order.
    pub args: Vec<String>,
}

impl ScriptDescriptor {
    /// Both the runtime version and the script path are required for the
    /// descriptor to be executable. A descriptor missing either is a
    /// configuration error, not a runtime failure.
    pub fn is_complete(&self) -> bool {
        !self.version.is_empty() && !self.script_file_path.is_empty()
    }
}

/// One unit of work: optional pre-script, one batch-processor launch per
/// settings file, optional post-script.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunGroup {
    /// Seconds to wait between successive launches within the group.
    /// Never applied after the last settings file.
    pub start_interval: u64,
    #[serde(default)]
    pub pre_script: Option<ScriptDescriptor>,
    #[serde(default)]
    pub post_script: Option<ScriptDescriptor>,
    /// Settings files, one batch-processor launch each, in order.
    pub setting_files: Vec<PathBuf>,
}

/// The whole orchestrated run. Order is significant everywhere and is
/// preserved exactly as configured.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FlowConfiguration {
    pub pre_flow_scripts: Vec<ScriptDescriptor>,
    pub run_groups: Vec<RunGroup>,
    pub post_flow_scripts: Vec<ScriptDescriptor>,
}

/// One install of the embedded-engine family.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddedInstall {
    pub version: String,
    pub install_path: PathBuf,
}

/// Host-application settings: the executable whose repeated invocations
/// are the unit of work, plus embedded-engine installs.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LauncherSettings {
    /// Path of the batch-processor executable.
    pub batch_processor_path: PathBuf,
    /// Embedded-engine installs; only the highest version is used.
    #[serde(default)]
    pub embedded_engines: Vec<EmbeddedInstall>,
    /// Extra script search paths appended for the embedded engine.
    #[serde(default)]
    pub extra_search_paths: Vec<PathBuf>,
}

/// Load the flow configuration document.
pub fn load_flow_configuration(path: &Path) -> Result<FlowConfiguration> {
    load_document(path)
}

/// Load the launcher settings document.
pub fn load_launcher_settings(path: &Path) -> Result<LauncherSettings> {
    load_document(path)
}

fn load_document<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)
        .map_err(|err| Error::Config(format!("cannot read {}: {}", path.display(), err)))?;
    serde_json::from_str(&text).map_err(|source| Error::ConfigParse {
        path: path.display().to_string(),
        source,
    })
}

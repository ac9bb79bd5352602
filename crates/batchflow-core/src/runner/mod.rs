//! Script runners and the version-keyed runner registry.
//!
//! A [`ScriptRunner`] executes one script file against one scripting
//! runtime. New runtime families are added by registering another
//! implementation, never by branching on type.

mod embedded;
mod external;

pub use embedded::EmbeddedRunner;
pub use external::ExternalRunner;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::LauncherSettings;
use crate::discovery;
use crate::error::{Error, Result};
use crate::observer::SharedObserver;

/// Registry key of the in-process engine family. Version-independent:
/// only the latest configured install is ever used.
pub const EMBEDDED_FAMILY: &str = "rustpython";

/// Registry key of the unversioned external-interpreter entry, resolving
/// to the latest discovered install at call time.
pub const EXTERNAL_FAMILY: &str = "cpython";

/// Executes a single script file against one scripting-runtime variant.
///
/// Synchronous and blocking until the script finishes. The boolean result
/// is the entire contract to callers: `true` only if the script ran to
/// completion without a nonzero exit or an uncaught error.
pub trait ScriptRunner: Send + Sync {
    fn execute_script(&self, script: &Path, args: &[String]) -> bool;
}

/// Strip separator characters so `"3.10"` and `"310"` address the same
/// registry entry. Idempotent, case-preserving.
pub fn normalize_version_key(version: &str) -> String {
    version
        .chars()
        .filter(|c| !matches!(c, '.' | '-' | '_'))
        .collect()
}

/// Immutable mapping from normalized version key to script runner.
///
/// Built once per process run, after discovery; lookups never mutate it.
pub struct RunnerRegistry {
    runners: BTreeMap<String, Box<dyn ScriptRunner>>,
}

impl std::fmt::Debug for RunnerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunnerRegistry")
            .field("runners", &self.runners.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl RunnerRegistry {
    /// Build the registry from discovered interpreter installs and the
    /// launcher settings' embedded-engine descriptors.
    ///
    /// One external entry is added per discovered version, plus the
    /// always-available unversioned entry under [`EXTERNAL_FAMILY`]. The
    /// embedded entry under [`EMBEDDED_FAMILY`] is added when at least
    /// one embedded install is configured; a configured install whose
    /// standard-library directory cannot be determined is a fatal
    /// configuration error, raised here before any script runs.
    pub fn build(
        discovered: &BTreeMap<String, PathBuf>,
        settings: &LauncherSettings,
        observer: SharedObserver,
    ) -> Result<Self> {
        let mut runners: BTreeMap<String, Box<dyn ScriptRunner>> = BTreeMap::new();

        for (key, install) in discovered {
            runners.insert(
                normalize_version_key(key),
                Box::new(ExternalRunner::new(
                    key.clone(),
                    install.clone(),
                    observer.clone(),
                )),
            );
        }
        runners.insert(
            EXTERNAL_FAMILY.to_string(),
            Box::new(ExternalRunner::unversioned(
                discovered.clone(),
                observer.clone(),
            )),
        );

        if !settings.embedded_engines.is_empty() {
            let library = discovery::latest_embedded_library(&settings.embedded_engines)
                .ok_or_else(|| {
                    Error::Config(
                        "embedded engine standard-library directory could not be determined"
                            .to_string(),
                    )
                })?;
            runners.insert(
                EMBEDDED_FAMILY.to_string(),
                Box::new(EmbeddedRunner::new(
                    library,
                    settings.extra_search_paths.clone(),
                    observer,
                )),
            );
        }

        Ok(Self { runners })
    }

    /// Assemble a registry from pre-built runners. Keys are normalized.
    pub fn from_runners(
        runners: impl IntoIterator<Item = (String, Box<dyn ScriptRunner>)>,
    ) -> Self {
        Self {
            runners: runners
                .into_iter()
                .map(|(key, runner)| (normalize_version_key(&key), runner))
                .collect(),
        }
    }

    /// Look up a runner by runtime-version string.
    ///
    /// A miss is a configuration error surfaced by the caller, not here.
    pub fn get(&self, version: &str) -> Option<&dyn ScriptRunner> {
        self.runners
            .get(&normalize_version_key(version))
            .map(|runner| runner.as_ref())
    }

    /// Registered normalized keys, in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.runners.keys().map(|key| key.as_str())
    }
}

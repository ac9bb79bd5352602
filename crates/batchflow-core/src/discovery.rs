//! Installed scripting-runtime discovery.
//!
//! Enumerates CPython installs from the host environment and picks the
//! latest version. The lookup mechanism sits behind [`RuntimeLocator`] so
//! each platform can plug in its own scan without touching callers:
//! Windows reads the interpreter registry hives, everything else scans
//! `PATH` for versioned executables.
//!
//! Discovery never fails hard: scan errors are logged and whatever was
//! collected up to that point is returned. An empty mapping just means
//! nothing is installed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::EmbeddedInstall;
use crate::runner::normalize_version_key;

/// Host-environment lookup for installed interpreter versions.
///
/// Returns a mapping from normalized version key to install directory.
pub trait RuntimeLocator {
    fn installed_runtimes(&self) -> BTreeMap<String, PathBuf>;
}

/// The locator for the current platform.
pub fn default_locator() -> Box<dyn RuntimeLocator> {
    #[cfg(windows)]
    {
        Box::new(RegistryLocator)
    }
    #[cfg(not(windows))]
    {
        Box::new(PathScanLocator)
    }
}

/// Pick the highest installed version from a discovery mapping.
///
/// Ordering is numeric on a `(major, minor)` rank, never lexicographic:
/// `{"27","35","39"}` selects `"39"`, and `{"2","10"}` selects `"10"`.
pub fn latest_version(map: &BTreeMap<String, PathBuf>) -> Option<(&str, &Path)> {
    map.iter()
        .max_by_key(|(key, _)| version_rank(key))
        .map(|(key, path)| (key.as_str(), path.as_path()))
}

/// Numeric rank for a version key.
///
/// A key still carrying a separator splits into major and minor parts; a
/// bare digit run counts as one whole major number, so `"39"` (from a
/// `Python39` install directory) ranks below `"310"`.
fn version_rank(key: &str) -> (u64, u64) {
    match key.split_once(['.', '-', '_']) {
        Some((major, minor)) => (parse_digits(major), parse_digits(minor)),
        None => (parse_digits(key), 0),
    }
}

fn parse_digits(text: &str) -> u64 {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}

/// Extract a version key from an install directory named `Python<digits>`.
///
/// The registry stores install paths like `C:\Python39\`; the version is
/// carried by the directory name, not the registry key.
pub fn version_key_from_install_dir(install: &Path) -> Option<String> {
    let name = install.file_name()?.to_str()?;
    let rest = name.split("Python").nth(1)?;
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    (!digits.is_empty()).then_some(digits)
}

/// Library directory of the highest-version embedded-engine install.
///
/// The embedded family is used in-process, so discovery reports a single
/// library path for seeding script search paths rather than per-version
/// executables. Returns `None` when no install is usable; callers treat
/// that as a fatal configuration condition once a script asks for the
/// engine.
pub fn latest_embedded_library(installs: &[EmbeddedInstall]) -> Option<PathBuf> {
    let best = installs
        .iter()
        .max_by_key(|install| version_rank(&install.version))?;
    let lib = best.install_path.join("Lib");
    if lib.is_dir() {
        return Some(lib);
    }
    best.install_path
        .is_dir()
        .then(|| best.install_path.clone())
}

/// Reads CPython install locations from the Windows registry.
///
/// Scans the `Python\PythonCore` hives (native and Wow6432Node) under
/// both `HKEY_LOCAL_MACHINE` and `HKEY_CURRENT_USER`; current-user
/// entries win when a version key collides.
#[cfg(windows)]
pub struct RegistryLocator;

#[cfg(windows)]
impl RuntimeLocator for RegistryLocator {
    fn installed_runtimes(&self) -> BTreeMap<String, PathBuf> {
        use winreg::RegKey;
        use winreg::enums::{HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE};

        const HIVE_PATHS: [&str; 2] = [
            r"SOFTWARE\Python\PythonCore",
            r"SOFTWARE\Wow6432Node\Python\PythonCore",
        ];

        let mut found = BTreeMap::new();
        // Machine-wide first so user-scoped entries overwrite on collision.
        for root in [HKEY_LOCAL_MACHINE, HKEY_CURRENT_USER] {
            let root = RegKey::predef(root);
            for hive_path in HIVE_PATHS {
                let Ok(core) = root.open_subkey(hive_path) else {
                    continue;
                };
                for version in core.enum_keys().filter_map(|key| key.ok()) {
                    let install_path: std::io::Result<String> = core
                        .open_subkey(format!(r"{version}\InstallPath"))
                        .and_then(|key| key.get_value(""));
                    match install_path {
                        Ok(install_path) => {
                            let install = PathBuf::from(install_path);
                            if let Some(key) = version_key_from_install_dir(&install) {
                                found.insert(key, install);
                            }
                        }
                        Err(err) => {
                            tracing::warn!(
                                "skipping python registry entry {version}: {err}"
                            );
                        }
                    }
                }
            }
        }
        found
    }
}

/// Scans `PATH` directories for versioned interpreter executables
/// (`python3.11`, `python311`, `python39.exe`).
pub struct PathScanLocator;

impl RuntimeLocator for PathScanLocator {
    fn installed_runtimes(&self) -> BTreeMap<String, PathBuf> {
        let mut found = BTreeMap::new();
        let Some(path_var) = std::env::var_os("PATH") else {
            return found;
        };
        for dir in std::env::split_paths(&path_var) {
            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(err) => {
                    tracing::debug!("skipping PATH entry {}: {err}", dir.display());
                    continue;
                }
            };
            for entry in entries.filter_map(|entry| entry.ok()) {
                let name = entry.file_name();
                let Some(name) = name.to_str() else { continue };
                if let Some(key) = version_key_from_exe_name(name) {
                    // First hit on PATH wins, matching interpreter lookup order.
                    found.entry(key).or_insert_with(|| dir.clone());
                }
            }
        }
        found
    }
}

/// Version key carried by an executable name like `python3.11`,
/// `python311`, or `python39.exe`.
fn version_key_from_exe_name(name: &str) -> Option<String> {
    let stem = name.strip_suffix(".exe").unwrap_or(name);
    let rest = stem.strip_prefix("python")?;
    if rest.is_empty() || !rest.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    Some(normalize_version_key(rest))
}

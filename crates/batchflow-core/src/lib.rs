//! Core engine for the batchflow batch-processor launcher.
//!
//! This crate provides:
//! - Flow orchestration: pre-flow scripts, run groups, post-flow scripts
//! - Script runners for installed CPython interpreters and the in-process engine
//! - Sequential batch-processor launching with inter-launch pacing
//! - Installed-runtime discovery
//!
//! Everything runs strictly sequentially; there is no cancellation and no
//! retry. Lower layers report failure as booleans through the status
//! observer, and the [`FlowOrchestrator`] converts the first failed stage
//! into an [`Error`].

pub mod config;
pub mod discovery;
pub mod error;
pub mod flow;
pub mod launcher;
pub mod observer;
pub mod runner;
pub mod scripts;

pub use config::{
    EmbeddedInstall, FlowConfiguration, LauncherSettings, RunGroup, ScriptDescriptor,
};
pub use error::{Error, Result};
pub use flow::FlowOrchestrator;
pub use launcher::SubprocessLauncher;
pub use observer::{ERROR_MARKER, NullObserver, OutputObserver, SharedObserver};
pub use runner::{
    EMBEDDED_FAMILY, EXTERNAL_FAMILY, EmbeddedRunner, ExternalRunner, RunnerRegistry,
    ScriptRunner, normalize_version_key,
};
pub use scripts::ScriptExecutionService;

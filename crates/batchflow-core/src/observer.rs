//! Status output channel shared by every pipeline component.
//!
//! All layers report progress as plain human-readable lines through an
//! [`OutputObserver`] handed to them at construction time. There is no
//! global sink; tests install a recording observer, the CLI installs a
//! terminal-facing one.

use std::sync::Arc;

/// Token observers may look for to highlight failure lines.
///
/// The status channel carries free text; this marker is the only
/// structure lower layers guarantee.
pub const ERROR_MARKER: &str = "[ERROR]";

/// Receives human-readable status lines from all pipeline layers.
pub trait OutputObserver: Send + Sync {
    /// Called with one status line, without a trailing newline.
    fn notify(&self, line: &str);
}

/// Shared observer handle threaded through component constructors.
pub type SharedObserver = Arc<dyn OutputObserver>;

/// Observer that drops every line.
///
/// Stands in where status output is not wanted, e.g. library embedders
/// that only care about the boolean/error results.
#[derive(Default)]
pub struct NullObserver;

impl OutputObserver for NullObserver {
    fn notify(&self, _line: &str) {}
}

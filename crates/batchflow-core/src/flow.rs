//! Top-level flow pipeline.
//!
//! Sequences pre-flow scripts, run groups, and post-flow scripts, all
//! strictly in configured order. Lower layers report failure as booleans;
//! this is the single place that converts a failed stage into an error,
//! caught at the binary boundary.

use crate::config::{FlowConfiguration, LauncherSettings};
use crate::error::{Error, Result};
use crate::observer::SharedObserver;
use crate::runner::RunnerRegistry;
use crate::scripts::ScriptExecutionService;

/// Runs one whole flow against a built runner registry.
pub struct FlowOrchestrator {
    scripts: ScriptExecutionService,
    observer: SharedObserver,
}

impl FlowOrchestrator {
    pub fn new(observer: SharedObserver) -> Self {
        Self {
            scripts: ScriptExecutionService::new(observer.clone()),
            observer,
        }
    }

    /// Execute the flow: pre-flow scripts, every run group in order,
    /// post-flow scripts.
    ///
    /// Stops at the first failed stage and returns it as [`Error::Flow`];
    /// there is no partial-success state to resume from.
    pub fn launch(
        &self,
        settings: &LauncherSettings,
        flow: &FlowConfiguration,
        registry: &RunnerRegistry,
    ) -> Result<()> {
        self.observer.notify("starting flow");

        if flow.pre_flow_scripts.is_empty() {
            self.observer.notify("no pre-flow scripts specified");
        } else if !self.scripts.run_scripts(&flow.pre_flow_scripts, registry) {
            return Err(Error::Flow("a pre-flow script failed".to_string()));
        }

        if flow.run_groups.is_empty() {
            // Not an error: the flow proceeds straight to post-flow scripts.
            self.observer.notify("flow contains no run groups");
        }
        let total = flow.run_groups.len();
        for (index, group) in flow.run_groups.iter().enumerate() {
            let group_no = index + 1;
            self.observer
                .notify(&format!("starting run group {group_no} of {total}"));
            if !self
                .scripts
                .run_batch_processor_group(group, settings, registry)
            {
                return Err(Error::Flow(format!("run group {group_no} failed")));
            }
            self.observer
                .notify(&format!("run group {group_no} finished"));
        }

        if flow.post_flow_scripts.is_empty() {
            self.observer.notify("no post-flow scripts specified");
        } else if !self.scripts.run_scripts(&flow.post_flow_scripts, registry) {
            return Err(Error::Flow("a post-flow script failed".to_string()));
        }

        self.observer.notify("flow finished");
        Ok(())
    }
}

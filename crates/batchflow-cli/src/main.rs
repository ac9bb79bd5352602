//! batchflow CLI - sequential batch-processor flow launcher.

mod colors;
mod observer;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use batchflow_core::{
    ERROR_MARKER, FlowOrchestrator, RunnerRegistry, SharedObserver, config, discovery,
};
use observer::ConsoleObserver;

#[derive(Parser)]
#[command(name = "batchflow")]
#[command(about = "Runs batch-processor flows with pre/post scripting hooks")]
#[command(version)]
struct Cli {
    /// Path to the flow configuration document
    #[arg(long)]
    flow: PathBuf,

    /// Path to the launcher settings document
    #[arg(long)]
    settings: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let observer: SharedObserver = Arc::new(ConsoleObserver::new());
    let exit_code = match run(&cli, observer.clone()) {
        Ok(()) => 0,
        Err(err) => {
            // The status channel is the user-facing surface; the error
            // lands there too, then the process exits nonzero.
            observer.notify(&format!("{ERROR_MARKER} {err:#}"));
            1
        }
    };
    observer::flush();
    std::process::exit(exit_code);
}

fn run(cli: &Cli, observer: SharedObserver) -> anyhow::Result<()> {
    let settings = config::load_launcher_settings(&cli.settings)?;
    let flow = config::load_flow_configuration(&cli.flow)?;

    let discovered = discovery::default_locator().installed_runtimes();
    if discovered.is_empty() {
        tracing::warn!("no installed python interpreters found");
    } else {
        tracing::debug!("discovered python versions: {:?}", discovered.keys());
    }

    let registry = RunnerRegistry::build(&discovered, &settings, observer.clone())?;
    let orchestrator = FlowOrchestrator::new(observer);
    orchestrator.launch(&settings, &flow, &registry)?;
    Ok(())
}

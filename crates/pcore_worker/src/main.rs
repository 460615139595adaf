//! pcore-worker
//!
//! Long-lived child process spawned by the worker-pool backend.
//! Reads framed `HostMessage`s from stdin, writes framed
//! `WorkerMessage`s to stdout.
//!
//! Usage:
//!     pcore-worker --artifact-root ./artifacts

use clap::Parser;
use pcore_logging::{init_logging, LogConfig};
use pcore_worker::{run_worker_loop, StaticHandlerRegistry, WorkerOptions};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "pcore-worker", about = "Plugin execution core worker process")]
struct Args {
    /// Directory the artifact broker publishes into.
    #[arg(long, default_value = "artifacts")]
    artifact_root: PathBuf,

    /// Log intended filesystem writes instead of performing them.
    #[arg(long)]
    dry_run: bool,

    /// Emit debug-level logs to stderr in addition to the rolling file log.
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // A worker talks to its parent over stdout; any stray log line on
    // that pipe would corrupt the wire protocol, so the console half
    // of the logging stack must stay on stderr (pcore_logging does
    // this by default) and file output goes to the shared runtime home.
    if let Err(err) = init_logging(LogConfig { app_name: "pcore-worker", verbose: args.verbose, tui_mode: false }) {
        eprintln!("failed to initialise logging: {err:#}");
    }

    tracing::info!(artifact_root = %args.artifact_root.display(), dry_run = args.dry_run, "starting pcore-worker");

    // The real dynamic handler-loading mechanism is supplied by an
    // embedding host; this binary is the reference entry point and
    // wires up an empty registry that the host extends before the
    // first `execute` message arrives over a real deployment's
    // transport, or that tests populate directly against the library.
    let loader: Arc<dyn pcore_worker::HandlerLoader> = Arc::new(StaticHandlerRegistry::new());

    let opts = WorkerOptions { artifact_base: args.artifact_root, dry_run: args.dry_run };

    run_worker_loop(tokio::io::stdin(), tokio::io::stdout(), loader, opts).await;

    Ok(())
}

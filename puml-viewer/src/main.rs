//! puml-viewer - Tabbed preview window for PlantUML diagrams.
//!
//! A second launch detects the running instance through the advisory lock
//! and forwards its file arguments over the IPC socket instead of opening
//! another window.

mod app;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use app::ViewerApp;
use puml_core::{
    config, send_to_running_instance, validate_files, AppContext, InstanceLock, IpcServer,
    RendererSet,
};

/// Tabbed viewer for PlantUML diagrams with auto-refresh on file change.
#[derive(Parser, Debug)]
#[command(name = "puml-viewer")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "\
Supported file types: .puml, .plantuml, .pu
Files with other extensions are accepted with a warning.

Keys:
  Tab / Right arrow    next tab
  Left arrow           previous tab
  Ctrl+W               close current tab")]
struct Args {
    /// PlantUML files to open
    files: Vec<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> eframe::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let candidates: Vec<String> = args
        .files
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();
    let files = validate_files(&candidates);
    if !args.files.is_empty() && files.is_empty() {
        warn!("no valid PlantUML files among the arguments");
    }

    let lock_path = config::default_lock_path();
    let socket_path = config::default_socket_path();

    // Hand off to an already-running instance instead of opening a second
    // window. If the hand-off fails, fall through and start our own.
    if InstanceLock::is_running(&lock_path) {
        info!(
            "detected a running instance; forwarding {} file(s)",
            files.len()
        );
        match send_to_running_instance(&socket_path, &files) {
            Ok(()) => return Ok(()),
            Err(e) => warn!(
                "could not forward to the running instance: {}; starting a new window",
                e
            ),
        }
    }

    // A lock failure is reported but does not abort the launch; we just run
    // without the single-instance guarantee.
    let lock = match InstanceLock::acquire(&lock_path) {
        Ok(lock) => Some(lock),
        Err(e) => {
            warn!("could not acquire instance lock: {}", e);
            None
        }
    };

    // The IPC server starts before the window exists; handlers defer their
    // hand-off until the session marks itself ready.
    let (ctx, events) = AppContext::new();
    let server = match IpcServer::spawn(&socket_path, ctx.clone()) {
        Ok(server) => Some(server),
        Err(e) => {
            warn!(
                "could not start IPC server: {}; later launches will open their own windows",
                e
            );
            None
        }
    };

    let renderer = Arc::new(RendererSet::discover());

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([800.0, 600.0])
            .with_title("PlantUML Viewer"),
        // Don't block when window is not visible (prevents "not responding" on focus loss)
        vsync: false,
        ..Default::default()
    };

    eframe::run_native(
        "PlantUML Viewer",
        options,
        Box::new(move |cc| {
            Ok(Box::new(ViewerApp::new(
                cc, ctx, events, renderer, files, lock, server,
            )))
        }),
    )
}

//! puml-core - Core library for the PlantUML viewer.
//!
//! Provides the non-GUI machinery of the viewer: the single-instance
//! advisory lock, the Unix-socket channel that hands file arguments from a
//! new launch to the running instance, per-file change watchers, the
//! open-file registry and the external-renderer boundary. The GUI is a
//! collaborator that owns a [`SessionRegistry`] on its UI-affine thread
//! and drains the [`AppEvent`] queue; background tasks never touch view
//! state directly.

pub mod config;
pub mod context;
pub mod error;
pub mod ipc;
pub mod lock;
pub mod render;
pub mod session;
pub mod validate;
pub mod watch;

// Re-exports for convenience
pub use context::{AppContext, AppEvent};
pub use error::{Result, ViewerError};
pub use ipc::{send_to_running_instance, IpcServer};
pub use lock::InstanceLock;
pub use render::{RenderResult, RenderStrategy, RendererSet};
pub use session::{OpenOutcome, SessionRegistry};
pub use validate::validate_files;
pub use watch::FileWatcher;

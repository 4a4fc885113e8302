//! Tuned constants and well-known paths.
//!
//! The intervals and deadlines here are empirically tuned for a manual
//! edit-preview workflow; no correctness invariant depends on their exact
//! values.

use std::path::PathBuf;
use std::time::Duration;

/// How often each file watcher polls for changes.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Minimum gap between two triggered reloads of the same file.
pub const RELOAD_COOLDOWN: Duration = Duration::from_secs(1);

/// Server-side deadline for reading a forwarded file list.
pub const IPC_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Server-side deadline for writing the acknowledgement.
pub const IPC_WRITE_TIMEOUT: Duration = Duration::from_secs(2);

/// Client-side deadline for writing the file list.
pub const IPC_SEND_TIMEOUT: Duration = Duration::from_secs(3);

/// Client-side deadline for the acknowledgement to arrive.
pub const IPC_ACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Receive buffer for one forwarded request. A practical cap, not a
/// protocol limit.
pub const IPC_RECV_BUFFER: usize = 4096;

/// Interval between readiness checks while the window is still starting.
pub const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How many readiness checks a connection handler makes before giving up.
pub const READY_POLL_ATTEMPTS: usize = 50;

/// File extensions recognised as PlantUML sources. Files with other
/// extensions are accepted with a warning.
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["puml", "plantuml", "pu"];

/// Default location of the single-instance lock file.
pub fn default_lock_path() -> PathBuf {
    std::env::temp_dir().join("pumlviewer.lock")
}

/// Default location of the IPC socket.
pub fn default_socket_path() -> PathBuf {
    std::env::temp_dir().join("pumlviewer.sock")
}

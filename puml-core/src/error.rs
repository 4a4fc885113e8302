//! Error types for the viewer core.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the viewer core.
#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("another instance already holds the lock at {path}")]
    LockHeld { path: PathBuf },

    #[error("no PlantUML renderer found ({probed} locations probed); install plantuml.jar or the plantuml command")]
    RendererNotFound { probed: usize },

    #[error("renderer `{command}` failed ({status}): {stderr}")]
    RendererFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("renderer produced no PNG output in {dir}")]
    OutputMissing { dir: PathBuf },

    #[error("failed to decode rendered image: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("IPC failure: {message}")]
    Ipc { message: String },

    #[error("file vanished before it could be opened: {path}")]
    FileVanished { path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for viewer core operations.
pub type Result<T> = std::result::Result<T, ViewerError>;

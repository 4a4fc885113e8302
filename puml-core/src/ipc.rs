//! Inter-process file hand-off over a Unix domain socket.
//!
//! Wire format: one connection per forwarded launch, carrying newline-
//! separated file paths as raw bytes, answered with `OK` or `ERROR: …`.
//! Requests on one connection are handled in arrival order; concurrent
//! connections may be serviced in any order relative to each other.

use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::{
    IPC_ACK_TIMEOUT, IPC_READ_TIMEOUT, IPC_RECV_BUFFER, IPC_SEND_TIMEOUT, IPC_WRITE_TIMEOUT,
    READY_POLL_ATTEMPTS, READY_POLL_INTERVAL,
};
use crate::context::{AppContext, AppEvent};
use crate::error::{Result, ViewerError};
use crate::validate::validate_files;

/// Listening side. The accept loop runs on a background thread for the
/// life of the process; dropping the handle removes the socket file.
pub struct IpcServer {
    socket_path: PathBuf,
}

impl IpcServer {
    /// Bind the well-known socket (clearing any stale socket file left by a
    /// previous run) and start accepting in the background.
    pub fn spawn(socket_path: &Path, ctx: AppContext) -> Result<IpcServer> {
        if socket_path.exists() {
            debug!("removing stale socket file {}", socket_path.display());
            let _ = std::fs::remove_file(socket_path);
        }

        let listener = UnixListener::bind(socket_path)?;
        info!("IPC server listening on {}", socket_path.display());

        std::thread::spawn(move || accept_loop(listener, ctx));

        Ok(IpcServer {
            socket_path: socket_path.to_path_buf(),
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

/// Accept connections forever, each handled on its own thread so a slow or
/// misbehaving client never blocks the next accept.
fn accept_loop(listener: UnixListener, ctx: AppContext) {
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let ctx = ctx.clone();
                std::thread::spawn(move || {
                    if let Err(e) = handle_connection(stream, &ctx) {
                        warn!("IPC connection failed: {}", e);
                    }
                });
            }
            Err(e) => {
                warn!("IPC accept failed: {}", e);
            }
        }
    }
}

/// Serve one forwarded request.
///
/// The acknowledgement is written as soon as the payload is validated,
/// before the (possibly slow) readiness wait, so a client never hangs on a
/// window that is still starting. A request with no valid files is a no-op
/// but still acknowledged.
fn handle_connection(mut stream: UnixStream, ctx: &AppContext) -> Result<()> {
    stream.set_read_timeout(Some(IPC_READ_TIMEOUT))?;
    stream.set_write_timeout(Some(IPC_WRITE_TIMEOUT))?;

    // One bounded read; forwarded path lists are tiny.
    let mut buf = vec![0u8; IPC_RECV_BUFFER];
    let n = match stream.read(&mut buf) {
        Ok(n) => n,
        Err(e) => {
            let _ = stream.write_all(b"ERROR: could not read request");
            return Err(e.into());
        }
    };

    let payload = String::from_utf8_lossy(&buf[..n]);
    debug!("IPC request: {} byte(s)", n);

    let files = validate_files(payload.split('\n'));
    stream.write_all(b"OK")?;

    if files.is_empty() {
        debug!("no valid files in forwarded request");
        return Ok(());
    }

    // The server starts before the window and registry exist; defer the
    // hand-off until the session layer reports ready.
    if ctx.await_ready(READY_POLL_INTERVAL, READY_POLL_ATTEMPTS) {
        info!("forwarding {} file(s) to the running session", files.len());
        ctx.send(AppEvent::OpenFiles(files));
    } else {
        warn!(
            "session never became ready; dropping {} forwarded file(s)",
            files.len()
        );
    }
    Ok(())
}

/// Client side: hand our file arguments to the already-running instance
/// and wait for its acknowledgement.
pub fn send_to_running_instance(socket_path: &Path, files: &[PathBuf]) -> Result<()> {
    if files.is_empty() {
        return Ok(());
    }

    let mut stream = UnixStream::connect(socket_path).map_err(|e| ViewerError::Ipc {
        message: format!("cannot reach running instance at {}: {e}", socket_path.display()),
    })?;
    stream.set_write_timeout(Some(IPC_SEND_TIMEOUT))?;

    let payload = files
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("\n");
    stream.write_all(payload.as_bytes())?;
    // Half-close so the server's single read observes EOF promptly.
    stream.shutdown(std::net::Shutdown::Write)?;

    stream.set_read_timeout(Some(IPC_ACK_TIMEOUT))?;
    let mut ack = [0u8; 16];
    let n = stream.read(&mut ack)?;
    let ack = String::from_utf8_lossy(&ack[..n]);

    if ack.starts_with("OK") {
        info!("forwarded {} file(s) to the running instance", files.len());
        Ok(())
    } else {
        Err(ViewerError::Ipc {
            message: format!("unexpected acknowledgement: {ack}"),
        })
    }
}

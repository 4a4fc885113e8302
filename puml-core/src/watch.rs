//! Per-file change monitor.
//!
//! Polling rather than native filesystem events: portability and
//! simplicity outweigh latency for a manual edit-preview workflow, and
//! 500ms is well within what that workflow notices.
//!
//! Each watcher runs on its own thread. A tick stats the file; only when
//! the size/mtime heuristic fires *and* the cooldown window has elapsed is
//! the content re-read and compared byte-for-byte — a touched-but-unchanged
//! file is never re-rendered. On a genuine change the watcher renders
//! (still on its own thread) and hands the result to the UI loop, strictly
//! in change-detect → render → foreground order.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Instant, SystemTime};

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use tracing::{debug, info, warn};

use crate::config::{POLL_INTERVAL, RELOAD_COOLDOWN};
use crate::context::{AppContext, AppEvent};
use crate::render::RendererSet;

/// Last-known file state, private to the watcher's own thread.
struct WatchState {
    size: u64,
    mtime: SystemTime,
    content: Vec<u8>,
}

impl WatchState {
    fn capture(path: &std::path::Path) -> std::io::Result<WatchState> {
        let meta = std::fs::metadata(path)?;
        let content = std::fs::read(path)?;
        Ok(WatchState {
            size: meta.len(),
            mtime: meta.modified()?,
            content,
        })
    }
}

/// Handle to a running watcher thread. Stopping is idempotent; dropping
/// the handle stops the watcher.
pub struct FileWatcher {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl FileWatcher {
    /// Start watching `path`. Change events and render results are sent
    /// through `ctx`; rendering happens on the watcher thread itself so the
    /// detect → render → foreground sequence stays ordered per file.
    pub fn spawn(path: PathBuf, renderer: Arc<RendererSet>, ctx: AppContext) -> FileWatcher {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let thread = std::thread::spawn(move || {
            info!("watching {}", path.display());
            let mut state = match WatchState::capture(&path) {
                Ok(state) => Some(state),
                Err(e) => {
                    warn!("cannot capture initial state of {}: {}", path.display(), e);
                    None
                }
            };
            let mut last_reload = Instant::now();

            loop {
                // Race the poll timer against the stop signal in one call.
                match stop_rx.recv_timeout(POLL_INTERVAL) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                        info!("stopped watching {}", path.display());
                        return;
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                }

                let meta = match std::fs::metadata(&path) {
                    Ok(meta) => meta,
                    Err(e) => {
                        debug!("stat failed for {}: {}", path.display(), e);
                        continue;
                    }
                };
                let size = meta.len();
                let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);

                let Some(known) = state.as_mut() else {
                    // First successful stat after a failed initial capture.
                    match WatchState::capture(&path) {
                        Ok(fresh) => state = Some(fresh),
                        Err(e) => debug!("still cannot read {}: {}", path.display(), e),
                    }
                    continue;
                };

                if size == known.size && mtime == known.mtime {
                    continue;
                }
                if last_reload.elapsed() < RELOAD_COOLDOWN {
                    continue;
                }

                let content = match std::fs::read(&path) {
                    Ok(content) => content,
                    Err(e) => {
                        warn!("cannot read changed file {}: {}", path.display(), e);
                        continue;
                    }
                };

                if content == known.content {
                    // Touched but unchanged; remember the new metadata so we
                    // stop re-reading on every tick.
                    debug!("{} touched but content unchanged", path.display());
                    known.size = size;
                    known.mtime = mtime;
                    continue;
                }

                info!("{} changed on disk; re-rendering", path.display());
                known.size = size;
                known.mtime = mtime;
                known.content = content;
                last_reload = Instant::now();

                let result = renderer.render(&path);
                ctx.send(AppEvent::Rendered {
                    path: path.clone(),
                    result,
                });
                ctx.send(AppEvent::FileChanged(path.clone()));
            }
        });

        FileWatcher {
            stop: Some(stop_tx),
            thread: Some(thread),
        }
    }

    /// Signal the watcher to stop and wait for it to wind down. The thread
    /// observes the signal at its next poll boundary; an in-flight reload
    /// finishes first. Safe to call more than once.
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.try_send(());
            drop(stop);
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("watcher thread panicked");
            }
        }
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

//! Application context shared with background tasks.
//!
//! Background tasks (the IPC accept loop, connection handlers, file
//! watchers, render invocations) never touch view state. They send
//! [`AppEvent`]s through the context's channel and the UI-affine loop
//! drains them. The context also carries the readiness flag the IPC
//! handlers consult before dispatching: the server starts listening
//! before the window and registry exist.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::warn;

use crate::error::Result;
use crate::render::RenderResult;

/// Events delivered to the UI-affine loop.
#[derive(Debug)]
pub enum AppEvent {
    /// Validated file paths forwarded by another process launch.
    OpenFiles(Vec<PathBuf>),
    /// A render invocation finished, successfully or not.
    Rendered {
        path: PathBuf,
        result: Result<RenderResult>,
    },
    /// The watched file genuinely changed; the affected view should be
    /// brought to the foreground.
    FileChanged(PathBuf),
}

/// Handle handed to background tasks: an event sender plus the readiness
/// flag. Cheap to clone.
#[derive(Clone)]
pub struct AppContext {
    events: Sender<AppEvent>,
    ready: Arc<AtomicBool>,
}

impl AppContext {
    /// Create a context and the receiving end of its event queue.
    pub fn new() -> (Self, Receiver<AppEvent>) {
        let (tx, rx) = unbounded();
        let ctx = AppContext {
            events: tx,
            ready: Arc::new(AtomicBool::new(false)),
        };
        (ctx, rx)
    }

    /// Enqueue an event for the UI loop. A send after the receiver is gone
    /// (shutdown) is logged and dropped.
    pub fn send(&self, event: AppEvent) {
        if self.events.send(event).is_err() {
            warn!("event queue closed; dropping event");
        }
    }

    /// Mark the session layer as constructed and able to open files.
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Block until the session layer is ready, checking at `interval` up to
    /// `attempts` times. Returns whether readiness was observed.
    pub fn await_ready(&self, interval: Duration, attempts: usize) -> bool {
        for _ in 0..attempts {
            if self.is_ready() {
                return true;
            }
            std::thread::sleep(interval);
        }
        self.is_ready()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn await_ready_gives_up_after_bounded_attempts() {
        let (ctx, _rx) = AppContext::new();
        assert!(!ctx.await_ready(Duration::from_millis(1), 3));
    }

    #[test]
    fn await_ready_sees_flag_set_by_another_thread() {
        let (ctx, _rx) = AppContext::new();
        let peer = ctx.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            peer.mark_ready();
        });
        assert!(ctx.await_ready(Duration::from_millis(10), 50));
        handle.join().unwrap();
    }
}

//! Open-file registry.
//!
//! Maps canonical absolute paths to their view slot and watcher. The
//! registry is owned by the UI-affine thread and mutated only there
//! (single-writer discipline), so it needs no lock; everything else in the
//! process reaches it indirectly through the event queue.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::context::{AppContext, AppEvent};
use crate::render::RendererSet;
use crate::watch::FileWatcher;

/// What `open` did.
#[derive(Debug, PartialEq, Eq)]
pub enum OpenOutcome {
    /// A new view slot was created at this index.
    Opened(usize),
    /// The path was already open; its slot was refreshed in place.
    Refreshed(usize),
    /// The file disappeared between validation and open.
    Missing,
}

struct OpenEntry {
    slot: usize,
    watcher: FileWatcher,
}

/// Registry of open files and their view slots.
///
/// Slot indices are contiguous and match the collaborator's visible
/// ordering; closing a slot shifts every higher index down by one.
pub struct SessionRegistry {
    entries: HashMap<PathBuf, OpenEntry>,
    selected: usize,
    renderer: Arc<RendererSet>,
    ctx: AppContext,
}

impl SessionRegistry {
    pub fn new(ctx: AppContext, renderer: Arc<RendererSet>) -> SessionRegistry {
        SessionRegistry {
            entries: HashMap::new(),
            selected: 0,
            renderer,
            ctx,
        }
    }

    /// Open a file, or refresh it if already open.
    ///
    /// A fresh render + watcher pair is started either way; refreshing an
    /// open file replaces its watcher so the cached content is discarded. A
    /// renderer failure arrives later as a `Rendered` event carrying the
    /// error and never prevents other files from opening.
    pub fn open(&mut self, path: &Path, select_on_open: bool) -> OpenOutcome {
        let path = match path.canonicalize() {
            Ok(path) => path,
            Err(e) => {
                warn!("cannot open {}: {}", path.display(), e);
                return OpenOutcome::Missing;
            }
        };

        if let Some(entry) = self.entries.get_mut(&path) {
            let slot = entry.slot;
            debug!("{} already open in slot {}; refreshing", path.display(), slot);
            if select_on_open {
                self.selected = slot;
            }
            entry.watcher.stop();
            entry.watcher =
                FileWatcher::spawn(path.clone(), self.renderer.clone(), self.ctx.clone());
            self.spawn_render(path);
            return OpenOutcome::Refreshed(slot);
        }

        let slot = self.entries.len();
        let watcher = FileWatcher::spawn(path.clone(), self.renderer.clone(), self.ctx.clone());
        self.entries.insert(path.clone(), OpenEntry { slot, watcher });
        if select_on_open {
            self.selected = slot;
        }
        self.spawn_render(path);
        OpenOutcome::Opened(slot)
    }

    /// Close a slot: stop its watcher, drop the mapping and re-index every
    /// slot above it. Returns the closed path, or `None` for an unknown
    /// slot.
    pub fn close(&mut self, slot: usize) -> Option<PathBuf> {
        let path = self.path_of(slot)?;
        if let Some(mut entry) = self.entries.remove(&path) {
            entry.watcher.stop();
        }
        for entry in self.entries.values_mut() {
            if entry.slot > slot {
                entry.slot -= 1;
            }
        }

        let len = self.entries.len();
        if len == 0 {
            self.selected = 0;
        } else if self.selected > slot {
            self.selected -= 1;
        } else if self.selected >= len {
            self.selected = len - 1;
        }
        Some(path)
    }

    /// Cyclic navigation to the next slot. No-op with one or no slot.
    pub fn next(&mut self) {
        if self.entries.len() > 1 {
            self.selected = (self.selected + 1) % self.entries.len();
        }
    }

    /// Cyclic navigation to the previous slot. No-op with one or no slot.
    pub fn previous(&mut self) {
        if self.entries.len() > 1 {
            self.selected = (self.selected + self.entries.len() - 1) % self.entries.len();
        }
    }

    /// Re-render a slot, typically after an in-view error's retry action.
    pub fn retry(&mut self, slot: usize) {
        if let Some(path) = self.path_of(slot) {
            self.spawn_render(path);
        }
    }

    pub fn select_slot(&mut self, slot: usize) {
        if slot < self.entries.len() {
            self.selected = slot;
        }
    }

    /// Select the slot showing `path`, if open. Used by the foreground-on-
    /// change callback.
    pub fn select_path(&mut self, path: &Path) -> Option<usize> {
        let slot = self.slot_of(path)?;
        self.selected = slot;
        Some(slot)
    }

    pub fn selected(&self) -> Option<usize> {
        (!self.entries.is_empty()).then_some(self.selected)
    }

    pub fn slot_of(&self, path: &Path) -> Option<usize> {
        self.entries.get(path).map(|entry| entry.slot)
    }

    pub fn path_of(&self, slot: usize) -> Option<PathBuf> {
        self.entries
            .iter()
            .find(|(_, entry)| entry.slot == slot)
            .map(|(path, _)| path.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stop every watcher. Called when the window closes.
    pub fn stop_all(&mut self) {
        for entry in self.entries.values_mut() {
            entry.watcher.stop();
        }
    }

    fn spawn_render(&self, path: PathBuf) {
        let renderer = self.renderer.clone();
        let ctx = self.ctx.clone();
        std::thread::spawn(move || {
            let result = renderer.render(&path);
            ctx.send(AppEvent::Rendered { path, result });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::Receiver;

    fn registry() -> (SessionRegistry, Receiver<AppEvent>) {
        let (ctx, events) = AppContext::new();
        let renderer = Arc::new(RendererSet::with_strategies(Vec::new()));
        (SessionRegistry::new(ctx, renderer), events)
    }

    fn make_files(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|name| {
                let path = dir.join(name);
                std::fs::write(&path, format!("@startuml\n' {name}\n@enduml\n")).unwrap();
                path.canonicalize().unwrap()
            })
            .collect()
    }

    #[test]
    fn opening_same_path_twice_creates_one_slot() {
        let dir = tempfile::tempdir().unwrap();
        let files = make_files(dir.path(), &["a.puml"]);
        let (mut reg, _events) = registry();

        assert_eq!(reg.open(&files[0], true), OpenOutcome::Opened(0));
        assert_eq!(reg.open(&files[0], true), OpenOutcome::Refreshed(0));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn closing_a_slot_reindexes_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let files = make_files(dir.path(), &["a.puml", "b.puml", "c.puml", "d.puml"]);
        let (mut reg, _events) = registry();
        for file in &files {
            reg.open(file, true);
        }

        assert_eq!(reg.close(1), Some(files[1].clone()));

        // Indices below the removed slot are untouched, those above shift
        // down by exactly one.
        assert_eq!(reg.slot_of(&files[0]), Some(0));
        assert_eq!(reg.slot_of(&files[2]), Some(1));
        assert_eq!(reg.slot_of(&files[3]), Some(2));
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn selection_follows_closures() {
        let dir = tempfile::tempdir().unwrap();
        let files = make_files(dir.path(), &["a.puml", "b.puml", "c.puml"]);
        let (mut reg, _events) = registry();
        for file in &files {
            reg.open(file, true);
        }
        assert_eq!(reg.selected(), Some(2));

        reg.close(2);
        assert_eq!(reg.selected(), Some(1));

        reg.close(0);
        assert_eq!(reg.selected(), Some(0));

        reg.close(0);
        assert_eq!(reg.selected(), None);
    }

    #[test]
    fn navigation_is_cyclic_and_noop_when_single() {
        let dir = tempfile::tempdir().unwrap();
        let files = make_files(dir.path(), &["a.puml", "b.puml", "c.puml"]);
        let (mut reg, _events) = registry();

        reg.open(&files[0], true);
        reg.next();
        assert_eq!(reg.selected(), Some(0));
        reg.previous();
        assert_eq!(reg.selected(), Some(0));

        reg.open(&files[1], false);
        reg.open(&files[2], false);
        assert_eq!(reg.selected(), Some(0));
        reg.next();
        assert_eq!(reg.selected(), Some(1));
        reg.previous();
        reg.previous();
        assert_eq!(reg.selected(), Some(2));
    }

    #[test]
    fn vanished_file_is_reported_missing_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let (mut reg, _events) = registry();
        let ghost = dir.path().join("ghost.puml");
        assert_eq!(reg.open(&ghost, true), OpenOutcome::Missing);
        assert!(reg.is_empty());
    }

    #[test]
    fn open_emits_render_result_event() {
        let dir = tempfile::tempdir().unwrap();
        let files = make_files(dir.path(), &["a.puml"]);
        let (mut reg, events) = registry();

        reg.open(&files[0], true);
        match events.recv_timeout(std::time::Duration::from_secs(2)).unwrap() {
            AppEvent::Rendered { path, result } => {
                assert_eq!(path, files[0]);
                assert!(result.is_err(), "no renderer configured in tests");
            }
            other => panic!("expected Rendered, got {other:?}"),
        }
    }
}

//! Main application state and eframe integration.
//!
//! The viewer is the UI-affine collaborator of the core: it owns the
//! `SessionRegistry`, drains the core's event queue each frame, and keeps
//! its tab strip in lockstep with the registry's slot indices. Background
//! tasks never touch this state; everything arrives through the channel.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;
use egui::{CentralPanel, Context, Key, TopBottomPanel};
use puml_core::{
    AppContext, AppEvent, InstanceLock, IpcServer, OpenOutcome, RenderResult, RendererSet,
    SessionRegistry,
};

/// Longest tab label before the file name gets elided.
const MAX_TAB_TITLE: usize = 30;

/// What one tab is currently showing.
enum SlotState {
    /// Render in flight.
    Loading,
    /// Rendered image, ready to draw.
    Ready {
        texture: egui::TextureHandle,
        width: u32,
        height: u32,
    },
    /// Inline renderer error with a retry action.
    Error(String),
}

/// One tab: the file it shows and its display state. Tab order mirrors the
/// registry's slot indices.
struct SlotView {
    path: PathBuf,
    title: String,
    state: SlotState,
}

/// Main application state.
pub struct ViewerApp {
    registry: SessionRegistry,
    events: Receiver<AppEvent>,
    slots: Vec<SlotView>,
    last_title: String,
    // Held for their lifetime: released/cleaned up when the window closes.
    _lock: Option<InstanceLock>,
    _server: Option<IpcServer>,
}

impl ViewerApp {
    /// Create the viewer, open the initial files and mark the session ready
    /// for IPC hand-offs.
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        ctx: AppContext,
        events: Receiver<AppEvent>,
        renderer: Arc<RendererSet>,
        initial_files: Vec<PathBuf>,
        lock: Option<InstanceLock>,
        server: Option<IpcServer>,
    ) -> Self {
        let mut app = ViewerApp {
            registry: SessionRegistry::new(ctx.clone(), renderer),
            events,
            slots: Vec::new(),
            last_title: String::new(),
            _lock: lock,
            _server: server,
        };
        for file in &initial_files {
            app.open_file(file, true);
        }
        ctx.mark_ready();
        app
    }

    /// Open or refresh a file and keep the tab strip aligned with the
    /// registry.
    fn open_file(&mut self, path: &Path, select: bool) {
        match self.registry.open(path, select) {
            OpenOutcome::Opened(slot) => {
                let canonical = self
                    .registry
                    .path_of(slot)
                    .unwrap_or_else(|| path.to_path_buf());
                self.slots.push(SlotView {
                    title: tab_title(&canonical),
                    path: canonical,
                    state: SlotState::Loading,
                });
            }
            OpenOutcome::Refreshed(slot) => {
                self.slots[slot].state = SlotState::Loading;
            }
            OpenOutcome::Missing => {}
        }
    }

    fn close_slot(&mut self, slot: usize) {
        if self.registry.close(slot).is_some() {
            self.slots.remove(slot);
        }
    }

    /// Apply everything the background tasks sent since the last frame.
    fn drain_events(&mut self, ctx: &Context) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                AppEvent::OpenFiles(paths) => {
                    for path in paths {
                        self.open_file(&path, true);
                    }
                    ctx.send_viewport_cmd(egui::ViewportCommand::Focus);
                }
                AppEvent::Rendered { path, result } => {
                    let Some(slot) = self.registry.slot_of(&path) else {
                        // Closed while the render was in flight.
                        continue;
                    };
                    self.slots[slot].state = match result {
                        Ok(render) => into_slot_state(ctx, &path, render),
                        Err(e) => SlotState::Error(e.to_string()),
                    };
                }
                AppEvent::FileChanged(path) => {
                    if self.registry.select_path(&path).is_some() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Focus);
                    }
                }
            }
        }
    }

    /// Handle keyboard shortcuts.
    fn handle_keyboard(&mut self, ctx: &Context) {
        let mut close_current = false;
        ctx.input(|i| {
            if i.key_pressed(Key::Tab) || i.key_pressed(Key::ArrowRight) {
                self.registry.next();
            }
            if i.key_pressed(Key::ArrowLeft) {
                self.registry.previous();
            }
            if i.modifiers.ctrl && i.key_pressed(Key::W) {
                close_current = true;
            }
        });
        if close_current {
            if let Some(slot) = self.registry.selected() {
                self.close_slot(slot);
            }
        }
    }

    /// Render the tab strip.
    fn render_tabs(&mut self, ctx: &Context) {
        let mut select: Option<usize> = None;
        let mut close: Option<usize> = None;

        TopBottomPanel::top("tab_bar").show(ctx, |ui| {
            ui.horizontal_wrapped(|ui| {
                let selected = self.registry.selected();
                for (i, slot) in self.slots.iter().enumerate() {
                    if ui
                        .selectable_label(selected == Some(i), &slot.title)
                        .clicked()
                    {
                        select = Some(i);
                    }
                    if ui.small_button("✕").clicked() {
                        close = Some(i);
                    }
                    ui.separator();
                }
            });
        });

        if let Some(slot) = select {
            self.registry.select_slot(slot);
        }
        if let Some(slot) = close {
            self.close_slot(slot);
        }
    }

    /// Render the selected tab's content.
    fn render_content(&mut self, ctx: &Context) {
        let selected = self.registry.selected();
        let mut retry: Option<usize> = None;

        CentralPanel::default().show(ctx, |ui| {
            let Some(slot) = selected else {
                ui.centered_and_justified(|ui| {
                    ui.label("No file open\n\nPass PlantUML files on the command line");
                });
                return;
            };

            match &self.slots[slot].state {
                SlotState::Loading => {
                    ui.centered_and_justified(|ui| {
                        ui.spinner();
                    });
                }
                SlotState::Ready {
                    texture,
                    width,
                    height,
                } => {
                    let avail = ui.available_size();
                    let scale = (avail.x / *width as f32)
                        .min(avail.y / *height as f32)
                        .min(1.0);
                    let size = egui::Vec2::new(*width as f32 * scale, *height as f32 * scale);
                    ui.centered_and_justified(|ui| {
                        ui.add(egui::Image::new(egui::load::SizedTexture::new(
                            texture.id(),
                            size,
                        )));
                    });
                }
                SlotState::Error(message) => {
                    let message = message.clone();
                    ui.vertical_centered(|ui| {
                        ui.add_space(ui.available_height() * 0.3);
                        ui.label(format!("Could not render diagram:\n{message}"));
                        ui.add_space(8.0);
                        if ui.button("Retry").clicked() {
                            retry = Some(slot);
                        }
                    });
                }
            }
        });

        if let Some(slot) = retry {
            self.registry.retry(slot);
            self.slots[slot].state = SlotState::Loading;
        }
    }

    /// Keep the window title on the selected file.
    fn update_title(&mut self, ctx: &Context) {
        let title = match self.registry.selected().and_then(|s| self.slots.get(s)) {
            Some(slot) => format!("PlantUML Viewer - {}", file_name(&slot.path)),
            None => "PlantUML Viewer - no file".to_string(),
        };
        if title != self.last_title {
            ctx.send_viewport_cmd(egui::ViewportCommand::Title(title.clone()));
            self.last_title = title;
        }
    }
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        self.drain_events(ctx);
        self.handle_keyboard(ctx);
        self.render_tabs(ctx);
        self.render_content(ctx);
        self.update_title(ctx);

        // Watchers and IPC deliver events while we're idle; wake up
        // periodically to drain them.
        ctx.request_repaint_after(Duration::from_millis(200));
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.registry.stop_all();
    }
}

/// Upload the rendered PNG as a texture.
fn into_slot_state(ctx: &Context, path: &Path, render: RenderResult) -> SlotState {
    let decoded = match image::load_from_memory(&render.png) {
        Ok(decoded) => decoded.to_rgba8(),
        Err(e) => return SlotState::Error(format!("failed to decode rendered image: {e}")),
    };
    let size = [decoded.width() as usize, decoded.height() as usize];
    let color = egui::ColorImage::from_rgba_unmultiplied(size, decoded.as_raw());
    let texture = ctx.load_texture(
        path.display().to_string(),
        color,
        egui::TextureOptions::LINEAR,
    );
    SlotState::Ready {
        texture,
        width: render.width,
        height: render.height,
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Elide over-long file names so the tab strip stays usable.
fn tab_title(path: &Path) -> String {
    let name = file_name(path);
    if name.chars().count() <= MAX_TAB_TITLE {
        return name;
    }
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let keep = MAX_TAB_TITLE.saturating_sub(3 + ext.chars().count()).max(10);
    let stem: String = name.chars().take(keep).collect();
    format!("{stem}...{ext}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_names_are_untouched() {
        assert_eq!(tab_title(Path::new("/tmp/seq.puml")), "seq.puml");
    }

    #[test]
    fn long_names_keep_the_extension() {
        let title = tab_title(Path::new(
            "/tmp/a_very_long_diagram_file_name_indeed_yes.puml",
        ));
        assert!(title.len() <= MAX_TAB_TITLE + 3);
        assert!(title.ends_with(".puml"));
        assert!(title.contains("..."));
    }
}

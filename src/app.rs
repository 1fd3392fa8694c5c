//! `eframe` front end.
//!
//! The window only translates input into [`AnnotationSession`] calls and
//! paints the [`DrawCommand`]s returned by the renderer.

use crate::classes::{discover_class_file, ClassTable};
use crate::config::AppConfig;
use crate::dataset::scan_dataset;
use crate::loader::{DecodedImage, ImageLoader};
use crate::model::{Point, Rect};
use crate::render::{CanvasRenderer, Color, DrawCommand};
use crate::session::{
    AnnotationSession, PointerButton, SwitchDecision, SwitchOutcome, SwitchRequest,
};
use egui_extras::{Column, TableBuilder};
use std::path::PathBuf;

const ROW_HEIGHT: f32 = 20.0;
const LABEL_FONT_SIZE: f32 = 12.0;
const PLACEHOLDER_FONT_SIZE: f32 = 16.0;

/// What is waiting on the unsaved-changes prompt.
#[derive(Clone, Debug, PartialEq)]
enum UnsavedPrompt {
    SwitchImage { to: usize },
    OpenDataset(PathBuf),
}

pub struct App {
    config: AppConfig,
    /// Where settings are written; None disables persistence.
    config_path: Option<PathBuf>,
    session: AnnotationSession,
    renderer: CanvasRenderer,
    /// None when the loader thread could not be started; images then load inline.
    loader: Option<ImageLoader>,
    texture: Option<egui::TextureHandle>,
    dataset_dir: Option<PathBuf>,
    classes_file: Option<PathBuf>,
    /// Highlighted row of the image list
    list_selection: Option<usize>,
    /// Highlighted row of the box table
    selected_box: Option<usize>,
    prompt: Option<UnsavedPrompt>,
    confirm_clear: bool,
    error_message: Option<String>,
    status: String,
}

impl App {
    pub fn new(cc: &eframe::CreationContext<'_>, config: AppConfig, dataset_dir: Option<PathBuf>) -> Self {
        let repaint_ctx = cc.egui_ctx.clone();
        let loader = match ImageLoader::spawn(move || repaint_ctx.request_repaint()) {
            Ok(loader) => Some(loader),
            Err(e) => {
                log::error!("Cannot start image loader thread, loading inline: {}", e);
                None
            }
        };

        let mut app = Self {
            session: AnnotationSession::new(config.session_options()),
            config,
            config_path: AppConfig::default_path(),
            renderer: CanvasRenderer::default(),
            loader,
            texture: None,
            dataset_dir: None,
            classes_file: None,
            list_selection: None,
            selected_box: None,
            prompt: None,
            confirm_clear: false,
            error_message: None,
            status: String::new(),
        };

        if let Some(path) = app.config.last_classes_file.clone().filter(|p| p.is_file()) {
            app.load_classes(path);
        }
        if let Some(dir) = dataset_dir.or_else(|| app.config.last_dataset_dir.clone()) {
            if dir.is_dir() {
                app.open_dataset(&cc.egui_ctx, dir);
            } else {
                log::warn!("Dataset directory {:?} does not exist", dir);
            }
        }
        app
    }

    fn show_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{}", message);
        self.error_message = Some(message);
    }

    fn save_config(&self) {
        let Some(path) = &self.config_path else {
            return;
        };
        if let Err(e) = self.config.save_to(path) {
            log::warn!("Failed to save configuration: {}", e);
        }
    }

    // ── Dataset and classes ────────────────────────────────────────────────

    fn open_dataset(&mut self, ctx: &egui::Context, dir: PathBuf) {
        if self.session.is_modified() {
            self.prompt = Some(UnsavedPrompt::OpenDataset(dir));
            return;
        }

        if self.classes_file.is_none() {
            if let Some(found) = discover_class_file(&dir) {
                log::info!("Using class file {:?} found in dataset", found);
                self.load_classes(found);
            }
        }

        let records = match scan_dataset(&dir, self.session.classes()) {
            Ok(records) => records,
            Err(e) => {
                self.show_error(format!("Cannot open dataset {}: {}", dir.display(), e));
                return;
            }
        };
        let count = records.len();
        self.session.set_records(records);
        self.texture = None;
        self.list_selection = None;
        self.selected_box = None;
        self.status = format!("{} images in {}", count, dir.display());

        self.config.last_dataset_dir = Some(dir.clone());
        self.dataset_dir = Some(dir);
        self.save_config();

        if count > 0 {
            self.select_image(ctx, 0);
        }
    }

    fn load_classes(&mut self, path: PathBuf) {
        match ClassTable::load(&path) {
            Ok(table) => {
                self.status = format!("{} classes from {}", table.len(), path.display());
                self.session.set_classes(table);
                self.config.last_classes_file = Some(path.clone());
                self.classes_file = Some(path);
                self.save_config();
            }
            Err(e) => self.show_error(format!("Cannot load classes from {}: {}", path.display(), e)),
        }
    }

    // ── Image switching ────────────────────────────────────────────────────

    fn select_image(&mut self, ctx: &egui::Context, index: usize) {
        self.list_selection = Some(index);
        match self.session.request_switch(index) {
            Ok(SwitchRequest::Unchanged) => self.cancel_load(),
            Ok(SwitchRequest::Ready(to)) => self.start_load(ctx, to),
            Ok(SwitchRequest::NeedsDecision { to, .. }) => {
                self.cancel_load();
                self.prompt = Some(UnsavedPrompt::SwitchImage { to });
            }
            Err(e) => {
                self.cancel_load();
                self.list_selection = self.session.current_index();
                self.show_error(e.to_string());
            }
        }
    }

    /// Drop any in-flight load so it cannot replace the current image.
    fn cancel_load(&mut self) {
        if let Some(loader) = self.loader.as_mut() {
            loader.cancel();
        }
    }

    fn resolve_prompt(&mut self, ctx: &egui::Context, decision: SwitchDecision) {
        let Some(prompt) = self.prompt.take() else {
            return;
        };
        match prompt {
            UnsavedPrompt::SwitchImage { .. } => match self.session.resolve_switch(decision) {
                Ok(SwitchOutcome::Switch(to)) => self.start_load(ctx, to),
                Ok(SwitchOutcome::Stay { selected }) => self.list_selection = selected,
                Err(e) => {
                    self.list_selection = self.session.current_index();
                    self.show_error(e.to_string());
                }
            },
            UnsavedPrompt::OpenDataset(dir) => {
                match decision {
                    SwitchDecision::Cancel => return,
                    SwitchDecision::SaveThenSwitch => {
                        if let Err(e) = self.session.save_current() {
                            self.show_error(e.to_string());
                            return;
                        }
                    }
                    SwitchDecision::DiscardAndSwitch => self.session.revert_current(),
                }
                self.open_dataset(ctx, dir);
            }
        }
    }

    fn start_load(&mut self, ctx: &egui::Context, index: usize) {
        let Some(record) = self.session.image_records().get(index) else {
            return;
        };
        let path = record.path.clone();
        self.status = format!("Loading {}", record.name());

        if let Some(loader) = self.loader.as_mut() {
            loader.request(index, path);
            if loader.is_running() {
                return;
            }
            log::warn!("Image loader stopped, loading inline from now on");
            self.loader = None;
        }
        match self.session.open_image(index) {
            Ok(image) => self.image_installed(ctx, index, &image),
            Err(e) => {
                self.list_selection = self.session.current_index();
                self.show_error(e.to_string());
            }
        }
    }

    fn poll_loader(&mut self, ctx: &egui::Context) {
        let Some(loader) = self.loader.as_mut() else {
            return;
        };
        let polled = loader.poll();
        if !loader.is_running() {
            log::warn!("Image loader stopped, loading inline from now on");
            self.loader = None;
        }
        let Some(result) = polled else {
            return;
        };
        let loaded = result
            .image
            .map_err(|e| e.to_string())
            .and_then(|image| {
                self.session
                    .load_image(result.index, &image)
                    .map(|()| image)
                    .map_err(|e| e.to_string())
            });
        match loaded {
            Ok(image) => self.image_installed(ctx, result.index, &image),
            Err(message) => {
                self.list_selection = self.session.current_index();
                self.status.clear();
                self.show_error(message);
            }
        }
    }

    fn image_installed(&mut self, ctx: &egui::Context, index: usize, image: &DecodedImage) {
        let size = [image.width as usize, image.height as usize];
        let color_image = egui::ColorImage::from_rgba_unmultiplied(size, &image.rgba);
        self.texture = Some(ctx.load_texture("image", color_image, egui::TextureOptions::LINEAR));
        self.list_selection = Some(index);
        self.selected_box = None;
        if let Some(record) = self.session.current_record() {
            self.status = format!("{} ({}x{})", record.name(), image.width, image.height);
        }
    }

    fn is_loading(&self) -> bool {
        self.loader.as_ref().is_some_and(ImageLoader::is_pending)
    }

    // ── Editing ────────────────────────────────────────────────────────────

    fn save(&mut self) {
        match self.session.save_current() {
            Ok(path) => self.status = format!("Saved {}", path.display()),
            Err(e) => self.show_error(e.to_string()),
        }
    }

    fn delete_selected_box(&mut self) {
        if let Some(index) = self.selected_box.take() {
            self.session.remove_box(index);
        }
    }

    // ── Panels ─────────────────────────────────────────────────────────────

    fn side_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::left("dataset_panel")
            .resizable(true)
            .default_width(320.0)
            .show(ctx, |ui| {
                ui.heading("Dataset");
                ui.horizontal(|ui| {
                    if ui.button("Open folder…").clicked() {
                        if let Some(dir) = rfd::FileDialog::new().pick_folder() {
                            self.open_dataset(ctx, dir);
                        }
                    }
                    if ui.button("Classes…").clicked() {
                        if let Some(path) = rfd::FileDialog::new()
                            .add_filter("Class list", &["yaml", "yml", "txt", "names"])
                            .pick_file()
                        {
                            self.load_classes(path);
                        }
                    }
                });
                if let Some(dir) = &self.dataset_dir {
                    ui.small(dir.display().to_string());
                }
                if let Some(file) = &self.classes_file {
                    ui.small(format!("Classes: {}", file.display()));
                }
                ui.separator();

                self.image_table(ctx, ui);
                ui.separator();

                ui.horizontal(|ui| {
                    ui.strong(format!("Boxes ({})", self.session.boxes().len()));
                    let has_selection = self.selected_box.is_some();
                    if ui
                        .add_enabled(has_selection, egui::Button::new("Delete"))
                        .clicked()
                    {
                        self.delete_selected_box();
                    }
                    if ui
                        .add_enabled(!self.session.boxes().is_empty(), egui::Button::new("Clear all"))
                        .clicked()
                    {
                        self.confirm_clear = true;
                    }
                });
                self.box_table(ui);
            });
    }

    fn image_table(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        let mut clicked = None;
        let selection = self.list_selection;
        let records = self.session.image_records();

        TableBuilder::new(ui)
            .id_salt("image_list")
            .striped(true)
            .sense(egui::Sense::click())
            .max_scroll_height(320.0)
            .column(Column::remainder().at_least(120.0).clip(true))
            .column(Column::exact(24.0))
            .column(Column::exact(40.0))
            .column(Column::auto().at_least(60.0))
            .header(ROW_HEIGHT, |mut header| {
                header.col(|ui| {
                    ui.strong("Image");
                });
                header.col(|ui| {
                    ui.strong("✔");
                });
                header.col(|ui| {
                    ui.strong("Boxes");
                });
                header.col(|ui| {
                    ui.strong("Classes");
                });
            })
            .body(|body| {
                body.rows(ROW_HEIGHT, records.len(), |mut row| {
                    let index = row.index();
                    let record = &records[index];
                    row.set_selected(selection == Some(index));
                    row.col(|ui| {
                        ui.label(record.name());
                    });
                    row.col(|ui| {
                        ui.label(if record.has_annotation { "✔" } else { "" });
                    });
                    row.col(|ui| {
                        ui.label(record.annotation_count.to_string());
                    });
                    row.col(|ui| {
                        ui.label(record.label_types_display());
                    });
                    if row.response().clicked() {
                        clicked = Some(index);
                    }
                });
            });

        if let Some(index) = clicked {
            self.select_image(ctx, index);
        }
    }

    fn box_table(&mut self, ui: &mut egui::Ui) {
        let mut clicked = None;
        let selection = self.selected_box;
        let boxes = self.session.boxes();

        TableBuilder::new(ui)
            .id_salt("box_list")
            .striped(true)
            .sense(egui::Sense::click())
            .column(Column::remainder().at_least(80.0).clip(true))
            .columns(Column::exact(44.0), 4)
            .header(ROW_HEIGHT, |mut header| {
                for title in ["Class", "x1", "y1", "x2", "y2"] {
                    header.col(|ui| {
                        ui.strong(title);
                    });
                }
            })
            .body(|body| {
                body.rows(ROW_HEIGHT, boxes.len(), |mut row| {
                    let index = row.index();
                    let b = &boxes[index];
                    row.set_selected(selection == Some(index));
                    row.col(|ui| {
                        ui.label(&b.class_name);
                    });
                    for value in [b.x1, b.y1, b.x2, b.y2] {
                        row.col(|ui| {
                            ui.label(value.to_string());
                        });
                    }
                    if row.response().clicked() {
                        clicked = Some(index);
                    }
                });
            });

        if let Some(index) = clicked {
            self.selected_box = if selection == Some(index) { None } else { Some(index) };
        }
    }

    fn toolbar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let mut draw_mode = self.session.draw_mode();
                if ui.toggle_value(&mut draw_mode, "Draw box").changed()
                    && !self.session.set_draw_mode(draw_mode)
                {
                    self.status = "Load an image before drawing".to_string();
                }

                let classes = self.session.classes().names().to_vec();
                let mut selected = self.session.selected_class();
                let selected_text = selected
                    .and_then(|id| classes.get(id).cloned())
                    .unwrap_or_else(|| "No class".to_string());
                egui::ComboBox::from_id_salt("class_select")
                    .selected_text(selected_text)
                    .show_ui(ui, |ui| {
                        for (id, name) in classes.iter().enumerate() {
                            ui.selectable_value(&mut selected, Some(id), name);
                        }
                    });
                if selected != self.session.selected_class() {
                    self.session.select_class(selected);
                }

                ui.separator();
                let can_save = self.session.current_index().is_some();
                if ui.add_enabled(can_save, egui::Button::new("Save")).clicked() {
                    self.save();
                }
                if ui.add_enabled(can_save, egui::Button::new("Reset view")).clicked() {
                    if let Err(e) = self.session.reset_view() {
                        self.status = e.to_string();
                    }
                }
                ui.separator();
                ui.label(format!("Zoom: {:.0}%", self.session.viewport().scale() * 100.0));
                ui.separator();
                if self.is_loading() {
                    ui.spinner();
                }
                if self.session.is_modified() {
                    ui.colored_label(egui::Color32::YELLOW, "● unsaved");
                }
                ui.label(&self.status);
            });
        });
    }

    // ── Canvas ─────────────────────────────────────────────────────────────

    fn canvas(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default()
            .frame(egui::Frame::default())
            .show(ctx, |ui| {
                let (response, painter) =
                    ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
                let canvas_rect = response.rect;
                self.session.on_resize(
                    canvas_rect.width().max(0.0) as u32,
                    canvas_rect.height().max(0.0) as u32,
                );

                if self.prompt.is_none() && !self.confirm_clear && !self.is_loading() {
                    self.handle_canvas_input(ctx, &response);
                }

                let commands = self.renderer.render(&self.session.scene());
                for command in &commands {
                    self.paint(&painter, canvas_rect, command);
                }
            });
    }

    fn handle_canvas_input(&mut self, ctx: &egui::Context, response: &egui::Response) {
        let origin = response.rect.min;
        let to_canvas = |pos: egui::Pos2| {
            Point::new((pos.x - origin.x).round() as i32, (pos.y - origin.y).round() as i32)
        };
        let (events, hover) = ctx.input(|i| (i.events.clone(), i.pointer.hover_pos()));

        for event in events {
            match event {
                egui::Event::PointerButton {
                    pos,
                    button,
                    pressed,
                    ..
                } => {
                    let Some(button) = map_button(button) else {
                        continue;
                    };
                    let result = if pressed {
                        if !response.contains_pointer() {
                            continue;
                        }
                        self.session.on_pointer_down(to_canvas(pos), button)
                    } else {
                        self.session.on_pointer_up(to_canvas(pos), button).map(|committed| {
                            if let Some(index) = committed {
                                self.selected_box = Some(index);
                            }
                        })
                    };
                    if let Err(e) = result {
                        self.show_error(e.to_string());
                    }
                }
                egui::Event::PointerMoved(pos) => {
                    self.session.on_pointer_move(to_canvas(pos));
                }
                egui::Event::MouseWheel { delta, .. } if response.contains_pointer() => {
                    if let Some(cursor) = hover {
                        self.session.on_wheel(to_canvas(cursor), delta.y);
                    }
                }
                _ => {}
            }
        }
    }

    fn paint(&self, painter: &egui::Painter, canvas_rect: egui::Rect, command: &DrawCommand) {
        let origin = canvas_rect.min;
        let to_screen = |p: Point| origin + egui::vec2(p.x as f32, p.y as f32);
        let to_rect = |r: &Rect| egui::Rect::from_two_pos(to_screen(r.min()), to_screen(r.max()));

        match command {
            DrawCommand::FillRect { rect, color } => {
                painter.rect_filled(to_rect(rect), 0.0, to_egui(*color));
            }
            DrawCommand::Text {
                center,
                text,
                color,
            } => {
                painter.text(
                    to_screen(*center),
                    egui::Align2::CENTER_CENTER,
                    text,
                    egui::FontId::proportional(PLACEHOLDER_FONT_SIZE),
                    to_egui(*color),
                );
            }
            DrawCommand::Image { dest } => {
                if let Some(tex) = &self.texture {
                    painter.image(
                        tex.id(),
                        to_rect(dest),
                        egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                        egui::Color32::WHITE,
                    );
                }
            }
            DrawCommand::StrokeRect {
                rect,
                color,
                width,
                dashed,
            } => {
                let stroke = egui::Stroke::new(*width, to_egui(*color));
                let rect = to_rect(rect);
                if *dashed {
                    let outline = [
                        rect.left_top(),
                        rect.right_top(),
                        rect.right_bottom(),
                        rect.left_bottom(),
                        rect.left_top(),
                    ];
                    painter.extend(egui::Shape::dashed_line(&outline, stroke, 6.0, 4.0));
                } else {
                    painter.rect_stroke(rect, 0.0, stroke, egui::StrokeKind::Middle);
                }
            }
            DrawCommand::LabelChip {
                anchor,
                text,
                fill,
                text_color,
            } => {
                let text_color = to_egui(*text_color);
                let galley = painter.layout_no_wrap(
                    text.clone(),
                    egui::FontId::proportional(LABEL_FONT_SIZE),
                    text_color,
                );
                let padding = egui::vec2(3.0, 1.0);
                let size = galley.size() + padding * 2.0;
                let chip = egui::Rect::from_min_size(to_screen(*anchor) - egui::vec2(0.0, size.y), size);
                painter.rect_filled(chip, 0.0, to_egui(*fill));
                painter.galley(chip.min + padding, galley, text_color);
            }
        }
    }

    // ── Dialogs ────────────────────────────────────────────────────────────

    fn dialogs(&mut self, ctx: &egui::Context) {
        if let Some(prompt) = self.prompt.clone() {
            let mut decision = None;
            egui::Window::new("Unsaved changes")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    let name = self
                        .session
                        .current_record()
                        .map(|r| r.name())
                        .unwrap_or_default();
                    match &prompt {
                        UnsavedPrompt::SwitchImage { to } => {
                            let target = self
                                .session
                                .image_records()
                                .get(*to)
                                .map(|r| r.name())
                                .unwrap_or_default();
                            ui.label(format!(
                                "{} has unsaved boxes. Save before switching to {}?",
                                name, target
                            ));
                        }
                        UnsavedPrompt::OpenDataset(_) => {
                            ui.label(format!("{} has unsaved boxes. Save before opening another dataset?", name));
                        }
                    }
                    ui.horizontal(|ui| {
                        if ui.button("Save").clicked() {
                            decision = Some(SwitchDecision::SaveThenSwitch);
                        }
                        if ui.button("Discard").clicked() {
                            decision = Some(SwitchDecision::DiscardAndSwitch);
                        }
                        if ui.button("Cancel").clicked() {
                            decision = Some(SwitchDecision::Cancel);
                        }
                    });
                });
            if let Some(decision) = decision {
                self.resolve_prompt(ctx, decision);
            }
        }

        if self.confirm_clear {
            let mut answer = None;
            egui::Window::new("Clear boxes")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.label(format!(
                        "Remove all {} boxes from this image?",
                        self.session.boxes().len()
                    ));
                    ui.horizontal(|ui| {
                        if ui.button("Clear").clicked() {
                            answer = Some(true);
                        }
                        if ui.button("Cancel").clicked() {
                            answer = Some(false);
                        }
                    });
                });
            if let Some(clear) = answer {
                if clear {
                    self.session.clear_boxes();
                    self.selected_box = None;
                }
                self.confirm_clear = false;
            }
        }

        if let Some(error) = self.error_message.clone() {
            let mut should_close = false;
            egui::Window::new("Error")
                .collapsible(false)
                .resizable(false)
                .show(ctx, |ui| {
                    ui.label(&error);
                    if ui.button("OK").clicked() {
                        should_close = true;
                    }
                });
            if should_close {
                self.error_message = None;
            }
        }
    }
}

fn map_button(button: egui::PointerButton) -> Option<PointerButton> {
    match button {
        egui::PointerButton::Primary => Some(PointerButton::Primary),
        egui::PointerButton::Secondary => Some(PointerButton::Secondary),
        egui::PointerButton::Middle => Some(PointerButton::Middle),
        _ => None,
    }
}

fn to_egui(c: Color) -> egui::Color32 {
    egui::Color32::from_rgba_unmultiplied(c.r, c.g, c.b, c.a)
}

impl eframe::App for App {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_loader(ctx);

        let modal_open = self.prompt.is_some() || self.confirm_clear;
        let (save, escape, delete) = ctx.input(|i| {
            (
                i.modifiers.ctrl && i.key_pressed(egui::Key::S),
                i.key_pressed(egui::Key::Escape),
                i.key_pressed(egui::Key::Delete),
            )
        });
        if escape {
            self.session.cancel_gesture();
        }
        if !modal_open {
            if save && self.session.current_index().is_some() {
                self.save();
            }
            if delete {
                self.delete_selected_box();
            }
        }

        self.toolbar(ctx);
        self.side_panel(ctx);
        self.canvas(ctx);
        self.dialogs(ctx);
    }
}

impl Drop for App {
    fn drop(&mut self) {
        if self.session.is_modified() {
            log::warn!("Exiting with unsaved boxes");
        }
        self.save_config();
    }
}

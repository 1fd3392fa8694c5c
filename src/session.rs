//! Annotation session: current image, its boxes, the viewport and the
//! pointer gesture state machine.
//!
//! ```text
//!            primary down (draw mode)          primary up / cancel
//!   Idle ───────────────────────────▶ Drawing ─────────────────────▶ Idle
//!    │  ▲
//!    │  │ any up / cancel
//!    ▼  │
//!  Panning   (secondary or middle down; primary down when not in draw mode)
//! ```
//!
//! All mutation of the box store and viewport goes through this type so the
//! modified flag, the image records and the gesture stay consistent.

use crate::boxes::BoxStore;
use crate::classes::ClassTable;
use crate::codec;
use crate::error::{SessionError, ViewportError};
use crate::loader::{decode_image, DecodedImage};
use crate::model::{BBox, ImageRecord, Point, Rect};
use crate::render::Scene;
use crate::viewport::Viewport;
use std::path::{Component, Path, PathBuf};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

/// The single active pointer interaction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Gesture {
    #[default]
    Idle,
    /// Positions are in image space, already clamped to the image.
    Drawing { start: Point, current: Rect },
    /// Last pointer position in screen space.
    Panning { anchor: Point },
}

/// Caller's answer to the unsaved-changes prompt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwitchDecision {
    SaveThenSwitch,
    DiscardAndSwitch,
    Cancel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwitchRequest {
    /// Target is already the current image.
    Unchanged,
    /// Nothing to lose; load the target.
    Ready(usize),
    /// Unsaved edits: ask the user, then call [`AnnotationSession::resolve_switch`].
    NeedsDecision { from: usize, to: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// Load this image next.
    Switch(usize),
    /// Stay put; the list selection must go back to `selected`.
    Stay { selected: Option<usize> },
}

/// Tunables taken from the application config.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SessionOptions {
    /// Stay in draw mode after a box is committed.
    pub keep_draw_mode: bool,
    /// Wheel-in factor; wheel-out uses `2 - zoom_step`.
    pub zoom_step: f64,
    /// Boxes must be strictly larger than this in both axes.
    pub min_box_size: i32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            keep_draw_mode: false,
            zoom_step: 1.1,
            min_box_size: 2,
        }
    }
}

#[derive(Debug, Default)]
pub struct AnnotationSession {
    options: SessionOptions,
    classes: ClassTable,
    records: Vec<ImageRecord>,
    current: Option<usize>,
    image_size: Option<(u32, u32)>,
    boxes: BoxStore,
    viewport: Viewport,
    gesture: Gesture,
    draw_mode: bool,
    selected_class: Option<usize>,
    canvas_size: (u32, u32),
    needs_fit: bool,
    pending_switch: Option<usize>,
}

impl AnnotationSession {
    pub fn new(options: SessionOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    // ── Dataset and classes ────────────────────────────────────────────────

    /// Start over with a new dataset. Nothing is loaded until the caller
    /// switches to an image.
    pub fn set_records(&mut self, records: Vec<ImageRecord>) {
        self.records = records;
        self.current = None;
        self.image_size = None;
        self.boxes.replace_all(Vec::new(), true);
        self.gesture = Gesture::Idle;
        self.draw_mode = false;
        self.pending_switch = None;
    }

    pub fn set_classes(&mut self, classes: ClassTable) {
        self.classes = classes;
        let table = &self.classes;
        self.boxes.rename_classes(|id| table.name_for(id));
        self.selected_class = if self.classes.is_empty() { None } else { Some(0) };
        self.sync_record();
    }

    pub fn classes(&self) -> &ClassTable {
        &self.classes
    }

    pub fn image_records(&self) -> &[ImageRecord] {
        &self.records
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_record(&self) -> Option<&ImageRecord> {
        self.current.and_then(|i| self.records.get(i))
    }

    pub fn image_size(&self) -> Option<(u32, u32)> {
        self.image_size
    }

    pub fn boxes(&self) -> &[BBox] {
        self.boxes.as_slice()
    }

    pub fn is_modified(&self) -> bool {
        self.boxes.is_modified()
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn gesture(&self) -> Gesture {
        self.gesture
    }

    pub fn draw_mode(&self) -> bool {
        self.draw_mode
    }

    pub fn selected_class(&self) -> Option<usize> {
        self.selected_class
    }

    pub fn options(&self) -> SessionOptions {
        self.options
    }

    pub fn set_options(&mut self, options: SessionOptions) {
        self.options = options;
    }

    // ── Image switching ────────────────────────────────────────────────────

    /// First half of an image switch: checks the unsaved-changes guard.
    pub fn request_switch(&mut self, to: usize) -> Result<SwitchRequest, SessionError> {
        self.check_index(to)?;
        if self.current == Some(to) {
            return Ok(SwitchRequest::Unchanged);
        }
        match self.current {
            Some(from) if self.boxes.is_modified() => {
                self.pending_switch = Some(to);
                Ok(SwitchRequest::NeedsDecision { from, to })
            }
            _ => Ok(SwitchRequest::Ready(to)),
        }
    }

    /// Second half of a guarded switch.
    ///
    /// A failed save keeps the current image and its edits and returns the
    /// error; the pending switch is dropped either way.
    pub fn resolve_switch(
        &mut self,
        decision: SwitchDecision,
    ) -> Result<SwitchOutcome, SessionError> {
        let stay = SwitchOutcome::Stay {
            selected: self.current,
        };
        let Some(to) = self.pending_switch.take() else {
            return Ok(stay);
        };
        match decision {
            SwitchDecision::Cancel => {
                log::debug!("Switch to image {} cancelled", to);
                Ok(stay)
            }
            SwitchDecision::SaveThenSwitch => {
                self.save_current()?;
                Ok(SwitchOutcome::Switch(to))
            }
            SwitchDecision::DiscardAndSwitch => {
                self.revert_current();
                Ok(SwitchOutcome::Switch(to))
            }
        }
    }

    pub fn pending_switch(&self) -> Option<usize> {
        self.pending_switch
    }

    /// Install a decoded image as the current one and read its labels.
    pub fn load_image(&mut self, index: usize, image: &DecodedImage) -> Result<(), SessionError> {
        self.check_index(index)?;
        let (width, height) = (image.width, image.height);
        let boxes = self.read_labels(index, width, height);
        log::info!(
            "Loaded image {} ({}x{}, {} boxes)",
            self.records[index].name(),
            width,
            height,
            boxes.len()
        );

        self.current = Some(index);
        self.image_size = Some((width, height));
        self.boxes.replace_all(boxes, true);
        self.gesture = Gesture::Idle;
        self.pending_switch = None;
        self.sync_record();
        self.fit_or_defer();
        Ok(())
    }

    /// Decode and load synchronously. On a decode error nothing changes.
    pub fn open_image(&mut self, index: usize) -> Result<DecodedImage, SessionError> {
        self.check_index(index)?;
        let image = decode_image(&self.records[index].path)?;
        self.load_image(index, &image)?;
        Ok(image)
    }

    /// Reload the saved labels of the current image, dropping edits.
    pub fn revert_current(&mut self) {
        let (Some(index), Some((w, h))) = (self.current, self.image_size) else {
            return;
        };
        let boxes = self.read_labels(index, w, h);
        self.boxes.replace_all(boxes, true);
        self.gesture = Gesture::Idle;
        self.sync_record();
    }

    fn read_labels(&self, index: usize, width: u32, height: u32) -> Vec<BBox> {
        let Some(label_path) = &self.records[index].label_path else {
            return Vec::new();
        };
        codec::load(label_path, width, height, &self.classes).unwrap_or_else(|e| {
            log::warn!("Cannot read labels {:?}: {}", label_path, e);
            Vec::new()
        })
    }

    // ── Saving ─────────────────────────────────────────────────────────────

    /// Write the current boxes and return the label file path.
    pub fn save_current(&mut self) -> Result<PathBuf, SessionError> {
        let (Some(index), Some((w, h))) = (self.current, self.image_size) else {
            return Err(SessionError::NoImage);
        };
        let record = &self.records[index];
        let path = label_path_for(&record.path, record.label_path.as_deref());

        codec::save(&path, self.boxes.as_slice(), w, h).map_err(|source| {
            log::error!("Saving {:?} failed: {}", path, source);
            SessionError::Save {
                path: path.clone(),
                source,
            }
        })?;

        self.boxes.mark_saved();
        self.records[index].label_path = Some(path.clone());
        self.sync_record();
        Ok(path)
    }

    // ── Box editing ────────────────────────────────────────────────────────

    pub fn remove_box(&mut self, index: usize) -> Option<BBox> {
        let removed = self.boxes.remove(index);
        if removed.is_some() {
            self.sync_record();
        }
        removed
    }

    pub fn clear_boxes(&mut self) {
        if self.boxes.is_empty() {
            return;
        }
        self.boxes.clear();
        self.sync_record();
    }

    fn sync_record(&mut self) {
        if let Some(record) = self.current.and_then(|i| self.records.get_mut(i)) {
            record.refresh_from(self.boxes.as_slice());
        }
    }

    /// Only valid class ids (or none) are accepted.
    pub fn select_class(&mut self, class_id: Option<usize>) -> bool {
        match class_id {
            Some(id) if id >= self.classes.len() => false,
            _ => {
                self.selected_class = class_id;
                true
            }
        }
    }

    /// Draw mode needs a loaded image. Leaving it cancels a box in progress.
    pub fn set_draw_mode(&mut self, enabled: bool) -> bool {
        if enabled && self.image_size.is_none() {
            return false;
        }
        self.draw_mode = enabled;
        if !enabled && matches!(self.gesture, Gesture::Drawing { .. }) {
            self.gesture = Gesture::Idle;
        }
        true
    }

    // ── Pointer input ──────────────────────────────────────────────────────

    pub fn on_pointer_down(
        &mut self,
        pos: Point,
        button: PointerButton,
    ) -> Result<(), SessionError> {
        if self.image_size.is_none() || self.gesture != Gesture::Idle {
            return Ok(());
        }
        match button {
            PointerButton::Primary if self.draw_mode => {
                if self.selected_class.is_none() {
                    return Err(SessionError::NoClassSelected);
                }
                let start = self.clamped_image_point(pos);
                self.gesture = Gesture::Drawing {
                    start,
                    current: Rect::from_corners(start, start),
                };
            }
            _ => self.gesture = Gesture::Panning { anchor: pos },
        }
        log::debug!("Gesture started: {:?}", self.gesture);
        Ok(())
    }

    /// Returns true when the canvas needs a repaint.
    pub fn on_pointer_move(&mut self, pos: Point) -> bool {
        match self.gesture {
            Gesture::Idle => false,
            Gesture::Drawing { start, .. } => {
                let end = self.clamped_image_point(pos);
                self.gesture = Gesture::Drawing {
                    start,
                    current: Rect::from_corners(start, end),
                };
                true
            }
            Gesture::Panning { anchor } => {
                self.viewport.pan_by(pos.x - anchor.x, pos.y - anchor.y);
                self.gesture = Gesture::Panning { anchor: pos };
                true
            }
        }
    }

    /// Ends the gesture. Returns the index of a newly committed box.
    pub fn on_pointer_up(
        &mut self,
        pos: Point,
        button: PointerButton,
    ) -> Result<Option<usize>, SessionError> {
        match self.gesture {
            Gesture::Idle => Ok(None),
            Gesture::Panning { .. } => {
                self.gesture = Gesture::Idle;
                Ok(None)
            }
            Gesture::Drawing { .. } if button != PointerButton::Primary => Ok(None),
            Gesture::Drawing { start, .. } => {
                let rect = Rect::from_corners(start, self.clamped_image_point(pos));
                self.finish_drawing();

                let Some(class_id) = self.selected_class.filter(|&id| id < self.classes.len())
                else {
                    return Err(SessionError::NoClassSelected);
                };
                if !rect.exceeds(self.options.min_box_size) {
                    log::debug!("Discarding undersized box {:?}", rect);
                    return Ok(None);
                }
                self.boxes
                    .add(BBox::new(class_id, self.classes.name_for(class_id), rect));
                self.sync_record();
                Ok(Some(self.boxes.len() - 1))
            }
        }
    }

    /// Abort the current gesture without side effects.
    pub fn cancel_gesture(&mut self) {
        if matches!(self.gesture, Gesture::Drawing { .. }) {
            self.finish_drawing();
        } else {
            self.gesture = Gesture::Idle;
        }
    }

    fn finish_drawing(&mut self) {
        self.gesture = Gesture::Idle;
        if !self.options.keep_draw_mode {
            self.draw_mode = false;
        }
    }

    fn clamped_image_point(&self, screen: Point) -> Point {
        let p = self.viewport.screen_to_image(screen);
        let (w, h) = self.image_size.unwrap_or((0, 0));
        Point::new(p.x.clamp(0, w as i32), p.y.clamp(0, h as i32))
    }

    // ── Viewport ───────────────────────────────────────────────────────────

    /// Zoom about `cursor`; positive `delta` zooms in.
    pub fn on_wheel(&mut self, cursor: Point, delta: f32) -> bool {
        if self.image_size.is_none() || delta == 0.0 {
            return false;
        }
        let factor = if delta > 0.0 {
            self.options.zoom_step
        } else {
            2.0 - self.options.zoom_step
        };
        self.viewport.zoom_at(cursor, factor);
        true
    }

    /// New canvas size. Refits the image while no gesture is active; a
    /// resize during a gesture is applied on the first call after it ends.
    pub fn on_resize(&mut self, width: u32, height: u32) -> bool {
        let changed = self.canvas_size != (width, height);
        self.canvas_size = (width, height);
        if self.image_size.is_none() || !(changed || self.needs_fit) {
            return false;
        }
        if self.gesture != Gesture::Idle {
            self.needs_fit = true;
            return false;
        }
        self.fit_or_defer();
        true
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        self.canvas_size
    }

    pub fn reset_view(&mut self) -> Result<(), SessionError> {
        let (w, h) = self.image_size.ok_or(SessionError::NoImage)?;
        self.viewport
            .fit_to_window(w, h, self.canvas_size.0, self.canvas_size.1)?;
        self.needs_fit = false;
        Ok(())
    }

    pub fn pan_by(&mut self, dx: i32, dy: i32) {
        self.viewport.pan_by(dx, dy);
    }

    fn fit_or_defer(&mut self) {
        match self.reset_view() {
            Ok(()) => {}
            Err(SessionError::ViewportNotReady(ViewportError::NotReady)) => {
                log::debug!("Canvas not ready, fit deferred to next resize");
                self.needs_fit = true;
            }
            Err(e) => log::debug!("Fit skipped: {}", e),
        }
    }

    /// Snapshot for the renderer.
    pub fn scene(&self) -> Scene<'_> {
        Scene {
            canvas_size: self.canvas_size,
            image_size: self.image_size,
            viewport: &self.viewport,
            boxes: self.boxes.as_slice(),
            gesture: self.gesture,
        }
    }

    fn check_index(&self, index: usize) -> Result<(), SessionError> {
        if index < self.records.len() {
            Ok(())
        } else {
            Err(SessionError::IndexOutOfRange {
                index,
                len: self.records.len(),
            })
        }
    }
}

/// Where labels for `image_path` are written.
///
/// An existing label path wins. Otherwise the last `images` path component
/// is swapped for `labels` when that directory exists, and finally the label
/// sits next to the image.
pub fn label_path_for(image_path: &Path, existing: Option<&Path>) -> PathBuf {
    if let Some(existing) = existing {
        return existing.to_path_buf();
    }
    if let Some(mirrored) = mirrored_label_path(image_path) {
        if mirrored.parent().is_some_and(Path::is_dir) {
            return mirrored;
        }
    }
    image_path.with_extension("txt")
}

/// `.../images/x/y.jpg` → `.../labels/x/y.txt`, using the last `images`
/// component.
pub fn mirrored_label_path(image_path: &Path) -> Option<PathBuf> {
    let components: Vec<Component<'_>> = image_path.components().collect();
    let idx = components
        .iter()
        .rposition(|c| c.as_os_str() == "images")?;

    let mut out = PathBuf::new();
    for (i, c) in components.iter().enumerate() {
        if i == idx {
            out.push("labels");
        } else {
            out.push(c.as_os_str());
        }
    }
    Some(out.with_extension("txt"))
}

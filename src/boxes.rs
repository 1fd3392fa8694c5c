//! Boxes of the image currently being annotated.

use crate::model::BBox;

/// Ordered boxes plus an unsaved-changes flag. Duplicates are allowed.
#[derive(Clone, Debug, Default)]
pub struct BoxStore {
    boxes: Vec<BBox>,
    modified: bool,
}

impl BoxStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, bbox: BBox) {
        self.boxes.push(bbox);
        self.modified = true;
    }

    /// Remove the box at `index`. Out-of-range indices are ignored.
    pub fn remove(&mut self, index: usize) -> Option<BBox> {
        if index >= self.boxes.len() {
            return None;
        }
        self.modified = true;
        Some(self.boxes.remove(index))
    }

    pub fn clear(&mut self) {
        self.boxes.clear();
        self.modified = true;
    }

    /// Replace every box. `fresh_load` marks the result as unmodified.
    pub fn replace_all(&mut self, boxes: Vec<BBox>, fresh_load: bool) {
        self.boxes = boxes;
        self.modified = !fresh_load;
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub(crate) fn mark_saved(&mut self) {
        self.modified = false;
    }

    pub(crate) fn rename_classes(&mut self, name_for: impl Fn(usize) -> String) {
        for b in &mut self.boxes {
            b.class_name = name_for(b.class_id);
        }
    }

    pub fn as_slice(&self) -> &[BBox] {
        &self.boxes
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BBox> {
        self.boxes.iter()
    }
}

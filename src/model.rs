//! Core data model: pixel points and rectangles, boxes, and image records.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Integer pixel position, either in image space or screen space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned integer rectangle with `x1 <= x2` and `y1 <= y2`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rect {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Rect {
    /// Normalized rectangle spanned by two arbitrary corners.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            x1: a.x.min(b.x),
            y1: a.y.min(b.y),
            x2: a.x.max(b.x),
            y2: a.y.max(b.y),
        }
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    /// True when both sides are strictly larger than `min_size`.
    pub fn exceeds(&self, min_size: i32) -> bool {
        self.width() > min_size && self.height() > min_size
    }

    pub fn min(&self) -> Point {
        Point::new(self.x1, self.y1)
    }

    pub fn max(&self) -> Point {
        Point::new(self.x2, self.y2)
    }
}

/// A labelled bounding box in image pixel coordinates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BBox {
    pub class_id: usize,
    pub class_name: String,
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BBox {
    pub fn new(class_id: usize, class_name: impl Into<String>, rect: Rect) -> Self {
        Self {
            class_id,
            class_name: class_name.into(),
            x1: rect.x1,
            y1: rect.y1,
            x2: rect.x2,
            y2: rect.y2,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect {
            x1: self.x1,
            y1: self.y1,
            x2: self.x2,
            y2: self.y2,
        }
    }
}

/// One image discovered in a dataset, together with its label summary.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImageRecord {
    pub path: PathBuf,
    pub label_path: Option<PathBuf>,
    pub has_annotation: bool,
    pub annotation_count: usize,
    pub label_types: BTreeSet<String>,
}

impl ImageRecord {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// File name for list display.
    pub fn name(&self) -> String {
        file_name(&self.path)
    }

    /// Recompute the annotation summary from the boxes currently in memory.
    pub fn refresh_from(&mut self, boxes: &[BBox]) {
        self.annotation_count = boxes.len();
        self.has_annotation = !boxes.is_empty();
        self.label_types = boxes.iter().map(|b| b.class_name.clone()).collect();
    }

    /// Comma separated label types, sorted.
    pub fn label_types_display(&self) -> String {
        self.label_types
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_from_corners_normalizes_order() {
        let r = Rect::from_corners(Point::new(30, 5), Point::new(10, 40));
        assert_eq!(r, Rect { x1: 10, y1: 5, x2: 30, y2: 40 });
        assert_eq!(r.width(), 20);
        assert_eq!(r.height(), 35);
    }

    #[test]
    fn exceeds_is_strict() {
        let r = Rect { x1: 0, y1: 0, x2: 2, y2: 10 };
        assert!(!r.exceeds(2));
        let r = Rect { x1: 0, y1: 0, x2: 3, y2: 3 };
        assert!(r.exceeds(2));
    }

    #[test]
    fn refresh_from_empty_clears_annotation_flag() {
        let mut record = ImageRecord::new("a/b.jpg");
        record.refresh_from(&[BBox::new(0, "cat", Rect { x1: 0, y1: 0, x2: 5, y2: 5 })]);
        assert!(record.has_annotation);
        assert_eq!(record.annotation_count, 1);
        assert_eq!(record.label_types_display(), "cat");

        record.refresh_from(&[]);
        assert!(!record.has_annotation);
        assert_eq!(record.annotation_count, 0);
        assert!(record.label_types.is_empty());
        assert_eq!(record.name(), "b.jpg");
    }
}

//! Normalized label file format.
//!
//! Each line in a label file:
//! ```text
//! <class_id> <x_center> <y_center> <width> <height>
//! ```
//!
//! The four floats are normalized to [0, 1] by the image width and height
//! and written with 6 decimal digits.

use crate::classes::ClassTable;
use crate::error::CodecError;
use crate::model::{BBox, Rect};
use std::io::Write;
use std::path::Path;

fn malformed(line: &str, reason: impl Into<String>) -> CodecError {
    CodecError::MalformedLine {
        line: line.trim().to_string(),
        reason: reason.into(),
    }
}

/// Parse one label line into a pixel-space box for an image of
/// `width`×`height`. Tokens after the fifth are ignored.
pub fn decode(
    line: &str,
    width: u32,
    height: u32,
    classes: &ClassTable,
) -> Result<BBox, CodecError> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 5 {
        return Err(malformed(
            line,
            format!("expected 5 fields, found {}", parts.len()),
        ));
    }

    let class_id: usize = parts[0]
        .parse()
        .map_err(|_| malformed(line, format!("invalid class id '{}'", parts[0])))?;

    let mut coords = [0.0f64; 4];
    for (slot, token) in coords.iter_mut().zip(&parts[1..5]) {
        let value: f64 = token
            .parse()
            .map_err(|_| malformed(line, format!("invalid number '{}'", token)))?;
        if !value.is_finite() {
            return Err(malformed(line, format!("non-finite number '{}'", token)));
        }
        *slot = value;
    }
    let [xc, yc, w, h] = coords;
    if w <= 0.0 || h <= 0.0 {
        return Err(malformed(line, "width and height must be positive"));
    }
    let (img_w, img_h) = (f64::from(width), f64::from(height));

    let rect = Rect {
        x1: ((xc - w / 2.0) * img_w) as i32,
        y1: ((yc - h / 2.0) * img_h) as i32,
        x2: ((xc + w / 2.0) * img_w) as i32,
        y2: ((yc + h / 2.0) * img_h) as i32,
    };
    Ok(BBox::new(class_id, classes.name_for(class_id), rect))
}

/// Format a box as a label line (without the trailing newline).
pub fn encode(bbox: &BBox, width: u32, height: u32) -> String {
    let (img_w, img_h) = (f64::from(width), f64::from(height));
    let xc = f64::from(bbox.x1 + bbox.x2) / 2.0 / img_w;
    let yc = f64::from(bbox.y1 + bbox.y2) / 2.0 / img_h;
    let w = f64::from(bbox.x2 - bbox.x1) / img_w;
    let h = f64::from(bbox.y2 - bbox.y1) / img_h;
    format!("{} {:.6} {:.6} {:.6} {:.6}", bbox.class_id, xc, yc, w, h)
}

/// Whole-file contents for `boxes`, one newline-terminated line per box.
pub fn encode_all(boxes: &[BBox], width: u32, height: u32) -> String {
    boxes
        .iter()
        .map(|b| encode(b, width, height) + "\n")
        .collect()
}

/// Decode every line of `text`, skipping blank and malformed lines.
pub fn decode_all(text: &str, width: u32, height: u32, classes: &ClassTable) -> Vec<BBox> {
    let mut boxes = Vec::new();
    for (line_num, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match decode(line, width, height, classes) {
            Ok(b) => boxes.push(b),
            Err(e) => log::warn!("Skipping label line {}: {}", line_num + 1, e),
        }
    }
    boxes
}

/// Read a label file. A missing file is an empty label set.
pub fn load(
    path: &Path,
    width: u32,
    height: u32,
    classes: &ClassTable,
) -> Result<Vec<BBox>, CodecError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let text = std::fs::read_to_string(path)?;
    let boxes = decode_all(&text, width, height, classes);
    log::debug!("Loaded {} boxes from {:?}", boxes.len(), path);
    Ok(boxes)
}

/// Atomically replace the label file at `path`.
///
/// The contents go to a temporary file in the same directory which is then
/// renamed over the destination, so a crash never leaves a partial file.
pub fn save(path: &Path, boxes: &[BBox], width: u32, height: u32) -> Result<(), CodecError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(encode_all(boxes, width, height).as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| CodecError::Io(e.error))?;
    log::info!("Saved {} boxes to {:?}", boxes.len(), path);
    Ok(())
}

//! Dataset directory scanning.
//!
//! Every image under the root becomes an [`ImageRecord`]. Labels are looked
//! up next to the image (`x.jpg` → `x.txt`) and then in the mirrored
//! `labels/` tree (`images/a/x.jpg` → `labels/a/x.txt`).

use crate::classes::ClassTable;
use crate::model::ImageRecord;
use crate::session::mirrored_label_path;
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tif", "tiff"];

pub fn is_image(path: &Path) -> bool {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return false;
    };
    IMAGE_EXTENSIONS
        .iter()
        .any(|allowed| ext.eq_ignore_ascii_case(allowed))
}

/// Existing label file for `image_path`, if any.
pub fn find_label(image_path: &Path) -> Option<PathBuf> {
    let sibling = image_path.with_extension("txt");
    if sibling.is_file() {
        return Some(sibling);
    }
    mirrored_label_path(image_path).filter(|p| p.is_file())
}

/// Walk `root` and build one record per image, sorted by path.
pub fn scan_dataset(root: &Path, classes: &ClassTable) -> io::Result<Vec<ImageRecord>> {
    if !root.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} is not a directory", root.display()),
        ));
    }

    let mut images = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        match entry {
            Ok(entry) if entry.file_type().is_file() && is_image(entry.path()) => {
                images.push(entry.into_path());
            }
            Ok(_) => {}
            Err(e) => log::warn!("Skipping unreadable entry: {}", e),
        }
    }
    images.sort();

    let records: Vec<ImageRecord> = images
        .into_iter()
        .map(|path| {
            let mut record = ImageRecord::new(path);
            if let Some(label) = find_label(&record.path) {
                summarize_label(&mut record, &label, classes);
                record.label_path = Some(label);
            }
            record
        })
        .collect();

    log::info!(
        "Scanned {:?}: {} images, {} with labels",
        root,
        records.len(),
        records.iter().filter(|r| r.has_annotation).count()
    );
    Ok(records)
}

fn summarize_label(record: &mut ImageRecord, label: &Path, classes: &ClassTable) {
    record.has_annotation = true;
    let text = match std::fs::read_to_string(label) {
        Ok(text) => text,
        Err(e) => {
            log::warn!("Cannot read {:?}: {}", label, e);
            return;
        }
    };

    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    record.annotation_count = lines.len();
    record.label_types = lines
        .iter()
        .filter_map(|line| line.split_whitespace().next()?.parse::<usize>().ok())
        .map(|id| classes.name_for(id))
        .collect::<BTreeSet<_>>();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn scan_pairs_images_with_labels() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("images/train")).unwrap();
        fs::create_dir_all(root.join("labels/train")).unwrap();
        fs::create_dir_all(root.join("loose")).unwrap();

        fs::write(root.join("images/train/b.JPG"), b"").unwrap();
        fs::write(root.join("images/train/a.png"), b"").unwrap();
        fs::write(
            root.join("labels/train/a.txt"),
            "0 0.5 0.5 0.1 0.1\n\n5 0.2 0.2 0.1 0.1\n0 0.3 0.3 0.1 0.1\n",
        )
        .unwrap();
        fs::write(root.join("loose/c.bmp"), b"").unwrap();
        fs::write(root.join("loose/c.txt"), "1 0.5 0.5 0.5 0.5\n").unwrap();
        fs::write(root.join("loose/notes.md"), b"").unwrap();

        let classes = ClassTable::new(["cat", "dog"]);
        let records = scan_dataset(root, &classes).unwrap();
        let names: Vec<String> = records.iter().map(ImageRecord::name).collect();
        assert_eq!(names, ["a.png", "b.JPG", "c.bmp"]);

        let a = &records[0];
        assert_eq!(a.label_path.as_deref(), Some(root.join("labels/train/a.txt").as_path()));
        assert!(a.has_annotation);
        assert_eq!(a.annotation_count, 3);
        assert_eq!(a.label_types_display(), "5,cat");

        let b = &records[1];
        assert!(b.label_path.is_none());
        assert!(!b.has_annotation);

        let c = &records[2];
        assert_eq!(c.label_path.as_deref(), Some(root.join("loose/c.txt").as_path()));
        assert_eq!(c.label_types_display(), "dog");
    }

    #[test]
    fn scan_missing_root_fails() {
        let temp = tempfile::tempdir().unwrap();
        assert!(scan_dataset(&temp.path().join("nope"), &ClassTable::default()).is_err());
    }
}

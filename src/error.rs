//! Error types for label files, class tables, image decoding and the
//! annotation session.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while reading or writing label files.
#[derive(Error, Debug)]
pub enum CodecError {
    /// A label line that could not be parsed. Callers skip it and continue.
    #[error("Malformed label line '{line}': {reason}")]
    MalformedLine {
        /// The offending line, trimmed
        line: String,
        /// Why it was rejected
        reason: String,
    },

    /// I/O error while reading or writing a label file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The canvas has no usable size yet.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewportError {
    #[error("Canvas is not ready (zero-sized viewport)")]
    NotReady,
}

/// An image file that could not be decoded.
#[derive(Error, Debug, Clone)]
#[error("Cannot decode image {path:?}: {message}")]
pub struct DecodeError {
    pub path: PathBuf,
    pub message: String,
}

/// Errors while loading a class table.
#[derive(Error, Debug)]
pub enum ClassTableError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Structured config without a `names` field
    #[error("Class config {path:?} has no 'names' field")]
    MissingNames { path: PathBuf },

    /// The file parsed but lists no classes
    #[error("Class file {path:?} defines no classes")]
    Empty { path: PathBuf },
}

/// Errors for the persisted application config.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No config directory available on this platform")]
    NoConfigDir,
}

/// Errors surfaced by [`crate::session::AnnotationSession`].
///
/// None of these are fatal: the worst outcome is an edit that was not saved.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The image could not be decoded; the previous image stays displayed.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Writing the label file failed; the store stays marked as modified.
    #[error("Failed to save labels to {path:?}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: CodecError,
    },

    /// A box was committed without an active class.
    #[error("Select a class before drawing a box")]
    NoClassSelected,

    /// Zero-sized canvas; retried on the next resize.
    #[error(transparent)]
    ViewportNotReady(#[from] ViewportError),

    /// The operation needs a loaded image.
    #[error("No image is loaded")]
    NoImage,

    #[error("Image index {index} is out of range ({len} images)")]
    IndexOutOfRange { index: usize, len: usize },
}

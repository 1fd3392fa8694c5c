//! YOLO bounding-box annotation tool.
//!
//! The annotation model (label codec, viewport math, box store, gesture
//! state machine and renderer) has no GUI dependency; [`app`] wires it into
//! an `eframe` window.

pub mod app;
pub mod boxes;
pub mod classes;
pub mod codec;
pub mod config;
pub mod dataset;
pub mod error;
pub mod loader;
pub mod model;
pub mod render;
pub mod session;
pub mod viewport;

pub use boxes::BoxStore;
pub use classes::ClassTable;
pub use config::AppConfig;
pub use error::{ClassTableError, CodecError, ConfigError, DecodeError, SessionError, ViewportError};
pub use model::{BBox, ImageRecord, Point, Rect};
pub use render::{CanvasRenderer, DrawCommand, Scene};
pub use session::{AnnotationSession, Gesture, PointerButton, SwitchDecision, SwitchOutcome, SwitchRequest};
pub use viewport::Viewport;

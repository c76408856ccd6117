//! Cartomark Core Library
//!
//! Platform-agnostic data structures and editor logic for the Cartomark
//! layered annotation editor.

pub mod camera;
pub mod editor;
pub mod event;
pub mod history;
pub mod layer;
pub mod project;
pub mod router;
pub mod storage;
pub mod store;
pub mod tools;

pub use camera::{Camera, ViewState};
pub use editor::Editor;
pub use event::ChangeEvent;
pub use history::HistoryStore;
pub use layer::{
    Layer, LayerId, Marker, MarkerId, Rgba, Stroke, StrokeKind, TextAnnotation, TextId, VersionKey,
};
pub use project::Project;
pub use router::{InteractionRouter, PointerButton};
pub use store::{LayerError, LayerStore};
pub use tools::{ToolKind, ToolOptions};

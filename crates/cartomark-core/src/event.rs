//! Typed change notifications emitted by the editor.
//!
//! The shell drains these once per frame and feeds them to the
//! compositor (cache invalidation, redraw scheduling) and to its own
//! layer-list and marker-list views. This replaces ad hoc broadcast
//! messaging with one explicit event interface owned by the core.

use crate::layer::{LayerId, MarkerId};
use kurbo::Point;

/// A change notification from the editor.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    /// The layer list structure or attributes changed; list views should
    /// re-render.
    LayersChanged,
    /// A different layer became active.
    ActiveLayerChanged(usize),
    /// A layer's content counts changed; the version key will pick this
    /// up on the next composite.
    LayerContentChanged(LayerId),
    /// In-place mutation invisible to the version key (marker move or
    /// restyle, text edit); caches for this layer must be dropped.
    LayerInvalidated(LayerId),
    /// Color, opacity, or z-order changed; counts are unaffected so all
    /// caches must be dropped and the frame recomposited.
    AppearanceChanged,
    /// A draw gesture finished on this layer; its cache entry and live
    /// buffer must be dropped.
    StrokeCommitted(LayerId),
    /// The marker set or selection changed; marker list views should
    /// re-render.
    MarkersChanged,
    /// The view transform changed; recomposite with the new placement.
    ViewChanged,
    /// The user asked to edit a marker (secondary click or re-click).
    MarkerEditRequested(MarkerId),
    /// The user clicked with the text tool; the shell should open its
    /// text input at this world position.
    TextEditRequested(Point),
}

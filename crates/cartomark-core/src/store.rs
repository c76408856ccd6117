//! Ordered layer collection and its structural and content operations.

use crate::layer::{
    Layer, LayerId, Marker, MarkerId, Rgba, Stroke, StrokeKind, TextAnnotation, TextId,
    VersionKey, LAYER_PALETTE,
};
use kurbo::Point;
use thiserror::Error;

/// Errors for layer store operations.
///
/// Validation failures leave the store unchanged.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayerError {
    #[error("at least one layer must remain")]
    LastLayer,
    #[error("layer name must not be empty")]
    EmptyName,
    #[error("layer index {index} out of range (len {len})")]
    OutOfRange { index: usize, len: usize },
    #[error("no layer exists to draw on")]
    NoLayers,
    #[error("no stroke in progress on the active layer")]
    NoStroke,
    #[error("no marker with id {0}")]
    MarkerNotFound(MarkerId),
    #[error("no text annotation with id {0}")]
    TextNotFound(TextId),
}

/// Result type for layer store operations.
pub type LayerResult<T> = Result<T, LayerError>;

/// Ordered collection of layers plus the active-layer index.
///
/// Z-order: lower index paints later, so index 0 is the topmost layer.
/// New layers are inserted at index 0 and become active. While any layer
/// exists the active index is always valid.
#[derive(Debug, Clone, Default)]
pub struct LayerStore {
    layers: Vec<Layer>,
    active: usize,
    /// Number of layers ever created, used to cycle the default palette.
    created: usize,
}

impl LayerStore {
    /// Create an empty store.
    ///
    /// Drawing operations require at least one layer; creating the first
    /// layer is the caller's responsibility.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    /// The active layer, if any layer exists.
    pub fn active_layer(&self) -> Option<&Layer> {
        self.layers.get(self.active)
    }

    pub fn active_layer_mut(&mut self) -> Option<&mut Layer> {
        self.layers.get_mut(self.active)
    }

    pub fn get(&self, index: usize) -> LayerResult<&Layer> {
        let len = self.layers.len();
        self.layers
            .get(index)
            .ok_or(LayerError::OutOfRange { index, len })
    }

    fn get_mut(&mut self, index: usize) -> LayerResult<&mut Layer> {
        let len = self.layers.len();
        self.layers
            .get_mut(index)
            .ok_or(LayerError::OutOfRange { index, len })
    }

    /// Aggregate content signature of all layers, in z-order.
    ///
    /// Used by the compositor to skip work when nothing changed.
    pub fn signature(&self) -> Vec<(LayerId, VersionKey)> {
        self.layers
            .iter()
            .map(|layer| (layer.id, layer.version_key()))
            .collect()
    }

    /// Create a layer, inserting it at index 0 and making it active.
    ///
    /// Without a name the layer is called `Layer N`; without a color it
    /// takes the next color from the default palette.
    pub fn create(&mut self, name: Option<String>, color: Option<Rgba>) -> LayerId {
        let name = name.unwrap_or_else(|| format!("Layer {}", self.layers.len() + 1));
        let color = color.unwrap_or(LAYER_PALETTE[self.created % LAYER_PALETTE.len()]);
        self.created += 1;

        let layer = Layer::new(name, color);
        let id = layer.id;
        self.layers.insert(0, layer);
        self.active = 0;
        id
    }

    /// Delete the layer at `index`. The last remaining layer cannot be
    /// deleted.
    pub fn delete(&mut self, index: usize) -> LayerResult<Layer> {
        if self.layers.len() <= 1 {
            return Err(LayerError::LastLayer);
        }
        let len = self.layers.len();
        if index >= len {
            return Err(LayerError::OutOfRange { index, len });
        }

        let removed = self.layers.remove(index);

        // Keep the active index pointing at a sensible layer: prefer the
        // one that took the deleted slot, falling back to the new end.
        if index == self.active || self.active >= self.layers.len() {
            self.active = index.min(self.layers.len() - 1);
        } else if index < self.active {
            self.active -= 1;
        }

        Ok(removed)
    }

    /// Rename a layer. Empty or whitespace-only names are rejected.
    pub fn rename(&mut self, index: usize, name: &str) -> LayerResult<()> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(LayerError::EmptyName);
        }
        self.get_mut(index)?.name = trimmed.to_string();
        Ok(())
    }

    pub fn set_color(&mut self, index: usize, color: Rgba) -> LayerResult<()> {
        self.get_mut(index)?.color = color;
        Ok(())
    }

    /// Set a layer's opacity, clamped to [0, 1].
    pub fn set_opacity(&mut self, index: usize, opacity: f64) -> LayerResult<()> {
        self.get_mut(index)?.opacity = opacity.clamp(0.0, 1.0);
        Ok(())
    }

    pub fn toggle_visibility(&mut self, index: usize) -> LayerResult<()> {
        let layer = self.get_mut(index)?;
        layer.visible = !layer.visible;
        Ok(())
    }

    /// Move a layer from one index to another (splice move).
    ///
    /// The active index is re-derived so it keeps tracking the same
    /// logical layer through the move.
    pub fn reorder(&mut self, from: usize, to: usize) -> LayerResult<()> {
        let len = self.layers.len();
        if from >= len {
            return Err(LayerError::OutOfRange { index: from, len });
        }
        if to >= len {
            return Err(LayerError::OutOfRange { index: to, len });
        }
        if from == to {
            return Ok(());
        }

        let layer = self.layers.remove(from);
        self.layers.insert(to, layer);

        if self.active == from {
            self.active = to;
        } else if from < self.active && to >= self.active {
            self.active -= 1;
        } else if from > self.active && to <= self.active {
            self.active += 1;
        }

        Ok(())
    }

    pub fn set_active(&mut self, index: usize) -> LayerResult<()> {
        let len = self.layers.len();
        if index >= len {
            return Err(LayerError::OutOfRange { index, len });
        }
        self.active = index;
        Ok(())
    }

    /// Replace the whole layer collection (snapshot restore or project
    /// load), clamping the active index.
    pub fn replace_all(&mut self, layers: Vec<Layer>) {
        self.layers = layers;
        if self.layers.is_empty() {
            self.active = 0;
        } else {
            self.active = self.active.min(self.layers.len() - 1);
        }
    }

    /// Clear all content from the layer at `index`.
    pub fn clear_layer(&mut self, index: usize) -> LayerResult<LayerId> {
        let layer = self.get_mut(index)?;
        layer.clear();
        Ok(layer.id)
    }

    // --- stroke content -------------------------------------------------

    /// Append a new empty stroke to the active layer.
    pub fn begin_stroke(
        &mut self,
        kind: StrokeKind,
        size: f64,
        color: Option<Rgba>,
    ) -> LayerResult<LayerId> {
        let layer = self.active_layer_mut().ok_or(LayerError::NoLayers)?;
        layer.strokes.push(Stroke::new(kind, size, color));
        Ok(layer.id)
    }

    /// Append a world point to the active layer's newest stroke.
    pub fn append_stroke_point(&mut self, point: Point) -> LayerResult<()> {
        let layer = self.active_layer_mut().ok_or(LayerError::NoLayers)?;
        let stroke = layer.strokes.last_mut().ok_or(LayerError::NoStroke)?;
        stroke.add_point(point);
        Ok(())
    }

    // --- marker content -------------------------------------------------

    /// Add a marker to the active layer.
    pub fn add_marker(&mut self, marker: Marker) -> LayerResult<(LayerId, MarkerId)> {
        let layer = self.active_layer_mut().ok_or(LayerError::NoLayers)?;
        let marker_id = marker.id;
        layer.markers.push(marker);
        Ok((layer.id, marker_id))
    }

    /// Hit-test markers on visible layers, topmost layer first and
    /// last-placed marker first within each layer.
    pub fn hit_test_marker(&self, point: Point) -> Option<MarkerId> {
        self.layers
            .iter()
            .filter(|layer| layer.visible)
            .flat_map(|layer| layer.markers.iter().rev())
            .find(|marker| marker.hit_test(point))
            .map(|marker| marker.id)
    }

    /// Find a marker anywhere in the stack.
    pub fn find_marker(&self, id: MarkerId) -> Option<&Marker> {
        self.layers.iter().find_map(|layer| layer.marker(id))
    }

    /// Apply an update to a marker in place.
    ///
    /// Returns the owning layer's id so callers can emit an explicit
    /// invalidation (in-place edits are invisible to the version key).
    pub fn update_marker(
        &mut self,
        id: MarkerId,
        update: impl FnOnce(&mut Marker),
    ) -> LayerResult<LayerId> {
        for layer in &mut self.layers {
            if let Some(marker) = layer.marker_mut(id) {
                update(marker);
                return Ok(layer.id);
            }
        }
        Err(LayerError::MarkerNotFound(id))
    }

    /// Move a marker to a new world position.
    pub fn move_marker(&mut self, id: MarkerId, pos: Point) -> LayerResult<LayerId> {
        self.update_marker(id, |marker| marker.pos = pos)
    }

    /// Remove a marker, returning the owning layer's id.
    pub fn delete_marker(&mut self, id: MarkerId) -> LayerResult<LayerId> {
        for layer in &mut self.layers {
            if layer.markers.iter().any(|m| m.id == id) {
                layer.markers.retain(|m| m.id != id);
                return Ok(layer.id);
            }
        }
        Err(LayerError::MarkerNotFound(id))
    }

    // --- text content ---------------------------------------------------

    /// Add a text annotation to the active layer.
    pub fn add_text(&mut self, text: TextAnnotation) -> LayerResult<(LayerId, TextId)> {
        let layer = self.active_layer_mut().ok_or(LayerError::NoLayers)?;
        let text_id = text.id;
        layer.texts.push(text);
        Ok((layer.id, text_id))
    }

    /// Apply an update to a text annotation in place.
    pub fn update_text(
        &mut self,
        id: TextId,
        update: impl FnOnce(&mut TextAnnotation),
    ) -> LayerResult<LayerId> {
        for layer in &mut self.layers {
            if let Some(text) = layer.text_mut(id) {
                update(text);
                return Ok(layer.id);
            }
        }
        Err(LayerError::TextNotFound(id))
    }

    /// Remove a text annotation, returning the owning layer's id.
    pub fn delete_text(&mut self, id: TextId) -> LayerResult<LayerId> {
        for layer in &mut self.layers {
            if layer.texts.iter().any(|t| t.id == id) {
                layer.texts.retain(|t| t.id != id);
                return Ok(layer.id);
            }
        }
        Err(LayerError::TextNotFound(id))
    }
}

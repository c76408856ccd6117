//! Incremental painting for the stroke currently being drawn.
//!
//! While a draw gesture is open, re-rasterizing the whole layer on every
//! pointer sample would make stroke latency scale with layer complexity.
//! Instead a base buffer is captured once per gesture: the layer with
//! everything committed except the in-progress stroke. Each frame blits
//! that base and paints only the newest stroke's polyline on top.

use crate::raster;
use crate::text::TextPainter;
use cartomark_core::{Layer, LayerId};
use log::debug;
use tiny_skia::Pixmap;

/// Base buffer for a draw gesture on one layer.
pub struct LiveStroke {
    layer_id: LayerId,
    /// The layer rasterized without its newest stroke, full alpha.
    base: Pixmap,
    /// Stroke count the base was captured at (newest excluded).
    committed: usize,
}

impl LiveStroke {
    /// Stroke count the base buffer reflects.
    pub fn committed(&self) -> usize {
        self.committed
    }

    pub fn layer_id(&self) -> LayerId {
        self.layer_id
    }

    /// Get a base buffer consistent with the layer's current state,
    /// reusing the existing one when possible.
    ///
    /// If the recorded committed count no longer matches the layer (an
    /// undo or redo landed mid-gesture), the base is regenerated once
    /// rather than failing; drawing never blocks on a stale cache.
    pub fn ensure<'a>(
        slot: &'a mut Option<LiveStroke>,
        layer: &Layer,
        width: u32,
        height: u32,
        text: &TextPainter,
    ) -> Option<&'a LiveStroke> {
        let committed = layer.strokes.len().saturating_sub(1);

        let stale = match slot {
            Some(live) => live.layer_id != layer.id || live.committed != committed,
            None => true,
        };

        if stale {
            if slot.is_some() {
                debug!("live stroke base out of date, regenerating");
            }
            let mut base = Pixmap::new(width, height)?;
            raster::paint_layer_partial(&mut base, layer, committed, text);
            *slot = Some(LiveStroke {
                layer_id: layer.id,
                base,
                committed,
            });
        }

        slot.as_ref()
    }

    /// Compose this gesture's frame for the layer: the base buffer plus
    /// the in-progress stroke, with markers and texts repainted above.
    ///
    /// The stroke is applied to a scratch copy of the base so eraser
    /// semantics stay confined to this layer's own pixels.
    pub fn compose(&self, layer: &Layer, text: &TextPainter) -> Pixmap {
        let mut scratch = self.base.clone();
        if let Some(stroke) = layer.strokes.last() {
            let color = stroke.color.unwrap_or(layer.color);
            raster::paint_stroke(&mut scratch, stroke, color);
            raster::paint_overlays(&mut scratch, layer, text);
        }
        scratch
    }
}

//! Rasterization of layer content onto tiny-skia pixmaps.
//!
//! Layer buffers are painted at full opacity; the layer's own opacity is
//! applied once at composite time. Draw order within a layer is strokes,
//! then markers, then texts, so markers and labels always sit above
//! stroke content.

use crate::text::TextPainter;
use cartomark_core::{Layer, Marker, Rgba, Stroke, StrokeKind, TextAnnotation};
use tiny_skia::{
    BlendMode, FillRule, LineCap, LineJoin, Paint, PathBuilder, Pixmap, Stroke as StrokeStyle,
    Transform,
};

/// Width of the white ring drawn around marker discs.
const MARKER_RING_WIDTH: f32 = 2.0;
/// Gap between a marker disc and its label baseline.
const MARKER_LABEL_GAP: f64 = 4.0;

pub(crate) fn to_skia_color(color: Rgba) -> tiny_skia::Color {
    tiny_skia::Color::from_rgba8(color.r, color.g, color.b, color.a)
}

/// Paint one stroke. Pen and line strokes paint source-over in `color`;
/// eraser strokes clear the buffer's pixels with destination-out and
/// ignore the color entirely.
pub fn paint_stroke(pixmap: &mut Pixmap, stroke: &Stroke, color: Rgba) {
    if stroke.points.len() < 2 {
        return;
    }

    let mut pb = PathBuilder::new();
    let first = stroke.points[0];
    pb.move_to(first.x as f32, first.y as f32);
    for point in stroke.points.iter().skip(1) {
        pb.line_to(point.x as f32, point.y as f32);
    }
    let Some(path) = pb.finish() else {
        return;
    };

    let mut paint = Paint::default();
    paint.anti_alias = true;
    match stroke.kind {
        StrokeKind::Eraser => {
            paint.set_color(tiny_skia::Color::BLACK);
            paint.blend_mode = BlendMode::DestinationOut;
        }
        StrokeKind::Pen | StrokeKind::Line => {
            paint.set_color(to_skia_color(color));
            paint.blend_mode = BlendMode::SourceOver;
        }
    }

    let style = StrokeStyle {
        width: stroke.size as f32,
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        ..StrokeStyle::default()
    };

    pixmap.stroke_path(&path, &paint, &style, Transform::identity(), None);
}

/// Paint a marker disc with its white ring and optional centered label.
pub fn paint_marker(pixmap: &mut Pixmap, marker: &Marker, text: &TextPainter) {
    let radius = (marker.size / 2.0) as f32;
    let Some(path) =
        PathBuilder::from_circle(marker.pos.x as f32, marker.pos.y as f32, radius)
    else {
        return;
    };

    let mut fill = Paint::default();
    fill.anti_alias = true;
    fill.set_color(to_skia_color(marker.color));
    pixmap.fill_path(&path, &fill, FillRule::Winding, Transform::identity(), None);

    let mut ring = Paint::default();
    ring.anti_alias = true;
    ring.set_color(tiny_skia::Color::WHITE);
    let style = StrokeStyle {
        width: MARKER_RING_WIDTH,
        ..StrokeStyle::default()
    };
    pixmap.stroke_path(&path, &ring, &style, Transform::identity(), None);

    if !marker.text.is_empty() {
        let px = marker.font_size as f32;
        let width = text.measure(&marker.text, px) as f64;
        let origin = kurbo::Point::new(
            marker.pos.x - width / 2.0,
            marker.pos.y - marker.size / 2.0 - MARKER_LABEL_GAP,
        );
        text.draw(pixmap, &marker.text, origin, px, marker.text_color);
    }
}

/// Paint a text annotation with its baseline at the anchor point.
pub fn paint_text(pixmap: &mut Pixmap, annotation: &TextAnnotation, text: &TextPainter) {
    if annotation.text.is_empty() {
        return;
    }
    text.draw(
        pixmap,
        &annotation.text,
        annotation.pos,
        annotation.font_size as f32,
        annotation.color,
    );
}

/// Paint a layer's markers and texts (the content that sits above
/// strokes).
pub fn paint_overlays(pixmap: &mut Pixmap, layer: &Layer, text: &TextPainter) {
    for marker in &layer.markers {
        paint_marker(pixmap, marker, text);
    }
    for annotation in &layer.texts {
        paint_text(pixmap, annotation, text);
    }
}

/// Rasterize a layer's first `stroke_limit` strokes plus all overlays
/// into a full-alpha buffer.
///
/// Pen and line strokes take the layer's current color, so recoloring a
/// layer retints its content on the next rebuild.
pub fn paint_layer_partial(
    pixmap: &mut Pixmap,
    layer: &Layer,
    stroke_limit: usize,
    text: &TextPainter,
) {
    for stroke in layer.strokes.iter().take(stroke_limit) {
        paint_stroke(pixmap, stroke, layer.color);
    }
    paint_overlays(pixmap, layer, text);
}

/// Rasterize a complete layer into a full-alpha buffer.
pub fn paint_layer(pixmap: &mut Pixmap, layer: &Layer, text: &TextPainter) {
    paint_layer_partial(pixmap, layer, layer.strokes.len(), text);
}

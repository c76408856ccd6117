//! Layer data model: strokes, point markers, and text annotations.

use kurbo::Point;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a layer.
pub type LayerId = Uuid;
/// Unique identifier for a marker.
pub type MarkerId = Uuid;
/// Unique identifier for a text annotation.
pub type TextId = Uuid;

/// Extra hit-test tolerance around a marker, in world pixels.
pub const MARKER_HIT_SLOP: f64 = 5.0;

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    pub const fn black() -> Self {
        Self::opaque(0, 0, 0)
    }

    pub const fn white() -> Self {
        Self::opaque(255, 255, 255)
    }

    /// Parse a hex color string (`#rgb`, `#rrggbb`, or `#rrggbbaa`).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex).trim();
        match hex.len() {
            3 => {
                // #rgb -> #rrggbb
                let r = u8::from_str_radix(&hex[0..1], 16).ok()? * 17;
                let g = u8::from_str_radix(&hex[1..2], 16).ok()? * 17;
                let b = u8::from_str_radix(&hex[2..3], 16).ok()? * 17;
                Some(Self::opaque(r, g, b))
            }
            6 => {
                let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
                let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
                let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
                Some(Self::opaque(r, g, b))
            }
            8 => {
                let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
                let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
                let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
                let a = u8::from_str_radix(&hex[6..8], 16).ok()?;
                Some(Self::new(r, g, b, a))
            }
            _ => None,
        }
    }

    /// Format as a `#rrggbb` hex string (alpha omitted when fully opaque).
    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

/// The default accent color used for new annotations.
pub const DEFAULT_ACCENT: Rgba = Rgba::opaque(0xe7, 0x4c, 0x3c);

/// Palette cycled through when creating layers without an explicit color.
pub const LAYER_PALETTE: [Rgba; 8] = [
    Rgba::opaque(0xe7, 0x4c, 0x3c),
    Rgba::opaque(0x34, 0x98, 0xdb),
    Rgba::opaque(0x2e, 0xcc, 0x71),
    Rgba::opaque(0xf3, 0x9c, 0x12),
    Rgba::opaque(0x9b, 0x59, 0xb6),
    Rgba::opaque(0x1a, 0xbc, 0x9c),
    Rgba::opaque(0xe6, 0x7e, 0x22),
    Rgba::opaque(0x34, 0x49, 0x5e),
];

/// Kind of a stroke drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrokeKind {
    Pen,
    Eraser,
    Line,
}

/// A sampled polyline in world coordinates.
///
/// Pen and line strokes paint with the owning layer's color; eraser
/// strokes clear previously painted pixels within the same layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub kind: StrokeKind,
    /// Points in world coordinates, independent of the view transform.
    pub points: Vec<Point>,
    /// Brush width in world pixels.
    pub size: f64,
    /// Color recorded at draw time. Eraser strokes carry none.
    pub color: Option<Rgba>,
}

impl Stroke {
    /// Create a new empty stroke.
    pub fn new(kind: StrokeKind, size: f64, color: Option<Rgba>) -> Self {
        Self {
            kind,
            points: Vec::new(),
            size,
            color,
        }
    }

    /// Append a sampled point.
    pub fn add_point(&mut self, point: Point) {
        self.points.push(point);
    }
}

/// A fixed-point annotation with an optional label, independently
/// hit-testable. Markers always render above stroke content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub id: MarkerId,
    pub pos: Point,
    /// Diameter of the marker disc in world pixels.
    pub size: f64,
    pub color: Rgba,
    pub text: String,
    pub font_size: f64,
    pub text_color: Rgba,
}

impl Marker {
    /// Create a marker at the given world position.
    pub fn new(pos: Point, size: f64, color: Rgba, font_size: f64, text_color: Rgba) -> Self {
        Self {
            id: Uuid::new_v4(),
            pos,
            size,
            color,
            text: String::new(),
            font_size,
            text_color,
        }
    }

    /// Whether a world-space point hits this marker.
    ///
    /// The hit area is the marker disc grown by [`MARKER_HIT_SLOP`].
    pub fn hit_test(&self, point: Point) -> bool {
        self.pos.distance(point) <= self.size / 2.0 + MARKER_HIT_SLOP
    }
}

/// A free-standing text annotation anchored at its bottom-left corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextAnnotation {
    pub id: TextId,
    pub pos: Point,
    pub text: String,
    pub font_size: f64,
    pub color: Rgba,
}

impl TextAnnotation {
    pub fn new(pos: Point, text: String, font_size: f64, color: Rgba) -> Self {
        Self {
            id: Uuid::new_v4(),
            pos,
            text,
            font_size,
            color,
        }
    }
}

/// Cheap content-change signature used to decide cache reuse.
///
/// This is deliberately a coarse count-based key rather than a content
/// hash: mutating an existing stroke's points in place does not change
/// it. Mutations that need a repaint without changing any count must go
/// through an explicit invalidation event instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VersionKey {
    pub strokes: usize,
    pub markers: usize,
    pub texts: usize,
    pub visible: bool,
}

/// An ordered, independently visible and colorable paint surface
/// containing strokes, markers, and text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub id: LayerId,
    pub name: String,
    pub visible: bool,
    pub color: Rgba,
    /// Applied once, globally, at composite time.
    pub opacity: f64,
    pub strokes: Vec<Stroke>,
    pub markers: Vec<Marker>,
    pub texts: Vec<TextAnnotation>,
}

impl Layer {
    /// Create a new empty, visible layer.
    pub fn new(name: String, color: Rgba) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            visible: true,
            color,
            opacity: 1.0,
            strokes: Vec::new(),
            markers: Vec::new(),
            texts: Vec::new(),
        }
    }

    /// Current content-change signature for this layer.
    pub fn version_key(&self) -> VersionKey {
        VersionKey {
            strokes: self.strokes.len(),
            markers: self.markers.len(),
            texts: self.texts.len(),
            visible: self.visible,
        }
    }

    /// Remove all strokes, markers, and texts, keeping layer attributes.
    pub fn clear(&mut self) {
        self.strokes.clear();
        self.markers.clear();
        self.texts.clear();
    }

    /// Find a marker by id.
    pub fn marker(&self, id: MarkerId) -> Option<&Marker> {
        self.markers.iter().find(|m| m.id == id)
    }

    /// Find a marker by id, mutably.
    pub fn marker_mut(&mut self, id: MarkerId) -> Option<&mut Marker> {
        self.markers.iter_mut().find(|m| m.id == id)
    }

    /// Find a text annotation by id.
    pub fn text(&self, id: TextId) -> Option<&TextAnnotation> {
        self.texts.iter().find(|t| t.id == id)
    }

    /// Find a text annotation by id, mutably.
    pub fn text_mut(&mut self, id: TextId) -> Option<&mut TextAnnotation> {
        self.texts.iter_mut().find(|t| t.id == id)
    }
}

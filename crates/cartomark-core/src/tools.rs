//! Tool modes and per-tool option defaults.

use crate::layer::{Rgba, DEFAULT_ACCENT};
use serde::{Deserialize, Serialize};

/// Available interaction tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ToolKind {
    #[default]
    Pan,
    Pen,
    Eraser,
    /// Marker placement and editing.
    Marker,
    Text,
}

/// Pen tool options.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PenOptions {
    pub size: f64,
}

impl Default for PenOptions {
    fn default() -> Self {
        Self { size: 4.0 }
    }
}

/// Eraser tool options.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EraserOptions {
    pub size: f64,
}

impl Default for EraserOptions {
    fn default() -> Self {
        Self { size: 5.0 }
    }
}

/// Defaults applied to newly placed markers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkerOptions {
    pub size: f64,
    pub color: Rgba,
    pub font_size: f64,
    pub text_color: Rgba,
}

impl Default for MarkerOptions {
    fn default() -> Self {
        Self {
            size: 10.0,
            color: DEFAULT_ACCENT,
            font_size: 16.0,
            text_color: DEFAULT_ACCENT,
        }
    }
}

/// Defaults applied to newly placed text annotations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextOptions {
    pub font_size: f64,
    pub color: Rgba,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            font_size: 16.0,
            color: DEFAULT_ACCENT,
        }
    }
}

/// Current per-tool option set.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ToolOptions {
    pub pen: PenOptions,
    pub eraser: EraserOptions,
    pub marker: MarkerOptions,
    pub text: TextOptions,
}

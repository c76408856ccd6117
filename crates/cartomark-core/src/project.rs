//! Persisted project document: base image, layers, and canvas size.

use crate::layer::Layer;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// A saved or exported annotation project.
///
/// This is the interchange format for persistence and for layer
/// import/export. The base image travels as base64-encoded PNG so the
/// whole document stays a single JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub version: String,
    /// Base64-encoded PNG bytes of the base image, if one is set.
    pub image: Option<String>,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub layers: Vec<Layer>,
}

impl Project {
    /// Current on-disk format version.
    pub const FORMAT_VERSION: &'static str = "1.0.0";

    /// Create an empty project for a canvas of the given size.
    pub fn new(canvas_width: u32, canvas_height: u32) -> Self {
        Self {
            version: Self::FORMAT_VERSION.to_string(),
            image: None,
            canvas_width,
            canvas_height,
            layers: Vec::new(),
        }
    }

    /// Embed encoded image bytes (PNG) as the base image.
    pub fn set_image_bytes(&mut self, bytes: &[u8]) {
        self.image = Some(BASE64.encode(bytes));
    }

    /// Decode the embedded base image, if any.
    pub fn image_bytes(&self) -> Result<Option<Vec<u8>>, base64::DecodeError> {
        match &self.image {
            Some(encoded) => BASE64.decode(encoded).map(Some),
            None => Ok(None),
        }
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Export as file bytes (the layer import/export contract).
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        self.to_json().map(String::into_bytes)
    }

    /// Import from file bytes.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

//! Cartomark rendering: CPU rasterization, per-layer caching, and
//! frame-coalesced compositing over tiny-skia surfaces.

pub mod cache;
pub mod compositor;
pub mod live;
pub mod raster;
pub mod text;

pub use cache::RenderCache;
pub use compositor::{Compositor, Frame, Placement, RenderError};
pub use text::TextPainter;

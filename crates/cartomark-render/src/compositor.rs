//! Frame-coalesced compositing of cached layer buffers.
//!
//! The compositor owns the canvas-sized surface, the per-layer render
//! cache, and the live stroke buffer. Pan/zoom never touches layer
//! buffers: the composited surface is presented through a single
//! placement computed from the camera once per frame.

use crate::cache::RenderCache;
use crate::live::LiveStroke;
use crate::raster;
use crate::text::TextPainter;
use cartomark_core::{Camera, ChangeEvent, LayerId, LayerStore, Rgba, VersionKey};
use kurbo::Point;
use log::{debug, warn};
use thiserror::Error;
use tiny_skia::{IntSize, Pixmap, PixmapPaint, Transform};

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid surface size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
    #[error("failed to decode base image: {0}")]
    ImageDecode(String),
}

/// Screen-space placement of the composited surface for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// Screen position of the canvas top-left corner.
    pub origin: Point,
    pub scale: f64,
}

/// A composited frame: the canvas-space surface plus its placement.
pub struct Frame<'a> {
    pub surface: &'a Pixmap,
    pub placement: Placement,
}

/// Composites background, base image, and layer buffers into the
/// visible frame.
pub struct Compositor {
    width: u32,
    height: u32,
    surface: Pixmap,
    background: Rgba,
    base_image: Option<Pixmap>,
    cache: RenderCache,
    live: Option<LiveStroke>,
    text: TextPainter,
    /// Coalescing flag: many redraw requests, one compositing pass.
    pending_redraw: bool,
    /// Aggregate signature of the last full pass, for the cheap path.
    last_signature: Option<Vec<(LayerId, VersionKey)>>,
    /// Number of layer buffer rasterizations performed.
    rebuilds: u64,
}

impl Compositor {
    /// Create a compositor for a canvas of the given pixel size.
    pub fn new(width: u32, height: u32) -> Result<Self, RenderError> {
        let surface = Pixmap::new(width, height)
            .ok_or(RenderError::InvalidSize { width, height })?;
        Ok(Self {
            width,
            height,
            surface,
            background: Rgba::white(),
            base_image: None,
            cache: RenderCache::new(),
            live: None,
            text: TextPainter::default(),
            pending_redraw: true,
            last_signature: None,
            rebuilds: 0,
        })
    }

    /// Replace the text painter (tests use [`TextPainter::empty`]).
    pub fn with_text_painter(mut self, text: TextPainter) -> Self {
        self.text = text;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// The composited canvas-space surface.
    pub fn surface(&self) -> &Pixmap {
        &self.surface
    }

    /// Number of layer buffer rasterizations performed so far.
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }

    /// Number of cached layer buffers currently held.
    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }

    /// Fill color painted beneath the base image.
    pub fn set_background(&mut self, color: Rgba) {
        self.background = color;
        self.last_signature = None;
        self.request_redraw();
    }

    /// Set the base image from an already decoded pixmap.
    pub fn set_base_image(&mut self, image: Pixmap) {
        self.base_image = Some(image);
        self.last_signature = None;
        self.request_redraw();
    }

    /// Decode and set the base image from encoded bytes (PNG or JPEG).
    pub fn set_base_image_bytes(&mut self, bytes: &[u8]) -> Result<(), RenderError> {
        let image = decode_image(bytes)?;
        self.set_base_image(image);
        Ok(())
    }

    pub fn clear_base_image(&mut self) {
        self.base_image = None;
        self.last_signature = None;
        self.request_redraw();
    }

    /// Ask for a recomposite on the next frame. Requests coalesce.
    pub fn request_redraw(&mut self) {
        self.pending_redraw = true;
    }

    pub fn needs_redraw(&self) -> bool {
        self.pending_redraw
    }

    /// React to an editor change event: invalidate what the version key
    /// cannot see and schedule a redraw.
    pub fn handle_event(&mut self, event: &ChangeEvent) {
        match event {
            ChangeEvent::LayersChanged
            | ChangeEvent::LayerContentChanged(_)
            | ChangeEvent::ViewChanged => self.request_redraw(),
            ChangeEvent::LayerInvalidated(id) => {
                self.cache.remove(*id);
                self.last_signature = None;
                self.request_redraw();
            }
            ChangeEvent::AppearanceChanged => {
                self.cache.clear();
                self.live = None;
                self.last_signature = None;
                self.request_redraw();
            }
            ChangeEvent::StrokeCommitted(id) => {
                self.cache.remove(*id);
                self.live = None;
                self.last_signature = None;
                self.request_redraw();
            }
            ChangeEvent::ActiveLayerChanged(_)
            | ChangeEvent::MarkersChanged
            | ChangeEvent::MarkerEditRequested(_)
            | ChangeEvent::TextEditRequested(_) => {}
        }
    }

    /// Run the coalesced compositing pass if one is scheduled.
    ///
    /// `live` names the layer an open draw gesture is painting on, if
    /// any; that layer goes through the incremental live path. Returns
    /// true when a pass ran.
    pub fn render_if_needed(&mut self, store: &LayerStore, live: Option<LayerId>) -> bool {
        if !self.pending_redraw {
            return false;
        }
        self.pending_redraw = false;
        self.compose(store, live);
        true
    }

    /// Composite immediately, bypassing coalescing and the cheap path
    /// (initial load, forced refresh).
    ///
    /// Must not run while a draw gesture is mid-flight: it would tear
    /// against the live path, so the request degrades to a scheduled
    /// redraw instead.
    pub fn render_now(&mut self, store: &LayerStore, live: Option<LayerId>) -> bool {
        if live.is_some() {
            warn!("immediate redraw requested mid-gesture, deferring to the next frame");
            self.pending_redraw = true;
            return false;
        }
        self.pending_redraw = false;
        self.last_signature = None;
        self.compose(store, None);
        true
    }

    fn compose(&mut self, store: &LayerStore, live: Option<LayerId>) {
        let signature = store.signature();

        // Cheap path: nothing changed and no gesture is open, so the
        // surface is already correct; only the placement moves.
        if live.is_none() && self.last_signature.as_ref() == Some(&signature) {
            return;
        }

        self.cache
            .retain_layers(|id| signature.iter().any(|(layer_id, _)| *layer_id == id));
        if live.is_none() {
            self.live = None;
        }

        self.surface.fill(raster::to_skia_color(self.background));
        if let Some(base) = &self.base_image {
            self.surface.draw_pixmap(
                0,
                0,
                base.as_ref(),
                &PixmapPaint::default(),
                Transform::identity(),
                None,
            );
        }

        // Index 0 paints last (topmost).
        for layer in store.layers().iter().rev() {
            if !layer.visible {
                continue;
            }
            let paint = PixmapPaint {
                opacity: layer.opacity as f32,
                ..PixmapPaint::default()
            };

            if live == Some(layer.id) {
                if let Some(buffer) =
                    LiveStroke::ensure(&mut self.live, layer, self.width, self.height, &self.text)
                {
                    let composed = buffer.compose(layer, &self.text);
                    self.surface.draw_pixmap(
                        0,
                        0,
                        composed.as_ref(),
                        &paint,
                        Transform::identity(),
                        None,
                    );
                }
                continue;
            }

            let version = layer.version_key();
            if self.cache.get_fresh(layer.id, version).is_none() {
                if let Some(mut pixmap) = Pixmap::new(self.width, self.height) {
                    raster::paint_layer(&mut pixmap, layer, &self.text);
                    self.cache.insert(layer.id, pixmap, version);
                    self.rebuilds += 1;
                    debug!("rebuilt buffer for layer {}", layer.name);
                }
            }
            if let Some(entry) = self.cache.get_fresh(layer.id, version) {
                self.surface.draw_pixmap(
                    0,
                    0,
                    entry.pixmap.as_ref(),
                    &paint,
                    Transform::identity(),
                    None,
                );
            }
        }

        self.last_signature = Some(signature);
    }

    /// The presentation placement for the current camera.
    pub fn placement(&self, camera: &Camera) -> Placement {
        Placement {
            origin: camera.canvas_origin(),
            scale: camera.scale(),
        }
    }

    /// The current frame: surface plus placement.
    pub fn frame<'a>(&'a self, camera: &Camera) -> Frame<'a> {
        Frame {
            surface: &self.surface,
            placement: self.placement(camera),
        }
    }

    /// Blit the composited surface into a screen-sized target using the
    /// camera placement.
    pub fn present_to(&self, camera: &Camera, target: &mut Pixmap) {
        target.fill(tiny_skia::Color::TRANSPARENT);
        let placement = self.placement(camera);
        let transform = Transform::from_row(
            placement.scale as f32,
            0.0,
            0.0,
            placement.scale as f32,
            placement.origin.x as f32,
            placement.origin.y as f32,
        );
        target.draw_pixmap(
            0,
            0,
            self.surface.as_ref(),
            &PixmapPaint::default(),
            transform,
            None,
        );
    }
}

/// Decode PNG or JPEG bytes into a premultiplied pixmap.
fn decode_image(bytes: &[u8]) -> Result<Pixmap, RenderError> {
    let decoded =
        image::load_from_memory(bytes).map_err(|e| RenderError::ImageDecode(e.to_string()))?;
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut data = rgba.into_raw();

    // tiny-skia stores premultiplied alpha.
    for px in data.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a < 255 {
            px[0] = ((px[0] as u16 * a) / 255) as u8;
            px[1] = ((px[1] as u16 * a) / 255) as u8;
            px[2] = ((px[2] as u16 * a) / 255) as u8;
        }
    }

    let size =
        IntSize::from_wh(width, height).ok_or(RenderError::InvalidSize { width, height })?;
    Pixmap::from_vec(data, size).ok_or(RenderError::InvalidSize { width, height })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cartomark_core::{Rgba, StrokeKind};
    use kurbo::{Point, Size, Vec2};

    const W: u32 = 64;
    const H: u32 = 64;

    fn compositor() -> Compositor {
        Compositor::new(W, H)
            .unwrap()
            .with_text_painter(TextPainter::empty())
    }

    fn stroke_across(store: &mut LayerStore, y: f64, size: f64) {
        store.begin_stroke(StrokeKind::Pen, size, None).unwrap();
        store.append_stroke_point(Point::new(4.0, y)).unwrap();
        store.append_stroke_point(Point::new(60.0, y)).unwrap();
    }

    fn pixel(surface: &Pixmap, x: u32, y: u32) -> tiny_skia::PremultipliedColorU8 {
        surface.pixels()[(y * W + x) as usize]
    }

    #[test]
    fn test_redraw_requests_coalesce() {
        let mut compositor = compositor();
        let mut store = LayerStore::new();
        store.create(None, None);

        compositor.request_redraw();
        compositor.request_redraw();
        compositor.request_redraw();

        assert!(compositor.render_if_needed(&store, None));
        // All requests collapsed into the single pass above.
        assert!(!compositor.render_if_needed(&store, None));
    }

    #[test]
    fn test_cheap_path_skips_rebuilds() {
        let mut compositor = compositor();
        let mut store = LayerStore::new();
        store.create(None, None);
        stroke_across(&mut store, 32.0, 4.0);

        compositor.render_now(&store, None);
        let rebuilds = compositor.rebuild_count();
        assert_eq!(rebuilds, 1);

        // Pan/zoom only schedules a redraw; content is untouched, so the
        // pass reuses the surface without touching any layer buffer.
        compositor.handle_event(&ChangeEvent::ViewChanged);
        assert!(compositor.render_if_needed(&store, None));
        assert_eq!(compositor.rebuild_count(), rebuilds);
    }

    #[test]
    fn test_version_key_misses_inplace_mutation() {
        // The coarse key cannot see appended points on an existing
        // stroke; the buffer stays stale until an explicit invalidation.
        let mut compositor = compositor();
        let mut store = LayerStore::new();
        store.create(None, None);
        stroke_across(&mut store, 32.0, 4.0);
        compositor.render_now(&store, None);
        let rebuilds = compositor.rebuild_count();

        store.append_stroke_point(Point::new(60.0, 8.0)).unwrap();
        compositor.request_redraw();
        compositor.render_if_needed(&store, None);
        assert_eq!(compositor.rebuild_count(), rebuilds);
    }

    #[test]
    fn test_appearance_event_forces_recomposite() {
        let mut compositor = compositor();
        let mut store = LayerStore::new();
        store.create(None, Some(Rgba::opaque(255, 0, 0)));
        stroke_across(&mut store, 32.0, 6.0);
        compositor.render_now(&store, None);
        assert!(pixel(compositor.surface(), 32, 32).red() > 0);

        // Recoloring changes no counts; the explicit event is what
        // drops the caches.
        store.set_color(0, Rgba::opaque(0, 0, 255)).unwrap();
        let rebuilds = compositor.rebuild_count();
        compositor.handle_event(&ChangeEvent::AppearanceChanged);
        assert!(compositor.render_if_needed(&store, None));
        assert!(compositor.rebuild_count() > rebuilds);
        assert!(pixel(compositor.surface(), 32, 32).blue() > 0);
    }

    #[test]
    fn test_opacity_applied_at_composite_time() {
        let mut compositor = compositor();
        let mut store = LayerStore::new();
        store.create(None, Some(Rgba::opaque(255, 0, 0)));
        stroke_across(&mut store, 32.0, 6.0);
        store.set_opacity(0, 0.5).unwrap();
        // Opaque white background, so alpha stays 255; the stroke color
        // is halved toward white instead.
        compositor.render_now(&store, None);
        let px = pixel(compositor.surface(), 32, 32);
        // Half red over white: red stays saturated, green/blue land
        // halfway between stroke and background.
        assert_eq!(px.red(), 255);
        assert!(px.green() > 100 && px.green() < 160);
        assert!(px.blue() > 100 && px.blue() < 160);
    }

    #[test]
    fn test_eraser_only_affects_its_own_layer() {
        let mut compositor = compositor();
        let mut store = LayerStore::new();

        // Bottom layer: green stroke across the region.
        store.create(None, Some(Rgba::opaque(0, 255, 0)));
        stroke_across(&mut store, 32.0, 8.0);

        // Top layer: red stroke over the same region, then erased.
        store.create(None, Some(Rgba::opaque(255, 0, 0)));
        stroke_across(&mut store, 32.0, 8.0);
        store.begin_stroke(StrokeKind::Eraser, 16.0, None).unwrap();
        store.append_stroke_point(Point::new(4.0, 32.0)).unwrap();
        store.append_stroke_point(Point::new(60.0, 32.0)).unwrap();

        compositor.render_now(&store, None);
        let px = pixel(compositor.surface(), 32, 32);
        // The erased region is fully transparent on the top layer, so
        // the bottom layer shows through untouched.
        assert_eq!(px.green(), 255);
        assert_eq!(px.red(), 0);
    }

    #[test]
    fn test_dead_layer_buffers_purged() {
        let mut compositor = compositor();
        let mut store = LayerStore::new();
        store.create(None, None);
        store.create(None, None);

        compositor.render_now(&store, None);
        assert_eq!(compositor.cache_size(), 2);

        store.delete(0).unwrap();
        compositor.render_now(&store, None);
        assert_eq!(compositor.cache_size(), 1);
    }

    #[test]
    fn test_live_path_draws_in_progress_stroke() {
        let mut compositor = compositor();
        let mut store = LayerStore::new();
        store.create(None, Some(Rgba::opaque(255, 0, 0)));
        stroke_across(&mut store, 16.0, 4.0);
        let layer_id = store.layers()[0].id;
        compositor.render_now(&store, None);

        // Open a gesture: a new stroke accumulates points sample by
        // sample while frames composite through the live path.
        store.begin_stroke(StrokeKind::Pen, 4.0, None).unwrap();
        store.append_stroke_point(Point::new(4.0, 48.0)).unwrap();
        compositor.request_redraw();
        compositor.render_if_needed(&store, Some(layer_id));

        store.append_stroke_point(Point::new(60.0, 48.0)).unwrap();
        compositor.request_redraw();
        compositor.render_if_needed(&store, Some(layer_id));

        let surface = compositor.surface();
        assert!(pixel(surface, 32, 16).red() > 0);
        assert!(pixel(surface, 32, 48).red() > 0);

        // Committing drops the cache entry; the next full pass rebuilds.
        let rebuilds = compositor.rebuild_count();
        compositor.handle_event(&ChangeEvent::StrokeCommitted(layer_id));
        assert!(compositor.render_if_needed(&store, None));
        assert!(compositor.rebuild_count() > rebuilds);
        assert!(pixel(compositor.surface(), 32, 48).red() > 0);
    }

    #[test]
    fn test_render_now_refuses_mid_gesture() {
        let mut compositor = compositor();
        let mut store = LayerStore::new();
        store.create(None, None);
        let layer_id = store.layers()[0].id;
        store.begin_stroke(StrokeKind::Pen, 4.0, None).unwrap();

        assert!(!compositor.render_now(&store, Some(layer_id)));
        // Degrades to a scheduled redraw instead of tearing.
        assert!(compositor.needs_redraw());
    }

    #[test]
    fn test_hidden_layers_not_composited() {
        let mut compositor = compositor();
        let mut store = LayerStore::new();
        store.create(None, Some(Rgba::opaque(255, 0, 0)));
        stroke_across(&mut store, 32.0, 6.0);

        store.toggle_visibility(0).unwrap();
        compositor.render_now(&store, None);
        let px = pixel(compositor.surface(), 32, 32);
        // Only the white background remains.
        assert_eq!(px.red(), 255);
        assert_eq!(px.green(), 255);
        assert_eq!(px.blue(), 255);
    }

    #[test]
    fn test_base_image_composites_under_layers() {
        let mut base = Pixmap::new(W, H).unwrap();
        base.fill(tiny_skia::Color::from_rgba8(0, 0, 255, 255));
        let png = base.encode_png().unwrap();

        let mut compositor = compositor();
        compositor.set_base_image_bytes(&png).unwrap();

        let mut store = LayerStore::new();
        store.create(None, Some(Rgba::opaque(255, 0, 0)));
        stroke_across(&mut store, 32.0, 6.0);

        compositor.render_now(&store, None);
        // Stroke over the base image, base visible elsewhere.
        assert!(pixel(compositor.surface(), 32, 32).red() > 0);
        assert_eq!(pixel(compositor.surface(), 32, 8).blue(), 255);
    }

    #[test]
    fn test_placement_follows_camera() {
        let compositor = compositor();
        let mut camera = Camera::new(Size::new(W as f64, H as f64));
        camera.set_viewport_size(Size::new(128.0, 128.0));
        camera.set_offset(Vec2::new(10.0, -4.0));

        let placement = compositor.placement(&camera);
        assert_eq!(placement.origin, camera.canvas_origin());
        assert!((placement.scale - 1.0).abs() < f64::EPSILON);

        let mut target = Pixmap::new(128, 128).unwrap();
        compositor.present_to(&camera, &mut target);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let mut compositor = compositor();
        assert!(matches!(
            compositor.set_base_image_bytes(b"not an image"),
            Err(RenderError::ImageDecode(_))
        ));
    }
}

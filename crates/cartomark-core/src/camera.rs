//! Camera module for pan/zoom view transforms.

use kurbo::{Point, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Minimum allowed zoom scale.
pub const MIN_SCALE: f64 = 0.1;
/// Maximum allowed zoom scale.
pub const MAX_SCALE: f64 = 5.0;

/// Zoom-in factor for a wheel step.
pub const WHEEL_ZOOM_IN: f64 = 1.1;
/// Zoom-out factor for a wheel step.
pub const WHEEL_ZOOM_OUT: f64 = 0.9;
/// Zoom factor for the zoom buttons (anchored at the viewport center).
pub const BUTTON_ZOOM_FACTOR: f64 = 1.2;

/// Serializable view state.
///
/// The offset is relative to the viewport center, not the world origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

/// Camera manages the view transform for the annotation canvas.
///
/// The canvas (world space) has fixed pixel dimensions; the camera maps
/// it into the viewport, keeping the canvas centered when the offset is
/// zero. Panning only moves the presentation transform and never touches
/// layer content or caches.
#[derive(Debug, Clone)]
pub struct Camera {
    /// Current zoom scale, always within [`MIN_SCALE`, `MAX_SCALE`].
    scale: f64,
    /// Translation offset relative to the viewport center.
    offset: Vec2,
    /// Viewport size in screen pixels.
    viewport: Size,
    /// Canvas size in world pixels.
    canvas: Size,
}

impl Camera {
    /// Create a camera for a canvas of the given world size.
    pub fn new(canvas: Size) -> Self {
        Self {
            scale: 1.0,
            offset: Vec2::ZERO,
            viewport: Size::new(800.0, 600.0),
            canvas,
        }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    pub fn viewport_size(&self) -> Size {
        self.viewport
    }

    pub fn canvas_size(&self) -> Size {
        self.canvas
    }

    pub fn set_viewport_size(&mut self, size: Size) {
        self.viewport = size;
    }

    pub fn set_canvas_size(&mut self, size: Size) {
        self.canvas = size;
    }

    /// Set the offset directly (used by pan gestures).
    pub fn set_offset(&mut self, offset: Vec2) {
        self.offset = offset;
    }

    /// Pan by a delta in screen pixels.
    pub fn pan(&mut self, delta: Vec2) {
        self.offset += delta;
    }

    /// The screen position of the canvas top-left corner.
    ///
    /// This is the single presentation placement the compositor applies
    /// once per frame.
    pub fn canvas_origin(&self) -> Point {
        let center_x = self.viewport.width / 2.0;
        let center_y = self.viewport.height / 2.0;
        Point::new(
            center_x + self.offset.x - (self.canvas.width * self.scale) / 2.0,
            center_y + self.offset.y - (self.canvas.height * self.scale) / 2.0,
        )
    }

    /// Convert a world point to screen coordinates.
    pub fn world_to_screen(&self, world: Point) -> Point {
        let origin = self.canvas_origin();
        Point::new(
            origin.x + world.x * self.scale,
            origin.y + world.y * self.scale,
        )
    }

    /// Convert a screen point to world coordinates, clamped to the
    /// canvas bounds (pointer samples never land outside the canvas).
    pub fn screen_to_world(&self, screen: Point) -> Point {
        let world = self.screen_to_world_unclamped(screen);
        Point::new(
            world.x.clamp(0.0, self.canvas.width),
            world.y.clamp(0.0, self.canvas.height),
        )
    }

    fn screen_to_world_unclamped(&self, screen: Point) -> Point {
        let origin = self.canvas_origin();
        Point::new(
            (screen.x - origin.x) / self.scale,
            (screen.y - origin.y) / self.scale,
        )
    }

    /// Zoom by a factor, keeping the world point under the given screen
    /// position fixed.
    ///
    /// Uses the unclamped inverse so the anchor stays invariant even for
    /// pointers outside the canvas bounds.
    pub fn zoom_at(&mut self, screen: Point, factor: f64) {
        let new_scale = (self.scale * factor).clamp(MIN_SCALE, MAX_SCALE);
        if (new_scale - self.scale).abs() < f64::EPSILON {
            return;
        }

        let world = self.screen_to_world_unclamped(screen);
        let center_x = self.viewport.width / 2.0;
        let center_y = self.viewport.height / 2.0;

        // Solve for the offset that puts `world` back under `screen`
        // at the new scale.
        let new_origin_x = screen.x - world.x * new_scale;
        let new_origin_y = screen.y - world.y * new_scale;

        self.scale = new_scale;
        self.offset = Vec2::new(
            new_origin_x - center_x + (self.canvas.width * new_scale) / 2.0,
            new_origin_y - center_y + (self.canvas.height * new_scale) / 2.0,
        );
    }

    /// Zoom in one button step, anchored at the viewport center.
    pub fn zoom_in(&mut self) {
        let center = Point::new(self.viewport.width / 2.0, self.viewport.height / 2.0);
        self.zoom_at(center, BUTTON_ZOOM_FACTOR);
    }

    /// Zoom out one button step, anchored at the viewport center.
    pub fn zoom_out(&mut self) {
        let center = Point::new(self.viewport.width / 2.0, self.viewport.height / 2.0);
        self.zoom_at(center, 1.0 / BUTTON_ZOOM_FACTOR);
    }

    /// Reset to scale 1 with no offset.
    pub fn reset(&mut self) {
        self.scale = 1.0;
        self.offset = Vec2::ZERO;
    }

    /// Snapshot of the serializable view state.
    pub fn view_state(&self) -> ViewState {
        ViewState {
            scale: self.scale,
            offset_x: self.offset.x,
            offset_y: self.offset.y,
        }
    }

    /// Restore a previously captured view state, clamping the scale.
    pub fn set_view_state(&mut self, state: ViewState) {
        self.scale = state.scale.clamp(MIN_SCALE, MAX_SCALE);
        self.offset = Vec2::new(state.offset_x, state.offset_y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> Camera {
        let mut camera = Camera::new(Size::new(1000.0, 800.0));
        camera.set_viewport_size(Size::new(640.0, 480.0));
        camera
    }

    #[test]
    fn test_default_centers_canvas() {
        let camera = camera();
        // At scale 1 with no offset the canvas is centered in the viewport.
        let origin = camera.canvas_origin();
        assert!((origin.x - (320.0 - 500.0)).abs() < f64::EPSILON);
        assert!((origin.y - (240.0 - 400.0)).abs() < f64::EPSILON);
    }

    #[test]
    fn test_roundtrip_conversion() {
        let mut camera = camera();
        camera.set_offset(Vec2::new(30.0, -20.0));
        camera.zoom_at(Point::new(100.0, 100.0), 1.5);

        let world = Point::new(123.0, 456.0);
        let screen = camera.world_to_screen(world);
        let back = camera.screen_to_world(screen);

        assert!((back.x - world.x).abs() < 1e-9);
        assert!((back.y - world.y).abs() < 1e-9);
    }

    #[test]
    fn test_zoom_anchor_invariance() {
        let mut camera = camera();
        camera.set_offset(Vec2::new(40.0, -25.0));

        let pointer = Point::new(200.0, 150.0);
        let before = camera.screen_to_world(pointer);
        camera.zoom_at(pointer, 1.2);
        let after = camera.screen_to_world(pointer);

        assert!((before.x - after.x).abs() < 1e-9);
        assert!((before.y - after.y).abs() < 1e-9);
    }

    #[test]
    fn test_zoom_clamp_across_sequences() {
        let mut camera = camera();
        for _ in 0..100 {
            camera.zoom_at(Point::new(10.0, 10.0), 1.1);
        }
        assert!(camera.scale() <= MAX_SCALE);

        for _ in 0..200 {
            camera.zoom_at(Point::new(10.0, 10.0), 0.9);
        }
        assert!(camera.scale() >= MIN_SCALE);
    }

    #[test]
    fn test_button_zoom_keeps_viewport_center() {
        let mut camera = camera();
        let center = Point::new(320.0, 240.0);
        let before = camera.screen_to_world(center);
        camera.zoom_in();
        let after = camera.screen_to_world(center);
        assert!((before.x - after.x).abs() < 1e-9);
        assert!((before.y - after.y).abs() < 1e-9);
        assert!((camera.scale() - BUTTON_ZOOM_FACTOR).abs() < f64::EPSILON);
    }

    #[test]
    fn test_screen_to_world_clamps_to_canvas() {
        let camera = camera();
        let world = camera.screen_to_world(Point::new(-5000.0, 5000.0));
        assert!((world.x - 0.0).abs() < f64::EPSILON);
        assert!((world.y - 800.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_pan_and_reset() {
        let mut camera = camera();
        camera.pan(Vec2::new(10.0, 20.0));
        assert!((camera.offset().x - 10.0).abs() < f64::EPSILON);
        assert!((camera.offset().y - 20.0).abs() < f64::EPSILON);

        camera.zoom_in();
        camera.reset();
        assert!((camera.scale() - 1.0).abs() < f64::EPSILON);
        assert_eq!(camera.offset(), Vec2::ZERO);
    }

    #[test]
    fn test_view_state_roundtrip() {
        let mut camera = camera();
        camera.zoom_at(Point::new(50.0, 60.0), 1.3);
        camera.pan(Vec2::new(-15.0, 7.0));

        let state = camera.view_state();
        let mut restored = Camera::new(Size::new(1000.0, 800.0));
        restored.set_viewport_size(Size::new(640.0, 480.0));
        restored.set_view_state(state);

        assert!((restored.scale() - camera.scale()).abs() < f64::EPSILON);
        assert_eq!(restored.offset(), camera.offset());
    }
}

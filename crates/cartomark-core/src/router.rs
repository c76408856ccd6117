//! Pointer gesture routing and disambiguation.
//!
//! Translates raw pointer input into layer, camera, and history
//! mutations according to the active tool. One gesture (press to
//! release) owns the transient state; cancellation is idempotent and
//! pointer-leave always clears in-progress flags.

use crate::camera::Camera;
use crate::event::ChangeEvent;
use crate::history::HistoryStore;
use crate::layer::{LayerId, Marker, MarkerId, StrokeKind};
use crate::store::LayerStore;
use crate::tools::{ToolKind, ToolOptions};
use kurbo::{Point, Vec2};
use log::warn;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Re-clicking the same marker within this window opens its editor.
pub const MARKER_RECLICK_WINDOW: Duration = Duration::from_millis(300);

/// Pointer button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

/// The gesture currently in flight.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Gesture {
    Idle,
    Pan { anchor: Vec2 },
    Draw { layer: LayerId },
    MarkerMove { marker: MarkerId, moved: bool },
}

/// Mutable editor state a gesture is allowed to touch, passed explicitly
/// per call.
pub struct RouterContext<'a> {
    pub store: &'a mut LayerStore,
    pub camera: &'a mut Camera,
    pub history: &'a mut HistoryStore,
    pub tool: ToolKind,
    pub options: &'a ToolOptions,
    pub events: &'a mut VecDeque<ChangeEvent>,
    /// True while a history snapshot is being applied; gesture commits
    /// must not capture new entries then.
    pub suppress_history: bool,
}

/// Gesture state machine keyed by the active tool mode.
#[derive(Debug)]
pub struct InteractionRouter {
    gesture: Gesture,
    /// Last primary-clicked marker, for re-click detection.
    last_marker_click: Option<(MarkerId, Instant)>,
}

impl Default for InteractionRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractionRouter {
    pub fn new() -> Self {
        Self {
            gesture: Gesture::Idle,
            last_marker_click: None,
        }
    }

    /// Whether any gesture is in flight.
    pub fn is_gesture_active(&self) -> bool {
        self.gesture != Gesture::Idle
    }

    /// The layer a draw gesture is currently painting on, if any.
    pub fn live_draw_layer(&self) -> Option<LayerId> {
        match self.gesture {
            Gesture::Draw { layer } => Some(layer),
            _ => None,
        }
    }

    /// Handle a button press at a screen position.
    pub fn pointer_down(&mut self, screen: Point, button: PointerButton, ctx: &mut RouterContext) {
        if self.gesture != Gesture::Idle {
            // Single-pointer model: ignore chorded presses mid-gesture.
            return;
        }

        match ctx.tool {
            ToolKind::Pan => {
                if matches!(button, PointerButton::Primary | PointerButton::Secondary) {
                    self.begin_pan(screen, ctx);
                }
            }
            ToolKind::Pen | ToolKind::Eraser => match button {
                PointerButton::Primary => self.begin_draw(screen, ctx),
                PointerButton::Secondary => self.begin_pan(screen, ctx),
                PointerButton::Middle => {}
            },
            ToolKind::Marker => self.marker_down(screen, button, ctx),
            ToolKind::Text => match button {
                PointerButton::Primary => {
                    let world = ctx.camera.screen_to_world(screen);
                    ctx.events.push_back(ChangeEvent::TextEditRequested(world));
                }
                PointerButton::Secondary => self.begin_pan(screen, ctx),
                PointerButton::Middle => {}
            },
        }
    }

    /// Handle pointer movement.
    pub fn pointer_moved(&mut self, screen: Point, ctx: &mut RouterContext) {
        match self.gesture {
            Gesture::Idle => {}
            Gesture::Pan { anchor } => {
                ctx.camera.set_offset(screen.to_vec2() - anchor);
                ctx.events.push_back(ChangeEvent::ViewChanged);
            }
            Gesture::Draw { layer } => {
                let world = ctx.camera.screen_to_world(screen);
                if ctx.store.append_stroke_point(world).is_ok() {
                    ctx.events.push_back(ChangeEvent::LayerContentChanged(layer));
                }
            }
            Gesture::MarkerMove { marker, .. } => {
                let world = ctx.camera.screen_to_world(screen);
                if let Ok(layer) = ctx.store.move_marker(marker, world) {
                    ctx.events.push_back(ChangeEvent::LayerInvalidated(layer));
                    ctx.events.push_back(ChangeEvent::MarkersChanged);
                    self.gesture = Gesture::MarkerMove {
                        marker,
                        moved: true,
                    };
                }
            }
        }
    }

    /// Handle a button release. Any button ends the gesture in flight.
    pub fn pointer_up(&mut self, _button: PointerButton, ctx: &mut RouterContext) {
        self.finish_gesture(ctx);
    }

    /// The pointer left the interactive surface; in-progress state must
    /// not stick around.
    pub fn pointer_left(&mut self, ctx: &mut RouterContext) {
        self.finish_gesture(ctx);
    }

    /// Cancel whatever gesture is in flight. Idempotent.
    pub fn cancel(&mut self, ctx: &mut RouterContext) {
        self.finish_gesture(ctx);
    }

    fn begin_pan(&mut self, screen: Point, ctx: &mut RouterContext) {
        self.gesture = Gesture::Pan {
            anchor: screen.to_vec2() - ctx.camera.offset(),
        };
    }

    fn begin_draw(&mut self, screen: Point, ctx: &mut RouterContext) {
        if ctx.store.is_empty() {
            warn!("no layer available, create a layer before drawing");
            return;
        }

        let (kind, size) = match ctx.tool {
            ToolKind::Eraser => (StrokeKind::Eraser, ctx.options.eraser.size),
            _ => (StrokeKind::Pen, ctx.options.pen.size),
        };
        // Pen strokes record the layer color at draw time; the eraser
        // carries no color.
        let color = match kind {
            StrokeKind::Eraser => None,
            _ => ctx.store.active_layer().map(|layer| layer.color),
        };

        let world = ctx.camera.screen_to_world(screen);
        match ctx.store.begin_stroke(kind, size, color) {
            Ok(layer) => {
                let _ = ctx.store.append_stroke_point(world);
                self.gesture = Gesture::Draw { layer };
                ctx.events.push_back(ChangeEvent::LayerContentChanged(layer));
            }
            Err(err) => warn!("could not start stroke: {err}"),
        }
    }

    fn marker_down(&mut self, screen: Point, button: PointerButton, ctx: &mut RouterContext) {
        let world = ctx.camera.screen_to_world(screen);

        if let Some(hit) = ctx.store.hit_test_marker(world) {
            match button {
                PointerButton::Secondary => {
                    ctx.events.push_back(ChangeEvent::MarkerEditRequested(hit));
                }
                PointerButton::Primary => {
                    let now = Instant::now();
                    let reclick = match self.last_marker_click {
                        Some((id, at)) => {
                            id == hit && now.duration_since(at) <= MARKER_RECLICK_WINDOW
                        }
                        None => false,
                    };
                    if reclick {
                        ctx.events.push_back(ChangeEvent::MarkerEditRequested(hit));
                        self.last_marker_click = None;
                    } else {
                        self.last_marker_click = Some((hit, now));
                        self.gesture = Gesture::MarkerMove {
                            marker: hit,
                            moved: false,
                        };
                    }
                }
                PointerButton::Middle => {}
            }
            return;
        }

        match button {
            PointerButton::Primary => {
                let marker = Marker::new(
                    world,
                    ctx.options.marker.size,
                    ctx.options.marker.color,
                    ctx.options.marker.font_size,
                    ctx.options.marker.text_color,
                );
                match ctx.store.add_marker(marker) {
                    Ok((layer, _)) => {
                        ctx.events.push_back(ChangeEvent::LayerContentChanged(layer));
                        ctx.events.push_back(ChangeEvent::MarkersChanged);
                        if !ctx.suppress_history {
                            ctx.history.push(ctx.store.layers(), true);
                        }
                    }
                    Err(err) => warn!("could not place marker: {err}"),
                }
            }
            // Secondary on empty space pans instead of a context action.
            PointerButton::Secondary => self.begin_pan(screen, ctx),
            PointerButton::Middle => {}
        }
    }

    fn finish_gesture(&mut self, ctx: &mut RouterContext) {
        let gesture = std::mem::replace(&mut self.gesture, Gesture::Idle);
        match gesture {
            Gesture::Idle | Gesture::Pan { .. } => {}
            Gesture::Draw { layer } => {
                ctx.events.push_back(ChangeEvent::StrokeCommitted(layer));
                if !ctx.suppress_history {
                    ctx.history.push(ctx.store.layers(), true);
                }
            }
            Gesture::MarkerMove { moved, .. } => {
                if moved && !ctx.suppress_history {
                    ctx.history.push(ctx.store.layers(), true);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Size;

    struct Fixture {
        store: LayerStore,
        camera: Camera,
        history: HistoryStore,
        options: ToolOptions,
        events: VecDeque<ChangeEvent>,
    }

    impl Fixture {
        fn new() -> Self {
            let mut camera = Camera::new(Size::new(1000.0, 800.0));
            camera.set_viewport_size(Size::new(1000.0, 800.0));
            Self {
                store: LayerStore::new(),
                camera,
                history: HistoryStore::new(),
                options: ToolOptions::default(),
                events: VecDeque::new(),
            }
        }

        fn ctx(&mut self, tool: ToolKind) -> RouterContext<'_> {
            RouterContext {
                store: &mut self.store,
                camera: &mut self.camera,
                history: &mut self.history,
                tool,
                options: &self.options,
                events: &mut self.events,
                suppress_history: false,
            }
        }
    }

    #[test]
    fn test_draw_without_layer_is_noop() {
        let mut fx = Fixture::new();
        let mut router = InteractionRouter::new();

        router.pointer_down(Point::new(10.0, 10.0), PointerButton::Primary, &mut fx.ctx(ToolKind::Pen));
        assert!(!router.is_gesture_active());
        assert!(fx.events.is_empty());
    }

    #[test]
    fn test_pan_gesture_updates_offset() {
        let mut fx = Fixture::new();
        let mut router = InteractionRouter::new();

        router.pointer_down(Point::new(100.0, 100.0), PointerButton::Primary, &mut fx.ctx(ToolKind::Pan));
        router.pointer_moved(Point::new(130.0, 80.0), &mut fx.ctx(ToolKind::Pan));

        assert_eq!(fx.camera.offset(), Vec2::new(30.0, -20.0));
        router.pointer_up(PointerButton::Primary, &mut fx.ctx(ToolKind::Pan));
        assert!(!router.is_gesture_active());
        // Panning never lands in history.
        assert!(fx.history.is_empty());
    }

    #[test]
    fn test_secondary_button_pans_in_draw_mode() {
        let mut fx = Fixture::new();
        fx.store.create(None, None);
        let mut router = InteractionRouter::new();

        router.pointer_down(Point::new(50.0, 50.0), PointerButton::Secondary, &mut fx.ctx(ToolKind::Pen));
        router.pointer_moved(Point::new(60.0, 55.0), &mut fx.ctx(ToolKind::Pen));

        assert_eq!(fx.camera.offset(), Vec2::new(10.0, 5.0));
        assert!(fx.store.layers()[0].strokes.is_empty());
    }

    #[test]
    fn test_marker_reclick_opens_editor() {
        let mut fx = Fixture::new();
        fx.store.create(None, None);
        let mut router = InteractionRouter::new();

        // Place a marker, then click it twice in quick succession.
        router.pointer_down(Point::new(500.0, 400.0), PointerButton::Primary, &mut fx.ctx(ToolKind::Marker));
        router.pointer_up(PointerButton::Primary, &mut fx.ctx(ToolKind::Marker));
        let placed = fx.store.layers()[0].markers[0].id;

        router.pointer_down(Point::new(500.0, 400.0), PointerButton::Primary, &mut fx.ctx(ToolKind::Marker));
        router.pointer_up(PointerButton::Primary, &mut fx.ctx(ToolKind::Marker));
        router.pointer_down(Point::new(500.0, 400.0), PointerButton::Primary, &mut fx.ctx(ToolKind::Marker));

        assert!(fx
            .events
            .iter()
            .any(|e| *e == ChangeEvent::MarkerEditRequested(placed)));
    }

    #[test]
    fn test_marker_secondary_click_opens_editor_immediately() {
        let mut fx = Fixture::new();
        fx.store.create(None, None);
        let mut router = InteractionRouter::new();

        router.pointer_down(Point::new(500.0, 400.0), PointerButton::Primary, &mut fx.ctx(ToolKind::Marker));
        router.pointer_up(PointerButton::Primary, &mut fx.ctx(ToolKind::Marker));
        let placed = fx.store.layers()[0].markers[0].id;
        fx.events.clear();

        router.pointer_down(Point::new(500.0, 400.0), PointerButton::Secondary, &mut fx.ctx(ToolKind::Marker));
        assert_eq!(
            fx.events.front(),
            Some(&ChangeEvent::MarkerEditRequested(placed))
        );
    }

    #[test]
    fn test_marker_drag_moves_and_commits() {
        let mut fx = Fixture::new();
        fx.store.create(None, None);
        let mut router = InteractionRouter::new();

        router.pointer_down(Point::new(500.0, 400.0), PointerButton::Primary, &mut fx.ctx(ToolKind::Marker));
        router.pointer_up(PointerButton::Primary, &mut fx.ctx(ToolKind::Marker));
        let placed = fx.store.layers()[0].markers[0].id;
        let history_before = fx.history.len();

        // Wait out the re-click window so the next press starts a drag.
        std::thread::sleep(MARKER_RECLICK_WINDOW + Duration::from_millis(20));

        router.pointer_down(Point::new(500.0, 400.0), PointerButton::Primary, &mut fx.ctx(ToolKind::Marker));
        router.pointer_moved(Point::new(520.0, 410.0), &mut fx.ctx(ToolKind::Marker));
        router.pointer_up(PointerButton::Primary, &mut fx.ctx(ToolKind::Marker));

        let marker = fx.store.find_marker(placed).unwrap();
        let expected = fx.camera.screen_to_world(Point::new(520.0, 410.0));
        assert_eq!(marker.pos, expected);
        assert_eq!(fx.history.len(), history_before + 1);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut fx = Fixture::new();
        fx.store.create(None, None);
        let mut router = InteractionRouter::new();

        router.pointer_down(Point::new(10.0, 10.0), PointerButton::Primary, &mut fx.ctx(ToolKind::Pen));
        assert!(router.is_gesture_active());

        router.cancel(&mut fx.ctx(ToolKind::Pen));
        let history_after_first = fx.history.len();
        router.cancel(&mut fx.ctx(ToolKind::Pen));

        assert!(!router.is_gesture_active());
        assert_eq!(fx.history.len(), history_after_first);
    }
}

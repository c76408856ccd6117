//! Editor facade tying the components together.
//!
//! Owns the layer store, camera, history, tool state, and gesture
//! router, and exposes the operation surface the shell calls. All
//! mutations flow through here so every commit can be captured into
//! history and announced through the typed event queue.

use crate::camera::Camera;
use crate::event::ChangeEvent;
use crate::history::HistoryStore;
use crate::layer::{LayerId, Marker, MarkerId, Rgba, StrokeKind, TextAnnotation, TextId};
use crate::project::Project;
use crate::router::{InteractionRouter, PointerButton, RouterContext};
use crate::store::{LayerResult, LayerStore};
use crate::tools::{ToolKind, ToolOptions};
use kurbo::{Point, Size, Vec2};
use std::collections::VecDeque;

/// The annotation editor core.
pub struct Editor {
    store: LayerStore,
    camera: Camera,
    history: HistoryStore,
    tools: ToolOptions,
    tool: ToolKind,
    router: InteractionRouter,
    events: VecDeque<ChangeEvent>,
    selected_marker: Option<MarkerId>,
    /// Set while a history snapshot is being applied so the resulting
    /// store update is not itself captured; cleared on the next tick.
    suppress_history: bool,
}

impl Editor {
    /// Create an editor for a canvas of the given world size.
    ///
    /// The editor starts with no layers; drawing requires the caller to
    /// create one first.
    pub fn new(canvas: Size) -> Self {
        Self {
            store: LayerStore::new(),
            camera: Camera::new(canvas),
            history: HistoryStore::new(),
            tools: ToolOptions::default(),
            tool: ToolKind::default(),
            router: InteractionRouter::new(),
            events: VecDeque::new(),
            selected_marker: None,
            suppress_history: false,
        }
    }

    pub fn store(&self) -> &LayerStore {
        &self.store
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut HistoryStore {
        &mut self.history
    }

    pub fn tool(&self) -> ToolKind {
        self.tool
    }

    pub fn tool_options(&self) -> &ToolOptions {
        &self.tools
    }

    pub fn tool_options_mut(&mut self) -> &mut ToolOptions {
        &mut self.tools
    }

    pub fn selected_marker(&self) -> Option<MarkerId> {
        self.selected_marker
    }

    /// Switch tools, ending any gesture in flight first.
    pub fn set_tool(&mut self, tool: ToolKind) {
        self.cancel_gesture();
        self.tool = tool;
    }

    pub fn set_viewport_size(&mut self, size: Size) {
        self.camera.set_viewport_size(size);
    }

    /// Drain all queued change events.
    pub fn drain_events(&mut self) -> Vec<ChangeEvent> {
        self.events.drain(..).collect()
    }

    /// Advance timers: commits a due debounced history snapshot and
    /// clears the history suppression flag.
    pub fn tick(&mut self) {
        self.history.tick();
        self.suppress_history = false;
    }

    // --- layer operations -----------------------------------------------

    pub fn create_layer(&mut self, name: Option<String>, color: Option<Rgba>) -> LayerId {
        let id = self.store.create(name, color);
        self.events.push_back(ChangeEvent::LayersChanged);
        self.events
            .push_back(ChangeEvent::ActiveLayerChanged(self.store.active_index()));
        self.push_history(true);
        id
    }

    pub fn delete_layer(&mut self, index: usize) -> LayerResult<()> {
        self.store.delete(index)?;
        self.events.push_back(ChangeEvent::LayersChanged);
        self.events.push_back(ChangeEvent::AppearanceChanged);
        self.events
            .push_back(ChangeEvent::ActiveLayerChanged(self.store.active_index()));
        self.push_history(true);
        Ok(())
    }

    pub fn rename_layer(&mut self, index: usize, name: &str) -> LayerResult<()> {
        self.store.rename(index, name)?;
        self.events.push_back(ChangeEvent::LayersChanged);
        self.push_history(true);
        Ok(())
    }

    /// Recolor a layer. Counts are unchanged, so an explicit appearance
    /// invalidation is emitted; the snapshot is debounced because color
    /// pickers fire in bursts.
    pub fn set_layer_color(&mut self, index: usize, color: Rgba) -> LayerResult<()> {
        self.store.set_color(index, color)?;
        self.events.push_back(ChangeEvent::LayersChanged);
        self.events.push_back(ChangeEvent::AppearanceChanged);
        self.push_history(false);
        Ok(())
    }

    /// Change a layer's opacity (debounced history, slider-driven).
    pub fn set_layer_opacity(&mut self, index: usize, opacity: f64) -> LayerResult<()> {
        self.store.set_opacity(index, opacity)?;
        self.events.push_back(ChangeEvent::LayersChanged);
        self.events.push_back(ChangeEvent::AppearanceChanged);
        self.push_history(false);
        Ok(())
    }

    pub fn toggle_visibility(&mut self, index: usize) -> LayerResult<()> {
        self.store.toggle_visibility(index)?;
        self.events.push_back(ChangeEvent::LayersChanged);
        self.push_history(true);
        Ok(())
    }

    pub fn reorder_layer(&mut self, from: usize, to: usize) -> LayerResult<()> {
        self.store.reorder(from, to)?;
        self.events.push_back(ChangeEvent::LayersChanged);
        self.events.push_back(ChangeEvent::AppearanceChanged);
        self.push_history(true);
        Ok(())
    }

    pub fn set_active_layer(&mut self, index: usize) -> LayerResult<()> {
        self.store.set_active(index)?;
        self.events.push_back(ChangeEvent::ActiveLayerChanged(index));
        Ok(())
    }

    pub fn clear_layer(&mut self, index: usize) -> LayerResult<()> {
        let id = self.store.clear_layer(index)?;
        self.events.push_back(ChangeEvent::LayerContentChanged(id));
        self.events.push_back(ChangeEvent::MarkersChanged);
        self.push_history(true);
        Ok(())
    }

    // --- stroke operations (programmatic path) --------------------------

    /// Start a stroke on the active layer using the current tool sizes.
    pub fn begin_stroke(&mut self, kind: StrokeKind) -> LayerResult<LayerId> {
        let size = match kind {
            StrokeKind::Eraser => self.tools.eraser.size,
            _ => self.tools.pen.size,
        };
        let color = match kind {
            StrokeKind::Eraser => None,
            _ => self.store.active_layer().map(|layer| layer.color),
        };
        let id = self.store.begin_stroke(kind, size, color)?;
        self.events.push_back(ChangeEvent::LayerContentChanged(id));
        Ok(id)
    }

    /// Append a world point to the stroke in progress.
    pub fn append_stroke_point(&mut self, world: Point) -> LayerResult<()> {
        self.store.append_stroke_point(world)?;
        if let Some(layer) = self.store.active_layer() {
            self.events
                .push_back(ChangeEvent::LayerContentChanged(layer.id));
        }
        Ok(())
    }

    /// Commit the stroke in progress: drop the layer's caches and take an
    /// immediate history snapshot.
    pub fn end_stroke(&mut self) -> LayerResult<()> {
        let layer = self
            .store
            .active_layer()
            .ok_or(crate::store::LayerError::NoLayers)?;
        self.events.push_back(ChangeEvent::StrokeCommitted(layer.id));
        self.push_history(true);
        Ok(())
    }

    // --- marker operations ----------------------------------------------

    /// Place a marker on the active layer using the current defaults.
    pub fn place_marker(&mut self, world: Point) -> LayerResult<MarkerId> {
        let marker = Marker::new(
            world,
            self.tools.marker.size,
            self.tools.marker.color,
            self.tools.marker.font_size,
            self.tools.marker.text_color,
        );
        let (layer, id) = self.store.add_marker(marker)?;
        self.events.push_back(ChangeEvent::LayerContentChanged(layer));
        self.events.push_back(ChangeEvent::MarkersChanged);
        self.push_history(true);
        Ok(id)
    }

    /// Edit a marker in place (label, style, position).
    pub fn update_marker(
        &mut self,
        id: MarkerId,
        update: impl FnOnce(&mut Marker),
    ) -> LayerResult<()> {
        let layer = self.store.update_marker(id, update)?;
        self.events.push_back(ChangeEvent::LayerInvalidated(layer));
        self.events.push_back(ChangeEvent::MarkersChanged);
        self.push_history(true);
        Ok(())
    }

    pub fn delete_marker(&mut self, id: MarkerId) -> LayerResult<()> {
        let layer = self.store.delete_marker(id)?;
        if self.selected_marker == Some(id) {
            self.selected_marker = None;
        }
        self.events.push_back(ChangeEvent::LayerContentChanged(layer));
        self.events.push_back(ChangeEvent::MarkersChanged);
        self.push_history(true);
        Ok(())
    }

    /// Select a marker for the marker-list view (or clear the selection).
    pub fn select_marker(&mut self, id: Option<MarkerId>) {
        if self.selected_marker != id {
            self.selected_marker = id;
            self.events.push_back(ChangeEvent::MarkersChanged);
        }
    }

    /// Hit-test markers at a world position.
    pub fn hit_test_marker(&self, world: Point) -> Option<MarkerId> {
        self.store.hit_test_marker(world)
    }

    // --- text operations ------------------------------------------------

    /// Place a text annotation on the active layer.
    pub fn place_text(&mut self, world: Point, content: String) -> LayerResult<TextId> {
        let text = TextAnnotation::new(
            world,
            content,
            self.tools.text.font_size,
            self.tools.text.color,
        );
        let (layer, id) = self.store.add_text(text)?;
        self.events.push_back(ChangeEvent::LayerContentChanged(layer));
        self.push_history(true);
        Ok(id)
    }

    pub fn update_text(
        &mut self,
        id: TextId,
        update: impl FnOnce(&mut TextAnnotation),
    ) -> LayerResult<()> {
        let layer = self.store.update_text(id, update)?;
        self.events.push_back(ChangeEvent::LayerInvalidated(layer));
        self.push_history(true);
        Ok(())
    }

    pub fn delete_text(&mut self, id: TextId) -> LayerResult<()> {
        let layer = self.store.delete_text(id)?;
        self.events.push_back(ChangeEvent::LayerContentChanged(layer));
        self.push_history(true);
        Ok(())
    }

    // --- history --------------------------------------------------------

    /// Step back one history entry. Returns false at the bottom of the
    /// stack.
    pub fn undo(&mut self) -> bool {
        match self.history.undo() {
            Some(snapshot) => {
                self.apply_snapshot(snapshot);
                true
            }
            None => false,
        }
    }

    /// Step forward one history entry. Returns false at the top.
    pub fn redo(&mut self) -> bool {
        match self.history.redo() {
            Some(snapshot) => {
                self.apply_snapshot(snapshot);
                true
            }
            None => false,
        }
    }

    fn apply_snapshot(&mut self, snapshot: Vec<crate::layer::Layer>) {
        // Applying a snapshot must not capture a new history entry; the
        // flag stays up until the next tick.
        self.suppress_history = true;
        self.store.replace_all(snapshot);
        self.events.push_back(ChangeEvent::LayersChanged);
        self.events.push_back(ChangeEvent::AppearanceChanged);
        self.events.push_back(ChangeEvent::MarkersChanged);
        self.events
            .push_back(ChangeEvent::ActiveLayerChanged(self.store.active_index()));
    }

    fn push_history(&mut self, immediate: bool) {
        if self.suppress_history {
            return;
        }
        self.history.push(self.store.layers(), immediate);
    }

    // --- view -----------------------------------------------------------

    pub fn pan(&mut self, delta: Vec2) {
        self.camera.pan(delta);
        self.events.push_back(ChangeEvent::ViewChanged);
    }

    pub fn zoom_in(&mut self) {
        self.camera.zoom_in();
        self.events.push_back(ChangeEvent::ViewChanged);
    }

    pub fn zoom_out(&mut self) {
        self.camera.zoom_out();
        self.events.push_back(ChangeEvent::ViewChanged);
    }

    /// Wheel zoom anchored at the pointer.
    pub fn zoom_at(&mut self, screen: Point, factor: f64) {
        self.camera.zoom_at(screen, factor);
        self.events.push_back(ChangeEvent::ViewChanged);
    }

    pub fn reset_zoom(&mut self) {
        self.camera.reset();
        self.events.push_back(ChangeEvent::ViewChanged);
    }

    pub fn screen_to_world(&self, screen: Point) -> Point {
        self.camera.screen_to_world(screen)
    }

    pub fn world_to_screen(&self, world: Point) -> Point {
        self.camera.world_to_screen(world)
    }

    // --- pointer routing ------------------------------------------------

    pub fn pointer_down(&mut self, screen: Point, button: PointerButton) {
        let mut ctx = Self::router_ctx(
            &mut self.store,
            &mut self.camera,
            &mut self.history,
            self.tool,
            &self.tools,
            &mut self.events,
            self.suppress_history,
        );
        self.router.pointer_down(screen, button, &mut ctx);
    }

    pub fn pointer_moved(&mut self, screen: Point) {
        let mut ctx = Self::router_ctx(
            &mut self.store,
            &mut self.camera,
            &mut self.history,
            self.tool,
            &self.tools,
            &mut self.events,
            self.suppress_history,
        );
        self.router.pointer_moved(screen, &mut ctx);
    }

    pub fn pointer_up(&mut self, button: PointerButton) {
        let mut ctx = Self::router_ctx(
            &mut self.store,
            &mut self.camera,
            &mut self.history,
            self.tool,
            &self.tools,
            &mut self.events,
            self.suppress_history,
        );
        self.router.pointer_up(button, &mut ctx);
    }

    pub fn pointer_left(&mut self) {
        let mut ctx = Self::router_ctx(
            &mut self.store,
            &mut self.camera,
            &mut self.history,
            self.tool,
            &self.tools,
            &mut self.events,
            self.suppress_history,
        );
        self.router.pointer_left(&mut ctx);
    }

    /// Cancel any gesture in flight. Idempotent.
    pub fn cancel_gesture(&mut self) {
        let mut ctx = Self::router_ctx(
            &mut self.store,
            &mut self.camera,
            &mut self.history,
            self.tool,
            &self.tools,
            &mut self.events,
            self.suppress_history,
        );
        self.router.cancel(&mut ctx);
    }

    /// The layer a draw gesture is currently painting on, if any. The
    /// compositor uses this to route that layer through the live path.
    pub fn live_draw_layer(&self) -> Option<LayerId> {
        self.router.live_draw_layer()
    }

    pub fn is_gesture_active(&self) -> bool {
        self.router.is_gesture_active()
    }

    fn router_ctx<'a>(
        store: &'a mut LayerStore,
        camera: &'a mut Camera,
        history: &'a mut HistoryStore,
        tool: ToolKind,
        options: &'a ToolOptions,
        events: &'a mut VecDeque<ChangeEvent>,
        suppress_history: bool,
    ) -> RouterContext<'a> {
        RouterContext {
            store,
            camera,
            history,
            tool,
            options,
            events,
            suppress_history,
        }
    }

    // --- persistence ----------------------------------------------------

    /// Build a project document from the current state.
    ///
    /// The base image is owned by the compositor side; the shell passes
    /// its encoded form through.
    pub fn to_project(&self, image: Option<String>) -> Project {
        let canvas = self.camera.canvas_size();
        Project {
            version: Project::FORMAT_VERSION.to_string(),
            image,
            canvas_width: canvas.width as u32,
            canvas_height: canvas.height as u32,
            layers: self.store.layers().to_vec(),
        }
    }

    /// Replace the editor state with a loaded project. History restarts
    /// from the loaded state.
    pub fn apply_project(&mut self, project: Project) {
        self.cancel_gesture();
        self.camera.set_canvas_size(Size::new(
            project.canvas_width as f64,
            project.canvas_height as f64,
        ));
        self.store.replace_all(project.layers);
        if !self.store.is_empty() {
            // Freshest layer becomes active, matching creation order.
            let _ = self.store.set_active(0);
        }
        self.history.clear();
        self.push_history(true);
        self.events.push_back(ChangeEvent::LayersChanged);
        self.events.push_back(ChangeEvent::AppearanceChanged);
        self.events.push_back(ChangeEvent::MarkersChanged);
        self.events
            .push_back(ChangeEvent::ActiveLayerChanged(self.store.active_index()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::DEFAULT_ACCENT;
    use std::time::Duration;

    fn editor() -> Editor {
        let mut editor = Editor::new(Size::new(1000.0, 800.0));
        editor.set_viewport_size(Size::new(1000.0, 800.0));
        editor
    }

    fn draw_stroke(editor: &mut Editor, points: &[(f64, f64)]) {
        editor.set_tool(ToolKind::Pen);
        let first = points[0];
        editor.pointer_down(Point::new(first.0, first.1), PointerButton::Primary);
        for &(x, y) in &points[1..] {
            editor.pointer_moved(Point::new(x, y));
        }
        editor.pointer_up(PointerButton::Primary);
    }

    #[test]
    fn test_stroke_history_scenario() {
        let mut editor = editor();
        editor.create_layer(Some("L0".to_string()), None);

        // Viewport matches the canvas, so screen == world here.
        draw_stroke(&mut editor, &[(0.0, 0.0), (10.0, 10.0), (20.0, 5.0)]);

        // Baseline entry from layer creation plus one stroke commit.
        assert_eq!(editor.history().len(), 2);
        let stroke = &editor.store().layers()[0].strokes[0];
        assert_eq!(stroke.points.len(), 3);

        assert!(editor.undo());
        assert!(editor.store().layers()[0].strokes.is_empty());

        assert!(editor.redo());
        let stroke = &editor.store().layers()[0].strokes[0];
        assert_eq!(stroke.points.len(), 3);
        assert_eq!(stroke.points[2], Point::new(20.0, 5.0));
    }

    #[test]
    fn test_undo_at_bottom_is_noop() {
        let mut editor = editor();
        editor.create_layer(None, None);
        assert!(!editor.undo());
        assert!(!editor.redo());
    }

    #[test]
    fn test_opacity_burst_debounces_to_one_entry() {
        let mut editor = editor();
        editor.create_layer(None, None);
        editor.history_mut().set_debounce_window(Duration::from_millis(20));

        for step in 1..=5 {
            editor
                .set_layer_opacity(0, 1.0 - step as f64 * 0.1)
                .unwrap();
        }
        assert_eq!(editor.history().len(), 1);

        std::thread::sleep(Duration::from_millis(30));
        editor.tick();

        assert_eq!(editor.history().len(), 2);
        assert!(editor.undo());
        assert!((editor.store().layers()[0].opacity - 1.0).abs() < f64::EPSILON);
        assert!(editor.redo());
        assert!((editor.store().layers()[0].opacity - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_undo_does_not_recapture_history() {
        let mut editor = editor();
        editor.create_layer(None, None);
        draw_stroke(&mut editor, &[(0.0, 0.0), (5.0, 5.0)]);
        let entries = editor.history().len();

        assert!(editor.undo());
        // Applying the snapshot emitted events but no new history entry.
        assert_eq!(editor.history().len(), entries);
        assert!(!editor.history().has_pending());

        // The flag lifts on the next tick, so later edits are captured.
        editor.tick();
        draw_stroke(&mut editor, &[(1.0, 1.0), (2.0, 2.0)]);
        assert!(editor.history().len() > 1);
    }

    #[test]
    fn test_suppression_flag_clears_on_tick() {
        let mut editor = editor();
        editor.create_layer(None, None);
        draw_stroke(&mut editor, &[(0.0, 0.0), (5.0, 5.0)]);

        editor.undo();
        // Mutations while the flag is up are not captured.
        let before = editor.history().len();
        editor.rename_layer(0, "renamed").unwrap();
        assert_eq!(editor.history().len(), before);
        assert!(editor.history().can_redo());

        editor.tick();
        // Once the flag lifts, the next commit truncates the redo tail
        // and lands as a fresh entry.
        editor.rename_layer(0, "captured").unwrap();
        assert!(!editor.history().can_redo());
        assert_eq!(editor.history().cursor(), 1);
    }

    #[test]
    fn test_marker_place_and_hit_test_ops() {
        let mut editor = editor();
        editor.create_layer(None, None);

        let id = editor.place_marker(Point::new(50.0, 50.0)).unwrap();
        assert_eq!(editor.hit_test_marker(Point::new(54.0, 50.0)), Some(id));
        assert_eq!(editor.hit_test_marker(Point::new(70.0, 50.0)), None);

        editor
            .update_marker(id, |m| m.text = "waypoint".to_string())
            .unwrap();
        assert_eq!(editor.store().find_marker(id).unwrap().text, "waypoint");

        editor.select_marker(Some(id));
        assert_eq!(editor.selected_marker(), Some(id));
        editor.delete_marker(id).unwrap();
        assert_eq!(editor.selected_marker(), None);
    }

    #[test]
    fn test_events_for_appearance_changes() {
        let mut editor = editor();
        editor.create_layer(None, None);
        editor.drain_events();

        editor.set_layer_color(0, Rgba::white()).unwrap();
        let events = editor.drain_events();
        assert!(events.contains(&ChangeEvent::AppearanceChanged));

        editor.set_layer_opacity(0, 0.4).unwrap();
        let events = editor.drain_events();
        assert!(events.contains(&ChangeEvent::AppearanceChanged));
    }

    #[test]
    fn test_text_tool_emits_edit_request() {
        let mut editor = editor();
        editor.create_layer(None, None);
        editor.set_tool(ToolKind::Text);
        editor.drain_events();

        editor.pointer_down(Point::new(120.0, 90.0), PointerButton::Primary);
        let events = editor.drain_events();
        let expected = editor.screen_to_world(Point::new(120.0, 90.0));
        assert!(events.contains(&ChangeEvent::TextEditRequested(expected)));

        let id = editor.place_text(expected, "ridge".to_string()).unwrap();
        assert_eq!(editor.store().layers()[0].texts[0].id, id);
    }

    #[test]
    fn test_project_roundtrip() {
        let mut editor = editor();
        editor.create_layer(Some("terrain".to_string()), Some(DEFAULT_ACCENT));
        draw_stroke(&mut editor, &[(0.0, 0.0), (10.0, 10.0)]);
        editor.place_marker(Point::new(40.0, 40.0)).unwrap();

        let project = editor.to_project(None);
        assert_eq!(project.canvas_width, 1000);
        assert_eq!(project.layers.len(), 1);

        let mut restored = Editor::new(Size::new(10.0, 10.0));
        restored.apply_project(project);
        assert_eq!(restored.store().len(), 1);
        assert_eq!(restored.store().layers()[0].name, "terrain");
        assert_eq!(restored.store().layers()[0].strokes.len(), 1);
        assert_eq!(restored.camera().canvas_size(), Size::new(1000.0, 800.0));
        // History restarts from the loaded state.
        assert!(!restored.undo());
    }

    #[test]
    fn test_set_tool_ends_gesture() {
        let mut editor = editor();
        editor.create_layer(None, None);
        editor.set_tool(ToolKind::Pen);
        editor.pointer_down(Point::new(0.0, 0.0), PointerButton::Primary);
        assert!(editor.is_gesture_active());

        editor.set_tool(ToolKind::Pan);
        assert!(!editor.is_gesture_active());
    }
}

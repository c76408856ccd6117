//! Undo/redo snapshot stack with debounced capture.

use crate::layer::Layer;
use std::time::{Duration, Instant};

/// Default debounce window for non-immediate pushes.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// A pending snapshot waiting out its debounce window.
struct Pending {
    snapshot: Vec<Layer>,
    due: Instant,
}

/// Append-only snapshot stack over the layer collection with a cursor.
///
/// Non-immediate pushes are debounced: each push replaces the pending
/// snapshot and restarts the window, so a burst of rapid changes
/// collapses into one entry holding the final state. Snapshots are deep
/// copies and never mutated after commit. Pushing after an undo
/// truncates the redone tail.
pub struct HistoryStore {
    entries: Vec<Vec<Layer>>,
    cursor: usize,
    pending: Option<Pending>,
    window: Duration,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryStore {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            cursor: 0,
            pending: None,
            window: DEFAULT_DEBOUNCE,
        }
    }

    /// Change the debounce window for non-immediate pushes.
    pub fn set_debounce_window(&mut self, window: Duration) {
        self.window = window;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Whether a debounced snapshot is still waiting to commit.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn can_undo(&self) -> bool {
        !self.entries.is_empty() && self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    /// Capture a snapshot of the layer collection.
    ///
    /// When `immediate` is false the snapshot is parked behind the
    /// debounce window, superseding any previous pending snapshot. When
    /// `immediate` is true the pending snapshot (if any) is cancelled and
    /// this one commits synchronously.
    pub fn push(&mut self, layers: &[Layer], immediate: bool) {
        let snapshot = layers.to_vec();
        if immediate {
            self.pending = None;
            self.commit(snapshot);
        } else {
            self.pending = Some(Pending {
                snapshot,
                due: Instant::now() + self.window,
            });
        }
    }

    /// Commit the pending snapshot if its debounce window has elapsed.
    /// Returns true when a snapshot was committed.
    pub fn tick(&mut self) -> bool {
        let due = match &self.pending {
            Some(pending) => pending.due <= Instant::now(),
            None => false,
        };
        if due {
            if let Some(pending) = self.pending.take() {
                self.commit(pending.snapshot);
                return true;
            }
        }
        false
    }

    fn commit(&mut self, snapshot: Vec<Layer>) {
        if self.entries.is_empty() {
            self.entries.push(snapshot);
            self.cursor = 0;
        } else {
            // Drop any redone tail before appending.
            self.entries.truncate(self.cursor + 1);
            self.entries.push(snapshot);
            self.cursor += 1;
        }
    }

    /// Step back one entry and return a copy of the snapshot now at the
    /// cursor. At the bottom of the stack this is a no-op.
    pub fn undo(&mut self) -> Option<Vec<Layer>> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        Some(self.entries[self.cursor].clone())
    }

    /// Step forward one entry and return a copy of that snapshot. At the
    /// top of the stack this is a no-op.
    pub fn redo(&mut self) -> Option<Vec<Layer>> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        Some(self.entries[self.cursor].clone())
    }

    /// Drop all entries and any pending snapshot.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
        self.pending = None;
    }
}

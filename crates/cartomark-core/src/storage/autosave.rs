//! Automatic periodic persistence of the working project.

use super::{Storage, StorageResult};
use crate::project::Project;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default auto-save interval in seconds.
pub const DEFAULT_AUTOSAVE_INTERVAL_SECS: u64 = 30;

/// Key for the most recently edited project, used for auto-restore.
pub const LAST_PROJECT_KEY: &str = "__last_project__";

/// Wraps a storage backend with dirty tracking and a minimum save
/// interval.
///
/// The editor marks the manager dirty on every committed mutation; the
/// shell polls `maybe_save` from its idle loop. Saving never blocks
/// editing and a failed save leaves in-memory state untouched.
pub struct AutoSave<S: Storage> {
    storage: Arc<S>,
    interval: Duration,
    last_save: Option<Instant>,
    dirty: bool,
    project_id: Option<String>,
}

impl<S: Storage> AutoSave<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            storage,
            interval: Duration::from_secs(DEFAULT_AUTOSAVE_INTERVAL_SECS),
            last_save: None,
            dirty: false,
            project_id: None,
        }
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    /// Mark the project as having unsaved changes.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_project_id(&mut self, id: Option<String>) {
        self.project_id = id;
    }

    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    /// Whether the project is dirty and the interval has elapsed.
    pub fn should_save(&self) -> bool {
        if !self.dirty {
            return false;
        }
        match self.last_save {
            Some(last) => last.elapsed() >= self.interval,
            None => true,
        }
    }

    /// Save if dirty and due. Returns true when a save was performed.
    pub async fn maybe_save(&mut self, project: &Project) -> StorageResult<bool> {
        if !self.should_save() {
            return Ok(false);
        }
        self.save(project).await?;
        Ok(true)
    }

    /// Save immediately, also recording the project as the last opened.
    pub async fn save(&mut self, project: &Project) -> StorageResult<()> {
        let id = self
            .project_id
            .clone()
            .unwrap_or_else(|| "default".to_string());

        self.storage.save(&id, project).await?;
        self.storage.save(LAST_PROJECT_KEY, project).await?;

        self.last_save = Some(Instant::now());
        self.dirty = false;
        Ok(())
    }

    /// Load a project by id.
    pub async fn load(&mut self, id: &str) -> StorageResult<Project> {
        let project = self.storage.load(id).await?;
        self.project_id = Some(id.to_string());
        self.dirty = false;
        self.last_save = Some(Instant::now());
        Ok(project)
    }

    /// Try to restore the most recently edited project. A failed load is
    /// "no saved data", not an error.
    pub async fn load_last(&mut self) -> Option<Project> {
        match self.storage.load(LAST_PROJECT_KEY).await {
            Ok(project) => {
                self.dirty = false;
                self.last_save = Some(Instant::now());
                Some(project)
            }
            Err(_) => None,
        }
    }

    /// Delete a stored project.
    pub async fn delete(&self, id: &str) -> StorageResult<()> {
        self.storage.delete(id).await
    }

    /// List stored project ids, hiding the auto-restore key.
    pub async fn list_projects(&self) -> StorageResult<Vec<String>> {
        let mut ids = self.storage.list().await?;
        ids.retain(|id| id != LAST_PROJECT_KEY);
        Ok(ids)
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }
}

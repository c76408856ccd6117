//! Storage abstraction for project persistence.

mod autosave;
mod file;
mod memory;

pub use autosave::{AutoSave, DEFAULT_AUTOSAVE_INTERVAL_SECS, LAST_PROJECT_KEY};
pub use file::FileStorage;
pub use memory::MemoryStorage;

use crate::project::Project;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("project not found: {0}")]
    NotFound(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("io error: {0}")]
    Io(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Boxed future for async storage operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait for project storage backends.
///
/// A failed `load` is not fatal to callers: the editor treats it as "no
/// saved data" and starts fresh. A failed `save` never rolls back or
/// corrupts in-memory state; editing continues and the error surfaces to
/// the caller.
pub trait Storage: Send + Sync {
    /// Save a project under an id.
    fn save(&self, id: &str, project: &Project) -> BoxFuture<'_, StorageResult<()>>;

    /// Load a project by id.
    fn load(&self, id: &str) -> BoxFuture<'_, StorageResult<Project>>;

    /// Delete a project by id.
    fn delete(&self, id: &str) -> BoxFuture<'_, StorageResult<()>>;

    /// List all stored project ids.
    fn list(&self) -> BoxFuture<'_, StorageResult<Vec<String>>>;

    /// Check whether a project exists.
    fn exists(&self, id: &str) -> BoxFuture<'_, StorageResult<bool>>;
}

#[cfg(test)]
pub(crate) fn block_on<F: Future>(f: F) -> F::Output {
    // Minimal blocking executor for storage tests.
    use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

    fn dummy_raw_waker() -> RawWaker {
        fn no_op(_: *const ()) {}
        fn clone(_: *const ()) -> RawWaker {
            dummy_raw_waker()
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
        RawWaker::new(std::ptr::null(), &VTABLE)
    }

    let waker = unsafe { Waker::from_raw(dummy_raw_waker()) };
    let mut cx = Context::from_waker(&waker);
    let mut f = std::pin::pin!(f);

    loop {
        match f.as_mut().poll(&mut cx) {
            Poll::Ready(result) => return result,
            Poll::Pending => {}
        }
    }
}

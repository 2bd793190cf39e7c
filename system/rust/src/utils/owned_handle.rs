//! Utility to abort an async task if its logical owner is dropped

use tokio::task::JoinHandle;

/// When this struct is dropped, the contained task will be aborted, unless it
/// was detached first
#[derive(Debug)]
pub struct OwnedHandle<T> {
    handle: Option<JoinHandle<T>>,
}

impl<T> OwnedHandle<T> {
    /// Give up ownership, letting the task run to completion on its own
    pub fn detach(mut self) {
        self.handle.take();
    }

    /// Whether the task has completed (or been aborted)
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl<T> From<JoinHandle<T>> for OwnedHandle<T> {
    fn from(handle: JoinHandle<T>) -> Self {
        Self { handle: Some(handle) }
    }
}

impl<T> Drop for OwnedHandle<T> {
    fn drop(&mut self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }
}

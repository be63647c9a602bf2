//     ______   __  __     __         ______     ______
//    /\  == \ /\ \/\ \   /\ \       /\  ___\   /\  ___\
//    \ \  _-/ \ \ \_\ \  \ \ \____  \ \___  \  \ \  __\
//     \ \_\    \ \_____\  \ \_____\  \/\_____\  \ \_____\
//      \/_/     \/_____/   \/_____/   \/_____/   \/_____/
//
// Author: Colin MacRitchie / Ripple Group
//! Posting work onto the monitored thread

#![forbid(unsafe_code)]

use std::sync::Arc;

/// Unit of work executed on the monitored thread
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Errors returned when a task cannot be handed to the monitored thread
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PostError {
    /// The monitored thread no longer accepts work
    #[error("Monitored thread's task queue is disconnected")]
    Disconnected,

    /// The accessor refused the task
    #[error("Task rejected: {0}")]
    Rejected(String),
}

/// Access to the thread being watched
pub trait ThreadAccessor: Send + Sync {
    /// Queue `task` to run on the monitored thread
    ///
    /// # Errors
    ///
    /// Returns [`PostError`] when the task could not be queued. The detector
    /// treats this as a skipped sample and posts again on its next poll.
    fn post(&self, task: Task) -> Result<(), PostError>;

    /// True when called from the monitored thread itself
    fn is_current_thread(&self) -> bool;
}

impl<T: ThreadAccessor + ?Sized> ThreadAccessor for Arc<T> {
    fn post(&self, task: Task) -> Result<(), PostError> {
        (**self).post(task)
    }

    fn is_current_thread(&self) -> bool {
        (**self).is_current_thread()
    }
}

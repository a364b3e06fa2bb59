//! Cooperative cancellation shared by every processing stage
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A shared flag that long running stages poll at the top of each unit of work.
///
/// Clones observe the same flag, so a caller may keep one handle and pass
/// another into a stage running on a different thread.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// The result of a stage that may be cancelled.
///
/// Cancellation produces no result but is not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome<T> {
    Completed(T),
    Cancelled,
}

impl<T> TaskOutcome<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Cancelled => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> TaskOutcome<U> {
        match self {
            Self::Completed(value) => TaskOutcome::Completed(f(value)),
            Self::Cancelled => TaskOutcome::Cancelled,
        }
    }
}

impl<T> From<Option<T>> for TaskOutcome<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Self::Completed(value),
            None => Self::Cancelled,
        }
    }
}

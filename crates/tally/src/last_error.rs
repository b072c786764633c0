//! Per-collector error-suppression cell.

use std::{
    fmt,
    sync::{Mutex, MutexGuard, PoisonError},
};

/// Last error observed by a [`Collector`](crate::Collector) when querying its data source.
///
/// Errors are compared by their rendered message. [`Self::replace()`] decides whether an error
/// should be reported and stores it in a single locked step, so concurrent scrapes failing
/// with the same new error report it only once.
///
/// # Examples
///
/// ```
/// use tally::LastError;
///
/// let last_error = LastError::new();
/// assert!(last_error.replace(&"connection refused"));
/// assert!(!last_error.replace(&"connection refused")); // suppressed
/// assert!(last_error.replace(&"timed out"));
/// last_error.clear();
/// assert!(last_error.replace(&"timed out")); // reported again after recovery
/// ```
#[derive(Debug, Default)]
pub struct LastError {
    message: Mutex<Option<String>>,
}

impl LastError {
    /// Creates a cell with no error.
    pub const fn new() -> Self {
        Self {
            message: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<String>> {
        // The cell holds plain data, so a panic while holding the lock cannot break it.
        self.message.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `err` as the last error. Returns `true` if it differs from the previously stored
    /// error (including the case when there was none), i.e. if it should be reported.
    pub fn replace(&self, err: &dyn fmt::Display) -> bool {
        let message = err.to_string();
        let mut last_message = self.lock();
        if last_message.as_deref() == Some(message.as_str()) {
            false
        } else {
            *last_message = Some(message);
            true
        }
    }

    /// Clears the last error. Returns `true` if there was an error.
    pub fn clear(&self) -> bool {
        self.lock().take().is_some()
    }

    /// Returns the message of the last error, if any.
    pub fn get(&self) -> Option<String> {
        self.lock().clone()
    }
}

//! Cooperative cancellation.
//!
//! A [`CancellationHandle`] is shared between the transport driving a query
//! and the code doing the work. The worker polls it at every suspension
//! point (row boundaries during export) and aborts with a
//! [`CancelledError`] tagged with the name of the cancelled operation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Raised when a cancellation handle fires at a suspension point.
#[derive(Debug, Clone, Error)]
#[error("operation \"{operation}\" was cancelled")]
pub struct CancelledError {
    pub operation: &'static str,
}

/// Cheap-to-clone cancellation flag.
#[derive(Clone, Debug, Default)]
pub struct CancellationHandle(Arc<AtomicBool>);

impl CancellationHandle {
    pub fn new() -> CancellationHandle {
        CancellationHandle::default()
    }

    /// Request cancellation. Takes effect at the worker's next poll.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Poll the flag, failing with the given operation tag if set.
    #[inline]
    pub fn check(&self, operation: &'static str) -> Result<(), CancelledError> {
        if self.is_cancelled() {
            Err(CancelledError { operation })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_before_and_after_cancel() {
        let handle = CancellationHandle::new();
        assert!(handle.check("Query export").is_ok());

        let shared = handle.clone();
        shared.cancel();

        let err = handle.check("Query export").unwrap_err();
        assert_eq!(err.operation, "Query export");
        assert!(err.to_string().contains("Query export"));
    }
}

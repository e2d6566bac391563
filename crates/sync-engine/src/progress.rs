// crates/sync-engine/src/progress.rs
//! Progress reporting for bulk operations
//!
//! Listeners are called synchronously after each item. A listener that
//! fails (typically because the screen that asked for updates is gone) is
//! logged and otherwise ignored; it never aborts the operation.

use crate::types::Progress;
use thiserror::Error;

/// Returned by a listener that could not handle an update
#[derive(Debug, Error)]
#[error("progress listener failed: {0}")]
pub struct ListenerError(pub String);

/// Receives progress updates
pub trait ProgressListener: Send + Sync {
    fn on_progress(&self, progress: &Progress) -> Result<(), ListenerError>;
}

impl<F> ProgressListener for F
where
    F: Fn(&Progress) -> Result<(), ListenerError> + Send + Sync,
{
    fn on_progress(&self, progress: &Progress) -> Result<(), ListenerError> {
        self(progress)
    }
}

/// A listener that ignores every update
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentProgress;

impl ProgressListener for SilentProgress {
    fn on_progress(&self, _progress: &Progress) -> Result<(), ListenerError> {
        Ok(())
    }
}

/// Delivers an update, swallowing listener failures
pub(crate) fn report(listener: &dyn ProgressListener, progress: Progress) {
    if let Err(e) = listener.on_progress(&progress) {
        log::debug!(
            "Ignoring {} at {}/{}",
            e,
            progress.processed,
            progress.total
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_closure_listener_receives_updates() {
        let seen = Mutex::new(Vec::new());
        let listener = |p: &Progress| -> Result<(), ListenerError> {
            seen.lock().unwrap().push(p.processed);
            Ok(())
        };

        report(&listener, Progress::new(1, 2, "a"));
        report(&listener, Progress::new(2, 2, "b"));
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_failing_listener_is_swallowed() {
        let listener =
            |_: &Progress| -> Result<(), ListenerError> { Err(ListenerError("unmounted".into())) };
        report(&listener, Progress::new(1, 1, "x"));
        report(&SilentProgress, Progress::new(1, 1, "x"));
    }
}

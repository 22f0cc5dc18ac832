// Job Watcher Port
// Delivers "job arrived" dispatches from the incoming directory over a channel.

use crate::domain::JobId;
use crate::error::Result;
use std::path::Path;
use tokio::sync::mpsc;

/// Something the watcher observed in the incoming directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A regular file was created; dispatch it
    Arrived(JobId),
    /// A file was deleted out-of-band (not moved by the engine)
    Removed(String),
    /// The backend reported an error or lost events; the watcher can no longer
    /// be trusted
    Failed(String),
}

pub type WatchEventSender = mpsc::UnboundedSender<WatchEvent>;
pub type WatchEventReceiver = mpsc::UnboundedReceiver<WatchEvent>;

/// Create the channel a watcher publishes into
pub fn watch_channel() -> (WatchEventSender, WatchEventReceiver) {
    mpsc::unbounded_channel()
}

/// Job Watcher trait
///
/// Implementations:
/// - NotifyWatcher: OS filesystem notifications (inotify, FSEvents, ...)
/// - ManualWatcher: test double (see `mocks`)
///
/// Construction is where backend availability is checked; `watch` only
/// subscribes to an already-created directory.
pub trait JobWatcher: Send {
    /// Subscribe (non-recursively) to creations in `dir`
    ///
    /// # Errors
    /// - AppError::DependencyUnavailable if the backend cannot add a watch
    /// - AppError::Environment if `dir` cannot be watched
    fn watch(&mut self, dir: &Path) -> Result<()>;

    /// Stop delivering events. Idempotent.
    fn unwatch(&mut self) -> Result<()>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    /// Watcher driven by hand: tests push events through the returned sender
    pub struct ManualWatcher {
        watched: Arc<Mutex<Option<PathBuf>>>,
    }

    impl ManualWatcher {
        /// Returns the watcher, a sender for injecting events, and the receiver
        /// the runner consumes
        pub fn new() -> (Self, WatchEventSender, WatchEventReceiver) {
            let (tx, rx) = watch_channel();
            (
                Self {
                    watched: Arc::new(Mutex::new(None)),
                },
                tx,
                rx,
            )
        }

        /// Shared view of the currently watched directory
        pub fn watched(&self) -> Arc<Mutex<Option<PathBuf>>> {
            Arc::clone(&self.watched)
        }
    }

    impl JobWatcher for ManualWatcher {
        fn watch(&mut self, dir: &Path) -> Result<()> {
            *self.watched.lock().unwrap() = Some(dir.to_path_buf());
            Ok(())
        }

        fn unwatch(&mut self) -> Result<()> {
            *self.watched.lock().unwrap() = None;
            Ok(())
        }
    }
}

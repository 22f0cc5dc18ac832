//! Filesystem watcher for the incoming directory.
//!
//! Wraps `notify::RecommendedWatcher` (inotify, FSEvents, ReadDirectoryChanges)
//! and bridges its callback thread into the runner's unbounded channel.
//!
//! Backend errors, dropped-event overflows and removal of the watched
//! directory all become `WatchEvent::Failed`, which stops the runner.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use dirqueue_core::domain::JobId;
use dirqueue_core::error::{AppError, Result};
use dirqueue_core::port::{
    watch_channel, JobWatcher, WatchEvent, WatchEventReceiver, WatchEventSender,
};

/// `JobWatcher` backed by OS filesystem notifications
pub struct NotifyWatcher {
    /// Must stay alive: dropping it deregisters the OS watch and closes the
    /// event channel.
    watcher: notify::RecommendedWatcher,
    watched: Arc<Mutex<Option<PathBuf>>>,
}

impl NotifyWatcher {
    /// Initialize the notification backend, publishing into `events`.
    ///
    /// Nothing is watched yet; this only proves the backend is usable.
    ///
    /// # Errors
    /// - AppError::DependencyUnavailable if the backend cannot be created
    ///   (unsupported platform, inotify instance limit reached, ...)
    pub fn new(events: WatchEventSender) -> Result<Self> {
        let watched: Arc<Mutex<Option<PathBuf>>> = Arc::new(Mutex::new(None));

        let watcher = {
            let watched = Arc::clone(&watched);
            notify::recommended_watcher(move |res: notify::Result<Event>| {
                let dir = watched.lock().ok().and_then(|guard| guard.clone());
                for event in translate(res, dir.as_deref()) {
                    // Receiver gone means the runner has stopped; nothing to deliver to
                    let _ = events.send(event);
                }
            })
            .map_err(|e| {
                AppError::DependencyUnavailable(format!(
                    "cannot initialize filesystem event watching: {}",
                    e
                ))
            })?
        };

        Ok(Self { watcher, watched })
    }

    /// Create a boxed watcher together with the receiver the runner consumes
    pub fn create() -> Result<(Box<dyn JobWatcher>, WatchEventReceiver)> {
        let (tx, rx) = watch_channel();
        let watcher = Self::new(tx)?;
        Ok((Box::new(watcher), rx))
    }
}

impl JobWatcher for NotifyWatcher {
    fn watch(&mut self, dir: &Path) -> Result<()> {
        // Record the directory first so its own removal is recognized
        if let Ok(mut guard) = self.watched.lock() {
            *guard = Some(dir.to_path_buf());
        }

        self.watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| map_watch_error(dir, e))?;

        info!(dir = %dir.display(), "Watching for new jobs");
        Ok(())
    }

    fn unwatch(&mut self) -> Result<()> {
        let dir = match self.watched.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };

        if let Some(dir) = dir {
            self.watcher
                .unwatch(&dir)
                .map_err(|e| map_watch_error(&dir, e))?;
            debug!(dir = %dir.display(), "Stopped watching");
        }
        Ok(())
    }
}

fn map_watch_error(dir: &Path, err: notify::Error) -> AppError {
    let context = format!("watch {}", dir.display());
    match err.kind {
        notify::ErrorKind::MaxFilesWatch => AppError::DependencyUnavailable(format!(
            "{}: the OS limit on filesystem watches has been reached",
            context
        )),
        notify::ErrorKind::Io(io_err) => AppError::environment(context, io_err),
        notify::ErrorKind::PathNotFound => {
            AppError::environment(context, std::io::Error::from(std::io::ErrorKind::NotFound))
        }
        other => AppError::Watcher(format!("{}: {:?}", context, other)),
    }
}

/// Translate one backend notification into runner events
///
/// - creation of a regular file => `Arrived`
/// - a regular file renamed into the directory => `Arrived`
/// - deletion of a file => `Removed` (the engine itself only ever renames)
/// - deletion of the watched directory, backend errors, lost events => `Failed`
/// - everything else (directories, modifications, renames out) is ignored
pub(crate) fn translate(res: notify::Result<Event>, watched: Option<&Path>) -> Vec<WatchEvent> {
    let event = match res {
        Ok(event) => event,
        Err(e) => return vec![WatchEvent::Failed(format!("filesystem watcher error: {}", e))],
    };

    if event.need_rescan() {
        return vec![WatchEvent::Failed(
            "filesystem events were dropped by the OS; arrivals may have been missed".to_string(),
        )];
    }

    match event.kind {
        EventKind::Create(CreateKind::Folder) => Vec::new(),
        EventKind::Create(_) => event
            .paths
            .iter()
            .filter(|path| is_regular_file(path))
            .filter_map(|path| job_id_for(path))
            .map(WatchEvent::Arrived)
            .collect(),
        // inotify reports a move-in as `To` (plus a paired `Both` when the
        // source was watched too); other backends only know `Any`
        EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Any)) => event
            .paths
            .iter()
            .filter(|path| is_within(path, watched))
            .filter(|path| is_regular_file(path))
            .filter_map(|path| job_id_for(path))
            .map(WatchEvent::Arrived)
            .collect(),
        EventKind::Remove(kind) => {
            if let Some(dir) = watched {
                if event.paths.iter().any(|path| path == dir) {
                    return vec![WatchEvent::Failed(format!(
                        "incoming directory {} was removed",
                        dir.display()
                    ))];
                }
            }
            match kind {
                RemoveKind::Folder => Vec::new(),
                _ => event
                    .paths
                    .iter()
                    .filter_map(|path| path.file_name())
                    .map(|name| WatchEvent::Removed(name.to_string_lossy().into_owned()))
                    .collect(),
            }
        }
        _ => Vec::new(),
    }
}

fn is_within(path: &Path, watched: Option<&Path>) -> bool {
    match watched {
        Some(dir) => path.parent() == Some(dir),
        None => true,
    }
}

fn is_regular_file(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}

fn job_id_for(path: &Path) -> Option<JobId> {
    let name = path.file_name()?;
    match JobId::from_file_name(name) {
        Ok(id) => Some(id),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring new file with unusable name");
            None
        }
    }
}

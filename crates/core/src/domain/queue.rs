// Queue Domain Model

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::domain::{JobId, JobState};

/// Directory (under the queue root) that holds the four state directories
pub const QUEUE_DIR: &str = "queue";

/// Physical layout of a queue: `<root>/queue/{in,active,done,failed}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueLayout {
    root: PathBuf,
}

impl QueueLayout {
    /// Create a layout rooted at `root`.
    ///
    /// The root should be absolute; nothing in the engine changes the
    /// process working directory, so relative roots are resolved against
    /// whatever it happens to be.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding jobs in `state`
    pub fn dir(&self, state: JobState) -> PathBuf {
        self.root.join(QUEUE_DIR).join(state.dir_name())
    }

    /// Path of job `id` while in `state`
    pub fn job_path(&self, id: &JobId, state: JobState) -> PathBuf {
        self.dir(state).join(id.as_str())
    }
}

/// What a move does when the destination already holds a file of the same name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Replace the destination (plain rename semantics)
    #[default]
    Overwrite,
    /// Refuse the move and leave the source where it is
    Reject,
}

// Directory-backed StateStore
// Each state is a directory; a transition is a single rename(2) between two of
// them, so a job is never visible in two states (or none) at once.

use async_trait::async_trait;
use std::io;
use std::path::PathBuf;
use tracing::{debug, warn};

use dirqueue_core::domain::{CollisionPolicy, JobId, JobState, QueueLayout};
use dirqueue_core::error::{AppError, Result};
use dirqueue_core::port::StateStore;

/// State store over `<root>/queue/{in,active,done,failed}`
///
/// Only rename-atomicity is relied on: all four directories must live on one
/// filesystem, and only one engine may operate on a queue at a time.
#[derive(Debug, Clone)]
pub struct DirectoryStateStore {
    layout: QueueLayout,
    collision_policy: CollisionPolicy,
}

impl DirectoryStateStore {
    /// Create a store over `layout`
    ///
    /// # Example
    /// ```ignore
    /// let store = DirectoryStateStore::new(
    ///     QueueLayout::new("/srv/dirqueue"),
    ///     CollisionPolicy::Overwrite,
    /// );
    /// store.ensure_layout().await?;
    /// ```
    pub fn new(layout: QueueLayout, collision_policy: CollisionPolicy) -> Self {
        Self {
            layout,
            collision_policy,
        }
    }

    pub fn layout(&self) -> &QueueLayout {
        &self.layout
    }

    async fn is_regular_file(path: &std::path::Path) -> bool {
        // Follows symlinks: a link to a regular file counts as a job
        tokio::fs::metadata(path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }
}

#[async_trait]
impl StateStore for DirectoryStateStore {
    async fn ensure_layout(&self) -> Result<()> {
        for state in JobState::ALL {
            let dir = self.layout.dir(state);
            // create_dir_all tolerates an existing directory but not a file in its place
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| AppError::environment(format!("create directory {}", dir.display()), e))?;
        }
        debug!(root = %self.layout.root().display(), "Queue layout ready");
        Ok(())
    }

    async fn move_job(&self, id: &JobId, from: JobState, to: JobState) -> Result<()> {
        from.check_transition(to)?;

        let src = self.layout.job_path(id, from);
        let dst = self.layout.job_path(id, to);

        if self.collision_policy == CollisionPolicy::Reject {
            let exists = tokio::fs::try_exists(&dst)
                .await
                .map_err(|e| AppError::environment(format!("stat {}", dst.display()), e))?;
            if exists {
                return Err(AppError::environment(
                    format!("move {} -> {}", src.display(), dst.display()),
                    io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        "destination already holds a job with this name",
                    ),
                ));
            }
        }

        tokio::fs::rename(&src, &dst).await.map_err(|e| {
            AppError::environment(format!("move {} -> {}", src.display(), dst.display()), e)
        })?;

        debug!(job_id = %id, from = %from, to = %to, "Job moved");
        Ok(())
    }

    async fn list_files(&self, state: JobState) -> Result<Vec<JobId>> {
        let dir = self.layout.dir(state);
        let list_err = |e: io::Error| AppError::environment(format!("list {}", dir.display()), e);

        let mut entries = tokio::fs::read_dir(&dir).await.map_err(list_err)?;
        let mut ids = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(list_err)? {
            if !Self::is_regular_file(&entry.path()).await {
                continue;
            }
            match JobId::from_file_name(&entry.file_name()) {
                Ok(id) => ids.push(id),
                Err(e) => warn!(dir = %dir.display(), error = %e, "Skipping unusable file name"),
            }
        }

        ids.sort();
        Ok(ids)
    }

    fn job_path(&self, id: &JobId, state: JobState) -> PathBuf {
        self.layout.job_path(id, state)
    }
}

// State Store Port
// Job state is directory membership; implementations move job files between
// state directories atomically.

use crate::domain::{JobId, JobState};
use crate::error::Result;
use async_trait::async_trait;
use std::path::PathBuf;

/// State store interface
///
/// Implementations:
/// - DirectoryStateStore: one directory per state, rename-based moves
/// - InMemoryStateStore: test double (see `mocks`)
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Create every state directory. Safe to call repeatedly.
    ///
    /// # Errors
    /// - AppError::Environment for any failure other than "already exists"
    async fn ensure_layout(&self) -> Result<()>;

    /// Move job `id` from `from` to `to` in a single atomic step.
    ///
    /// # Errors
    /// - AppError::Domain if the engine may not perform this transition
    /// - AppError::Environment if the source is missing or the rename fails
    async fn move_job(&self, id: &JobId, from: JobState, to: JobState) -> Result<()>;

    /// Regular files currently in `state`, sorted by name
    async fn list_files(&self, state: JobState) -> Result<Vec<JobId>>;

    /// Location of job `id` while in `state`
    fn job_path(&self, id: &JobId, state: JobState) -> PathBuf;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::{HashMap, HashSet};
    use std::io;
    use std::sync::Mutex;

    /// In-memory state store
    ///
    /// Holds `JobId -> JobState` and records every successful move so tests can
    /// assert on ordering.
    #[derive(Default)]
    pub struct InMemoryStateStore {
        jobs: Mutex<HashMap<JobId, JobState>>,
        moves: Mutex<Vec<(JobId, JobState, JobState)>>,
        broken_targets: Mutex<HashSet<JobState>>,
    }

    impl InMemoryStateStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Place a job directly into `state` (what a producer or a crash would do)
        pub fn insert(&self, name: &str, state: JobState) -> JobId {
            let id = JobId::new(name).unwrap();
            self.jobs.lock().unwrap().insert(id.clone(), state);
            id
        }

        /// Make every move into `state` fail with an I/O error
        pub fn break_moves_into(&self, state: JobState) {
            self.broken_targets.lock().unwrap().insert(state);
        }

        pub fn state_of(&self, name: &str) -> Option<JobState> {
            let id = JobId::new(name).ok()?;
            self.jobs.lock().unwrap().get(&id).copied()
        }

        pub fn moves(&self) -> Vec<(JobId, JobState, JobState)> {
            self.moves.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StateStore for InMemoryStateStore {
        async fn ensure_layout(&self) -> Result<()> {
            Ok(())
        }

        async fn move_job(&self, id: &JobId, from: JobState, to: JobState) -> Result<()> {
            from.check_transition(to)?;

            if self.broken_targets.lock().unwrap().contains(&to) {
                return Err(AppError::environment(
                    format!("move {} to {}", id, to),
                    io::Error::new(io::ErrorKind::PermissionDenied, "injected failure"),
                ));
            }

            let mut jobs = self.jobs.lock().unwrap();
            match jobs.get(id) {
                Some(current) if *current == from => {
                    jobs.insert(id.clone(), to);
                    self.moves.lock().unwrap().push((id.clone(), from, to));
                    Ok(())
                }
                _ => Err(AppError::environment(
                    format!("move {} from {}", id, from),
                    io::Error::from(io::ErrorKind::NotFound),
                )),
            }
        }

        async fn list_files(&self, state: JobState) -> Result<Vec<JobId>> {
            let mut ids: Vec<JobId> = self
                .jobs
                .lock()
                .unwrap()
                .iter()
                .filter(|(_, s)| **s == state)
                .map(|(id, _)| id.clone())
                .collect();
            ids.sort();
            Ok(ids)
        }

        fn job_path(&self, id: &JobId, state: JobState) -> PathBuf {
            PathBuf::from("/mem/queue").join(state.dir_name()).join(id.as_str())
        }
    }
}

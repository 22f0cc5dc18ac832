// Crash recovery sweep
use crate::domain::JobState;
use crate::port::StateStore;
use std::sync::Arc;
use tracing::{debug, info};

/// Crash recovery service
///
/// On startup, any job still in `Active` belongs to a previous run that ended
/// mid-processing with an unknown processor outcome. Such jobs are moved to
/// `Failed`; requeueing them is left to an operator.
pub struct RecoveryService {
    store: Arc<dyn StateStore>,
}

impl RecoveryService {
    /// Create a new recovery service
    ///
    /// # Example
    /// ```ignore
    /// let recovery = RecoveryService::new(store.clone());
    /// let recovered = recovery.sweep_active().await?;
    /// ```
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Move every job left in `Active` to `Failed`
    ///
    /// Must run to completion before the watcher starts, so nothing a new run
    /// activates is mistaken for a leftover.
    ///
    /// # Returns
    /// Number of jobs recovered
    ///
    /// # Errors
    /// Stops at the first listing or move failure. At startup that is fatal.
    pub async fn sweep_active(&self) -> crate::error::Result<usize> {
        let stranded = self.store.list_files(JobState::Active).await?;

        if stranded.is_empty() {
            debug!("No stranded jobs in active");
            return Ok(0);
        }

        info!(
            stranded_count = stranded.len(),
            "Recovering jobs left in active by an unclean shutdown"
        );

        for id in &stranded {
            info!("moving job to failed: {}", id);
            self.store
                .move_job(id, JobState::Active, JobState::Failed)
                .await?;
        }

        info!(recovered_count = stranded.len(), "Crash recovery complete");
        Ok(stranded.len())
    }
}

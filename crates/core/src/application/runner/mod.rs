// Job Runner - the single serialized worker driving jobs through their states

mod shutdown;

pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::domain::{JobId, JobReport, JobState};
use crate::error::{AppError, Result};
use crate::port::{
    JobProcessor, ProcessorError, ProcessorRun, StateStore, TimeProvider, WatchEvent,
    WatchEventReceiver,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Counts of what the runner did before it stopped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub done: usize,
    pub failed: usize,
    /// Jobs that could not be activated or were left stranded in `Active`
    pub unresolved: usize,
}

impl RunSummary {
    fn record(&mut self, report: &JobReport) {
        match report.final_state {
            JobState::Done => self.done += 1,
            JobState::Failed => self.failed += 1,
            JobState::Queued | JobState::Active => self.unresolved += 1,
        }
    }
}

/// Runner consumes watch events and processes one job at a time
///
/// ```text
/// Queued --(dispatch)--> Active --(exit 0)--> Done
///                               \--(anything else)--> Failed
/// ```
pub struct JobRunner {
    store: Arc<dyn StateStore>,
    processor: Arc<dyn JobProcessor>,
    time_provider: Arc<dyn TimeProvider>,
}

impl JobRunner {
    pub fn new(
        store: Arc<dyn StateStore>,
        processor: Arc<dyn JobProcessor>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            store,
            processor,
            time_provider,
        }
    }

    /// Run the dispatch loop until shutdown
    ///
    /// Dispatches arriving while a job is in flight wait in the channel. A
    /// shutdown request is only observed between jobs: the in-flight job
    /// always reaches its final move first.
    ///
    /// # Errors
    /// - AppError::Watcher if the watcher reports a failure or its event
    ///   stream closes before shutdown was requested
    pub async fn run(
        &self,
        mut events: WatchEventReceiver,
        mut shutdown: ShutdownToken,
    ) -> Result<RunSummary> {
        info!("Job runner started");
        let mut summary = RunSummary::default();

        loop {
            if shutdown.is_shutdown() {
                break;
            }

            let event = tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                event = events.recv() => event,
            };

            match event {
                Some(WatchEvent::Arrived(id)) => {
                    let report = self.handle(&id).await;
                    summary.record(&report);
                }
                Some(WatchEvent::Removed(name)) => {
                    warn!(
                        "{}",
                        AppError::ExternalInterference(format!(
                            "job '{}' was deleted from the incoming directory out-of-band",
                            name
                        ))
                    );
                }
                Some(WatchEvent::Failed(reason)) => {
                    return Err(AppError::Watcher(reason));
                }
                None => {
                    if shutdown.is_shutdown() {
                        break;
                    }
                    return Err(AppError::Watcher(
                        "event stream closed unexpectedly".to_string(),
                    ));
                }
            }
        }

        info!(
            done = summary.done,
            failed = summary.failed,
            unresolved = summary.unresolved,
            "Job runner stopped"
        );
        Ok(summary)
    }

    /// Handle one dispatched job. Never fails: every problem is logged and
    /// reflected in the report's final state.
    pub async fn handle(&self, id: &JobId) -> JobReport {
        info!("moving job to active: {}", id);
        if let Err(e) = self
            .store
            .move_job(id, JobState::Queued, JobState::Active)
            .await
        {
            if e.is_not_found() {
                warn!(
                    "{}",
                    AppError::ExternalInterference(format!(
                        "job '{}' disappeared from the incoming directory before it could be activated",
                        id
                    ))
                );
            } else {
                error!("could not activate job {}: {}", id, e);
            }
            return JobReport::not_activated(id.clone());
        }
        let activated_at = self.time_provider.now_millis();

        let final_state = match self.invoke(id).await {
            Ok(run) => {
                debug!(job_id = %id, duration_ms = run.duration_ms, "Job processor succeeded");
                info!("moving job to done: {}", id);
                match self.finish(id, JobState::Done).await {
                    Ok(()) => JobState::Done,
                    Err(_) => self.fail(id).await,
                }
            }
            Err(e) => {
                error!("job processor failed for {}: {}", id, e);
                self.fail(id).await
            }
        };

        JobReport {
            id: id.clone(),
            final_state,
            activated_at: Some(activated_at),
            finished_at: final_state
                .is_terminal()
                .then(|| self.time_provider.now_millis()),
        }
    }

    /// Move an active job to `Failed`, returning where it ended up
    async fn fail(&self, id: &JobId) -> JobState {
        info!("moving job to failed: {}", id);
        match self.finish(id, JobState::Failed).await {
            Ok(()) => JobState::Failed,
            Err(_) => {
                error!(
                    "job {} left in active; it will be moved to failed by the next recovery sweep",
                    id
                );
                JobState::Active
            }
        }
    }

    async fn finish(&self, id: &JobId, target: JobState) -> Result<()> {
        self.store
            .move_job(id, JobState::Active, target)
            .await
            .inspect_err(|e| error!("could not move job {} to {}: {}", id, target, e))
    }

    /// Invoke the processor on its own task so a panic cannot take the
    /// runner down with it
    async fn invoke(&self, id: &JobId) -> std::result::Result<ProcessorRun, ProcessorError> {
        let path = self.store.job_path(id, JobState::Active);
        let processor = Arc::clone(&self.processor);

        let handle = tokio::task::spawn(async move { processor.process(&path).await });

        match handle.await {
            Ok(result) => result,
            Err(join_err) if join_err.is_panic() => {
                let panic_info = join_err.into_panic();
                let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };
                Err(ProcessorError::Panicked(panic_msg))
            }
            Err(join_err) => Err(ProcessorError::Panicked(join_err.to_string())),
        }
    }
}

// Composition root: wires the filesystem store, watcher and processor into a
// runner and drives the startup sequence.

use std::sync::Arc;
use tracing::{info, warn};

use dirqueue_core::application::{JobRunner, RecoveryService, RunSummary, ShutdownToken};
use dirqueue_core::domain::JobState;
use dirqueue_core::error::Result;
use dirqueue_core::port::time_provider::SystemTimeProvider;
use dirqueue_core::port::{JobProcessor, JobWatcher, StateStore, TimeProvider, WatchEventReceiver};
use dirqueue_infra_fs::{DirectoryStateStore, NotifyWatcher};
use dirqueue_infra_system::SubprocessProcessor;

use crate::config::Settings;

/// Produces the watcher and the event stream it publishes into
pub type WatcherFactory =
    Box<dyn FnOnce() -> Result<(Box<dyn JobWatcher>, WatchEventReceiver)> + Send>;

/// One engine instance over one queue root
pub struct Daemon {
    settings: Settings,
    watcher_factory: WatcherFactory,
    processor: Option<Arc<dyn JobProcessor>>,
    time_provider: Arc<dyn TimeProvider>,
}

impl Daemon {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            watcher_factory: Box::new(NotifyWatcher::create),
            processor: None,
            time_provider: Arc::new(SystemTimeProvider),
        }
    }

    /// Replace the OS-backed watcher
    pub fn with_watcher_factory(mut self, factory: WatcherFactory) -> Self {
        self.watcher_factory = factory;
        self
    }

    /// Replace the subprocess processor built from the settings
    pub fn with_processor(mut self, processor: Arc<dyn JobProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Start the engine and process jobs until `shutdown` fires.
    ///
    /// Startup order:
    /// 1. initialize filesystem watching (nothing on disk is touched if this fails)
    /// 2. create the state directories
    /// 3. move jobs stranded in `active` to `failed`
    /// 4. watch `queue/in` and start dispatching
    ///
    /// # Errors
    /// - AppError::DependencyUnavailable if filesystem watching cannot be initialized
    /// - AppError::Environment if the layout cannot be created or recovered
    /// - AppError::Watcher if watching fails while running
    pub async fn run(self, shutdown: ShutdownToken) -> Result<RunSummary> {
        let Daemon {
            settings,
            watcher_factory,
            processor,
            time_provider,
        } = self;

        let (mut watcher, events) = watcher_factory()?;

        let layout = settings.layout();
        info!(root = %layout.root().display(), "Opening queue");
        let store: Arc<dyn StateStore> = Arc::new(DirectoryStateStore::new(
            layout.clone(),
            settings.on_collision,
        ));
        store.ensure_layout().await?;

        RecoveryService::new(Arc::clone(&store))
            .sweep_active()
            .await?;

        let processor = match processor {
            Some(processor) => processor,
            None => {
                let subprocess =
                    SubprocessProcessor::new(&settings.processor, Arc::clone(&time_provider))
                        .with_working_dir(&settings.processor_workdir);
                // Not fatal: the processor may be installed while the engine runs
                if let Err(reason) = subprocess.preflight() {
                    warn!(
                        "job processor is not usable yet, jobs will fail until it is: {}",
                        reason
                    );
                }
                Arc::new(subprocess)
            }
        };

        watcher.watch(&layout.dir(JobState::Queued))?;
        info!("running...");

        let runner = JobRunner::new(store, processor, time_provider);
        let result = runner.run(events, shutdown).await;

        if let Err(e) = watcher.unwatch() {
            warn!(error = %e, "Failed to stop watching cleanly");
        }
        result
    }
}

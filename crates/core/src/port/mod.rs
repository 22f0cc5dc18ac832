// Port Layer - Interfaces for external dependencies

pub mod job_processor;
pub mod job_watcher;
pub mod state_store;
pub mod time_provider;

// Re-exports
pub use job_processor::{JobProcessor, ProcessorError, ProcessorRun};
pub use job_watcher::{watch_channel, JobWatcher, WatchEvent, WatchEventReceiver, WatchEventSender};
pub use state_store::StateStore;
pub use time_provider::TimeProvider;

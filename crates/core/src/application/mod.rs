// Application Layer - Use Cases and Business Logic

pub mod recovery;
pub mod runner;

// Re-exports
pub use recovery::RecoveryService;
pub use runner::{shutdown_channel, JobRunner, RunSummary, ShutdownSender, ShutdownToken};

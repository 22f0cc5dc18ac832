// Domain Layer - Pure business logic and entities

pub mod error;
pub mod job;
pub mod queue;

// Re-exports
pub use error::DomainError;
pub use job::{JobId, JobReport, JobState};
pub use queue::{CollisionPolicy, QueueLayout};

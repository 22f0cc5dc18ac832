// Job Processor Port
// Abstraction over the external program that performs a job's side effects.

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// A processor run that exited with status 0
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorRun {
    pub duration_ms: i64,
}

/// Ways a processor invocation can fail. Every variant sends the job to `Failed`.
#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("failed to launch job processor '{program}': {reason}")]
    LaunchFailed { program: String, reason: String },

    #[error("job processor returned non-zero exit status {0}")]
    NonZeroExit(i32),

    #[error("job processor was terminated by signal {0}")]
    Terminated(String),

    #[error("IO error while waiting for job processor: {0}")]
    Io(String),

    #[error("job processor invocation panicked: {0}")]
    Panicked(String),
}

/// Job Processor trait
///
/// Implementations:
/// - SubprocessProcessor: runs `<program> <job-path>` as a child process
/// - MockJobProcessor: test double (see `mocks`)
#[async_trait]
pub trait JobProcessor: Send + Sync {
    /// Run the processor against the job file at `job_path` and wait for it.
    ///
    /// No timeout is applied; a processor that never exits blocks the caller
    /// indefinitely.
    ///
    /// # Errors
    /// - ProcessorError::LaunchFailed if the program cannot be started
    /// - ProcessorError::NonZeroExit / Terminated if it did not exit with 0
    async fn process(&self, job_path: &Path) -> Result<ProcessorRun, ProcessorError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    /// Mock processor behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Exit with status 0
        Success,
        /// Exit with the given non-zero status
        Exit(i32),
        /// Fail to launch
        LaunchFail(String),
        /// Panic inside the invocation
        Panic(String),
    }

    #[derive(Default)]
    struct Tracker {
        calls: Vec<PathBuf>,
        in_flight: usize,
        max_in_flight: usize,
        windows: Vec<(Instant, Instant)>,
    }

    /// Mock Job Processor for testing
    pub struct MockJobProcessor {
        behavior: Arc<Mutex<MockBehavior>>,
        delay: Duration,
        tracker: Arc<Mutex<Tracker>>,
    }

    impl MockJobProcessor {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior: Arc::new(Mutex::new(behavior)),
                delay: Duration::ZERO,
                tracker: Arc::new(Mutex::new(Tracker::default())),
            }
        }
        pub fn new_success() -> Self {
            Self::new(MockBehavior::Success)
        }
        pub fn new_exit(code: i32) -> Self {
            Self::new(MockBehavior::Exit(code))
        }
        /// Hold every invocation open for `delay` before resolving
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
        pub fn set_behavior(&self, behavior: MockBehavior) {
            *self.behavior.lock().unwrap() = behavior;
        }
        pub fn call_count(&self) -> usize {
            self.tracker.lock().unwrap().calls.len()
        }
        pub fn calls(&self) -> Vec<PathBuf> {
            self.tracker.lock().unwrap().calls.clone()
        }
        /// Highest number of invocations observed running at the same time
        pub fn max_in_flight(&self) -> usize {
            self.tracker.lock().unwrap().max_in_flight
        }
        /// (start, end) of every completed invocation, in completion order
        pub fn windows(&self) -> Vec<(Instant, Instant)> {
            self.tracker.lock().unwrap().windows.clone()
        }
    }

    #[async_trait]
    impl JobProcessor for MockJobProcessor {
        async fn process(&self, job_path: &Path) -> Result<ProcessorRun, ProcessorError> {
            let started = Instant::now();
            {
                let mut tracker = self.tracker.lock().unwrap();
                tracker.calls.push(job_path.to_path_buf());
                tracker.in_flight += 1;
                tracker.max_in_flight = tracker.max_in_flight.max(tracker.in_flight);
            }

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            {
                let mut tracker = self.tracker.lock().unwrap();
                tracker.in_flight -= 1;
                tracker.windows.push((started, Instant::now()));
            }

            let behavior = self.behavior.lock().unwrap().clone();
            match behavior {
                MockBehavior::Success => Ok(ProcessorRun {
                    duration_ms: self.delay.as_millis() as i64,
                }),
                MockBehavior::Exit(code) => Err(ProcessorError::NonZeroExit(code)),
                MockBehavior::LaunchFail(reason) => Err(ProcessorError::LaunchFailed {
                    program: "mock_processor".to_string(),
                    reason,
                }),
                MockBehavior::Panic(msg) => {
                    panic!("{}", msg); // Actually panic for panic isolation testing
                }
            }
        }
    }
}

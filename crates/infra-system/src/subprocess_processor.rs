// Subprocess job processor
// reason: tokio for async process management; nix to name terminating signals
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use tokio::process::Command;
use tracing::info;

use dirqueue_core::port::job_processor::{JobProcessor, ProcessorError, ProcessorRun};
use dirqueue_core::port::TimeProvider;

/// Runs `<program> <job-path>` once per job
///
/// stdout/stderr are inherited so processor output lands in the daemon's own
/// streams; only the exit status is interpreted. There is no timeout.
///
/// On Unix the child gets its own process group, so a terminal interrupt
/// stops the daemon between jobs without also killing the in-flight job.
pub struct SubprocessProcessor {
    program: PathBuf,
    working_dir: Option<PathBuf>,
    time_provider: Arc<dyn TimeProvider>,
}

impl SubprocessProcessor {
    /// Create a processor invoking `program`
    ///
    /// # Example
    /// ```ignore
    /// let processor = SubprocessProcessor::new(
    ///     "/srv/dirqueue/bin/job_processor",
    ///     Arc::new(SystemTimeProvider),
    /// )
    /// .with_working_dir("/srv/dirqueue/bin");
    /// ```
    pub fn new(program: impl Into<PathBuf>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            program: program.into(),
            working_dir: None,
            time_provider,
        }
    }

    /// Run the processor from `dir` instead of the daemon's working directory
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Check that the program exists and is executable
    ///
    /// Bare program names are resolved through `PATH` at launch time and are
    /// not checked here.
    pub fn preflight(&self) -> Result<(), String> {
        if self.program.components().count() < 2 {
            return Ok(());
        }

        let metadata = std::fs::metadata(&self.program)
            .map_err(|e| format!("{}: {}", self.program.display(), e))?;
        if !metadata.is_file() {
            return Err(format!("{} is not a regular file", self.program.display()));
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if metadata.permissions().mode() & 0o111 == 0 {
                return Err(format!("{} is not executable", self.program.display()));
            }
        }

        Ok(())
    }

    /// Map a finished child's exit status onto the processor contract
    fn interpret(status: ExitStatus) -> Result<(), ProcessorError> {
        if status.success() {
            return Ok(());
        }
        if let Some(code) = status.code() {
            return Err(ProcessorError::NonZeroExit(code));
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                let name = nix::sys::signal::Signal::try_from(signal)
                    .map(|s| s.as_str().to_string())
                    .unwrap_or_else(|_| format!("signal {}", signal));
                return Err(ProcessorError::Terminated(name));
            }
        }

        Err(ProcessorError::Terminated(status.to_string()))
    }
}

#[async_trait]
impl JobProcessor for SubprocessProcessor {
    async fn process(&self, job_path: &Path) -> Result<ProcessorRun, ProcessorError> {
        let start_time = self.time_provider.now_millis();

        let mut command = Command::new(&self.program);
        command
            .arg(job_path)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|e| ProcessorError::LaunchFailed {
            program: self.program.display().to_string(),
            reason: e.to_string(),
        })?;

        info!(
            program = %self.program.display(),
            job_path = %job_path.display(),
            pid = ?child.id(),
            "Job processor started"
        );

        let status = child
            .wait()
            .await
            .map_err(|e| ProcessorError::Io(e.to_string()))?;

        let duration_ms = self.time_provider.now_millis() - start_time;
        info!(
            program = %self.program.display(),
            duration_ms = %duration_ms,
            exit_code = ?status.code(),
            "Job processor finished"
        );

        Self::interpret(status)?;
        Ok(ProcessorRun { duration_ms })
    }
}

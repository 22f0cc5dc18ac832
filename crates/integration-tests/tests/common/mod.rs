//! Shared harness: a daemon over a temporary queue root, with `/bin/sh` as
//! the job processor (each job file is the shell script it runs) and the text
//! log layers captured into one buffer.

#![allow(dead_code)]

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::layer::SubscriberExt;

use dirqueue_core::application::{shutdown_channel, RunSummary, ShutdownSender};
use dirqueue_core::error::Result;
use dirqueue_daemon::logging::text_layers;
use dirqueue_daemon::{Daemon, Settings};

/// Both log streams, interleaved in emission order
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Route this thread's events through the text layers into the buffer
    pub fn install(&self) -> DefaultGuard {
        let out = self.clone();
        let err = self.clone();
        let subscriber = tracing_subscriber::registry()
            .with(text_layers(move || out.clone(), move || err.clone()));
        tracing::subscriber::set_default(subscriber)
    }

    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock().unwrap())
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn contains(&self, line: &str) -> bool {
        self.lines().iter().any(|l| l == line)
    }

    /// Index of the first line starting with `prefix`
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.lines().iter().position(|l| l.starts_with(prefix))
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("condition not met within 10s");
}

pub fn settings_for(root: &Path) -> Settings {
    let mut settings = Settings::for_root(root);
    settings.processor = PathBuf::from("/bin/sh");
    settings.processor_workdir = root.to_path_buf();
    settings
}

/// A running daemon over a temporary root
pub struct RunningQueue {
    pub root: TempDir,
    pub logs: LogCapture,
    shutdown_tx: ShutdownSender,
    handle: JoinHandle<Result<RunSummary>>,
    _log_guard: DefaultGuard,
}

impl RunningQueue {
    pub async fn start() -> Self {
        Self::start_in(tempfile::tempdir().unwrap()).await
    }

    /// Start over an existing root and wait until new files are being watched
    pub async fn start_in(root: TempDir) -> Self {
        let logs = LogCapture::default();
        let log_guard = logs.install();

        let (shutdown_tx, shutdown) = shutdown_channel();
        let handle = tokio::spawn(Daemon::new(settings_for(root.path())).run(shutdown));
        wait_until(|| logs.contains("Log: running...")).await;

        Self {
            root,
            logs,
            shutdown_tx,
            handle,
            _log_guard: log_guard,
        }
    }

    pub fn state_dir(&self, state: &str) -> PathBuf {
        self.root.path().join("queue").join(state)
    }

    /// Drop a complete job file into `queue/in`.
    ///
    /// The file is written outside the queue and hard-linked in, so the
    /// creation event never races with its contents.
    pub fn submit(&self, name: &str, script: &str) {
        let staged = self.root.path().join(format!("staged-{}", name));
        fs::write(&staged, script).unwrap();
        fs::hard_link(&staged, self.state_dir("in").join(name)).unwrap();
        fs::remove_file(&staged).unwrap();
    }

    /// Move a job back into `queue/in`, as an operator requeueing it would
    pub fn requeue(&self, from_state: &str, name: &str) {
        fs::rename(
            self.state_dir(from_state).join(name),
            self.state_dir("in").join(name),
        )
        .unwrap();
    }

    pub fn files_in(&self, state: &str) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.state_dir(state))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    pub async fn wait_for_file(&self, state: &str, name: &str) {
        let path = self.state_dir(state).join(name);
        wait_until(|| path.exists()).await;
    }

    /// Request shutdown and wait for the daemon to stop
    pub async fn stop(self) -> (RunSummary, TempDir) {
        self.shutdown_tx.shutdown();
        let summary = self
            .handle
            .await
            .expect("daemon task panicked")
            .expect("daemon failed");
        (summary, self.root)
    }
}

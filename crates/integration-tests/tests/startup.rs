//! Startup behaviour: layout creation, crash recovery and the missing
//! filesystem-notification dependency.

mod common;

use std::fs;

use common::RunningQueue;
use dirqueue_core::application::shutdown_channel;
use dirqueue_core::domain::{CollisionPolicy, JobState, QueueLayout};
use dirqueue_core::error::{AppError, Result};
use dirqueue_core::port::{JobWatcher, StateStore, WatchEventReceiver};
use dirqueue_daemon::{remediation_hint, Daemon, ExitStatus};
use dirqueue_infra_fs::DirectoryStateStore;

#[tokio::test]
async fn test_layout_setup_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let store = DirectoryStateStore::new(QueueLayout::new(tmp.path()), CollisionPolicy::default());

    store.ensure_layout().await.unwrap();
    fs::write(tmp.path().join("queue/done/kept"), b"").unwrap();
    store.ensure_layout().await.unwrap();

    for state in JobState::ALL {
        assert!(store.layout().dir(state).is_dir());
    }
    assert!(tmp.path().join("queue/done/kept").exists());
}

#[tokio::test]
async fn test_restart_over_existing_queue() {
    let queue = RunningQueue::start().await;
    queue.submit("first", "exit 0\n");
    queue.wait_for_file("done", "first").await;
    let (_, root) = queue.stop().await;

    let queue = RunningQueue::start_in(root).await;
    queue.submit("second", "exit 0\n");
    queue.wait_for_file("done", "second").await;

    assert_eq!(queue.files_in("done"), vec!["first", "second"]);
    queue.stop().await;
}

/// Every job left in `active` by a previous run is failed before new work
/// is accepted.
#[tokio::test]
async fn test_recovery_sweep_moves_all_active_jobs_to_failed() {
    let root = tempfile::tempdir().unwrap();
    let active = root.path().join("queue/active");
    fs::create_dir_all(&active).unwrap();
    let stranded = ["r1", "r2", "r3", "r4"];
    for name in stranded {
        fs::write(active.join(name), b"exit 0\n").unwrap();
    }

    let queue = RunningQueue::start_in(root).await;

    assert!(queue.files_in("active").is_empty());
    assert_eq!(queue.files_in("failed"), stranded);
    for name in stranded {
        let line = format!("Log: moving job to failed: {}", name);
        let recovered = queue.logs.position(&line).expect("missing recovery line");
        let running = queue.logs.position("Log: running...").unwrap();
        assert!(recovered < running, "{} not recovered before start", name);
    }

    let (summary, _root) = queue.stop().await;
    assert_eq!(summary.failed, 0, "recovered jobs are not counted as run");
}

/// Files already waiting in `queue/in` at startup are not dispatched; only
/// arrivals after the watch is live are.
#[tokio::test]
async fn test_preexisting_incoming_files_are_left_alone() {
    let root = tempfile::tempdir().unwrap();
    let incoming = root.path().join("queue/in");
    fs::create_dir_all(&incoming).unwrap();
    fs::write(incoming.join("old"), b"exit 0\n").unwrap();

    let queue = RunningQueue::start_in(root).await;
    queue.submit("new", "exit 0\n");
    queue.wait_for_file("done", "new").await;

    assert_eq!(queue.files_in("in"), vec!["old"]);
    assert_eq!(queue.files_in("done"), vec!["new"]);
    queue.stop().await;
}

#[tokio::test]
async fn test_missing_watch_dependency_exits_with_dedicated_status() {
    let root = tempfile::tempdir().unwrap();
    let incoming = root.path().join("queue/in");
    let active = root.path().join("queue/active");
    fs::create_dir_all(&incoming).unwrap();
    fs::create_dir_all(&active).unwrap();
    fs::write(incoming.join("waiting"), b"exit 0\n").unwrap();
    fs::write(active.join("stranded"), b"exit 0\n").unwrap();

    let unavailable = || -> Result<(Box<dyn JobWatcher>, WatchEventReceiver)> {
        Err(AppError::DependencyUnavailable(
            "cannot initialize filesystem event watching: inotify limit reached".to_string(),
        ))
    };
    let daemon = Daemon::new(common::settings_for(root.path()))
        .with_watcher_factory(Box::new(unavailable));
    let (_shutdown_tx, shutdown) = shutdown_channel();

    let err = daemon.run(shutdown).await.unwrap_err();

    assert_eq!(ExitStatus::from_error(&err), ExitStatus::WatcherUnavailable);
    assert_eq!(ExitStatus::from_error(&err).code(), 2);
    assert!(remediation_hint(&err).is_some());
    assert!(incoming.join("waiting").exists(), "queued job was touched");
    assert!(active.join("stranded").exists(), "recovery ran before the dependency check");
    assert!(!root.path().join("queue/failed").exists());
}

/// A job whose processor cannot be launched is failed and the engine keeps
/// serving later jobs.
#[tokio::test]
async fn test_unlaunchable_processor_fails_jobs_without_stopping() {
    let root = tempfile::tempdir().unwrap();
    let mut settings = common::settings_for(root.path());
    settings.processor = root.path().join("bin/missing_processor");

    let logs = common::LogCapture::default();
    let _guard = logs.install();
    let (shutdown_tx, shutdown) = shutdown_channel();
    let handle = tokio::spawn(Daemon::new(settings).run(shutdown));
    common::wait_until(|| logs.contains("Log: running...")).await;
    assert!(logs.position("Warning: job processor is not usable yet").is_some());

    let incoming = root.path().join("queue/in");
    for name in ["x1", "x2"] {
        fs::write(root.path().join(name), b"").unwrap();
        fs::hard_link(root.path().join(name), incoming.join(name)).unwrap();
    }
    let failed = root.path().join("queue/failed");
    common::wait_until(|| failed.join("x1").exists() && failed.join("x2").exists()).await;

    shutdown_tx.shutdown();
    let summary = handle.await.unwrap().unwrap();
    assert_eq!(summary.failed, 2);
    assert!(logs.position("Error: job processor failed for x1: failed to launch").is_some());
}

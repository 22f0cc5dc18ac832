//! dirqueue - Main Entry Point
//!
//! Watches `<root>/queue/in` and runs the job processor on each new file, one
//! at a time, until interrupted.

use std::process::ExitCode;
use tracing::{error, info, warn};

use dirqueue_core::application::{shutdown_channel, ShutdownSender};
use dirqueue_daemon::{logging, remediation_hint, Daemon, ExitStatus, Settings};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> ExitCode {
    // 1. Load configuration (logging is not up yet)
    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitStatus::UnknownError.into();
        }
    };

    // 2. Initialize logging
    if let Err(e) = logging::init(settings.log_format) {
        eprintln!("Error: failed to initialize logging: {:#}", e);
        return ExitStatus::UnknownError.into();
    }

    info!(
        version = VERSION,
        root = %settings.root.display(),
        processor = %settings.processor.display(),
        "dirqueue starting"
    );

    // 3. Stop on Ctrl+C (and SIGTERM)
    let (shutdown_tx, shutdown) = shutdown_channel();
    tokio::spawn(stop_on_signal(shutdown_tx));

    // 4. Run until shutdown or a fatal error
    match Daemon::new(settings).run(shutdown).await {
        Ok(summary) => {
            info!(
                done = summary.done,
                failed = summary.failed,
                unresolved = summary.unresolved,
                "Shutdown complete"
            );
            ExitStatus::Success.into()
        }
        Err(e) => {
            error!("{}", e);
            if let Some(hint) = remediation_hint(&e) {
                eprintln!("Hint: {}", hint);
            }
            ExitStatus::from_error(&e).into()
        }
    }
}

async fn stop_on_signal(shutdown_tx: ShutdownSender) {
    #[cfg(unix)]
    let mut sigterm = {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(sigterm) => Some(sigterm),
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGTERM");
                None
            }
        }
    };

    loop {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Cannot listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match sigterm.as_mut() {
                Some(sigterm) => {
                    if sigterm.recv().await.is_none() {
                        std::future::pending::<()>().await;
                    }
                }
                None => std::future::pending::<()>().await,
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {}
            _ = terminate => {}
        }

        if shutdown_tx.shutdown() {
            info!("stopping...");
        } else {
            warn!("already stopping, waiting for the current job to finish");
        }
    }
}

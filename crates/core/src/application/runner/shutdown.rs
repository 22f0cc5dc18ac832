// Stop requests for the job runner
//
// The runner only looks at the token between jobs, so a request never
// interrupts a job that is already in flight.

use tokio::sync::watch;

/// Runner side: observes whether a stop was requested
#[derive(Debug, Clone)]
pub struct ShutdownToken {
    requested: watch::Receiver<bool>,
}

impl ShutdownToken {
    pub fn is_shutdown(&self) -> bool {
        *self.requested.borrow()
    }

    /// Resolve once a stop is requested or every sender is gone
    pub async fn wait(&mut self) {
        let _ = self.requested.wait_for(|stop| *stop).await;
    }
}

/// Entry-point side: requests the stop
#[derive(Debug)]
pub struct ShutdownSender {
    requested: watch::Sender<bool>,
}

impl ShutdownSender {
    /// Request a stop. Returns `false` if one was already requested.
    pub fn shutdown(&self) -> bool {
        self.requested.send_if_modified(|stop| !std::mem::replace(stop, true))
    }
}

pub fn shutdown_channel() -> (ShutdownSender, ShutdownToken) {
    let (requested_tx, requested_rx) = watch::channel(false);
    (
        ShutdownSender {
            requested: requested_tx,
        },
        ShutdownToken {
            requested: requested_rx,
        },
    )
}

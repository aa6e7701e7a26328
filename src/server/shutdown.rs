//! Graceful shutdown for the upgrade operator
//!
//! A signal only raises the shutdown flag. The upgrade loop checks it
//! between passes, so a pass in flight still writes both the spec and the
//! status of the instance it is working on.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Receiving side, cloned into every component that must stop
#[derive(Clone)]
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Resolve once shutdown is raised or every controller is gone
    pub async fn wait(&mut self) {
        // Err means the senders were dropped, which also ends the process
        let _ = self.receiver.wait_for(|stopping| *stopping).await;
    }

    pub fn is_shutdown(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Sleep for `duration` unless shutdown comes first
    ///
    /// Returns true when woken by shutdown.
    pub async fn sleep_or_shutdown(&mut self, duration: Duration) -> bool {
        if self.is_shutdown() {
            return true;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => false,
            _ = self.wait() => true,
        }
    }
}

/// Sending side, shared by `main` and the signal listener
#[derive(Clone)]
pub struct ShutdownController {
    sender: Arc<watch::Sender<bool>>,
}

impl ShutdownController {
    pub fn shutdown(&self) {
        // send_replace succeeds even when no receiver is left
        if !self.sender.send_replace(true) {
            info!("Shutdown requested");
        }
    }
}

/// Create a connected (controller, signal) pair
pub fn shutdown_channel() -> (ShutdownController, ShutdownSignal) {
    let (sender, receiver) = watch::channel(false);
    (
        ShutdownController {
            sender: Arc::new(sender),
        },
        ShutdownSignal { receiver },
    )
}

/// Raise shutdown on the first SIGTERM/SIGINT
///
/// If no handler can be installed the operator keeps running and can only
/// be stopped by SIGKILL; the failure is logged.
pub fn shutdown_on_signal(controller: ShutdownController) -> JoinHandle<()> {
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(signal) => {
                info!(signal = signal, "Initiating graceful shutdown");
                controller.shutdown();
            }
            Err(e) => error!(error = %e, "Cannot listen for shutdown signals"),
        }
    })
}

/// Wait for SIGTERM or SIGINT and return its name
#[cfg(unix)]
pub async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;

    Ok(tokio::select! {
        _ = terminate.recv() => "SIGTERM",
        _ = interrupt.recv() => "SIGINT",
    })
}

/// Wait for Ctrl+C
#[cfg(not(unix))]
pub async fn wait_for_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("CTRL_C")
}

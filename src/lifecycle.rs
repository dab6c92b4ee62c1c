//! Process lifecycle.
//!
//! Two ways out of the process:
//! - Graceful: a termination signal flips the [`ShutdownHandle`], the server
//!   stops accepting and drains in-flight requests, and `main` returns 0.
//! - Immediate: a handler tags its response with [`ExitAfterResponse`]; the
//!   connection arms its [`ExitLatch`] and, once the response has been written
//!   and the connection closed, calls the [`Terminator`].

use std::sync::{Arc, OnceLock};
use tokio::sync::watch;
use tracing::{error, info};

/// Exit status used by the process-exit endpoint.
pub const EXIT_STATUS: i32 = 1;

/// Cloneable handle used to request a graceful shutdown.
#[derive(Clone, Debug)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        ShutdownHandle { tx: Arc::new(tx) }
    }

    /// Request shutdown. Idempotent.
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once shutdown has been requested.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|requested| *requested).await;
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for SIGINT or SIGTERM and request shutdown through `handle`.
///
/// Returns early without signalling if shutdown was already requested
/// elsewhere.
pub async fn watch_signals(handle: &ShutdownHandle) {
    if handle.is_shutdown() {
        return;
    }

    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = handle.wait() => return,
    }

    info!("Received termination signal, shutting down");
    handle.shutdown();
}

/// Ends the process with a status code.
pub trait Terminator: Send + Sync + 'static {
    fn terminate(&self, status: i32);
}

/// Production terminator: exits immediately, skipping graceful shutdown.
pub struct ProcessExit;

impl Terminator for ProcessExit {
    fn terminate(&self, status: i32) {
        std::process::exit(status);
    }
}

/// Response extension asking the server to terminate once the response
/// carrying it has been flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitAfterResponse {
    pub status: i32,
}

/// Per-connection record of a pending termination.
#[derive(Clone, Debug, Default)]
pub struct ExitLatch {
    status: Arc<OnceLock<i32>>,
}

impl ExitLatch {
    /// Arm the latch. The first status wins.
    pub fn arm(&self, status: i32) {
        let _ = self.status.set(status);
    }

    pub fn armed(&self) -> Option<i32> {
        self.status.get().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_shutdown_wakes_waiters() {
        let handle = ShutdownHandle::new();
        assert!(!handle.is_shutdown());

        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.wait().await })
        };

        handle.shutdown();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(handle.is_shutdown());

        // Waiting after the fact returns immediately
        handle.wait().await;
    }

    #[tokio::test]
    async fn test_watch_signals_returns_on_prior_shutdown() {
        let handle = ShutdownHandle::new();
        handle.shutdown();
        tokio::time::timeout(Duration::from_secs(1), watch_signals(&handle))
            .await
            .unwrap();
    }

    #[test]
    fn test_exit_latch_first_status_wins() {
        let latch = ExitLatch::default();
        assert_eq!(latch.armed(), None);

        latch.clone().arm(EXIT_STATUS);
        latch.arm(7);
        assert_eq!(latch.armed(), Some(EXIT_STATUS));
    }
}

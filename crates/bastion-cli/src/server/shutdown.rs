//! Graceful shutdown signal handling.

use std::sync::Arc;
use std::time::Duration;

use tokio::signal::ctrl_c;
#[cfg(unix)]
use tokio::signal::unix;
use tokio::sync::Notify;

use crate::TRACING_TARGET_SERVER_SHUTDOWN;

/// Waits for SIGTERM or SIGINT (Ctrl+C).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            tracing::error!(
                target: TRACING_TARGET_SERVER_SHUTDOWN,
                error = %e,
                "failed to install Ctrl+C handler"
            );
            std::future::pending::<()>().await;
        } else {
            tracing::info!(
                target: TRACING_TARGET_SERVER_SHUTDOWN,
                "received Ctrl+C signal, initiating graceful shutdown"
            );
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match unix::signal(unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
                tracing::info!(
                    target: TRACING_TARGET_SERVER_SHUTDOWN,
                    "received SIGTERM signal, initiating graceful shutdown"
                );
            }
            Err(e) => {
                tracing::error!(
                    target: TRACING_TARGET_SERVER_SHUTDOWN,
                    error = %e,
                    "failed to install SIGTERM handler"
                );
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

/// Shutdown coordination between the signal handler and the drain deadline.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    started: Arc<Notify>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves once `signal` fires, and records that draining began.
    pub async fn watch<F>(self, signal: F)
    where
        F: Future<Output = ()>,
    {
        signal.await;
        self.started.notify_one();
    }

    /// Resolves `timeout` after draining began.
    pub async fn deadline(&self, timeout: Duration) {
        self.started.notified().await;
        tracing::info!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            timeout_secs = timeout.as_secs(),
            "draining in-flight requests"
        );
        tokio::time::sleep(timeout).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn deadline_starts_when_signal_fires() {
        let handle = ShutdownHandle::new();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let watcher = tokio::spawn(handle.clone().watch(async move {
            let _ = rx.await;
        }));

        let deadline = handle.deadline(Duration::from_secs(5));
        tokio::pin!(deadline);

        tokio::select! {
            () = &mut deadline => panic!("deadline elapsed before any signal"),
            () = tokio::time::sleep(Duration::from_secs(60)) => {},
        }

        let _ = tx.send(());
        let _ = watcher.await;

        let started = tokio::time::Instant::now();
        deadline.await;
        assert!(started.elapsed() >= Duration::from_secs(5));
    }
}

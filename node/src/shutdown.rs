//! Graceful shutdown fan-out.
//!
//! One broadcast channel; the gateway task, the webhook server and the
//! sweeper each hold a receiver and stop when it fires.

use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};

pub struct ShutdownController {
    tx: broadcast::Sender<()>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger shutdown programmatically.
    pub fn shutdown(&self) {
        let _ = self.tx.send(());
    }

    /// Resolves once shutdown has been triggered, for `with_graceful_shutdown`.
    pub fn signalled(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let mut rx = self.subscribe();
        async move {
            let _ = rx.recv().await;
        }
    }

    /// Wait for SIGTERM or SIGINT, then trigger shutdown. Also returns if
    /// shutdown was triggered some other way (e.g. a fatal gateway error).
    pub async fn wait_for_signal(&self) {
        let mut triggered = self.subscribe();

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(e) => {
                    warn!("SIGTERM handler unavailable: {e}");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = signal::ctrl_c() => info!("received SIGINT, shutting down"),
            _ = terminate => info!("received SIGTERM, shutting down"),
            _ = triggered.recv() => return,
        }

        self.shutdown();
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn programmatic_shutdown_notifies_subscribers() {
        let controller = ShutdownController::new();
        let mut rx1 = controller.subscribe();
        let mut rx2 = controller.subscribe();
        controller.shutdown();
        assert!(rx1.recv().await.is_ok());
        assert!(rx2.recv().await.is_ok());
    }

    #[tokio::test]
    async fn signalled_future_resolves_after_shutdown() {
        let controller = ShutdownController::new();
        let done = controller.signalled();
        controller.shutdown();
        tokio::time::timeout(std::time::Duration::from_secs(1), done)
            .await
            .expect("future should resolve");
    }

    #[tokio::test]
    async fn wait_returns_when_triggered_elsewhere() {
        let controller = std::sync::Arc::new(ShutdownController::new());
        let waiter = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.wait_for_signal().await })
        };
        tokio::task::yield_now().await;
        controller.shutdown();
        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("wait should return")
            .unwrap();
    }
}

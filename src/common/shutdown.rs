//! Graceful shutdown signal shared by the worker pools

use log::warn;
use tokio::sync::watch;

/// Cloneable handle that resolves once an interruption was requested
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    /// Create a handle together with the sender that triggers it
    pub fn channel() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self { rx })
    }

    /// Handle that never fires
    pub fn never() -> Self {
        Self::channel().1
    }

    /// Trigger on the first Ctrl-C. Must be called from within a tokio runtime.
    pub fn on_ctrl_c() -> Self {
        let (tx, shutdown) = Self::channel();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, flushing accumulated results...");
                let _ = tx.send(true);
            }
        });
        shutdown
    }

    /// Wait until shutdown is requested. Pends forever if the sender is gone without firing.
    pub async fn requested(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

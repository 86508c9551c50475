//! Shutdown signalling for the proxy's long-running tasks.

use tokio::sync::broadcast;

/// Fans a single shutdown signal out to everything that must wind down
/// together: the proxy server, the internal metrics server, and the
/// backpressure health-probe loop.
///
/// Whoever owns the `Shutdown` decides when that happens — Ctrl+C in
/// `main`, explicit teardown in the integration tests. Tasks only ever see
/// a [`ShutdownListener`], so nothing but the owner can trigger it.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        // Capacity 1 is enough: the signal fires once and listeners only
        // care that it fired.
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Hand out a listener for a task that must stop with the process.
    /// Subscribe before spawning the task; a listener created after
    /// `trigger` never sees the signal.
    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }

    /// Begin shutdown. Idempotent; a no-op when nothing is listening.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Tie the signal to Ctrl+C. This spawns the waiter, so it needs a
    /// running runtime — call it from `main`, not from constructors.
    pub fn trigger_on_ctrl_c(&self) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown signal received");
                let _ = tx.send(());
            }
        });
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// A task's view of the shutdown signal.
pub struct ShutdownListener {
    rx: broadcast::Receiver<()>,
}

impl ShutdownListener {
    /// Resolves once shutdown begins. A dropped `Shutdown` counts too, so
    /// a task can never miss the signal and keep running.
    pub async fn recv(&mut self) {
        let _ = self.rx.recv().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_every_listener_sees_the_trigger() {
        let shutdown = Shutdown::new();
        let mut first = shutdown.subscribe();
        let mut second = shutdown.subscribe();

        shutdown.trigger();

        first.recv().await;
        second.recv().await;
    }

    #[tokio::test]
    async fn test_dropped_owner_releases_listeners() {
        let shutdown = Shutdown::new();
        let mut listener = shutdown.subscribe();
        drop(shutdown);

        listener.recv().await;
    }
}

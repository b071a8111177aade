//! Coalescing wake-up channel between the pipeline and the queue manager.
//!
//! A single-slot channel: senders never block, and a send onto a full slot
//! is dropped because the pending token already carries the only
//! information there is ("something changed"). At least one manager tick
//! runs after every sent signal; the tick re-reads authoritative state, so
//! collapsed signals lose nothing.

use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct WakeSender {
    tx: mpsc::Sender<()>,
}

impl WakeSender {
    /// Signal the queue manager. Never blocks.
    pub fn wake(&self) {
        let _ = self.tx.try_send(());
    }
}

#[derive(Debug)]
pub struct WakeReceiver {
    rx: mpsc::Receiver<()>,
}

impl WakeReceiver {
    /// Wait for the next wake-up token. `None` once all senders are gone.
    pub async fn recv(&mut self) -> Option<()> {
        self.rx.recv().await
    }

    /// Non-blocking poll: whether a token is waiting right now.
    pub fn try_recv(&mut self) -> bool {
        self.rx.try_recv().is_ok()
    }
}

pub fn wake_channel() -> (WakeSender, WakeReceiver) {
    let (tx, rx) = mpsc::channel(1);
    (WakeSender { tx }, WakeReceiver { rx })
}

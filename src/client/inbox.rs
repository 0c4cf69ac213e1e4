//! Bounded event queue for loop-driven consumers
//!
//! The read loop offers every incoming message without waiting. When the
//! queue is full the message is dropped, so a consumer that never drains
//! it degrades to losing messages rather than stalling the connection.

use crate::message::Message;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

/// Consumer handle for the event queue. Cloning shares the same queue.
#[derive(Clone)]
pub struct Inbox {
    rx: Arc<Mutex<mpsc::Receiver<Message>>>,
    shutdown: CancellationToken,
}

/// Producer side, owned by the client.
pub(crate) struct InboxSender {
    tx: mpsc::Sender<Message>,
}

/// `capacity` must be non-zero.
pub(crate) fn channel(capacity: usize, shutdown: CancellationToken) -> (InboxSender, Inbox) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        InboxSender { tx },
        Inbox {
            rx: Arc::new(Mutex::new(rx)),
            shutdown,
        },
    )
}

impl InboxSender {
    /// Try to enqueue without waiting. Returns the message back if the
    /// queue is full.
    pub fn offer(&self, msg: Message) -> Result<(), Message> {
        self.tx.try_send(msg).map_err(|e| e.into_inner())
    }
}

impl Inbox {
    /// Wait for the next message.
    ///
    /// After the client is closed, whatever is still queued is handed out
    /// and then `None` is returned.
    pub async fn recv(&self) -> Option<Message> {
        let mut rx = self.rx.lock().await;
        tokio::select! {
            biased;
            msg = rx.recv() => msg,
            _ = self.shutdown.cancelled() => rx.try_recv().ok(),
        }
    }

    /// Take a message if one is ready. Never waits.
    pub fn try_recv(&self) -> Option<Message> {
        let mut rx = self.rx.try_lock().ok()?;
        rx.try_recv().ok()
    }
}

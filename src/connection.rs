//! Connection manager
//!
//! Keeps at most one live connection. The writer half lives in a
//! [`ConnectionCell`] shared by senders, the read loop and shutdown; the
//! reader half is handed to whoever dialed (the read loop).
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> (read failure) -> Disconnected -> ...
//!                                                  any state -> Closed
//! ```

use crate::error::{Error, Result};
use crate::transport::{FrameReader, FrameWriter, Transport, TransportError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Default wait between reconnect attempts
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(3);

/// Default limit for establishing a connection
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(5);

type SharedWriter<W> = Arc<tokio::sync::Mutex<W>>;

/// Single owner of "is there a connection". Load, swap and clear all go
/// through the same lock, which is never held across an await.
pub(crate) struct ConnectionCell<W> {
    slot: Mutex<Option<SharedWriter<W>>>,
}

impl<W> ConnectionCell<W> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    pub fn load(&self) -> Option<SharedWriter<W>> {
        self.slot().clone()
    }

    /// Install a new writer, returning the one it replaced.
    pub fn swap(&self, writer: W) -> Option<SharedWriter<W>> {
        self.slot()
            .replace(Arc::new(tokio::sync::Mutex::new(writer)))
    }

    pub fn clear(&self) -> Option<SharedWriter<W>> {
        self.slot().take()
    }

    pub fn is_present(&self) -> bool {
        self.slot().is_some()
    }

    fn slot(&self) -> MutexGuard<'_, Option<SharedWriter<W>>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub(crate) struct ConnectionManager<T: Transport> {
    transport: T,
    url: String,
    label: String,
    dial_timeout: Duration,
    reconnect_interval: Duration,
    cell: ConnectionCell<T::Writer>,
    shutdown: CancellationToken,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(
        transport: T,
        url: String,
        label: String,
        dial_timeout: Duration,
        reconnect_interval: Duration,
    ) -> Self {
        Self {
            transport,
            url,
            label,
            dial_timeout,
            reconnect_interval,
            cell: ConnectionCell::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_connected(&self) -> bool {
        self.cell.is_present()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Token cancelled once by [`ConnectionManager::shutdown`]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Dial once within the dial timeout and install the new connection.
    ///
    /// Failures are returned as-is; retrying is the caller's decision.
    pub async fn dial(&self) -> Result<T::Reader> {
        let dialed = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return Err(Error::Closed),
            dialed = self.dial_with_timeout() => dialed?,
        };
        let (reader, writer) = dialed;

        // No await from here on: once the writer is installed the reader
        // must reach the caller.
        if let Some(previous) = self.cell.swap(writer) {
            close_detached(previous);
        }

        // Shutdown raced the dial; don't leave a connection behind
        if self.shutdown.is_cancelled() {
            if let Some(writer) = self.cell.clear() {
                close_detached(writer);
            }
            return Err(Error::Closed);
        }

        Ok(reader)
    }

    async fn dial_with_timeout(&self) -> Result<(T::Reader, T::Writer)> {
        let dial = self.transport.dial(&self.url);

        // Zero means no limit
        let dialed = if self.dial_timeout.is_zero() {
            dial.await
        } else {
            tokio::time::timeout(self.dial_timeout, dial)
                .await
                .map_err(|_| Error::DialTimeout {
                    url: self.url.clone(),
                    timeout: self.dial_timeout,
                })?
        };

        dialed.map_err(|source| Error::Dial {
            url: self.url.clone(),
            source,
        })
    }

    /// Read one frame from the live connection.
    ///
    /// On any failure the connection is torn down so the next dial starts
    /// clean. A clean close from the peer is reported as [`Error::Closed`].
    pub async fn read(&self, reader: &mut T::Reader) -> Result<String> {
        match reader.read_frame().await {
            Ok(frame) => Ok(frame),
            Err(TransportError::Closed) => {
                self.cell.clear();
                Err(Error::Closed)
            }
            Err(e) => {
                self.cell.clear();
                Err(Error::Read(e))
            }
        }
    }

    pub async fn write(&self, frame: &str) -> Result<()> {
        let Some(writer) = self.cell.load() else {
            return Err(Error::NotConnected);
        };

        let mut writer = writer.lock().await;
        writer.write_frame(frame).await.map_err(Error::Write)
    }

    /// Retry dialing on a fixed interval until it works.
    ///
    /// Returns `None` when reconnecting is disabled (zero interval) or
    /// shutdown was requested. No backoff, no attempt limit.
    pub async fn reconnect(&self) -> Option<T::Reader> {
        if self.reconnect_interval.is_zero() {
            return None;
        }

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return None,
                _ = tokio::time::sleep(self.reconnect_interval) => {}
            }

            log::info!("[{}] reconnecting to {} ...", self.label, self.url);
            match self.dial().await {
                Ok(reader) => return Some(reader),
                Err(Error::Closed) => return None,
                Err(e) => log::warn!("[{}] reconnect failed: {}", self.label, e),
            }
        }
    }

    /// Signal shutdown and release the connection, if any.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown.cancel();

        let Some(writer) = self.cell.clear() else {
            return Ok(());
        };
        let mut writer = writer.lock().await;
        writer.close().await.map_err(Error::Write)
    }
}

fn close_detached<W: FrameWriter>(writer: SharedWriter<W>) {
    tokio::spawn(async move {
        let _ = writer.lock().await.close().await;
    });
}

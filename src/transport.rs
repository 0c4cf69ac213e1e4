//! Transport layer for concentrator connections
//!
//! A transport moves whole text frames over an ordered, connection-oriented
//! channel. It knows nothing about the message format.
//!
//! The transport layer is organized into:
//! - `websocket`: WebSocket client transport (`ws://`, `wss://`)
//! - `line`: newline-delimited frames over TCP or Unix sockets (`tcp://`, `unix://`)
//!
//! Dialing hands back separate reader and writer halves so the background
//! read loop can wait for the next frame while other tasks keep writing.

use std::future::Future;
use thiserror::Error;

mod line;
mod websocket;

pub use line::{LineReader, LineTransport, LineWriter};
pub use websocket::{WebSocketReader, WebSocketTransport, WebSocketWriter};

/// Transport error types
#[derive(Error, Debug)]
pub enum TransportError {
    /// Peer closed the connection normally (or is going away)
    #[error("connection closed by peer")]
    Closed,
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("WebSocket error: {0}")]
    WebSocket(String),
    /// Connection dropped without a normal close
    #[error("connection lost: {0}")]
    Abnormal(String),
    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),
}

/// Dials connections for a URL.
pub trait Transport: Send + Sync + 'static {
    type Reader: FrameReader;
    type Writer: FrameWriter;

    fn dial(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<(Self::Reader, Self::Writer), TransportError>> + Send;
}

/// Receiving half of a live connection.
pub trait FrameReader: Send + 'static {
    /// Wait for the next whole frame.
    ///
    /// A clean close from the peer must surface as [`TransportError::Closed`].
    fn read_frame(&mut self) -> impl Future<Output = Result<String, TransportError>> + Send;
}

/// Sending half of a live connection.
pub trait FrameWriter: Send + 'static {
    fn write_frame(&mut self, frame: &str)
    -> impl Future<Output = Result<(), TransportError>> + Send;

    fn close(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Transport family implied by a URL scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    WebSocket,
    Tcp,
    Unix,
}

impl Scheme {
    pub fn of(url: &str) -> Result<Self, TransportError> {
        let (scheme, _) = url
            .split_once("://")
            .ok_or_else(|| TransportError::UnsupportedScheme(url.to_string()))?;

        match scheme.to_ascii_lowercase().as_str() {
            "ws" | "wss" => Ok(Scheme::WebSocket),
            "tcp" => Ok(Scheme::Tcp),
            "unix" => Ok(Scheme::Unix),
            _ => Err(TransportError::UnsupportedScheme(url.to_string())),
        }
    }
}

use crate::message::ParseError;
use crate::transport::TransportError;
use std::time::Duration;
use thiserror::Error;

/// Client error types
#[derive(Error, Debug)]
pub enum Error {
    /// Not produced by the client itself (the read loop logs and skips bad
    /// frames); lets callers mix [`crate::Message::parse`] into client code with `?`.
    #[error(transparent)]
    MalformedFrame(#[from] ParseError),
    #[error("failed to connect to {url}: {source}")]
    Dial {
        url: String,
        #[source]
        source: TransportError,
    },
    #[error("connecting to {url} timed out after {timeout:?}")]
    DialTimeout { url: String, timeout: Duration },
    #[error("read error: {0}")]
    Read(#[source] TransportError),
    #[error("connection closed")]
    Closed,
    #[error("write error: {0}")]
    Write(#[source] TransportError),
    #[error("not connected")]
    NotConnected,
    #[error("already connected")]
    AlreadyConnected,
}

pub type Result<T> = std::result::Result<T, Error>;

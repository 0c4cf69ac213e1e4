//! Client library for the concentrator message bus
//!
//! Nodes talk to each other through a central concentrator using
//! colon-delimited text frames of the form `TO:VERB:NOUN[:ARGS...]:FROM`.
//! A [`Client`] keeps one long-lived connection open, reconnecting when it
//! fails, and hands incoming messages to verb handlers and/or a bounded
//! [`Inbox`].
//!
//! ```no_run
//! # async fn demo() -> concentrator::Result<()> {
//! let client = concentrator::Client::builder("luch", "ws://hal9000:9090/ws")
//!     .inbox(64)
//!     .build();
//!
//! client.handle("LAMP", |req| async move {
//!     let _ = req.reply("OK", "LAMP", &[]).await;
//! });
//!
//! client.connect().await?;
//! client.send("VERTEX", "LAMP", "ON", &[]).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
mod connection;
pub mod error;
pub mod message;
pub mod transport;

#[cfg(test)]
mod testing;

pub use client::{Client, ClientBuilder, Handler, Inbox, Request, WILDCARD};
pub use connection::{DEFAULT_DIAL_TIMEOUT, DEFAULT_RECONNECT_INTERVAL};
pub use error::{Error, Result};
pub use message::{Message, ParseError, SEP, encode};

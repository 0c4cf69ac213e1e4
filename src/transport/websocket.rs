//! WebSocket transport using async-tungstenite
//!
//! Text and binary frames are both delivered as text; binary frames that
//! are not valid UTF-8 are dropped with a warning. Control frames are
//! handled by tungstenite and never surface as frames.

use super::{FrameReader, FrameWriter, Transport, TransportError};
use async_tungstenite::WebSocketStream;
use async_tungstenite::tokio::{ConnectStream, connect_async};
use async_tungstenite::tungstenite;
use async_tungstenite::tungstenite::Message as WsMessage;
use async_tungstenite::tungstenite::protocol::CloseFrame;
use async_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};

type WsStream = WebSocketStream<ConnectStream>;

/// WebSocket transport for `ws://` and `wss://` URLs
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

pub struct WebSocketReader {
    stream: SplitStream<WsStream>,
}

pub struct WebSocketWriter {
    sink: SplitSink<WsStream, WsMessage>,
}

impl Transport for WebSocketTransport {
    type Reader = WebSocketReader;
    type Writer = WebSocketWriter;

    async fn dial(&self, url: &str) -> Result<(WebSocketReader, WebSocketWriter), TransportError> {
        let (websocket, _response) = connect_async(url).await.map_err(convert_ws_error)?;
        let (sink, stream) = websocket.split();
        Ok((WebSocketReader { stream }, WebSocketWriter { sink }))
    }
}

impl FrameReader for WebSocketReader {
    async fn read_frame(&mut self) -> Result<String, TransportError> {
        loop {
            let Some(ws_msg) = self.stream.next().await else {
                return Err(TransportError::Abnormal(
                    "stream ended without close frame".to_string(),
                ));
            };

            match ws_msg.map_err(convert_ws_error)? {
                WsMessage::Text(text) => return Ok(text),
                WsMessage::Binary(data) => {
                    if let Some(text) = binary_text(data) {
                        return Ok(text);
                    }
                }
                WsMessage::Close(frame) => return Err(classify_close(frame)),
                WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => {}
            }
        }
    }
}

impl FrameWriter for WebSocketWriter {
    async fn write_frame(&mut self, frame: &str) -> Result<(), TransportError> {
        self.sink
            .send(WsMessage::Text(frame.to_string()))
            .await
            .map_err(convert_ws_error)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self.sink.close().await {
            Ok(()) => Ok(()),
            // Peer already finished the close handshake
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(convert_ws_error(e)),
        }
    }
}

fn binary_text(data: Vec<u8>) -> Option<String> {
    match String::from_utf8(data) {
        Ok(text) => Some(text),
        Err(e) => {
            log::warn!(
                "dropping binary frame that is not UTF-8 ({} bytes): {}",
                e.as_bytes().len(),
                e.utf8_error()
            );
            None
        }
    }
}

/// Normal closure and going-away are clean; anything else is a fault.
fn classify_close(frame: Option<CloseFrame<'_>>) -> TransportError {
    match frame {
        Some(frame) if matches!(frame.code, CloseCode::Normal | CloseCode::Away) => {
            TransportError::Closed
        }
        Some(frame) => TransportError::Abnormal(format!(
            "closed with code {}: {}",
            frame.code, frame.reason
        )),
        None => TransportError::Abnormal("closed without status".to_string()),
    }
}

fn convert_ws_error(e: tungstenite::Error) -> TransportError {
    match e {
        tungstenite::Error::Io(io_err) => TransportError::Io(io_err),
        other => TransportError::WebSocket(other.to_string()),
    }
}

//! Newline-delimited transport over stream sockets
//!
//! One frame per line. EOF from the peer is treated as a clean close.

use super::{FrameReader, FrameWriter, Transport, TransportError};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

type BoxedRead = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWrite = Box<dyn AsyncWrite + Send + Unpin>;

/// Line transport for `tcp://host:port` and `unix:///path` URLs
#[derive(Debug, Clone, Copy, Default)]
pub struct LineTransport;

pub struct LineReader {
    reader: BufReader<BoxedRead>,
}

pub struct LineWriter {
    writer: BoxedWrite,
}

impl LineTransport {
    async fn open(url: &str) -> Result<(BoxedRead, BoxedWrite), TransportError> {
        if let Some(addr) = url.strip_prefix("tcp://") {
            let stream = TcpStream::connect(addr).await?;
            // Frames are small and latency matters more than throughput
            stream.set_nodelay(true)?;
            let (reader, writer) = stream.into_split();
            return Ok((Box::new(reader), Box::new(writer)));
        }

        if let Some(path) = url.strip_prefix("unix://") {
            return Self::open_unix(path).await;
        }

        Err(TransportError::UnsupportedScheme(url.to_string()))
    }

    #[cfg(unix)]
    async fn open_unix(path: &str) -> Result<(BoxedRead, BoxedWrite), TransportError> {
        let stream = tokio::net::UnixStream::connect(path).await?;
        let (reader, writer) = stream.into_split();
        Ok((Box::new(reader), Box::new(writer)))
    }

    #[cfg(not(unix))]
    async fn open_unix(path: &str) -> Result<(BoxedRead, BoxedWrite), TransportError> {
        Err(TransportError::UnsupportedScheme(format!("unix://{path}")))
    }
}

impl Transport for LineTransport {
    type Reader = LineReader;
    type Writer = LineWriter;

    async fn dial(&self, url: &str) -> Result<(LineReader, LineWriter), TransportError> {
        let (reader, writer) = Self::open(url).await?;
        Ok((
            LineReader {
                reader: BufReader::new(reader),
            },
            LineWriter { writer },
        ))
    }
}

impl FrameReader for LineReader {
    async fn read_frame(&mut self) -> Result<String, TransportError> {
        let mut line = String::new();
        match self.reader.read_line(&mut line).await {
            Ok(0) => Err(TransportError::Closed), // EOF - connection closed
            Ok(_) => {
                let end = line.trim_end_matches(['\r', '\n']).len();
                line.truncate(end);
                Ok(line)
            }
            Err(e) => Err(TransportError::Io(e)),
        }
    }
}

impl FrameWriter for LineWriter {
    async fn write_frame(&mut self, frame: &str) -> Result<(), TransportError> {
        self.writer.write_all(frame.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    async fn listener() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("tcp://{}", listener.local_addr().unwrap());
        (listener, url)
    }

    #[tokio::test]
    async fn test_read_frames() {
        let (listener, url) = listener().await;
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream
                .write_all(b"LUCH:LAMP:ON:VERTEX\r\nLUCH:OK:TIMER:qwe:ACHTUNG\n")
                .await
                .unwrap();
        });

        let (mut reader, _writer) = LineTransport.dial(&url).await.unwrap();
        assert_eq!(reader.read_frame().await.unwrap(), "LUCH:LAMP:ON:VERTEX");
        assert_eq!(reader.read_frame().await.unwrap(), "LUCH:OK:TIMER:qwe:ACHTUNG");

        server.await.unwrap();
        assert!(matches!(reader.read_frame().await, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn test_write_frame_appends_newline() {
        let (listener, url) = listener().await;
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut received = String::new();
            stream.read_to_string(&mut received).await.unwrap();
            received
        });

        let (_reader, mut writer) = LineTransport.dial(&url).await.unwrap();
        writer.write_frame("VERTEX:LAMP:OFF:LUCH").await.unwrap();
        writer.close().await.unwrap();

        assert_eq!(server.await.unwrap(), "VERTEX:LAMP:OFF:LUCH\n");
    }

    #[tokio::test]
    async fn test_dial_refused() {
        let (listener, url) = listener().await;
        drop(listener);

        assert!(matches!(
            LineTransport.dial(&url).await,
            Err(TransportError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_dial_unsupported_scheme() {
        assert!(matches!(
            LineTransport.dial("ws://127.0.0.1:1").await,
            Err(TransportError::UnsupportedScheme(_))
        ));
    }
}

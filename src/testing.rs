//! Scripted in-memory transport for tests

use crate::transport::{FrameReader, FrameWriter, Transport, TransportError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

type Feed = mpsc::UnboundedSender<Result<String, TransportError>>;

/// Each successful dial opens a fresh in-memory link. Tests feed the
/// current link with frames, read failures or a clean close, and inspect
/// everything the client wrote.
#[derive(Clone, Default)]
pub(crate) struct MockTransport {
    state: Arc<MockState>,
}

#[derive(Default)]
struct MockState {
    dials: AtomicUsize,
    connects: AtomicUsize,
    failing_dials: AtomicUsize,
    hang: AtomicBool,
    peer: Mutex<Option<Feed>>,
    written: Mutex<VecDeque<String>>,
    closed_writers: AtomicUsize,
}

pub(crate) struct MockReader {
    rx: mpsc::UnboundedReceiver<Result<String, TransportError>>,
}

pub(crate) struct MockWriter {
    state: Arc<MockState>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_dials(&self, n: usize) {
        self.state.failing_dials.store(n, Ordering::SeqCst);
    }

    /// Make every dial wait forever.
    pub fn hang_dials(&self, hang: bool) {
        self.state.hang.store(hang, Ordering::SeqCst);
    }

    /// Dial attempts, successful or not
    pub fn dial_count(&self) -> usize {
        self.state.dials.load(Ordering::SeqCst)
    }

    pub fn connect_count(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub fn closed_writers(&self) -> usize {
        self.state.closed_writers.load(Ordering::SeqCst)
    }

    pub fn written(&self) -> Vec<String> {
        self.state.written.lock().unwrap().iter().cloned().collect()
    }

    pub fn push_frame(&self, frame: &str) {
        self.feed(Ok(frame.to_string()));
    }

    pub fn fail_read(&self) {
        self.feed(Err(TransportError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "connection reset by peer",
        ))));
    }

    pub fn close_clean(&self) {
        self.feed(Err(TransportError::Closed));
    }

    fn feed(&self, item: Result<String, TransportError>) {
        let peer = self.state.peer.lock().unwrap();
        let feed = peer.as_ref().expect("no live mock connection");
        feed.send(item).expect("mock reader dropped");
    }
}

impl Transport for MockTransport {
    type Reader = MockReader;
    type Writer = MockWriter;

    async fn dial(&self, _url: &str) -> Result<(MockReader, MockWriter), TransportError> {
        self.state.dials.fetch_add(1, Ordering::SeqCst);

        if self.state.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }

        let failing = self.state.failing_dials.load(Ordering::SeqCst);
        if failing > 0 {
            self.state.failing_dials.store(failing - 1, Ordering::SeqCst);
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        *self.state.peer.lock().unwrap() = Some(tx);
        self.state.connects.fetch_add(1, Ordering::SeqCst);

        Ok((
            MockReader { rx },
            MockWriter {
                state: Arc::clone(&self.state),
            },
        ))
    }
}

impl FrameReader for MockReader {
    async fn read_frame(&mut self) -> Result<String, TransportError> {
        match self.rx.recv().await {
            Some(item) => item,
            None => Err(TransportError::Abnormal("mock link dropped".to_string())),
        }
    }
}

impl FrameWriter for MockWriter {
    async fn write_frame(&mut self, frame: &str) -> Result<(), TransportError> {
        self.state
            .written
            .lock()
            .unwrap()
            .push_back(frame.to_string());
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.state.closed_writers.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Poll `cond` until it holds or two seconds pass.
pub(crate) async fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}

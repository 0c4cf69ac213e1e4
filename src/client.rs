//! Concentrator client
//!
//! Runs the background read loop on top of the connection manager and the
//! codec. Every parsed message is delivered to two independent sinks:
//! - the optional inbox, for event-loop consumers (a UI, a poll loop)
//! - the verb handler registry, for callback-style consumers
//!
//! Neither sink can stall the read loop. The inbox drops on full and each
//! handler runs in its own task.

mod inbox;
mod registry;
mod request;

pub use inbox::Inbox;
pub use registry::{Handler, WILDCARD};
pub use request::Request;

use crate::connection::{ConnectionManager, DEFAULT_DIAL_TIMEOUT, DEFAULT_RECONNECT_INTERVAL};
use crate::error::{Error, Result};
use crate::message::{Message, encode};
use crate::transport::{Transport, WebSocketTransport};
use futures::FutureExt;
use futures::future::BoxFuture;
use inbox::InboxSender;
use registry::Registry;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, oneshot};
use tokio_util::task::TaskTracker;

type OnConnect<T> = Arc<dyn Fn(Client<T>) -> BoxFuture<'static, ()> + Send + Sync>;

/// Handle to a concentrator session. Clones share the same session.
pub struct Client<T: Transport = WebSocketTransport> {
    inner: Arc<ClientInner<T>>,
}

struct ClientInner<T: Transport> {
    node_id: String,
    manager: ConnectionManager<T>,
    registry: Registry<T>,
    inbox_tx: Option<InboxSender>,
    inbox: Option<Inbox>,
    on_connect: Option<OnConnect<T>>,
    // true while a read loop is running
    read_loop: Mutex<bool>,
    // read loop plus in-flight handlers
    tasks: TaskTracker,
}

pub struct ClientBuilder<T: Transport = WebSocketTransport> {
    node_id: String,
    url: String,
    transport: T,
    reconnect_interval: Duration,
    dial_timeout: Duration,
    on_connect: Option<OnConnect<T>>,
    inbox_capacity: usize,
}

impl ClientBuilder<WebSocketTransport> {
    pub fn new(node_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self::with_transport(node_id, url, WebSocketTransport)
    }
}

impl<T: Transport> ClientBuilder<T> {
    pub fn with_transport(node_id: impl Into<String>, url: impl Into<String>, transport: T) -> Self {
        Self {
            node_id: node_id.into(),
            url: url.into(),
            transport,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            on_connect: None,
            inbox_capacity: 0,
        }
    }

    /// Wait between reconnect attempts. Zero disables reconnecting.
    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Limit for each dial attempt. Zero means no limit.
    pub fn dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    /// Callback that fires after every successful connection (including
    /// reconnects). Useful for re-announcing state to the concentrator.
    ///
    /// It runs before the read loop resumes, so it must not wait for
    /// incoming messages.
    pub fn on_connect<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Client<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_connect = Some(Arc::new(move |client| f(client).boxed()));
        self
    }

    /// Enable an inbox of the given capacity. Every incoming message is
    /// pushed there (dropped when full). Zero leaves the inbox disabled.
    pub fn inbox(mut self, capacity: usize) -> Self {
        self.inbox_capacity = capacity;
        self
    }

    pub fn build(self) -> Client<T> {
        let node_id = self.node_id.to_uppercase();
        let manager = ConnectionManager::new(
            self.transport,
            self.url,
            node_id.clone(),
            self.dial_timeout,
            self.reconnect_interval,
        );

        let (inbox_tx, inbox) = match self.inbox_capacity {
            0 => (None, None),
            capacity => {
                let (tx, rx) = inbox::channel(capacity, manager.shutdown_token());
                (Some(tx), Some(rx))
            }
        };

        Client {
            inner: Arc::new(ClientInner {
                node_id,
                manager,
                registry: Registry::new(),
                inbox_tx,
                inbox,
                on_connect: self.on_connect,
                read_loop: Mutex::new(false),
                tasks: TaskTracker::new(),
            }),
        }
    }
}

impl Client<WebSocketTransport> {
    /// Create a WebSocket client with default options.
    ///
    /// ```no_run
    /// let client = concentrator::Client::new("LUCH", "ws://hal9000:9090/ws");
    /// ```
    pub fn new(node_id: impl Into<String>, url: impl Into<String>) -> Self {
        ClientBuilder::new(node_id, url).build()
    }

    pub fn builder(node_id: impl Into<String>, url: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(node_id, url)
    }
}

impl<T: Transport> Clone for Client<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> Client<T> {
    pub fn node_id(&self) -> &str {
        &self.inner.node_id
    }

    pub fn url(&self) -> &str {
        self.inner.manager.url()
    }

    /// Whether a connection is live right now. Advisory only: it can be
    /// stale by the time the caller acts on it.
    pub fn connected(&self) -> bool {
        self.inner.manager.is_connected()
    }

    /// The event queue, if one was configured.
    pub fn inbox(&self) -> Option<&Inbox> {
        self.inner.inbox.as_ref()
    }

    /// Register a handler that fires when an incoming message's VERB
    /// matches `verb` (case-insensitive). Use [`WILDCARD`] to catch all
    /// unmatched verbs. Registering again replaces the previous handler.
    ///
    /// ```no_run
    /// # let client = concentrator::Client::new("LUCH", "ws://hal9000:9090/ws");
    /// client.handle("LAMP", |req| async move {
    ///     match req.msg.noun.as_str() {
    ///         "ON" => { /* ... */ }
    ///         "OFF" => { /* ... */ }
    ///         _ => {}
    ///     }
    ///     let _ = req.reply("OK", "LAMP", &[]).await;
    /// });
    /// ```
    pub fn handle<F, Fut>(&self, verb: &str, f: F)
    where
        F: Fn(Request<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler: Handler<T> = Arc::new(move |req: Request<T>| f(req).boxed());
        self.inner.registry.insert(verb, handler);
    }

    /// Dial the concentrator once and start the read loop.
    ///
    /// A failed first dial is returned as-is and nothing is started, so
    /// callers can choose to run offline. Once the dial succeeds the read
    /// loop owns the connection, so dropping this future afterwards (for
    /// example under a timeout) leaves a working client behind.
    pub async fn connect(&self) -> Result<()> {
        let mut running = self.inner.read_loop.lock().await;
        if self.inner.manager.is_shut_down() {
            return Err(Error::Closed);
        }
        if *running {
            return Err(Error::AlreadyConnected);
        }

        let reader = self.inner.manager.dial().await?;
        log::info!("[{}] connected to {}", self.inner.node_id, self.url());

        let (ready_tx, ready_rx) = oneshot::channel();
        *running = true;
        self.inner.tasks.spawn(self.clone().read_loop(reader, ready_tx));
        drop(running);

        // on_connect runs at the head of the read loop
        let _ = ready_rx.await;
        if self.inner.manager.is_shut_down() {
            return Err(Error::Closed);
        }
        Ok(())
    }

    /// Shut down the client and wait for the read loop and in-flight
    /// handlers to finish. Handlers still running are cancelled at their
    /// next await point. The client cannot be reconnected afterwards.
    pub async fn close(&self) -> Result<()> {
        let result = self.inner.manager.shutdown().await;
        self.inner.tasks.close();
        self.inner.tasks.wait().await;
        result
    }

    /// Build and write a message. FROM is filled in from the node id.
    ///
    /// ```no_run
    /// # async fn demo(client: concentrator::Client) -> concentrator::Result<()> {
    /// client.send("VERTEX", "LAMP", "ON", &[]).await?;
    /// client.send("ACHTUNG", "NEW", "TIMER", &["qwe", "10s"]).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn send(&self, to: &str, verb: &str, noun: &str, args: &[&str]) -> Result<()> {
        let wire = encode(to, verb, noun, &self.inner.node_id, args);
        self.inner.manager.write(&wire).await
    }

    /// Write an already-encoded wire string. Use [`Client::send`] when possible.
    pub async fn send_raw(&self, wire: &str) -> Result<()> {
        self.inner.manager.write(wire).await
    }

    // Cut short by close, like handlers
    async fn run_on_connect(&self) {
        let Some(on_connect) = &self.inner.on_connect else {
            return;
        };
        let shutdown = self.inner.manager.shutdown_token();
        tokio::select! {
            _ = on_connect(self.clone()) => {}
            _ = shutdown.cancelled() => {}
        }
    }

    async fn read_loop(self, mut reader: T::Reader, ready: oneshot::Sender<()>) {
        let node_id = &self.inner.node_id;
        let manager = &self.inner.manager;
        let shutdown = manager.shutdown_token();

        self.run_on_connect().await;
        let _ = ready.send(());

        loop {
            let result = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                result = manager.read(&mut reader) => result,
            };

            match result {
                Ok(frame) => self.handle_frame(&frame),
                Err(Error::Closed) => {
                    log::info!("[{}] connection closed", node_id);
                    break;
                }
                Err(e) => {
                    log::warn!("[{}] {}", node_id, e);
                    let Some(next) = manager.reconnect().await else {
                        break;
                    };
                    reader = next;
                    log::info!("[{}] reconnected", node_id);
                    self.run_on_connect().await;
                }
            }
        }

        *self.inner.read_loop.lock().await = false;
    }

    fn handle_frame(&self, frame: &str) {
        let raw = frame.trim();
        if raw.is_empty() {
            log::debug!("[{}] skipping empty frame", self.inner.node_id);
            return;
        }

        match Message::parse(raw) {
            Ok(msg) => self.dispatch(msg),
            Err(e) => log::warn!("[{}] {}", self.inner.node_id, e),
        }
    }

    fn dispatch(&self, msg: Message) {
        if let Some(inbox) = &self.inner.inbox_tx
            && let Err(dropped) = inbox.offer(msg.clone())
        {
            log::warn!(
                "[{}] inbox full, dropping: {}",
                self.inner.node_id,
                dropped.raw
            );
        }

        let Some(handler) = self.inner.registry.lookup(&msg.verb) else {
            return;
        };
        log::debug!("[{}] dispatching {}", self.inner.node_id, msg.raw);

        let shutdown = self.inner.manager.shutdown_token();
        let request = Request::new(msg, self.clone());
        self.inner.tasks.spawn(async move {
            tokio::select! {
                _ = handler(request) => {}
                _ = shutdown.cancelled() => {}
            }
        });
    }
}

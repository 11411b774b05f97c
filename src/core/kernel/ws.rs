use crate::core::config::{SocketConfig, WsScheme};
use crate::core::errors::NakamaError;
use crate::core::kernel::codec::WsCodec;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::{self, protocol::Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, instrument, trace, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Upper bound on the close handshake we initiate; the handle is already gone by then.
const CLOSE_FRAME_TIMEOUT: Duration = Duration::from_secs(2);

pub type OpenCallback = Arc<dyn Fn() + Send + Sync>;
pub type MessageCallback<M> = Arc<dyn Fn(M) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&NakamaError) + Send + Sync>;
pub type CloseCallback = Arc<dyn Fn() + Send + Sync>;

/// Callbacks fired by the adapter
///
/// `on_open` runs inside `connect`; the others run on the receive loop's task.
pub struct SocketCallbacks<M> {
    on_open: Option<OpenCallback>,
    on_message: Option<MessageCallback<M>>,
    on_error: Option<ErrorCallback>,
    on_close: Option<CloseCallback>,
}

impl<M> Default for SocketCallbacks<M> {
    fn default() -> Self {
        Self {
            on_open: None,
            on_message: None,
            on_error: None,
            on_close: None,
        }
    }
}

impl<M> Clone for SocketCallbacks<M> {
    fn clone(&self) -> Self {
        Self {
            on_open: self.on_open.clone(),
            on_message: self.on_message.clone(),
            on_error: self.on_error.clone(),
            on_close: self.on_close.clone(),
        }
    }
}

/// The live transport handle. Exists iff the adapter is open.
struct Connection {
    id: u64,
    writer: Arc<Mutex<WsSink>>,
    // Dropping or firing this stops the receive loop without callbacks.
    shutdown: oneshot::Sender<()>,
}

impl Connection {
    async fn shutdown(self) {
        let _ = self.shutdown.send(());
        let close = async {
            let mut writer = self.writer.lock().await;
            writer.close().await
        };
        match tokio::time::timeout(CLOSE_FRAME_TIMEOUT, close).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(connection = self.id, "close frame not delivered: {}", e),
            Err(_) => debug!(connection = self.id, "close frame timed out"),
        }
    }
}

type ConnectionSlot = Arc<Mutex<Option<Connection>>>;

/// Text-framed WebSocket adapter owning at most one connection at a time
///
/// Frames are produced and consumed by the codec `C`. The adapter never
/// reconnects on its own; use the `on_close`/`on_error` callbacks to drive
/// a reconnect policy.
pub struct SocketAdapter<C: WsCodec> {
    codec: Arc<C>,
    config: SocketConfig,
    callbacks: SocketCallbacks<C::Message>,
    connection: ConnectionSlot,
    next_connection_id: AtomicU64,
}

impl<C: WsCodec> SocketAdapter<C> {
    pub fn new(codec: C) -> Self {
        Self::with_config(codec, SocketConfig::default())
    }

    pub fn with_config(codec: C, config: SocketConfig) -> Self {
        Self {
            codec: Arc::new(codec),
            config,
            callbacks: SocketCallbacks::default(),
            connection: Arc::new(Mutex::new(None)),
            next_connection_id: AtomicU64::new(1),
        }
    }

    /// Register the open callback, fired once per successful `connect`
    pub fn on_open(&mut self, callback: impl Fn() + Send + Sync + 'static) -> &mut Self {
        self.callbacks.on_open = Some(Arc::new(callback));
        self
    }

    /// Register the callback receiving every decoded inbound message, in order
    pub fn on_message(
        &mut self,
        callback: impl Fn(C::Message) + Send + Sync + 'static,
    ) -> &mut Self {
        self.callbacks.on_message = Some(Arc::new(callback));
        self
    }

    /// Register the callback receiving read and decode failures
    pub fn on_error(&mut self, callback: impl Fn(&NakamaError) + Send + Sync + 'static) -> &mut Self {
        self.callbacks.on_error = Some(Arc::new(callback));
        self
    }

    /// Register the callback fired when the server or the network ends the connection
    ///
    /// A local `close()` never fires it.
    pub fn on_close(&mut self, callback: impl Fn() + Send + Sync + 'static) -> &mut Self {
        self.callbacks.on_close = Some(Arc::new(callback));
        self
    }

    /// Whether a transport handle is currently held
    pub async fn is_open(&self) -> bool {
        self.connection.lock().await.is_some()
    }

    /// Open the connection and start the receive loop
    ///
    /// Fails if a connection is already open; call `close` first.
    #[instrument(skip(self, token), fields(scheme = scheme.as_str(), host = %host, port = port))]
    pub async fn connect(
        &self,
        scheme: WsScheme,
        host: &str,
        port: u16,
        create_status: bool,
        token: &str,
    ) -> Result<(), NakamaError> {
        let mut slot = self.connection.lock().await;
        if slot.is_some() {
            return Err(NakamaError::ConnectionError(
                "socket is already connected, close it before connecting again".to_string(),
            ));
        }

        let url = socket_url(scheme, host, port, &self.config.lang, create_status, token)?;
        let handshake = connect_async(url.as_str());
        let result = match self.config.connect_timeout() {
            Some(limit) => tokio::time::timeout(limit, handshake).await.map_err(|_| {
                NakamaError::ConnectionError(format!("WebSocket handshake timed out after {:?}", limit))
            })?,
            None => handshake.await,
        };
        let (stream, _) = result.map_err(|e| {
            NakamaError::ConnectionError(format!("WebSocket connection failed: {}", e))
        })?;

        let (writer, source) = stream.split();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        *slot = Some(Connection {
            id,
            writer: Arc::new(Mutex::new(writer)),
            shutdown: shutdown_tx,
        });
        drop(slot);

        info!(connection = id, "socket connected");

        if let Some(on_open) = &self.callbacks.on_open {
            on_open();
        }

        tokio::spawn(receive_loop(
            id,
            source,
            shutdown_rx,
            Arc::clone(&self.connection),
            Arc::clone(&self.codec),
            self.callbacks.clone(),
        ));

        Ok(())
    }

    /// Encode and write one message as a single frame
    ///
    /// A failed write is returned to the caller and leaves the connection
    /// open; the receive loop decides when the connection is dead.
    #[instrument(skip(self, message))]
    pub async fn send(&self, message: &C::Message) -> Result<(), NakamaError> {
        let writer = {
            let slot = self.connection.lock().await;
            slot.as_ref()
                .map(|connection| Arc::clone(&connection.writer))
                .ok_or(NakamaError::NotConnected)?
        };

        let frame = self.codec.encode_message(message)?;
        trace!(bytes = frame.len(), "sending frame");

        let mut writer = writer.lock().await;
        writer
            .send(frame)
            .await
            .map_err(|e| NakamaError::TransportWrite(e.to_string()))
    }

    /// Close the connection if one is open. Idempotent, never fires `on_close`.
    #[instrument(skip(self))]
    pub async fn close(&self) {
        // Detach under the lock, then run the close handshake without it.
        let connection = self.connection.lock().await.take();
        if let Some(connection) = connection {
            let id = connection.id;
            connection.shutdown().await;
            info!(connection = id, "socket closed");
        }
    }
}

impl<C: WsCodec> Drop for SocketAdapter<C> {
    fn drop(&mut self) {
        // Dropping the handle's shutdown sender ends the receive loop.
        if let Ok(mut slot) = self.connection.try_lock() {
            slot.take();
        }
    }
}

/// Build `{scheme}{host}:{port}/ws?lang=..&status=..&token=..`
pub fn socket_url(
    scheme: WsScheme,
    host: &str,
    port: u16,
    lang: &str,
    create_status: bool,
    token: &str,
) -> Result<Url, NakamaError> {
    let mut url = Url::parse(&format!("{}{}:{}/ws", scheme.as_str(), host, port))
        .map_err(|e| NakamaError::ConnectionError(format!("Invalid socket address: {}", e)))?;
    url.query_pairs_mut()
        .append_pair("lang", lang)
        .append_pair("status", if create_status { "true" } else { "false" })
        .append_pair("token", token);
    Ok(url)
}

async fn receive_loop<C: WsCodec>(
    id: u64,
    mut source: WsSource,
    mut shutdown: oneshot::Receiver<()>,
    slot: ConnectionSlot,
    codec: Arc<C>,
    callbacks: SocketCallbacks<C::Message>,
) {
    let failure = loop {
        let frame = tokio::select! {
            biased;
            _ = &mut shutdown => {
                debug!(connection = id, "receive loop stopped by local close");
                return;
            }
            frame = source.next() => frame,
        };

        match frame {
            Some(Ok(message @ (Message::Text(_) | Message::Binary(_)))) => {
                match codec.decode_message(message) {
                    Ok(Some(decoded)) => {
                        if let Some(on_message) = &callbacks.on_message {
                            on_message(decoded);
                        }
                    }
                    Ok(None) => {}
                    Err(e) => break e,
                }
            }
            // tungstenite answers pings itself
            Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
            Some(Ok(Message::Close(frame))) => {
                let message = frame.map_or_else(
                    || "server closed the connection".to_string(),
                    |f| format!("server closed the connection ({}): {}", u16::from(f.code), f.reason),
                );
                break NakamaError::TransportRead {
                    message,
                    unexpected_close: true,
                };
            }
            Some(Err(e)) => break classify_read_error(e),
            None => {
                break NakamaError::TransportRead {
                    message: "connection stream ended".to_string(),
                    unexpected_close: true,
                }
            }
        }
    };

    // A local close may have cleared the handle while the read was pending.
    let connection = {
        let mut slot = slot.lock().await;
        match slot.as_ref() {
            Some(current) if current.id == id => slot.take(),
            _ => None,
        }
    };
    let Some(connection) = connection else {
        debug!(connection = id, "read failed after local close: {}", failure);
        return;
    };

    warn!(connection = id, "socket read failed: {}", failure);
    if let Some(on_error) = &callbacks.on_error {
        on_error(&failure);
    }
    if failure.is_unexpected_close() {
        if let Some(on_close) = &callbacks.on_close {
            on_close();
        }
    }

    connection.shutdown().await;
}

fn classify_read_error(error: tungstenite::Error) -> NakamaError {
    let unexpected_close = matches!(
        error,
        tungstenite::Error::ConnectionClosed
            | tungstenite::Error::AlreadyClosed
            | tungstenite::Error::Io(_)
            | tungstenite::Error::Protocol(ProtocolError::ResetWithoutClosingHandshake)
    );
    NakamaError::TransportRead {
        message: error.to_string(),
        unexpected_close,
    }
}

//! WebSocket transport
//!
//! `WebsocketClient` presents the full client surface over one
//! persistent, bidirectional connection shared by arbitrarily many
//! concurrent callers.
//!
//! # Connection ownership
//!
//! Exactly one background read loop runs per connection, preserving
//! frame order on the wire; outbound frames go through a mutex-guarded
//! sink half so concurrent writers are serialized. Unary calls suspend
//! only the calling task, parked on a private oneshot until the
//! [`Correlator`] delivers the matching frame or the deadline fires.
//!
//! # Lifecycle
//!
//! The client is constructed disconnected; `open` performs the handshake
//! (with the configured timeout and optional TLS) and spawns the read
//! loop. `close`, or any fatal socket error, moves the connection to
//! its terminal closed state, failing every outstanding registration.
//! The transport never reconnects on its own; construct a new client.

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};

use async_trait::async_trait;
use vane_core::envelope::{request, Envelope};
use vane_core::{
    ClientError, Config, DeviceInfo, DeviceSummary, Plugin, PluginHealth, ReadCacheOptions,
    ReadOptions, ReadStreamOptions, Reading, Result, ScanOptions, Status, TagsOptions,
    Transaction, Version, WriteData, API_VERSION,
};

use crate::api::{Client, StreamSink, StreamStop};
use crate::correlator::{classify_error, Correlator};
use crate::options::{ConnectionOptions, TlsOptions};
use crate::state::{ConnectionState, StateTracker};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Client for the WebSocket transport
///
/// All operations are safe to call concurrently; every in-flight call
/// shares the single connection. The client is not cloneable by design:
/// it exclusively owns its connection and correlator state.
pub struct WebsocketClient {
    options: ConnectionOptions,
    correlator: Correlator,
    state: Arc<StateTracker>,
    sender: Mutex<Option<WsSink>>,
    read_task: Mutex<Option<JoinHandle<()>>>,
}

impl WebsocketClient {
    /// Create a client for the given options, without connecting
    ///
    /// Validates the options; fails with a `Config` error before any I/O
    /// when they are invalid. Call [`open`](Client::open) to connect.
    pub fn new(options: ConnectionOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            options,
            correlator: Correlator::new(),
            state: Arc::new(StateTracker::new()),
            sender: Mutex::new(None),
            read_task: Mutex::new(None),
        })
    }

    /// The current lifecycle state of the connection
    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    fn url(&self) -> String {
        let scheme = if self.options.tls.enabled { "wss" } else { "ws" };
        format!(
            "{}://{}/{}/connect",
            scheme, self.options.address, API_VERSION
        )
    }

    /// Fatal socket error: close the connection and fail everything
    async fn fail_connection(&self, reason: &str) {
        self.state.set(ConnectionState::Closed);
        self.correlator
            .shutdown(Some(ClientError::Connection(reason.to_string())))
            .await;
        if let Some(task) = self.read_task.lock().await.take() {
            task.abort();
        }
    }

    /// Serialize one frame onto the shared connection
    async fn send(&self, env: &Envelope) -> Result<()> {
        let text = env.encode()?;
        let mut guard = self.sender.lock().await;
        let Some(sink) = guard.as_mut() else {
            return Err(ClientError::NotConnected);
        };
        if let Err(e) = sink.send(Message::Text(text)).await {
            guard.take();
            drop(guard);
            tracing::error!(error = %e, "websocket write failed");
            self.fail_connection(&format!("write failed: {}", e)).await;
            return Err(ClientError::Connection(format!("write failed: {}", e)));
        }
        Ok(())
    }

    /// One unary request/response exchange
    ///
    /// Registers the pending request before sending so the response can
    /// never race past the registration, then parks on the private
    /// delivery slot until the correlator resolves it or the configured
    /// timeout elapses.
    #[tracing::instrument(skip(self, data), fields(event = event))]
    async fn request<T: DeserializeOwned>(&self, event: &'static str, data: Value) -> Result<T> {
        if !self.state.is_connected() {
            return Err(ClientError::NotConnected);
        }

        let id = self.correlator.next_id();
        let rx = self.correlator.register(id).await;

        if let Err(e) = self.send(&Envelope::new(id, event, data)).await {
            self.correlator.abandon(id).await;
            return Err(e);
        }
        tracing::debug!(id, "request sent, waiting for response");

        match tokio::time::timeout(self.options.timeout, rx).await {
            Err(_) => {
                // Deadline fired: drop our registration. A response
                // arriving after this is discarded, not delivered.
                self.correlator.abandon(id).await;
                tracing::debug!(id, "request timed out");
                Err(ClientError::Timeout)
            }
            Ok(Err(_)) => Err(ClientError::Connection(
                "connection closed while waiting for response".to_string(),
            )),
            Ok(Ok(Err(e))) => Err(e),
            Ok(Ok(Ok(env))) => {
                if env.is_error() {
                    return Err(classify_error(env.data));
                }
                serde_json::from_value(env.data)
                    .map_err(|e| ClientError::Serialization(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl Client for WebsocketClient {
    /// Perform the opening handshake and start the read loop
    ///
    /// Safe to call when already connected (a no-op). A closed client
    /// cannot be reopened.
    #[tracing::instrument(skip(self), fields(address = %self.options.address))]
    async fn open(&self) -> Result<()> {
        let mut sender = self.sender.lock().await;
        match self.state.get() {
            ConnectionState::Connected => return Ok(()),
            ConnectionState::Closed => {
                return Err(ClientError::Connection(
                    "connection is closed; construct a new client to reconnect".to_string(),
                ))
            }
            ConnectionState::Disconnected => {}
        }

        let url = self.url();
        tracing::info!(url = %url, "connecting");

        let connector = if self.options.tls.enabled {
            Some(tls_connector(&self.options.tls)?)
        } else {
            None
        };

        let handshake = connect_async_tls_with_config(url.as_str(), None, false, connector);
        let (ws_stream, _) = tokio::time::timeout(self.options.handshake_timeout, handshake)
            .await
            .map_err(|_| ClientError::Connection("handshake timed out".to_string()))?
            .map_err(|e| ClientError::Connection(format!("handshake failed: {}", e)))?;

        let (sink, stream) = ws_stream.split();
        *sender = Some(sink);
        self.state.set(ConnectionState::Connected);

        let task = tokio::spawn(read_loop(
            stream,
            self.correlator.clone(),
            Arc::clone(&self.state),
        ));
        *self.read_task.lock().await = Some(task);

        tracing::info!("connected");
        Ok(())
    }

    /// Tear down the connection
    ///
    /// Fails all pending unary calls with a connection error; open
    /// stream subscriptions complete with no further items. A no-op when
    /// the client was never opened or is already closed.
    #[tracing::instrument(skip(self))]
    async fn close(&self) -> Result<()> {
        let mut sender = self.sender.lock().await;
        if self.state.get() != ConnectionState::Connected {
            return Ok(());
        }
        self.state.set(ConnectionState::Closed);
        self.correlator.shutdown(None).await;

        if let Some(mut sink) = sender.take() {
            let _ = sink.send(Message::Close(None)).await;
            let _ = sink.close().await;
        }
        drop(sender);

        if let Some(task) = self.read_task.lock().await.take() {
            task.abort();
        }
        tracing::info!("connection closed");
        Ok(())
    }

    fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    async fn status(&self) -> Result<Status> {
        self.request(request::STATUS, Value::Null).await
    }

    async fn version(&self) -> Result<Version> {
        self.request(request::VERSION, Value::Null).await
    }

    async fn config(&self) -> Result<Config> {
        self.request(request::CONFIG, Value::Null).await
    }

    async fn plugins(&self) -> Result<Vec<Plugin>> {
        self.request(request::PLUGIN_LIST, Value::Null).await
    }

    async fn plugin(&self, id: &str) -> Result<Plugin> {
        self.request(request::PLUGIN, json!({ "plugin": id })).await
    }

    async fn plugin_health(&self) -> Result<PluginHealth> {
        self.request(request::PLUGIN_HEALTH, Value::Null).await
    }

    async fn scan(&self, options: ScanOptions) -> Result<Vec<DeviceSummary>> {
        self.request(request::SCAN, serde_json::to_value(&options)?)
            .await
    }

    async fn tags(&self, options: TagsOptions) -> Result<Vec<String>> {
        self.request(request::TAGS, serde_json::to_value(&options)?)
            .await
    }

    async fn info(&self, id: &str) -> Result<DeviceInfo> {
        self.request(request::INFO, json!({ "device": id })).await
    }

    async fn read(&self, options: ReadOptions) -> Result<Vec<Reading>> {
        self.request(request::READ, serde_json::to_value(&options)?)
            .await
    }

    async fn read_device(&self, id: &str, options: ReadOptions) -> Result<Vec<Reading>> {
        let mut data = serde_json::to_value(&options)?;
        if let Some(map) = data.as_object_mut() {
            map.insert("device".to_string(), json!(id));
        }
        self.request(request::READ_DEVICE, data).await
    }

    /// Start a bounded cache replay
    ///
    /// Returns once the request is on the wire; replayed readings carry
    /// this request's id and arrive on the sink until the server signals
    /// end-of-data.
    async fn read_cache(&self, options: ReadCacheOptions, sink: StreamSink) -> Result<()> {
        if !self.state.is_connected() {
            return Err(ClientError::NotConnected);
        }
        let id = self.correlator.next_id();
        self.correlator.register_replay(id, sink).await;

        let data = serde_json::to_value(&options)?;
        if let Err(e) = self.send(&Envelope::new(id, request::READ_CACHE, data)).await {
            self.correlator.remove_replay(id).await;
            return Err(e);
        }
        tracing::debug!(id, "cache replay started");
        Ok(())
    }

    /// Start an open-ended reading stream
    ///
    /// Returns once the subscription is registered and the request is on
    /// the wire. Readings matching the device-id filter are forwarded in
    /// receipt order until the stop signal fires (send or drop), the
    /// connection closes, or the consumer overflows its sink. Stopping
    /// releases only the subscription, never the connection.
    async fn read_stream(
        &self,
        options: ReadStreamOptions,
        sink: StreamSink,
        stop: StreamStop,
    ) -> Result<()> {
        if !self.state.is_connected() {
            return Err(ClientError::NotConnected);
        }
        let id = self.correlator.next_id();
        self.correlator
            .register_subscription(id, options.ids.clone(), sink)
            .await;

        let data = serde_json::to_value(&options)?;
        if let Err(e) = self
            .send(&Envelope::new(id, request::READ_STREAM, data))
            .await
        {
            self.correlator.remove_subscription(id).await;
            return Err(e);
        }

        let correlator = self.correlator.clone();
        tokio::spawn(async move {
            // Resolves on stop() or when the sender is dropped
            let _ = stop.await;
            correlator.remove_subscription(id).await;
            tracing::debug!(id, "stream subscription released");
        });

        tracing::debug!(id, "stream subscription started");
        Ok(())
    }

    async fn write_async(&self, id: &str, data: Vec<WriteData>) -> Result<Vec<Transaction>> {
        self.request(
            request::WRITE_ASYNC,
            json!({ "device": id, "payload": data }),
        )
        .await
    }

    async fn write_sync(&self, id: &str, data: Vec<WriteData>) -> Result<Vec<Transaction>> {
        self.request(
            request::WRITE_SYNC,
            json!({ "device": id, "payload": data }),
        )
        .await
    }

    async fn transactions(&self) -> Result<Vec<String>> {
        self.request(request::TRANSACTION_LIST, Value::Null).await
    }

    async fn transaction(&self, id: &str) -> Result<Transaction> {
        self.request(request::TRANSACTION, json!({ "id": id })).await
    }
}

/// The single per-connection read loop
///
/// Receives every frame on the connection and hands it to the
/// correlator. A malformed frame is logged and skipped; a socket-level
/// error or server close is fatal and fails every outstanding
/// registration and subscription.
async fn read_loop(mut stream: WsStream, correlator: Correlator, state: Arc<StateTracker>) {
    let mut failure: Option<ClientError> = None;

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => match Envelope::decode(&text) {
                Ok(env) => correlator.dispatch(env).await,
                Err(e) => {
                    // Frame-level damage does not tear down the connection
                    tracing::warn!(error = %e, "skipping malformed frame");
                }
            },
            Ok(Message::Close(_)) => {
                tracing::info!("connection closed by server");
                failure = Some(ClientError::Connection(
                    "connection closed by server".to_string(),
                ));
                break;
            }
            Ok(_) => {} // ping/pong/binary handled by the library or ignored
            Err(e) => {
                tracing::error!(error = %e, "websocket read error");
                failure = Some(ClientError::Connection(e.to_string()));
                break;
            }
        }
    }

    // If close() already ran this is a no-op; otherwise the closure was
    // failure-initiated and everything outstanding fails.
    let failure =
        failure.unwrap_or_else(|| ClientError::Connection("connection closed".to_string()));
    state.set(ConnectionState::Closed);
    correlator.shutdown(Some(failure)).await;
}

/// Build the TLS connector from the configured options
fn tls_connector(tls: &TlsOptions) -> Result<Connector> {
    let mut builder = native_tls::TlsConnector::builder();
    if tls.skip_verify {
        builder.danger_accept_invalid_certs(true);
    }
    if let (Some(cert_file), Some(key_file)) = (&tls.cert_file, &tls.key_file) {
        let cert = std::fs::read(cert_file)
            .map_err(|e| ClientError::Config(format!("reading {}: {}", cert_file.display(), e)))?;
        let key = std::fs::read(key_file)
            .map_err(|e| ClientError::Config(format!("reading {}: {}", key_file.display(), e)))?;
        let identity = native_tls::Identity::from_pkcs8(&cert, &key)
            .map_err(|e| ClientError::Config(format!("invalid client identity: {}", e)))?;
        builder.identity(identity);
    }
    let connector = builder
        .build()
        .map_err(|e| ClientError::Connection(format!("building TLS connector: {}", e)))?;
    Ok(Connector::NativeTls(connector))
}

//! Transport-agnostic client interface
//!
//! Every operation the server exposes is available through the [`Client`]
//! trait, with an identical surface for both transports. A non-streaming
//! call either returns a populated, schema-valid result or fails with a
//! classified [`ClientError`](vane_core::ClientError); it never returns a
//! partially populated result without an error.
//!
//! # Streaming calls
//!
//! `read_cache` and `read_stream` return as soon as the subscription is
//! established; individual items arrive asynchronously on the
//! caller-supplied sink. The sink is a bounded `mpsc` sender the caller
//! sizes; a consumer that falls behind has its subscription dropped with
//! a `StreamOverflow` error rather than stalling the transport.
//!
//! # Lifecycle
//!
//! `open` must be called once before any other operation on a WebSocket
//! client; calling an operation first fails with `NotConnected`. On the
//! HTTP variant `open` and `close` are no-ops, stated explicitly so both
//! variants satisfy the same contract.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use vane_core::{
    ClientError, Config, DeviceInfo, DeviceSummary, Plugin, PluginHealth, ReadCacheOptions,
    ReadOptions, ReadStreamOptions, Reading, Result, ScanOptions, Status, TagsOptions,
    Transaction, Version, WriteData,
};

use crate::options::ConnectionOptions;

/// Caller-supplied delivery channel for streamed readings
///
/// Bounded by the caller; the final item on a dropped or failed
/// subscription is an `Err`.
pub type StreamSink = mpsc::Sender<std::result::Result<Reading, ClientError>>;

/// Signal that stops an open-ended reading stream
///
/// Sending on it or dropping the sender both release the subscription;
/// neither closes the underlying connection.
pub type StreamStop = oneshot::Receiver<()>;

/// The capability surface of a device-telemetry server
///
/// Implemented by [`HttpClient`](crate::HttpClient) and
/// [`WebsocketClient`](crate::WebsocketClient), which share no internal
/// state.
#[async_trait]
pub trait Client: Send + Sync {
    /// Establish the connection (WebSocket) or do nothing (HTTP)
    async fn open(&self) -> Result<()>;

    /// Tear down the connection and fail anything in flight
    ///
    /// Idempotent: closing an already-closed client is a no-op.
    async fn close(&self) -> Result<()>;

    /// The options this client was constructed with
    fn options(&self) -> &ConnectionOptions;

    /// Check that the server is reachable and responsive
    async fn status(&self) -> Result<Status>;

    /// Get the server version and API version
    async fn version(&self) -> Result<Version>;

    /// Get the server's active configuration
    async fn config(&self) -> Result<Config>;

    /// List all registered plugins
    async fn plugins(&self) -> Result<Vec<Plugin>>;

    /// Get detail for a single plugin
    async fn plugin(&self, id: &str) -> Result<Plugin>;

    /// Get aggregate health over all plugins
    async fn plugin_health(&self) -> Result<PluginHealth>;

    /// Enumerate the devices the server knows about
    async fn scan(&self, options: ScanOptions) -> Result<Vec<DeviceSummary>>;

    /// List the tags currently in use
    async fn tags(&self, options: TagsOptions) -> Result<Vec<String>>;

    /// Get detail for a single device
    async fn info(&self, id: &str) -> Result<DeviceInfo>;

    /// Read from all devices matching the options
    async fn read(&self, options: ReadOptions) -> Result<Vec<Reading>>;

    /// Read from a single device
    async fn read_device(&self, id: &str, options: ReadOptions) -> Result<Vec<Reading>>;

    /// Replay cached readings into the sink
    ///
    /// Bounded: the stream completes when the server signals end-of-data.
    async fn read_cache(&self, options: ReadCacheOptions, sink: StreamSink) -> Result<()>;

    /// Stream readings into the sink until the stop signal fires
    ///
    /// Open-ended; only available over the WebSocket transport.
    async fn read_stream(
        &self,
        options: ReadStreamOptions,
        sink: StreamSink,
        stop: StreamStop,
    ) -> Result<()>;

    /// Write to a device without waiting for completion
    async fn write_async(&self, id: &str, data: Vec<WriteData>) -> Result<Vec<Transaction>>;

    /// Write to a device and wait for the transactions to resolve
    async fn write_sync(&self, id: &str, data: Vec<WriteData>) -> Result<Vec<Transaction>>;

    /// List the ids of all tracked transactions
    async fn transactions(&self) -> Result<Vec<String>>;

    /// Get the state of a single transaction
    async fn transaction(&self, id: &str) -> Result<Transaction>;
}

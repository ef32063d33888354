//! Device API clients over HTTP and WebSocket
//!
//! This crate provides two interchangeable clients for the device API:
//! a stateless HTTP client and a persistent WebSocket client that
//! multiplexes concurrent requests and reading streams over a single
//! connection. Both implement the [`Client`] trait, so code can be
//! written against the interface and handed either transport.
//!
//! # Core Features
//!
//! - **Dual Transport**: HTTP requests or a multiplexed WebSocket session
//! - **Request Correlation**: Concurrent in-flight requests matched by id
//! - **Reading Streams**: Live reading subscriptions with caller-owned
//!   channels and a stop signal
//! - **Cache Replay**: Bounded replay of the server's reading cache
//! - **Retry & TLS**: Configurable HTTP retry policy and TLS for both
//!   transports
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use vane_client::{Client, ConnectionOptions, HttpClient, WebsocketClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Stateless HTTP
//!     let http = HttpClient::new(ConnectionOptions::new("localhost:5000"))?;
//!     let status = http.status().await?;
//!     println!("server: {}", status.status);
//!
//!     // Persistent WebSocket
//!     let ws = WebsocketClient::new(ConnectionOptions::new("localhost:5000"))?;
//!     ws.open().await?;
//!     let version = ws.version().await?;
//!     println!("api: {}", version.api_version);
//!     ws.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Streaming Readings
//!
//! ```rust,no_run
//! use tokio::sync::{mpsc, oneshot};
//! use vane_client::{Client, ConnectionOptions, WebsocketClient};
//! use vane_core::ReadStreamOptions;
//!
//! # async fn example() -> vane_core::Result<()> {
//! let client = WebsocketClient::new(ConnectionOptions::new("localhost:5000"))?;
//! client.open().await?;
//!
//! let (tx, mut rx) = mpsc::channel(64);
//! let (stop_tx, stop_rx) = oneshot::channel();
//! client
//!     .read_stream(ReadStreamOptions::default(), tx, stop_rx)
//!     .await?;
//!
//! while let Some(reading) = rx.recv().await {
//!     println!("{:?}", reading?);
//!     break;
//! }
//! let _ = stop_tx.send(());
//! # Ok(())
//! # }
//! ```

mod api;
mod correlator;
mod http;
mod options;
mod state;
mod websocket;

pub use api::{Client, StreamSink, StreamStop};
pub use http::HttpClient;
pub use options::{ConnectionOptions, TlsOptions};
pub use state::ConnectionState;
pub use websocket::WebsocketClient;

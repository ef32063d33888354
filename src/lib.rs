//! VANE - dual-transport client for device-telemetry servers
//!
//! This is the main convenience crate that re-exports all vane sub-crates.
//! Use this crate if you want a single dependency that provides the full
//! client surface over both transports.
//!
//! # Transports
//!
//! The same capability surface is available over two transports:
//!
//! - **HTTP**: one REST request per operation, with lazy API-version
//!   resolution and a configurable retry policy.
//! - **WebSocket**: one persistent connection multiplexing concurrent
//!   request/response pairs and continuous reading streams.
//!
//! # Quick Start - HTTP
//!
//! ```rust,no_run
//! use vane::{Client, ConnectionOptions, HttpClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = HttpClient::new(ConnectionOptions::new("localhost:5000"))?;
//!
//!     let status = client.status().await?;
//!     println!("Server status: {}", status.status);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Quick Start - WebSocket
//!
//! ```rust,no_run
//! use vane::{Client, ConnectionOptions, WebsocketClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = WebsocketClient::new(ConnectionOptions::new("localhost:5000"))?;
//!     client.open().await?;
//!
//!     let status = client.status().await?;
//!     println!("Server status: {}", status.status);
//!
//!     client.close().await?;
//!     Ok(())
//! }
//! ```

// Re-export all public APIs from sub-crates
// This allows users to access everything through the `vane::` prefix
pub use vane_client as client;
pub use vane_core as core;

// Convenience re-exports of the most commonly used types
pub use vane_client::{Client, ConnectionOptions, HttpClient, WebsocketClient};
pub use vane_core::{ClientError, Result};

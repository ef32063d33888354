//! Core wire types and error taxonomy for vane
//!
//! This crate provides the foundation shared by both transports:
//!
//! - **Envelope**: the WebSocket frame wrapper carrying a correlation id
//!   and event name, plus the event-name constants
//! - **Types**: the flat resource records for every request/response
//!   payload, and the per-options-type query-parameter serialization
//! - **Error handling**: the classified `ClientError` taxonomy and the
//!   wire-format `ApiError` record
//!
//! # Architecture
//!
//! The crate is transport-agnostic: it defines what goes on the wire but
//! not how it gets there. The `vane-client` crate builds the HTTP and
//! WebSocket transports on top of this foundation.
//!
//! # Example
//!
//! ```rust
//! use vane_core::{envelope, Envelope};
//!
//! let env = Envelope::new(1, envelope::request::STATUS, serde_json::Value::Null);
//! let text = env.encode().unwrap();
//!
//! let decoded = Envelope::decode(&text).unwrap();
//! assert_eq!(decoded.id, 1);
//! ```

pub mod envelope;
pub mod error;
pub mod types;
pub mod version;

// Re-export the most commonly used types for convenience
pub use envelope::Envelope;
pub use error::{ApiError, ClientError, Result};
pub use types::{
    Config, DeviceInfo, DeviceSummary, Plugin, PluginHealth, QueryOptions, ReadCacheOptions,
    ReadOptions, ReadStreamOptions, Reading, ScanOptions, Status, TagsOptions, Transaction, Unit,
    Version, WriteData,
};
pub use version::{client_version, ClientVersion, API_VERSION};

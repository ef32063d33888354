//! Error types for vane
//!
//! Two error types live here:
//!
//! - **ClientError**: the application-level error every operation returns
//!   (uses thiserror)
//! - **ApiError**: the wire-format error record the server sends, both as
//!   a non-2xx HTTP body and as the payload of a `response/error` frame
//!
//! Every failure a caller can observe is classified into one of the
//! `ClientError` variants; the transports never return a partially
//! populated result with no error.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Result type for vane operations
///
/// Convenience alias used throughout the vane crates.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Application-level error type for vane operations
///
/// # Error Categories
///
/// - **Config**: invalid connection options, detected at construction
///   before any I/O
/// - **Connection / NotConnected**: handshake failures, socket loss,
///   operations issued before `open`
/// - **Timeout**: no matching response within the configured deadline;
///   never affects other in-flight calls
/// - **Server**: the remote reported a populated [`ApiError`] record,
///   preserved verbatim
/// - **Protocol / Serialization**: malformed frames or schema mismatches
/// - **StreamOverflow**: a stream consumer fell behind its bounded sink
///   and the subscription was dropped
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// Invalid configuration, detected before any I/O
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport-level connection failure
    ///
    /// Covers handshake errors, socket read/write failures, and the
    /// connection-closed condition that fails all outstanding calls.
    #[error("connection error: {0}")]
    Connection(String),

    /// An operation was called on a WebSocket client that is not open
    #[error("client is not connected")]
    NotConnected,

    /// No matching response arrived within the deadline
    #[error("request timed out")]
    Timeout,

    /// The server reported an error payload
    ///
    /// The wire record is preserved verbatim: code, description,
    /// timestamp, and context all come from the server.
    #[error("server error: {0}")]
    Server(#[from] ApiError),

    /// Malformed or unexpected wire data
    ///
    /// A protocol error on a single frame is reported per-call or
    /// per-frame; it does not tear down the connection.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Serialization or deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A stream consumer was too slow and its subscription was dropped
    ///
    /// The shared read loop never blocks on one consumer; when a
    /// caller-supplied sink is full the subscription is released and
    /// this error is the final item delivered.
    #[error("stream consumer fell behind, subscription dropped")]
    StreamOverflow,
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Serialization(err.to_string())
    }
}

/// Wire-format error record reported by the server
///
/// This is the JSON body of a non-2xx HTTP response and the `data`
/// payload of a `response/error` WebSocket frame. All fields are
/// defaulted so a body that is valid JSON but not an error record
/// deserializes to the empty value, which [`ApiError::is_empty`]
/// detects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// HTTP status code associated with the error
    #[serde(default)]
    pub http_code: u16,

    /// Human-readable description of what went wrong
    #[serde(default)]
    pub description: String,

    /// RFC3339 timestamp of when the error was raised on the server
    #[serde(default)]
    pub timestamp: String,

    /// Additional server-supplied context for the error
    #[serde(default)]
    pub context: HashMap<String, serde_json::Value>,
}

impl ApiError {
    /// Check whether every field holds its default value
    ///
    /// Used by the HTTP transport to distinguish a structured error body
    /// from an unstructured failure response.
    pub fn is_empty(&self) -> bool {
        self.http_code == 0
            && self.description.is_empty()
            && self.timestamp.is_empty()
            && self.context.is_empty()
    }
}

impl std::fmt::Display for ApiError {
    /// Formats as "[code] description" for readable logs
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.http_code, self.description)
    }
}

impl std::error::Error for ApiError {}

//! WebSocket wire envelope
//!
//! Every frame on the WebSocket connection is a JSON envelope carrying a
//! correlation id, an event name, and an opaque data payload:
//!
//! ```json
//! {"id": 1, "event": "request/read", "data": {...}}
//! ```
//!
//! The correlator owns the id sequence for the life of a connection and
//! matches response frames to requests purely by id, never by arrival
//! order. Event names identify what the payload is; request events are
//! `request/<operation>` and response events are `response/<result-kind>`,
//! with `response/error` carrying an [`ApiError`](crate::ApiError) payload
//! instead of a result.

use crate::error::{ClientError, Result};
use serde::{Deserialize, Serialize};

/// Request event names sent by the client
pub mod request {
    pub const STATUS: &str = "request/status";
    pub const VERSION: &str = "request/version";
    pub const CONFIG: &str = "request/config";
    pub const SCAN: &str = "request/scan";
    pub const TAGS: &str = "request/tags";
    pub const INFO: &str = "request/info";
    pub const READ: &str = "request/read";
    pub const READ_DEVICE: &str = "request/read_device";
    pub const READ_CACHE: &str = "request/read_cache";
    pub const READ_STREAM: &str = "request/read_stream";
    pub const WRITE_ASYNC: &str = "request/write_async";
    pub const WRITE_SYNC: &str = "request/write_sync";
    pub const TRANSACTION: &str = "request/transaction";
    pub const TRANSACTION_LIST: &str = "request/transaction_list";
    pub const PLUGIN: &str = "request/plugin";
    pub const PLUGIN_LIST: &str = "request/plugin_list";
    pub const PLUGIN_HEALTH: &str = "request/plugin_health";
}

/// Response event names sent by the server
pub mod response {
    pub const STATUS: &str = "response/status";
    pub const VERSION: &str = "response/version";
    pub const CONFIG: &str = "response/config";
    pub const DEVICE_SUMMARY: &str = "response/device_summary";
    pub const TAGS: &str = "response/tags";
    pub const DEVICE_INFO: &str = "response/device_info";
    pub const READING: &str = "response/reading";
    pub const TRANSACTION_INFO: &str = "response/transaction_info";
    pub const TRANSACTION_STATUS: &str = "response/transaction_status";
    pub const TRANSACTION_LIST: &str = "response/transaction_list";
    pub const PLUGIN_INFO: &str = "response/plugin_info";
    pub const PLUGIN_LIST: &str = "response/plugin_list";
    pub const PLUGIN_HEALTH: &str = "response/plugin_health";
    /// Terminates an id-keyed bounded replay (cache reads)
    pub const END: &str = "response/end";
    /// Carries an `ApiError` payload instead of a result
    pub const ERROR: &str = "response/error";
}

/// The wire-level wrapper of every WebSocket frame
///
/// The envelope id is a monotonically increasing `u64` allocated by the
/// client for requests; the server echoes it on the matching response.
/// Unsolicited server pushes (stream readings) carry ids the client has
/// no pending registration for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Correlation id, allocated by the sender of the request
    pub id: u64,
    /// Event name, e.g. `request/read` or `response/reading`
    pub event: String,
    /// Opaque payload; the transports deserialize it into the resource
    /// record the event name implies
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub data: serde_json::Value,
}

impl Envelope {
    /// Create a new request envelope
    pub fn new(id: u64, event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            id,
            event: event.into(),
            data,
        }
    }

    /// Whether this frame carries an error payload
    pub fn is_error(&self) -> bool {
        self.event == response::ERROR
    }

    /// Encode the envelope to its wire (JSON text) form
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ClientError::Serialization(e.to_string()))
    }

    /// Decode an envelope from its wire form
    ///
    /// A frame that is not a well-formed envelope is a protocol error;
    /// the read loop logs and skips it without tearing down the
    /// connection.
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| ClientError::Protocol(format!("malformed frame: {}", e)))
    }
}

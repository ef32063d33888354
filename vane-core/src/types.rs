//! Resource records and request options
//!
//! These are the flat, order-irrelevant field mappings round-tripped
//! verbatim to and from the wire. The transports treat them as opaque
//! payloads: they deserialize into them and reserialize from them, and
//! never inspect fields themselves apart from the envelope id/event and
//! the error-indicator fields used for failure detection.
//!
//! # Options and query parameters
//!
//! Each request-options record implements [`QueryOptions`], an explicit
//! per-type serialization into an ordered list of query parameters. The
//! parameter names are the lower-cased field names; list-valued fields
//! are joined with `,`; fields at their default value are omitted.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Serialize a request-options record into HTTP query parameters
///
/// Implemented manually per options type, returning an ordered mapping
/// of parameter name to string value. No runtime field introspection is
/// involved, and each impl is independently testable.
pub trait QueryOptions {
    /// Ordered (name, value) pairs; empty when all fields are default
    fn query_params(&self) -> Vec<(&'static str, String)>;
}

/// Server status record
///
/// Returned by the unversioned status endpoint; a reachable server
/// reports `"ok"`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub timestamp: String,
}

/// Server version record
///
/// `api_version` is the segment prefixed onto versioned endpoint paths
/// (e.g. `v3`); the HTTP transport resolves and caches it lazily.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Version {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub api_version: String,
}

/// Server configuration record
///
/// The configuration is an arbitrary document owned by the server; it is
/// passed through unmodified.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Config(pub serde_json::Map<String, Value>);

/// One entry in a device scan result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceSummary {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub info: String,
    #[serde(default, rename = "type")]
    pub device_type: String,
    #[serde(default)]
    pub plugin: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

/// Full detail record for a single device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub alias: String,
    #[serde(default, rename = "type")]
    pub device_type: String,
    #[serde(default)]
    pub info: String,
    #[serde(default)]
    pub plugin: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    #[serde(default)]
    pub capabilities: DeviceCapabilities,
    #[serde(default)]
    pub sort_index: i32,
}

/// What a device supports
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub write: WriteCapability,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteCapability {
    #[serde(default)]
    pub actions: Vec<String>,
}

/// A single reading from a device
///
/// Readings are returned by the unary read operations and pushed by the
/// server on streaming reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    #[serde(default)]
    pub device: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default, rename = "type")]
    pub reading_type: String,
    #[serde(default)]
    pub device_type: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<Unit>,
    #[serde(default)]
    pub context: HashMap<String, Value>,
}

/// Unit of measure for a reading value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
}

/// Payload for a single write action
///
/// `transaction` lets the caller pick their own transaction id; left
/// empty, the server generates one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteData {
    #[serde(default)]
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
}

impl WriteData {
    /// Create a write payload for an action with no data
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            data: None,
            transaction: None,
        }
    }

    /// Attach data to the write action
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Use a caller-chosen transaction id
    pub fn with_transaction(mut self, transaction: impl Into<String>) -> Self {
        self.transaction = Some(transaction.into());
        self
    }
}

/// State of a write transaction on the server
///
/// The `context` embeds the originating [`WriteData`] verbatim, so a
/// round trip through the server preserves the action and data the
/// caller submitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub updated: String,
    #[serde(default)]
    pub timeout: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub context: WriteData,
    #[serde(default)]
    pub device: String,
}

/// Plugin record
///
/// The same record deserializes both the summary list (where the nested
/// detail structs are absent) and the per-plugin detail view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plugin {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub maintainer: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<PluginNetwork>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<PluginVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<PluginHealthCheck>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginNetwork {
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginVersion {
    #[serde(default)]
    pub plugin_version: String,
    #[serde(default)]
    pub sdk_version: String,
    #[serde(default)]
    pub build_date: String,
    #[serde(default)]
    pub git_commit: String,
    #[serde(default)]
    pub git_tag: String,
    #[serde(default)]
    pub arch: String,
    #[serde(default)]
    pub os: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginHealthCheck {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub checks: Vec<HealthCheck>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthCheck {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default, rename = "type")]
    pub check_type: String,
}

/// Aggregate health over all plugins
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginHealth {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub updated: String,
    #[serde(default)]
    pub healthy: Vec<String>,
    #[serde(default)]
    pub unhealthy: Vec<String>,
    #[serde(default)]
    pub active: u32,
    #[serde(default)]
    pub inactive: u32,
}

/// Options for a device scan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanOptions {
    /// Default tag namespace to apply to unqualified tags
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ns: String,
    /// Restrict the scan to devices matching all of these tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Force a rebuild of the server's device cache
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub force: bool,
    /// Comma-separated fields to sort the results by
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sort: String,
}

impl QueryOptions for ScanOptions {
    fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if !self.ns.is_empty() {
            params.push(("ns", self.ns.clone()));
        }
        if !self.tags.is_empty() {
            params.push(("tags", self.tags.join(",")));
        }
        if self.force {
            params.push(("force", "true".to_string()));
        }
        if !self.sort.is_empty() {
            params.push(("sort", self.sort.clone()));
        }
        params
    }
}

/// Options for listing tags
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagsOptions {
    /// Tag namespaces to include
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ns: Vec<String>,
    /// Include id tags in the listing
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ids: bool,
}

impl QueryOptions for TagsOptions {
    fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if !self.ns.is_empty() {
            params.push(("ns", self.ns.join(",")));
        }
        if self.ids {
            params.push(("ids", "true".to_string()));
        }
        params
    }
}

/// Options for a unary read
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadOptions {
    /// Default tag namespace to apply to unqualified tags
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ns: String,
    /// Restrict the read to devices matching all of these tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl QueryOptions for ReadOptions {
    fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if !self.ns.is_empty() {
            params.push(("ns", self.ns.clone()));
        }
        if !self.tags.is_empty() {
            params.push(("tags", self.tags.join(",")));
        }
        params
    }
}

/// Options bounding a cache replay
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadCacheOptions {
    /// RFC3339 timestamp; replay readings at or after this instant
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub start: String,
    /// RFC3339 timestamp; replay readings at or before this instant
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub end: String,
}

impl QueryOptions for ReadCacheOptions {
    fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if !self.start.is_empty() {
            params.push(("start", self.start.clone()));
        }
        if !self.end.is_empty() {
            params.push(("end", self.end.clone()));
        }
        params
    }
}

/// Criteria for an open-ended reading stream
///
/// An empty options record subscribes to every reading on the
/// connection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadStreamOptions {
    /// Only deliver readings from these device ids
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<String>,
    /// Only deliver readings from devices matching these tags
    /// (enforced server-side)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

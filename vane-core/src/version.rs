//! Client build metadata
//!
//! Build metadata is an explicit struct populated once from compile-time
//! constants and handed out through an accessor, rather than mutable
//! package-level state.

/// Version information for this client build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientVersion {
    /// Semantic version of the client crates
    pub version: &'static str,
    /// Highest server API version this client speaks
    pub api_version: &'static str,
}

/// The server API version this client targets
pub const API_VERSION: &str = "v3";

/// Get the version information for this client build
pub fn client_version() -> ClientVersion {
    ClientVersion {
        version: env!("CARGO_PKG_VERSION"),
        api_version: API_VERSION,
    }
}

//! Connection configuration
//!
//! `ConnectionOptions` carries everything a client needs to reach the
//! server: address, per-call timeout, retry policy, TLS settings, and
//! the WebSocket handshake timeout. Options are immutable once a client
//! is constructed and validated by the client factories before any I/O.
//!
//! # Examples
//!
//! ```rust
//! use std::time::Duration;
//! use vane_client::ConnectionOptions;
//!
//! let options = ConnectionOptions::new("localhost:5000")
//!     .with_timeout(Duration::from_secs(5))
//!     .with_retry(3, Duration::from_millis(100), Duration::from_secs(2));
//! ```

use std::path::PathBuf;
use std::time::Duration;
use vane_core::{ClientError, Result};

/// Default per-call timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);
/// Default number of retries after a failed HTTP attempt
const DEFAULT_RETRY_COUNT: u32 = 3;
/// Default initial retry backoff
const DEFAULT_RETRY_WAIT: Duration = Duration::from_millis(100);
/// Default backoff ceiling
const DEFAULT_RETRY_MAX_WAIT: Duration = Duration::from_secs(2);
/// Default WebSocket handshake timeout
const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// TLS settings for either transport
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TlsOptions {
    /// Use TLS (https / wss) for the connection
    pub enabled: bool,
    /// PEM client certificate, paired with `key_file`
    pub cert_file: Option<PathBuf>,
    /// PEM private key, paired with `cert_file`
    pub key_file: Option<PathBuf>,
    /// Skip server certificate verification
    pub skip_verify: bool,
}

/// Configuration for a client connection
///
/// Immutable once a client is constructed. The retry policy applies only
/// to the HTTP transport's own request attempts; the WebSocket transport
/// never retries.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionOptions {
    /// Server address as `host:port`, no scheme
    pub address: String,
    /// Deadline applied to every call
    pub timeout: Duration,
    /// Number of retries after a failed HTTP request attempt
    pub retry_count: u32,
    /// Initial wait between HTTP retries, doubled each attempt
    pub retry_wait: Duration,
    /// Ceiling on the wait between HTTP retries
    pub retry_max_wait: Duration,
    /// TLS settings
    pub tls: TlsOptions,
    /// Deadline for the WebSocket opening handshake
    pub handshake_timeout: Duration,
}

impl ConnectionOptions {
    /// Create options for the given `host:port` address with defaults
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            timeout: DEFAULT_TIMEOUT,
            retry_count: DEFAULT_RETRY_COUNT,
            retry_wait: DEFAULT_RETRY_WAIT,
            retry_max_wait: DEFAULT_RETRY_MAX_WAIT,
            tls: TlsOptions::default(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    /// Set the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the HTTP retry policy: count, initial wait, and wait ceiling
    pub fn with_retry(mut self, count: u32, wait: Duration, max_wait: Duration) -> Self {
        self.retry_count = count;
        self.retry_wait = wait;
        self.retry_max_wait = max_wait;
        self
    }

    /// Enable TLS with a client certificate and key
    pub fn with_tls(mut self, cert_file: impl Into<PathBuf>, key_file: impl Into<PathBuf>) -> Self {
        self.tls.enabled = true;
        self.tls.cert_file = Some(cert_file.into());
        self.tls.key_file = Some(key_file.into());
        self
    }

    /// Enable TLS without a client certificate (server auth only)
    pub fn with_tls_enabled(mut self) -> Self {
        self.tls.enabled = true;
        self
    }

    /// Skip server certificate verification (implies TLS)
    pub fn with_skip_verify(mut self) -> Self {
        self.tls.enabled = true;
        self.tls.skip_verify = true;
        self
    }

    /// Set the WebSocket handshake timeout
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Validate the options
    ///
    /// Called by the client factories before any I/O. The address must be
    /// non-empty, and when a client certificate is configured both halves
    /// must be present and resolvable on disk.
    pub fn validate(&self) -> Result<()> {
        if self.address.is_empty() {
            return Err(ClientError::Config("no address specified".to_string()));
        }
        if self.address.contains("://") {
            return Err(ClientError::Config(format!(
                "address must be host:port without a scheme, got {}",
                self.address
            )));
        }
        if self.tls.enabled {
            match (&self.tls.cert_file, &self.tls.key_file) {
                (Some(cert), Some(key)) => {
                    for path in [cert, key] {
                        if !path.is_file() {
                            return Err(ClientError::Config(format!(
                                "TLS file not found: {}",
                                path.display()
                            )));
                        }
                    }
                }
                (None, None) => {}
                _ => {
                    return Err(ClientError::Config(
                        "TLS requires both a cert file and a key file".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_defaults() {
        let options = ConnectionOptions::new("localhost:5000");
        assert_eq!(options.address, "localhost:5000");
        assert_eq!(options.timeout, DEFAULT_TIMEOUT);
        assert_eq!(options.retry_count, DEFAULT_RETRY_COUNT);
        assert!(!options.tls.enabled);
    }

    #[test]
    fn test_options_chaining() {
        let options = ConnectionOptions::new("localhost:5000")
            .with_timeout(Duration::from_secs(5))
            .with_retry(1, Duration::from_millis(50), Duration::from_millis(500))
            .with_handshake_timeout(Duration::from_secs(1));
        assert_eq!(options.timeout, Duration::from_secs(5));
        assert_eq!(options.retry_count, 1);
        assert_eq!(options.retry_wait, Duration::from_millis(50));
        assert_eq!(options.handshake_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_validate_empty_address() {
        let result = ConnectionOptions::new("").validate();
        match result {
            Err(ClientError::Config(msg)) => assert!(msg.contains("no address")),
            other => panic!("expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_address_with_scheme() {
        let result = ConnectionOptions::new("http://localhost:5000").validate();
        assert!(matches!(result, Err(ClientError::Config(_))));
    }

    #[test]
    fn test_validate_tls_missing_key() {
        let mut options = ConnectionOptions::new("localhost:5000").with_tls_enabled();
        options.tls.cert_file = Some(PathBuf::from("/nonexistent/cert.pem"));
        let result = options.validate();
        match result {
            Err(ClientError::Config(msg)) => assert!(msg.contains("both")),
            other => panic!("expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_tls_unresolvable_cert() {
        let options = ConnectionOptions::new("localhost:5000")
            .with_tls("/nonexistent/cert.pem", "/nonexistent/key.pem");
        let result = options.validate();
        match result {
            Err(ClientError::Config(msg)) => assert!(msg.contains("not found")),
            other => panic!("expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_tls_without_certs_ok() {
        let options = ConnectionOptions::new("localhost:5000").with_skip_verify();
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_validate_plain_ok() {
        assert!(ConnectionOptions::new("localhost:5000").validate().is_ok());
    }
}

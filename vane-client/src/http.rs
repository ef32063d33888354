//! HTTP transport
//!
//! `HttpClient` maps each interface call onto one REST request against
//! the configured address. The status and version endpoints live
//! unversioned at the address root; every other endpoint is prefixed
//! with the server's API version, which the client resolves lazily by
//! calling the version endpoint exactly once per client instance and
//! caching the result for its lifetime. A failed resolution leaves the
//! cache unset so the next versioned call retries it.
//!
//! # Retry policy
//!
//! Every request applies the configured timeout and the count/wait/
//! max-wait retry policy, with the wait doubling per attempt up to the
//! ceiling. Only transport-level send failures are retried; a response
//! that reached the client (including a non-2xx) is never re-issued,
//! so server errors surface immediately and writes are not repeated.
//!
//! # Error classification
//!
//! A non-success status with a body that decodes into a populated
//! [`ApiError`] fails the call with `ClientError::Server`, preserving
//! the server's code, description, timestamp, and context; otherwise a
//! transport-level `Connection` error is reported.

use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::OnceCell;
use url::Url;

use async_trait::async_trait;
use vane_core::{
    ApiError, ClientError, Config, DeviceInfo, DeviceSummary, Plugin, PluginHealth, QueryOptions,
    ReadCacheOptions, ReadOptions, ReadStreamOptions, Reading, Result, ScanOptions, Status,
    TagsOptions, Transaction, Version, WriteData,
};

use crate::api::{Client, StreamSink, StreamStop};
use crate::options::ConnectionOptions;

/// Client for the HTTP transport
///
/// One pooled reqwest client per instance; `open` and `close` are no-ops
/// so the transport satisfies the same interface contract as the
/// WebSocket variant.
pub struct HttpClient {
    options: ConnectionOptions,
    client: reqwest::Client,
    base: Url,
    /// Lazily resolved API version segment, e.g. `v3`
    api_version: OnceCell<String>,
}

impl HttpClient {
    /// Create a client for the given options
    ///
    /// Validates the options and builds the underlying HTTP client;
    /// fails with a `Config` error before any I/O when either step is
    /// invalid.
    pub fn new(options: ConnectionOptions) -> Result<Self> {
        options.validate()?;

        let scheme = if options.tls.enabled { "https" } else { "http" };
        let base = Url::parse(&format!("{}://{}/", scheme, options.address))
            .map_err(|e| ClientError::Config(format!("invalid address: {}", e)))?;

        let mut builder = reqwest::Client::builder().timeout(options.timeout);
        if options.tls.skip_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let (Some(cert_file), Some(key_file)) = (&options.tls.cert_file, &options.tls.key_file) {
            let cert = std::fs::read(cert_file).map_err(|e| {
                ClientError::Config(format!("reading {}: {}", cert_file.display(), e))
            })?;
            let key = std::fs::read(key_file).map_err(|e| {
                ClientError::Config(format!("reading {}: {}", key_file.display(), e))
            })?;
            let identity = reqwest::Identity::from_pkcs8_pem(&cert, &key)
                .map_err(|e| ClientError::Config(format!("invalid client identity: {}", e)))?;
            builder = builder.identity(identity);
        }
        let client = builder
            .build()
            .map_err(|e| ClientError::Config(format!("building HTTP client: {}", e)))?;

        Ok(Self {
            options,
            client,
            base,
            api_version: OnceCell::new(),
        })
    }

    fn root_url(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| ClientError::Config(format!("invalid path {}: {}", path, e)))
    }

    /// Resolve and cache the server's API version
    ///
    /// Called lazily on the first versioned request. The cell stays
    /// unset on failure, so the next versioned call retries resolution;
    /// a cached version is never invalidated for the life of the client.
    async fn api_version(&self) -> Result<&String> {
        self.api_version
            .get_or_try_init(|| async {
                tracing::debug!("resolving server api version");
                let version: Version = self.get(self.root_url("version")?, &[]).await?;
                if version.api_version.is_empty() {
                    return Err(ClientError::Protocol(
                        "version response missing api_version".to_string(),
                    ));
                }
                tracing::debug!(api_version = %version.api_version, "api version resolved");
                Ok(version.api_version)
            })
            .await
    }

    async fn versioned_url(&self, path: &str) -> Result<Url> {
        let version = self.api_version().await?;
        let full = format!("{}/{}", version, path);
        self.base
            .join(&full)
            .map_err(|e| ClientError::Config(format!("invalid path {}: {}", full, e)))
    }

    /// Send a request, retrying transport failures per the retry policy
    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let mut attempt: u32 = 0;
        loop {
            let this_attempt = request.try_clone().ok_or_else(|| {
                ClientError::Protocol("request body is not retryable".to_string())
            })?;
            match this_attempt.send().await {
                Ok(response) => return check_response(response).await,
                Err(e) => {
                    if attempt >= self.options.retry_count {
                        return Err(ClientError::Connection(format!(
                            "request failed after {} attempts: {}",
                            attempt + 1,
                            e
                        )));
                    }
                    let wait = backoff(attempt, self.options.retry_wait, self.options.retry_max_wait);
                    tracing::debug!(
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        error = %e,
                        "request attempt failed, backing off"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&'static str, String)],
    ) -> Result<T> {
        let mut request = self.client.get(url);
        if !query.is_empty() {
            request = request.query(query);
        }
        let response = self.execute(request).await?;
        response
            .json()
            .await
            .map_err(|e| ClientError::Serialization(e.to_string()))
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<T> {
        let response = self.execute(self.client.post(url).json(body)).await?;
        response
            .json()
            .await
            .map_err(|e| ClientError::Serialization(e.to_string()))
    }
}

#[async_trait]
impl Client for HttpClient {
    /// No-op: HTTP needs no persistent connection
    async fn open(&self) -> Result<()> {
        Ok(())
    }

    /// No-op: HTTP needs no persistent connection
    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    async fn status(&self) -> Result<Status> {
        self.get(self.root_url("status")?, &[]).await
    }

    async fn version(&self) -> Result<Version> {
        self.get(self.root_url("version")?, &[]).await
    }

    async fn config(&self) -> Result<Config> {
        let url = self.versioned_url("config").await?;
        self.get(url, &[]).await
    }

    async fn plugins(&self) -> Result<Vec<Plugin>> {
        let url = self.versioned_url("plugin").await?;
        self.get(url, &[]).await
    }

    async fn plugin(&self, id: &str) -> Result<Plugin> {
        let url = self.versioned_url(&format!("plugin/{}", id)).await?;
        self.get(url, &[]).await
    }

    async fn plugin_health(&self) -> Result<PluginHealth> {
        let url = self.versioned_url("plugin/health").await?;
        self.get(url, &[]).await
    }

    async fn scan(&self, options: ScanOptions) -> Result<Vec<DeviceSummary>> {
        let url = self.versioned_url("scan").await?;
        self.get(url, &options.query_params()).await
    }

    async fn tags(&self, options: TagsOptions) -> Result<Vec<String>> {
        let url = self.versioned_url("tags").await?;
        self.get(url, &options.query_params()).await
    }

    async fn info(&self, id: &str) -> Result<DeviceInfo> {
        let url = self.versioned_url(&format!("info/{}", id)).await?;
        self.get(url, &[]).await
    }

    async fn read(&self, options: ReadOptions) -> Result<Vec<Reading>> {
        let url = self.versioned_url("read").await?;
        self.get(url, &options.query_params()).await
    }

    async fn read_device(&self, id: &str, options: ReadOptions) -> Result<Vec<Reading>> {
        let url = self.versioned_url(&format!("read/{}", id)).await?;
        self.get(url, &options.query_params()).await
    }

    /// Bounded cache replay over a newline-delimited JSON response
    ///
    /// Returns once the response is established; a detached task parses
    /// each line into a reading and forwards it to the sink. The task is
    /// dedicated to this call, so awaiting a slow consumer here blocks
    /// nobody else.
    async fn read_cache(&self, options: ReadCacheOptions, sink: StreamSink) -> Result<()> {
        let url = self.versioned_url("readcache").await?;
        let mut request = self.client.get(url);
        if !options.query_params().is_empty() {
            request = request.query(&options.query_params());
        }
        let response = self.execute(request).await?;

        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut buf: Vec<u8> = Vec::new();
            while let Some(chunk) = stream.next().await {
                match chunk {
                    Ok(bytes) => {
                        buf.extend_from_slice(&bytes);
                        while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                            let line: Vec<u8> = buf.drain(..=pos).collect();
                            if !forward_line(&line[..line.len() - 1], &sink).await {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        let _ = sink
                            .send(Err(ClientError::Connection(format!(
                                "cache read interrupted: {}",
                                e
                            ))))
                            .await;
                        return;
                    }
                }
            }
            // Trailing record without a final newline
            if !buf.is_empty() {
                forward_line(&buf, &sink).await;
            }
        });

        Ok(())
    }

    /// The REST surface has no streaming endpoint
    async fn read_stream(
        &self,
        _options: ReadStreamOptions,
        _sink: StreamSink,
        _stop: StreamStop,
    ) -> Result<()> {
        Err(ClientError::Protocol(
            "read stream is only available over the websocket transport".to_string(),
        ))
    }

    async fn write_async(&self, id: &str, data: Vec<WriteData>) -> Result<Vec<Transaction>> {
        let url = self.versioned_url(&format!("write/{}", id)).await?;
        self.post(url, &data).await
    }

    async fn write_sync(&self, id: &str, data: Vec<WriteData>) -> Result<Vec<Transaction>> {
        let url = self.versioned_url(&format!("write/wait/{}", id)).await?;
        self.post(url, &data).await
    }

    async fn transactions(&self) -> Result<Vec<String>> {
        let url = self.versioned_url("transaction").await?;
        self.get(url, &[]).await
    }

    async fn transaction(&self, id: &str) -> Result<Transaction> {
        let url = self.versioned_url(&format!("transaction/{}", id)).await?;
        self.get(url, &[]).await
    }
}

/// Parse one newline-delimited record and deliver it
///
/// Returns false when the consumer is gone and forwarding should stop.
/// An unparseable line is reported on the sink but does not end the
/// replay.
async fn forward_line(line: &[u8], sink: &StreamSink) -> bool {
    let trimmed = line.strip_suffix(b"\r").unwrap_or(line);
    if trimmed.is_empty() {
        return true;
    }
    let item = serde_json::from_slice::<Reading>(trimmed)
        .map_err(|e| ClientError::Serialization(format!("bad cache record: {}", e)));
    sink.send(item).await.is_ok()
}

/// Classify a completed response
async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let api: ApiError = serde_json::from_str(&body).unwrap_or_default();
    if !api.is_empty() {
        Err(ClientError::Server(api))
    } else {
        Err(ClientError::Connection(format!(
            "unexpected response status {}",
            status
        )))
    }
}

/// Exponential backoff: wait doubles per attempt, capped at the ceiling
fn backoff(attempt: u32, wait: Duration, max_wait: Duration) -> Duration {
    let factor = 1u32 << attempt.min(16);
    wait.saturating_mul(factor).min(max_wait)
}

//! Generate API streaming client
//!
//! Sends a serialized request to the inference server and hands the
//! NDJSON response body to the [`StreamDecoder`]:
//! - HTTP/1.1 via reqwest, one connection pool per process
//! - Endpoint: POST /api/generate
//! - No retry and no timeout; a stalled server stalls the caller

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Method, Url};
use std::io::Write;

use crate::errors::{ClientError, Result};
use crate::streaming::decoder::{parse_record, GenerateSummary, StreamDecoder, StreamRecord, MAX_LINE_BYTES};
use crate::types::GenerateRequest;

/// Default inference server address
pub const DEFAULT_HOST: &str = "127.0.0.1:6666";

/// Default generate path
pub const DEFAULT_PATH: &str = "/api/generate";

/// Host and path of the generate endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub path: String,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            path: path.into(),
        }
    }

    /// Full request URL
    pub fn url(&self) -> Result<Url> {
        if self.host.trim().is_empty() {
            return Err(ClientError::Config("endpoint host must not be empty".to_string()));
        }
        Url::parse(&format!("http://{}{}", self.host, self.path))
            .map_err(|e| ClientError::Config(format!("Invalid endpoint {}{}: {}", self.host, self.path, e)))
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PATH)
    }
}

/// `User-Agent` sent with every request: client, version, platform, toolchain
pub fn user_agent() -> String {
    format!(
        "aimy/{} ({} {}) rust/{}",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::ARCH,
        std::env::consts::OS,
        env!("CARGO_PKG_RUST_VERSION"),
    )
}

/// Streaming client for the generate endpoint
#[derive(Debug, Clone)]
pub struct GenerateClient {
    client: Client,
    endpoint: Endpoint,
    url: Url,
    max_line_bytes: usize,
}

impl GenerateClient {
    /// Create client for the default endpoint
    pub fn new() -> Result<Self> {
        Self::with_endpoint(Endpoint::default())
    }

    /// Create client for a custom endpoint
    pub fn with_endpoint(endpoint: Endpoint) -> Result<Self> {
        let url = endpoint.url()?;
        let client = Client::builder().build().map_err(ClientError::Http)?;

        Ok(Self {
            client,
            endpoint,
            url,
            max_line_bytes: MAX_LINE_BYTES,
        })
    }

    /// Override the decoder line capacity
    pub fn with_max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.max_line_bytes = max_line_bytes;
        self
    }

    /// Send `body` with `method` and stream the decoded reply into `out`.
    ///
    /// Fragments are written and flushed as they arrive. A status of 400
    /// or above fails with [`ClientError::HttpStatus`] before anything is
    /// written.
    pub async fn stream<W: Write>(&self, method: Method, body: Vec<u8>, out: &mut W) -> Result<GenerateSummary> {
        tracing::debug!(%method, url = %self.url, bytes = body.len(), "sending request");

        let response = self
            .client
            .request(method, self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/x-ndjson")
            .header(USER_AGENT, user_agent())
            .body(body)
            .send()
            .await?;

        let status = response.status();
        tracing::debug!(status = status.as_u16(), "response received");

        if status.is_client_error() || status.is_server_error() {
            let line = read_first_line(response.bytes_stream(), self.max_line_bytes).await;
            return Err(ClientError::HttpStatus {
                status: status.as_u16(),
                message: status_message(&line, status.canonical_reason()),
            });
        }

        StreamDecoder::with_capacity(self.max_line_bytes)
            .decode_stream(response.bytes_stream(), out)
            .await
    }

    /// Serialize `request` and POST it
    pub async fn generate<W: Write>(&self, request: &GenerateRequest, out: &mut W) -> Result<GenerateSummary> {
        let body = request.to_json_bytes()?;
        self.stream(Method::POST, body, out).await
    }

    /// Configured endpoint
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Resolved request URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Line capacity handed to each decoder
    pub fn max_line_bytes(&self) -> usize {
        self.max_line_bytes
    }
}

/// Read an error response body up to its first newline, never holding
/// more than `limit` bytes. A read failure keeps what arrived so far.
async fn read_first_line<S, E>(body: S, limit: usize) -> String
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    E: std::fmt::Display,
{
    let mut body = std::pin::pin!(body);
    let mut buffer: Vec<u8> = Vec::new();

    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read error response body");
                break;
            }
        };

        let room = limit.saturating_sub(buffer.len());
        buffer.extend_from_slice(&chunk[..chunk.len().min(room)]);

        if buffer.contains(&b'\n') || buffer.len() >= limit {
            break;
        }
    }

    if let Some(end) = buffer.iter().position(|&b| b == b'\n') {
        buffer.truncate(end);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Pick the most useful message out of an error response body
fn status_message(body: &str, reason: Option<&str>) -> String {
    let first_line = body.lines().map(str::trim).find(|line| !line.is_empty());

    if let Some(line) = first_line {
        if let Ok(StreamRecord::Error(message)) = parse_record(line.as_bytes()) {
            return message;
        }
        return line.to_string();
    }

    reason.unwrap_or("unknown error").to_string()
}

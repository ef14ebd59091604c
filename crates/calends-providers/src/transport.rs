//! Network transport for remote calendars.
//!
//! [`Transport`] is the seam between the fetcher and the network. The real
//! implementation is [`HttpTransport`]; tests script their own.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::header::{ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use url::Url;

use crate::error::{FetchError, FetchResult};

/// A boxed future for async trait methods.
///
/// Keeps [`Transport`] object-safe so the fetcher can hold an `Arc<dyn Transport>`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// HTTP cache validators returned by a server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validators {
    /// The `ETag` header.
    pub etag: Option<String>,
    /// The `Last-Modified` header.
    pub last_modified: Option<String>,
}

impl Validators {
    pub fn is_empty(&self) -> bool {
        self.etag.is_none() && self.last_modified.is_none()
    }

    /// Keeps `self`'s values and fills the gaps from `older`.
    pub fn or(self, older: &Validators) -> Self {
        Self {
            etag: self.etag.or_else(|| older.etag.clone()),
            last_modified: self.last_modified.or_else(|| older.last_modified.clone()),
        }
    }
}

/// The outcome of a successful request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportResponse {
    /// New content.
    Modified { body: String, validators: Validators },
    /// The server confirmed the cached content is current.
    NotModified { validators: Validators },
}

/// Fetches remote calendar content.
pub trait Transport: Send + Sync {
    /// Returns a short name for logs.
    fn name(&self) -> &str;

    /// Fetches `url`. When `validators` is given the request is conditional
    /// and may answer [`TransportResponse::NotModified`].
    fn get<'a>(
        &'a self,
        url: &'a Url,
        validators: Option<&'a Validators>,
    ) -> BoxFuture<'a, FetchResult<TransportResponse>>;
}

/// Configuration for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    /// The `User-Agent` header.
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("calends/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// [`Transport`] over HTTP(S) with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Creates a new transport with the given configuration.
    pub fn new(config: HttpConfig) -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                FetchError::internal(format!("Failed to create HTTP client: {}", e)).with_source(e)
            })?;
        Ok(Self { client })
    }

    async fn fetch(
        &self,
        url: &Url,
        validators: Option<&Validators>,
    ) -> FetchResult<TransportResponse> {
        let mut request = self.client.get(url.clone());
        if let Some(validators) = validators {
            if let Some(etag) = &validators.etag {
                request = request.header(IF_NONE_MATCH, etag);
            }
            if let Some(last_modified) = &validators.last_modified {
                request = request.header(IF_MODIFIED_SINCE, last_modified);
            }
        }

        trace!(url = %url, conditional = validators.is_some(), "Sending request");
        let response = request.send().await.map_err(map_reqwest_error)?;
        self.handle_response(response).await
    }

    async fn handle_response(&self, response: Response) -> FetchResult<TransportResponse> {
        let status = response.status();
        let validators = Validators {
            etag: header_value(&response, ETAG),
            last_modified: header_value(&response, LAST_MODIFIED),
        };
        debug!(status = %status, url = %response.url(), "Received response");

        match status {
            StatusCode::NOT_MODIFIED => Ok(TransportResponse::NotModified { validators }),
            s if s.is_success() => {
                let body = response.text().await.map_err(|e| {
                    FetchError::invalid_response(format!("Failed to read response: {}", e))
                        .with_source(e)
                })?;
                Ok(TransportResponse::Modified { body, validators })
            }
            s => Err(FetchError::http_status(
                s.as_u16(),
                s.canonical_reason().unwrap_or("unexpected status"),
            )),
        }
    }
}

impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    fn get<'a>(
        &'a self,
        url: &'a Url,
        validators: Option<&'a Validators>,
    ) -> BoxFuture<'a, FetchResult<TransportResponse>> {
        Box::pin(self.fetch(url, validators))
    }
}

fn header_value(response: &Response, name: reqwest::header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::timeout(format!("Request timed out: {}", err)).with_source(err)
    } else {
        FetchError::network(format!("Request failed: {}", err)).with_source(err)
    }
}

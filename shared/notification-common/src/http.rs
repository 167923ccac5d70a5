//! HTTP front-end for the retrying executor
//!
//! Used by network-based providers. URLs are validated before any attempt,
//! the retry policy is gated on the HTTP method, and each in-flight request
//! races the caller's cancellation token.

use crate::error::{Aborted, RequestError};
use crate::retry::{self, RetryOptions};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

/// Methods the default retry policy considers safe to repeat
fn is_idempotent(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD || *method == Method::OPTIONS
}

/// Options for a single [`HttpExecutor::execute`] call
#[derive(Debug, Clone)]
pub struct HttpRequestOptions {
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub retry: RetryOptions,
    /// Turn non-2xx responses into [`RequestError::Status`]
    pub throw_on_error: bool,
    pub signal: Option<CancellationToken>,
}

impl Default for HttpRequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: Vec::new(),
            body: None,
            retry: RetryOptions::default(),
            throw_on_error: false,
            signal: None,
        }
    }
}

impl HttpRequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Default::default()
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Serialize `body` as the JSON request body
    pub fn json<T: serde::Serialize>(mut self, body: &T) -> Result<Self, serde_json::Error> {
        self.body = Some(serde_json::to_vec(body)?);
        Ok(self.header("Content-Type", "application/json"))
    }

    pub fn retry(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }

    pub fn throw_on_error(mut self, throw_on_error: bool) -> Self {
        self.throw_on_error = throw_on_error;
        self
    }

    pub fn signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }
}

/// Response returned by [`HttpExecutor::execute`]
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Retrying HTTP client shared by network-based providers
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: Client,
}

impl HttpExecutor {
    /// Create a new executor with a 30 second request timeout
    pub fn new() -> Result<Self, RequestError> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, RequestError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RequestError::Transport {
                url: String::new(),
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Send a request, retrying according to `options.retry`
    pub async fn execute(
        &self,
        url: &str,
        options: HttpRequestOptions,
    ) -> Result<HttpResponse, RequestError> {
        let parsed = parse_url(url)?;
        let headers = build_headers(url, &options.headers)?;

        let mut retry = options.retry.clone();
        retry.idempotent = is_idempotent(&options.method);
        if options.signal.is_some() {
            retry.signal = options.signal.clone();
        }

        let signal = retry.signal.clone();

        retry::execute(
            |attempt| {
                let request = self
                    .client
                    .request(options.method.clone(), parsed.clone())
                    .headers(headers.clone());
                let request = match &options.body {
                    Some(body) => request.body(body.clone()),
                    None => request,
                };
                let signal = signal.clone();
                let throw_on_error = options.throw_on_error;

                async move {
                    debug!("HTTP attempt {} to {}", attempt + 1, url);
                    let send = send_once(request, url, throw_on_error);
                    match signal {
                        None => send.await,
                        Some(signal) => tokio::select! {
                            biased;
                            _ = signal.cancelled() => Err(RequestError::Aborted(Aborted::Operation)),
                            result = send => result,
                        },
                    }
                }
            },
            &retry,
        )
        .await
    }
}

async fn send_once(
    request: reqwest::RequestBuilder,
    url: &str,
    throw_on_error: bool,
) -> Result<HttpResponse, RequestError> {
    let response = request.send().await.map_err(|e| RequestError::Transport {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    let status = response.status().as_u16();
    let headers = response.headers().clone();
    let body = response.text().await.map_err(|e| RequestError::Transport {
        url: url.to_string(),
        message: format!("failed to read response body: {}", e),
    })?;

    debug!("HTTP response from {}: status={}", url, status);

    if throw_on_error && !(200..300).contains(&status) {
        return Err(RequestError::Status {
            url: url.to_string(),
            status_code: status,
            body,
        });
    }

    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}

fn parse_url(url: &str) -> Result<Url, RequestError> {
    if url.trim().is_empty() {
        return Err(RequestError::InvalidUrl {
            url: url.to_string(),
            reason: "URL is empty".to_string(),
        });
    }

    let parsed = Url::parse(url).map_err(|e| RequestError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(RequestError::InvalidUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme {}", scheme),
        }),
    }
}

fn build_headers(url: &str, headers: &[(String, String)]) -> Result<HeaderMap, RequestError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| RequestError::InvalidHeader {
                url: url.to_string(),
                name: name.clone(),
                reason: format!("invalid name: {}", e),
            })?;
        let value = HeaderValue::from_str(value).map_err(|e| RequestError::InvalidHeader {
            url: url.to_string(),
            name: name.clone(),
            reason: format!("invalid value: {}", e),
        })?;
        let name = header_name;
        map.insert(name, value);
    }
    Ok(map)
}

//! Error taxonomy for notification delivery
//!
//! - [`ConfigurationError`]: misconfiguration detected before any network activity
//! - [`ProviderError`]: a provider's send failed, attributed to that provider
//! - [`RequestError`]: transport, URL or HTTP status failures from the retrying executor

use crate::NotificationChannel;
use thiserror::Error;

/// Boxed error used for causes and hook failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Strategy or provider misconfiguration
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigurationError {
    #[error("{strategy} strategy requires at least one provider")]
    EmptyProviders { strategy: &'static str },

    #[error("{strategy} strategy requires exactly {expected} provider(s), got {actual}")]
    WrongProviderCount {
        strategy: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("provider {provider_id} has invalid weight {weight}: weights must be finite and >= 0")]
    InvalidWeight { provider_id: String, weight: f64 },

    #[error("provider {provider_id} has no weight, which the weighted strategy requires")]
    MissingWeight { provider_id: String },

    #[error("unknown strategy \"{name}\", expected one of: {}", .valid.join(", "))]
    UnknownStrategy {
        name: String,
        valid: Vec<&'static str>,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigurationError {
    /// Get error code for logging/monitoring
    pub fn error_code(&self) -> &'static str {
        match self {
            ConfigurationError::EmptyProviders { .. } => "EMPTY_PROVIDERS",
            ConfigurationError::WrongProviderCount { .. } => "WRONG_PROVIDER_COUNT",
            ConfigurationError::InvalidWeight { .. } => "INVALID_WEIGHT",
            ConfigurationError::MissingWeight { .. } => "MISSING_WEIGHT",
            ConfigurationError::UnknownStrategy { .. } => "UNKNOWN_STRATEGY",
            ConfigurationError::Invalid(_) => "INVALID_CONFIGURATION",
        }
    }
}

/// Classification carried by a [`ProviderError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The provider rejected or failed the send
    Provider,
    /// The underlying HTTP request failed
    Request,
    /// The request's customize hook failed
    Customize,
    /// The payload does not belong to the provider's channel
    InvalidPayload,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Provider => "PROVIDER_ERROR",
            ErrorCode::Request => "REQUEST_ERROR",
            ErrorCode::Customize => "CUSTOMIZE_ERROR",
            ErrorCode::InvalidPayload => "INVALID_PAYLOAD",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single provider's send failed.
///
/// Displays as the bare message so aggregated status maps carry what the
/// provider reported.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ProviderError {
    provider_id: Option<String>,
    channel: Option<NotificationChannel>,
    code: ErrorCode,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl ProviderError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            provider_id: None,
            channel: None,
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Generic provider failure
    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Provider, message)
    }

    pub fn with_provider_id(mut self, provider_id: impl Into<String>) -> Self {
        self.provider_id = Some(provider_id.into());
        self
    }

    pub fn with_channel(mut self, channel: NotificationChannel) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn provider_id(&self) -> Option<&str> {
        self.provider_id.as_deref()
    }

    pub fn channel(&self) -> Option<NotificationChannel> {
        self.channel
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<RequestError> for ProviderError {
    fn from(err: RequestError) -> Self {
        ProviderError::new(ErrorCode::Request, err.to_string()).with_source(err)
    }
}

/// Why an operation run by the retrying executor was cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Aborted {
    /// Cancelled before or during an attempt
    #[error("Operation aborted")]
    Operation,
    /// Cancelled while waiting between attempts
    #[error("Delay aborted")]
    Delay,
}

/// Failure of a request made through the retrying executor
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RequestError {
    #[error("invalid URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid header \"{name}\" for {url}: {reason}")]
    InvalidHeader {
        url: String,
        name: String,
        reason: String,
    },

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("request to {url} failed with status {status_code}: {body}")]
    Status {
        url: String,
        status_code: u16,
        body: String,
    },

    #[error(transparent)]
    Aborted(#[from] Aborted),
}

impl RequestError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            RequestError::Status { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            RequestError::InvalidUrl { url, .. }
            | RequestError::InvalidHeader { url, .. }
            | RequestError::Transport { url, .. }
            | RequestError::Status { url, .. } => Some(url),
            RequestError::Aborted(_) => None,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, RequestError::Aborted(_))
    }
}

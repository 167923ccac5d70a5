//! Shared types and utilities for notification delivery
//!
//! This library provides the channel types, request and status payloads,
//! error taxonomy, provider interface and the retrying request executor
//! used by network-based providers.

pub mod error;
pub mod http;
pub mod payloads;
pub mod provider;
pub mod retry;
pub mod types;

// Re-export commonly used types
pub use error::{Aborted, BoxError, ConfigurationError, ErrorCode, ProviderError, RequestError};
pub use http::{HttpExecutor, HttpRequestOptions, HttpResponse};
pub use payloads::*;
pub use provider::{LoggerProvider, Provider};
pub use retry::{
    execute as execute_with_retry, RetryConfig, RetryContext, RetryEvent, RetryOptions,
    RetryableError,
};
pub use types::*;

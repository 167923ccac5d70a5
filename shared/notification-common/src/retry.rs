//! Retry logic and backoff for network-based providers
//!
//! [`execute`] runs a single-attempt operation with exponential backoff,
//! method-safety gating and cancellation. It knows nothing about HTTP beyond
//! the default status-code policy; see [`crate::http`] for the HTTP front-end.

use crate::error::{Aborted, RequestError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Status codes retried by default
pub const DEFAULT_RETRYABLE_STATUS_CODES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Errors the executor can classify and produce on cancellation
pub trait RetryableError: std::error::Error + Send + Sync + From<Aborted> + 'static {
    /// HTTP status code carried by the error; `None` for network-level failures
    fn status_code(&self) -> Option<u16> {
        None
    }
}

impl RetryableError for RequestError {
    fn status_code(&self) -> Option<u16> {
        RequestError::status_code(self)
    }
}

/// Input to a `should_retry` predicate
#[derive(Debug)]
pub struct RetryContext<'a> {
    pub status_code: Option<u16>,
    pub error: &'a (dyn std::error::Error + Send + Sync),
    /// Zero-based attempt that just failed
    pub attempt: u32,
}

/// Passed to `on_retry` before each delay
#[derive(Debug)]
pub struct RetryEvent<'a> {
    /// One-based number of the retry about to happen
    pub attempt: u32,
    pub error: &'a (dyn std::error::Error + Send + Sync),
    pub delay: Duration,
}

pub type ShouldRetryFn = dyn Fn(&RetryContext<'_>) -> bool + Send + Sync;
pub type OnRetryFn = dyn Fn(&RetryEvent<'_>) + Send + Sync;

/// Options controlling [`execute`]
#[derive(Clone)]
pub struct RetryOptions {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Multiply each delay by a random factor in `[0.75, 1.25)`
    pub jitter: bool,
    pub retryable_status_codes: Vec<u16>,
    /// Whether the default policy may retry at all. Non-idempotent HTTP
    /// methods clear this.
    pub idempotent: bool,
    pub should_retry: Option<Arc<ShouldRetryFn>>,
    pub on_retry: Option<Arc<OnRetryFn>>,
    pub signal: Option<CancellationToken>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000), // 1 second
            max_delay: Duration::from_millis(30000), // 30 seconds
            jitter: true,
            retryable_status_codes: DEFAULT_RETRYABLE_STATUS_CODES.to_vec(),
            idempotent: true,
            should_retry: None,
            on_retry: None,
            signal: None,
        }
    }
}

impl std::fmt::Debug for RetryOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryOptions")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("jitter", &self.jitter)
            .field("retryable_status_codes", &self.retryable_status_codes)
            .field("idempotent", &self.idempotent)
            .field("should_retry", &self.should_retry.is_some())
            .field("on_retry", &self.on_retry.is_some())
            .field("signal", &self.signal.is_some())
            .finish()
    }
}

impl RetryOptions {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
            ..Default::default()
        }
    }

    /// Exactly one attempt
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: false,
            ..Default::default()
        }
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_retryable_status_codes(mut self, codes: Vec<u16>) -> Self {
        self.retryable_status_codes = codes;
        self
    }

    pub fn with_idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = idempotent;
        self
    }

    pub fn with_should_retry<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&RetryContext<'_>) -> bool + Send + Sync + 'static,
    {
        self.should_retry = Some(Arc::new(predicate));
        self
    }

    pub fn with_on_retry<F>(mut self, callback: F) -> Self
    where
        F: Fn(&RetryEvent<'_>) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(callback));
        self
    }

    pub fn with_signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Delay before retry number `attempt + 1`: `min(base * 2^attempt, max)`,
    /// then jittered and clamped to `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }

        let exponential = 2u32
            .checked_pow(attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .unwrap_or(self.max_delay);
        let delay = exponential.min(self.max_delay);

        if self.jitter && !delay.is_zero() {
            let factor = rand::thread_rng().gen_range(0.75..1.25);
            Duration::try_from_secs_f64(delay.as_secs_f64() * factor)
                .unwrap_or(self.max_delay)
                .min(self.max_delay)
        } else {
            delay
        }
    }

    /// Decide whether a failed attempt should be retried, ignoring the
    /// attempt budget.
    pub fn is_retryable(&self, ctx: &RetryContext<'_>) -> bool {
        if let Some(should_retry) = &self.should_retry {
            return should_retry(ctx);
        }

        if !self.idempotent {
            return false;
        }

        match ctx.status_code {
            None => true,
            Some(code) => self.retryable_status_codes.contains(&code),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.signal.as_ref().is_some_and(CancellationToken::is_cancelled)
    }
}

/// Serializable retry settings used in configuration files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
    pub retryable_status_codes: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30000,
            jitter: true,
            retryable_status_codes: DEFAULT_RETRYABLE_STATUS_CODES.to_vec(),
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.base_delay_ms > self.max_delay_ms {
            return Err(format!(
                "base_delay_ms ({}) must not exceed max_delay_ms ({})",
                self.base_delay_ms, self.max_delay_ms
            ));
        }
        Ok(())
    }

    pub fn to_options(&self) -> RetryOptions {
        RetryOptions {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            jitter: self.jitter,
            retryable_status_codes: self.retryable_status_codes.clone(),
            ..Default::default()
        }
    }
}

/// Wait for `delay`, returning early with [`Aborted::Delay`] when the signal fires
async fn wait(delay: Duration, signal: Option<&CancellationToken>) -> Result<(), Aborted> {
    match signal {
        None => {
            tokio::time::sleep(delay).await;
            Ok(())
        }
        Some(signal) => {
            tokio::select! {
                biased;
                _ = signal.cancelled() => Err(Aborted::Delay),
                _ = tokio::time::sleep(delay) => Ok(()),
            }
        }
    }
}

/// Run `operation` with exponential backoff.
///
/// `operation` performs exactly one attempt and receives the zero-based
/// attempt number. The final error is returned unchanged once it is not
/// retryable or the retry budget is spent.
pub async fn execute<T, E, F, Fut>(mut operation: F, options: &RetryOptions) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError,
{
    if options.is_cancelled() {
        return Err(Aborted::Operation.into());
    }

    let mut attempt: u32 = 0;

    loop {
        debug!("Attempt {} of {}", attempt + 1, options.max_retries + 1);

        let error = match operation(attempt).await {
            Ok(result) => {
                if attempt > 0 {
                    debug!("Operation succeeded after {} attempts", attempt + 1);
                }
                return Ok(result);
            }
            Err(error) => error,
        };

        // A cancelled caller gets the failure it already has
        if options.is_cancelled() {
            return Err(error);
        }

        let ctx = RetryContext {
            status_code: error.status_code(),
            error: &error,
            attempt,
        };

        if attempt >= options.max_retries || !options.is_retryable(&ctx) {
            warn!(
                "Operation failed after {} attempts, error: {}",
                attempt + 1,
                error
            );
            return Err(error);
        }

        let delay = options.delay_for(attempt);

        if let Some(on_retry) = &options.on_retry {
            on_retry(&RetryEvent {
                attempt: attempt + 1,
                error: &error,
                delay,
            });
        }

        warn!(
            "Operation failed (attempt {}/{}), retrying in {:?}. Error: {}",
            attempt + 1,
            options.max_retries + 1,
            delay,
            error
        );

        wait(delay, options.signal.as_ref()).await?;
        attempt += 1;
    }
}

//! Provider selection strategies
//!
//! A strategy turns a channel's list of providers into a single `send` that
//! decides which provider(s) to try and in what order. Provider attempts
//! within one send are strictly sequential.

mod fallback;
mod no_fallback;
mod round_robin;
mod weighted;

pub use fallback::FallbackStrategy;
pub use no_fallback::NoFallbackStrategy;
pub use round_robin::RoundRobinStrategy;
pub use weighted::{RandomSource, SeededRandom, ThreadRandom, WeightedStrategy};

use async_trait::async_trait;
use notification_common::{
    ChannelRequest, ConfigurationError, Provider, ProviderError, ProviderSendResult,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Selects and sequences providers for one channel
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str;

    async fn send(&self, request: &ChannelRequest) -> Result<ProviderSendResult, ProviderError>;
}

/// A provider as configured for a channel, with its optional weight
#[derive(Clone)]
pub struct ConfiguredProvider {
    pub provider: Arc<dyn Provider>,
    pub weight: Option<f64>,
}

impl ConfiguredProvider {
    pub fn new(provider: impl Provider + 'static) -> Self {
        Self::from_arc(Arc::new(provider))
    }

    pub fn from_arc(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            weight: None,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn id(&self) -> &str {
        self.provider.id()
    }
}

impl std::fmt::Debug for ConfiguredProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfiguredProvider")
            .field("id", &self.id())
            .field("weight", &self.weight)
            .finish()
    }
}

/// Built-in strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StrategyKind {
    #[default]
    Fallback,
    NoFallback,
    RoundRobin,
    Weighted,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::Fallback,
        StrategyKind::NoFallback,
        StrategyKind::RoundRobin,
        StrategyKind::Weighted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Fallback => "fallback",
            StrategyKind::NoFallback => "no-fallback",
            StrategyKind::RoundRobin => "roundrobin",
            StrategyKind::Weighted => "weighted",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StrategyKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ConfigurationError::UnknownStrategy {
                name: s.to_string(),
                valid: StrategyKind::ALL.iter().map(StrategyKind::as_str).collect(),
            })
    }
}

impl TryFrom<String> for StrategyKind {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StrategyKind> for String {
    fn from(kind: StrategyKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Builds a user-supplied strategy from a channel's providers
pub type CustomStrategyFn =
    dyn Fn(Vec<ConfiguredProvider>) -> Result<Arc<dyn Strategy>, ConfigurationError> + Send + Sync;

/// A built-in strategy or a custom builder
#[derive(Clone)]
pub enum StrategySpec {
    Builtin(StrategyKind),
    Custom(Arc<CustomStrategyFn>),
}

impl Default for StrategySpec {
    fn default() -> Self {
        StrategySpec::Builtin(StrategyKind::Fallback)
    }
}

impl std::fmt::Debug for StrategySpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategySpec::Builtin(kind) => f.debug_tuple("Builtin").field(kind).finish(),
            StrategySpec::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl From<StrategyKind> for StrategySpec {
    fn from(kind: StrategyKind) -> Self {
        StrategySpec::Builtin(kind)
    }
}

impl StrategySpec {
    pub fn custom<F>(builder: F) -> Self
    where
        F: Fn(Vec<ConfiguredProvider>) -> Result<Arc<dyn Strategy>, ConfigurationError>
            + Send
            + Sync
            + 'static,
    {
        StrategySpec::Custom(Arc::new(builder))
    }

    /// Build the strategy, drawing weighted selections from the thread RNG
    pub fn build(
        &self,
        providers: Vec<ConfiguredProvider>,
    ) -> Result<Arc<dyn Strategy>, ConfigurationError> {
        self.build_with_random(providers, Arc::new(ThreadRandom))
    }

    pub fn build_with_random(
        &self,
        providers: Vec<ConfiguredProvider>,
        random: Arc<dyn RandomSource>,
    ) -> Result<Arc<dyn Strategy>, ConfigurationError> {
        let strategy: Arc<dyn Strategy> = match self {
            StrategySpec::Builtin(StrategyKind::Fallback) => {
                Arc::new(FallbackStrategy::new(providers)?)
            }
            StrategySpec::Builtin(StrategyKind::NoFallback) => {
                Arc::new(NoFallbackStrategy::new(providers)?)
            }
            StrategySpec::Builtin(StrategyKind::RoundRobin) => {
                Arc::new(RoundRobinStrategy::new(providers)?)
            }
            StrategySpec::Builtin(StrategyKind::Weighted) => {
                Arc::new(WeightedStrategy::with_random(providers, random)?)
            }
            StrategySpec::Custom(builder) => builder(providers)?,
        };
        Ok(strategy)
    }
}

/// Resolve a channel's strategy from its kind or builder and its providers
pub fn build_strategy(
    spec: &StrategySpec,
    providers: Vec<ConfiguredProvider>,
    random: Arc<dyn RandomSource>,
) -> Result<Arc<dyn Strategy>, ConfigurationError> {
    spec.build_with_random(providers, random)
}

/// Send through one provider, attributing any failure to it
pub(crate) async fn try_provider(
    configured: &ConfiguredProvider,
    request: &ChannelRequest,
) -> Result<ProviderSendResult, ProviderError> {
    let provider_id = configured.id();

    match configured.provider.send(request).await {
        Ok(id) => {
            debug!(provider_id, message_id = %id, "Provider accepted notification");
            Ok(ProviderSendResult {
                provider_id: provider_id.to_string(),
                id,
            })
        }
        Err(error) => {
            warn!(provider_id, error = %error, "Provider failed to send notification");
            let channel = error.channel().unwrap_or_else(|| request.channel());
            Err(error.with_provider_id(provider_id).with_channel(channel))
        }
    }
}

/// Try providers in the given order until one succeeds; the last failure is
/// returned when all fail.
pub(crate) async fn send_in_order<'a, I>(
    providers: I,
    request: &ChannelRequest,
) -> Result<ProviderSendResult, ProviderError>
where
    I: IntoIterator<Item = &'a ConfiguredProvider>,
{
    let mut last_error = None;

    for configured in providers {
        match try_provider(configured, request).await {
            Ok(result) => return Ok(result),
            Err(error) => last_error = Some(error),
        }
    }

    Err(last_error.unwrap_or_else(|| ProviderError::provider("no providers available")))
}

use super::{try_provider, ConfiguredProvider, Strategy};
use async_trait::async_trait;
use notification_common::{ChannelRequest, ConfigurationError, ProviderError, ProviderSendResult};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tracing::debug;

/// Source of uniform draws in `[0, 1)` for weighted selection
pub trait RandomSource: Send + Sync {
    fn next_f64(&self) -> f64;
}

/// Draws from the thread-local RNG
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_f64(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }
}

/// Reproducible draws from a seeded RNG
#[derive(Debug)]
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_f64(&self) -> f64 {
        self.rng.lock().gen::<f64>()
    }
}

#[derive(Debug, Clone)]
struct WeightedEntry {
    provider: ConfiguredProvider,
    weight: f64,
}

/// Pick a provider with probability proportional to its weight; on failure
/// remove it and pick again from the rest.
///
/// Zero-weight providers are only used once every positive-weight provider
/// has failed, in configured order.
pub struct WeightedStrategy {
    entries: Vec<WeightedEntry>,
    random: Arc<dyn RandomSource>,
}

impl std::fmt::Debug for WeightedStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeightedStrategy")
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

impl WeightedStrategy {
    pub fn new(providers: Vec<ConfiguredProvider>) -> Result<Self, ConfigurationError> {
        Self::with_random(providers, Arc::new(ThreadRandom))
    }

    pub fn with_random(
        providers: Vec<ConfiguredProvider>,
        random: Arc<dyn RandomSource>,
    ) -> Result<Self, ConfigurationError> {
        if providers.is_empty() {
            return Err(ConfigurationError::EmptyProviders {
                strategy: "weighted",
            });
        }

        let entries = providers
            .into_iter()
            .map(|provider| match provider.weight {
                None => Err(ConfigurationError::MissingWeight {
                    provider_id: provider.id().to_string(),
                }),
                Some(weight) if !weight.is_finite() || weight < 0.0 => {
                    Err(ConfigurationError::InvalidWeight {
                        provider_id: provider.id().to_string(),
                        weight,
                    })
                }
                Some(weight) => Ok(WeightedEntry { provider, weight }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { entries, random })
    }

    /// Index into `pool` of the provider to try next
    fn select(&self, pool: &[&WeightedEntry]) -> usize {
        let largest = pool
            .iter()
            .map(|entry| entry.weight)
            .fold(0.0_f64, f64::max);

        // Nothing left with positive weight: first remaining in configured order
        if largest <= 0.0 {
            return 0;
        }

        // Scaled by the largest weight so the sum stays finite
        let total: f64 = pool
            .iter()
            .filter(|entry| entry.weight > 0.0)
            .map(|entry| entry.weight / largest)
            .sum();

        let target = self.random.next_f64().clamp(0.0, 1.0) * total;
        let mut cumulative = 0.0;
        let mut last_positive = 0;

        for (index, entry) in pool.iter().enumerate() {
            if entry.weight <= 0.0 {
                continue;
            }
            cumulative += entry.weight / largest;
            last_positive = index;
            if cumulative > target {
                return index;
            }
        }

        // Only reachable when the draw lands exactly on the total
        last_positive
    }
}

#[async_trait]
impl Strategy for WeightedStrategy {
    fn name(&self) -> &'static str {
        "weighted"
    }

    async fn send(&self, request: &ChannelRequest) -> Result<ProviderSendResult, ProviderError> {
        let mut pool: Vec<&WeightedEntry> = self.entries.iter().collect();
        let mut last_error = None;

        while !pool.is_empty() {
            let index = self.select(&pool);
            let entry = pool.remove(index);
            debug!(
                provider_id = entry.provider.id(),
                weight = entry.weight,
                remaining = pool.len(),
                "Weighted strategy selected provider"
            );

            match try_provider(&entry.provider, request).await {
                Ok(result) => return Ok(result),
                Err(error) => last_error = Some(error),
            }
        }

        Err(last_error.unwrap_or_else(|| ProviderError::provider("no providers available")))
    }
}

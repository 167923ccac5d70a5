use super::{try_provider, ConfiguredProvider, Strategy};
use async_trait::async_trait;
use notification_common::{ChannelRequest, ConfigurationError, ProviderError, ProviderSendResult};

/// Send through exactly one provider, never retrying across providers
#[derive(Debug, Clone)]
pub struct NoFallbackStrategy {
    provider: ConfiguredProvider,
}

impl NoFallbackStrategy {
    pub fn new(mut providers: Vec<ConfiguredProvider>) -> Result<Self, ConfigurationError> {
        if providers.len() != 1 {
            return Err(ConfigurationError::WrongProviderCount {
                strategy: "no-fallback",
                expected: 1,
                actual: providers.len(),
            });
        }

        match providers.pop() {
            Some(provider) => Ok(Self { provider }),
            None => Err(ConfigurationError::EmptyProviders {
                strategy: "no-fallback",
            }),
        }
    }
}

#[async_trait]
impl Strategy for NoFallbackStrategy {
    fn name(&self) -> &'static str {
        "no-fallback"
    }

    async fn send(&self, request: &ChannelRequest) -> Result<ProviderSendResult, ProviderError> {
        try_provider(&self.provider, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utilities::{sms_request, ScriptedProvider};

    #[test]
    fn test_rejects_zero_or_many_providers() {
        let err = NoFallbackStrategy::new(Vec::new()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "no-fallback strategy requires exactly 1 provider(s), got 0"
        );

        let err = NoFallbackStrategy::new(vec![
            ConfiguredProvider::new(ScriptedProvider::succeeding("a")),
            ConfiguredProvider::new(ScriptedProvider::succeeding("b")),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::WrongProviderCount {
                expected: 1,
                actual: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_success_passes_through() {
        let provider = ScriptedProvider::succeeding("sms-only");
        let strategy =
            NoFallbackStrategy::new(vec![ConfiguredProvider::new(provider.clone())]).unwrap();

        let result = tokio_test::block_on(strategy.send(&sms_request())).unwrap();
        assert_eq!(result.provider_id, "sms-only");
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_is_attributed_and_not_retried() {
        let provider = ScriptedProvider::failing("sms-only", "invalid number");
        let strategy =
            NoFallbackStrategy::new(vec![ConfiguredProvider::new(provider.clone())]).unwrap();

        let err = strategy.send(&sms_request()).await.unwrap_err();
        assert_eq!(err.provider_id(), Some("sms-only"));
        assert_eq!(err.to_string(), "invalid number");
        assert_eq!(provider.calls(), 1);
    }
}

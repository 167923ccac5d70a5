use super::{send_in_order, ConfiguredProvider, Strategy};
use async_trait::async_trait;
use notification_common::{ChannelRequest, ConfigurationError, ProviderError, ProviderSendResult};

/// Try providers in configured order until one succeeds
#[derive(Debug, Clone)]
pub struct FallbackStrategy {
    providers: Vec<ConfiguredProvider>,
}

impl FallbackStrategy {
    pub fn new(providers: Vec<ConfiguredProvider>) -> Result<Self, ConfigurationError> {
        if providers.is_empty() {
            return Err(ConfigurationError::EmptyProviders {
                strategy: "fallback",
            });
        }
        Ok(Self { providers })
    }
}

#[async_trait]
impl Strategy for FallbackStrategy {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn send(&self, request: &ChannelRequest) -> Result<ProviderSendResult, ProviderError> {
        send_in_order(&self.providers, request).await
    }
}

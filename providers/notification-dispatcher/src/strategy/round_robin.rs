use super::{send_in_order, ConfiguredProvider, Strategy};
use async_trait::async_trait;
use notification_common::{ChannelRequest, ConfigurationError, ProviderError, ProviderSendResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Rotate the primary provider on every send, then fall back in rotated order.
///
/// The rotation advances before the first send, so with `[A, B, C]` the
/// primaries are `B, C, A, B, ...`. Concurrent sends on one instance each
/// advance the rotation but are not otherwise coordinated.
#[derive(Debug)]
pub struct RoundRobinStrategy {
    providers: Vec<ConfiguredProvider>,
    /// Rotation offset used by the previous send
    offset: AtomicUsize,
}

impl RoundRobinStrategy {
    pub fn new(providers: Vec<ConfiguredProvider>) -> Result<Self, ConfigurationError> {
        if providers.is_empty() {
            return Err(ConfigurationError::EmptyProviders {
                strategy: "roundrobin",
            });
        }
        Ok(Self {
            providers,
            offset: AtomicUsize::new(0),
        })
    }

    /// Advance the rotation by one and return the new offset
    fn advance(&self) -> usize {
        let len = self.providers.len();
        let previous = self
            .offset
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |offset| {
                Some((offset + 1) % len)
            })
            .unwrap_or_else(|offset| offset);
        (previous + 1) % len
    }

    fn rotated(&self, offset: usize) -> impl Iterator<Item = &ConfiguredProvider> + '_ {
        let len = self.providers.len();
        (0..len).map(move |i| &self.providers[(offset + i) % len])
    }
}

#[async_trait]
impl Strategy for RoundRobinStrategy {
    fn name(&self) -> &'static str {
        "roundrobin"
    }

    async fn send(&self, request: &ChannelRequest) -> Result<ProviderSendResult, ProviderError> {
        let offset = self.advance();
        debug!(
            primary = self.providers[offset].id(),
            "Round-robin selected primary provider"
        );
        send_in_order(self.rotated(offset), request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utilities::{sms_request, CallLog, ScriptedProvider};

    #[test]
    fn test_requires_at_least_one_provider() {
        let err = RoundRobinStrategy::new(Vec::new()).unwrap_err();
        assert_eq!(err.error_code(), "EMPTY_PROVIDERS");
    }

    #[tokio::test]
    async fn test_primary_rotates_before_first_send() {
        let strategy = RoundRobinStrategy::new(vec![
            ConfiguredProvider::new(ScriptedProvider::succeeding("A")),
            ConfiguredProvider::new(ScriptedProvider::succeeding("B")),
            ConfiguredProvider::new(ScriptedProvider::succeeding("C")),
        ])
        .unwrap();

        let mut primaries = Vec::new();
        for _ in 0..4 {
            primaries.push(strategy.send(&sms_request()).await.unwrap().provider_id);
        }

        assert_eq!(primaries, vec!["B", "C", "A", "B"]);
    }

    #[tokio::test]
    async fn test_failure_falls_back_in_rotated_order() {
        let log = CallLog::default();
        let strategy = RoundRobinStrategy::new(vec![
            ConfiguredProvider::new(ScriptedProvider::succeeding("A").with_log(log.clone())),
            ConfiguredProvider::new(ScriptedProvider::failing("B", "B down").with_log(log.clone())),
            ConfiguredProvider::new(ScriptedProvider::failing("C", "C down").with_log(log.clone())),
        ])
        .unwrap();

        // Rotated order for the first send is B, C, A
        let result = strategy.send(&sms_request()).await.unwrap();
        assert_eq!(result.provider_id, "A");
        assert_eq!(log.calls(), vec!["B", "C", "A"]);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_last_in_rotated_order() {
        let strategy = RoundRobinStrategy::new(vec![
            ConfiguredProvider::new(ScriptedProvider::failing("A", "A down")),
            ConfiguredProvider::new(ScriptedProvider::failing("B", "B down")),
        ])
        .unwrap();

        // First send rotates to B, A
        let err = strategy.send(&sms_request()).await.unwrap_err();
        assert_eq!(err.provider_id(), Some("A"));
        assert_eq!(err.to_string(), "A down");

        // Second send rotates back to A, B
        let err = strategy.send(&sms_request()).await.unwrap_err();
        assert_eq!(err.provider_id(), Some("B"));
    }

    #[tokio::test]
    async fn test_single_provider_is_always_primary() {
        let strategy =
            RoundRobinStrategy::new(vec![ConfiguredProvider::new(ScriptedProvider::succeeding("only"))])
                .unwrap();

        for _ in 0..3 {
            assert_eq!(strategy.send(&sms_request()).await.unwrap().provider_id, "only");
        }
    }
}

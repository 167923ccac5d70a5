//! Multi-channel fan-out
//!
//! The [`Sender`] owns one strategy per channel. A send merges the request's
//! top-level metadata into each channel request, runs every channel
//! concurrently and folds the outcomes into a [`NotificationStatus`].
//! Provider and strategy failures never escape as errors; they are recorded
//! per channel.

use crate::strategy::{
    build_strategy, ConfiguredProvider, RandomSource, Strategy, StrategyKind, StrategySpec,
    ThreadRandom,
};
use futures::future::join_all;
use notification_common::{
    ChannelRequest, ChannelStatus, ConfigurationError, LoggerProvider, NotificationChannel,
    NotificationRequest, NotificationStatus, ProviderError, ProviderSendResult,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Strategy and providers configured for one channel
#[derive(Debug, Clone, Default)]
pub struct ChannelConfig {
    pub strategy: StrategySpec,
    pub providers: Vec<ConfiguredProvider>,
}

impl ChannelConfig {
    pub fn new(strategy: impl Into<StrategySpec>, providers: Vec<ConfiguredProvider>) -> Self {
        Self {
            strategy: strategy.into(),
            providers,
        }
    }
}

/// Errors raised for structurally invalid requests
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    #[error("invalid request: channel \"{key}\" carries a {payload} payload")]
    InvalidRequest {
        key: NotificationChannel,
        payload: NotificationChannel,
    },
}

/// Dispatches notification requests across channels
#[derive(Clone)]
pub struct Sender {
    strategies: BTreeMap<NotificationChannel, Arc<dyn Strategy>>,
}

impl std::fmt::Debug for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let strategies: BTreeMap<_, _> = self
            .strategies
            .iter()
            .map(|(channel, strategy)| (*channel, strategy.name()))
            .collect();
        f.debug_struct("Sender")
            .field("strategies", &strategies)
            .finish()
    }
}

impl Sender {
    pub fn new(
        channels: BTreeMap<NotificationChannel, ChannelConfig>,
    ) -> Result<Self, ConfigurationError> {
        Self::with_random(channels, Arc::new(ThreadRandom))
    }

    /// Build a sender whose weighted strategies draw from `random`.
    ///
    /// Every known channel gets a strategy. Channels without providers are
    /// served by a [`LoggerProvider`] under the fallback strategy, whatever
    /// strategy they were configured with.
    pub fn with_random(
        mut channels: BTreeMap<NotificationChannel, ChannelConfig>,
        random: Arc<dyn RandomSource>,
    ) -> Result<Self, ConfigurationError> {
        let mut strategies = BTreeMap::new();

        for channel in NotificationChannel::ALL {
            let ChannelConfig {
                mut strategy,
                mut providers,
            } = channels.remove(&channel).unwrap_or_default();

            if providers.is_empty() {
                warn!(
                    channel = %channel,
                    "No provider registered for channel \"{}\", using logger", channel
                );
                strategy = StrategySpec::Builtin(StrategyKind::Fallback);
                providers.push(
                    ConfiguredProvider::new(LoggerProvider::new(channel)).with_weight(1.0),
                );
            }

            let built = build_strategy(&strategy, providers, random.clone())?;
            debug!(channel = %channel, strategy = built.name(), "Channel strategy ready");
            strategies.insert(channel, built);
        }

        Ok(Self { strategies })
    }

    /// Send every channel in `request` concurrently and collect the outcome
    pub async fn send(&self, request: &NotificationRequest) -> Result<NotificationStatus, SendError> {
        for (key, channel_request) in &request.channels {
            let payload = channel_request.channel();
            if payload != *key {
                return Err(SendError::InvalidRequest { key: *key, payload });
            }
        }

        let sends = request
            .channels
            .iter()
            .filter_map(|(channel, channel_request)| {
                let strategy = self.strategies.get(channel)?.clone();
                let merged = channel_request
                    .clone()
                    .with_metadata_defaults(request.id.as_deref(), request.user_id.as_deref());
                Some(send_channel(*channel, strategy, merged))
            });

        let outcomes = join_all(sends).await;

        let mut channels = BTreeMap::new();
        let mut errors = BTreeMap::new();

        for (channel, outcome) in outcomes {
            match outcome {
                Ok(result) => {
                    channels.insert(
                        channel,
                        ChannelStatus {
                            id: Some(result.id),
                            provider_id: Some(result.provider_id),
                        },
                    );
                }
                Err(error) => {
                    channels.insert(
                        channel,
                        ChannelStatus {
                            id: None,
                            provider_id: error.provider_id().map(str::to_string),
                        },
                    );
                    errors.insert(channel, error.to_string());
                }
            }
        }

        Ok(NotificationStatus::from_parts(channels, errors))
    }
}

async fn send_channel(
    channel: NotificationChannel,
    strategy: Arc<dyn Strategy>,
    request: ChannelRequest,
) -> (NotificationChannel, Result<ProviderSendResult, ProviderError>) {
    let outcome = strategy.send(&request).await;
    match &outcome {
        Ok(result) => info!(
            channel = %channel,
            provider_id = %result.provider_id,
            message_id = %result.id,
            "Notification sent"
        ),
        Err(error) => warn!(
            channel = %channel,
            provider_id = error.provider_id().unwrap_or("-"),
            error = %error,
            "Channel delivery failed"
        ),
    }
    (channel, outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utilities::{sms_request, CallLog, ScriptedProvider};
    use async_trait::async_trait;
    use notification_common::{EmailRequest, Provider, PushRequest, SendStatus, SmsRequest};
    use parking_lot::Mutex;
    use std::time::Duration;

    fn email() -> EmailRequest {
        EmailRequest {
            from: "alerts@ekko.test".to_string(),
            to: "user@ekko.test".to_string(),
            subject: "Balance alert".to_string(),
            text: Some("Balance below threshold".to_string()),
            ..Default::default()
        }
    }

    fn sms() -> SmsRequest {
        SmsRequest {
            from: "Ekko".to_string(),
            to: "+15555550100".to_string(),
            text: "Balance below threshold".to_string(),
            ..Default::default()
        }
    }

    fn channel(providers: Vec<ScriptedProvider>) -> ChannelConfig {
        ChannelConfig::new(
            StrategyKind::Fallback,
            providers.into_iter().map(ConfiguredProvider::new).collect(),
        )
    }

    /// Records the (id, user_id) of every request it receives
    #[derive(Clone, Default)]
    struct CapturingProvider {
        seen: Arc<Mutex<Vec<(Option<String>, Option<String>)>>>,
    }

    #[async_trait]
    impl Provider for CapturingProvider {
        fn id(&self) -> &str {
            "capturing"
        }

        async fn send(&self, request: &ChannelRequest) -> Result<String, ProviderError> {
            self.seen
                .lock()
                .push((request.id.clone(), request.user_id.clone()));
            Ok("captured".to_string())
        }
    }

    struct SlowProvider {
        id: String,
        delay: Duration,
    }

    #[async_trait]
    impl Provider for SlowProvider {
        fn id(&self) -> &str {
            &self.id
        }

        async fn send(&self, _request: &ChannelRequest) -> Result<String, ProviderError> {
            tokio::time::sleep(self.delay).await;
            Ok(format!("{}-done", self.id))
        }
    }

    #[tokio::test]
    async fn test_partial_failure_is_reported_per_channel() {
        let mut channels = BTreeMap::new();
        channels.insert(
            NotificationChannel::Sms,
            channel(vec![ScriptedProvider::succeeding("sms-ok")]),
        );
        channels.insert(
            NotificationChannel::Email,
            channel(vec![ScriptedProvider::failing("email-down", "smtp refused")]),
        );
        let sender = Sender::new(channels).unwrap();

        let request = NotificationRequest::new().with_sms(sms()).with_email(email());
        let status = sender.send(&request).await.unwrap();

        assert_eq!(status.status, SendStatus::Error);
        let sms_status = status.channel(NotificationChannel::Sms).unwrap();
        assert_eq!(sms_status.provider_id.as_deref(), Some("sms-ok"));
        assert!(sms_status.id.as_deref().unwrap().starts_with("sms-ok-"));

        assert_eq!(
            status.channel(NotificationChannel::Email),
            Some(&ChannelStatus {
                id: None,
                provider_id: Some("email-down".to_string())
            })
        );
        assert_eq!(status.error(NotificationChannel::Email), Some("smtp refused"));
        assert_eq!(status.error(NotificationChannel::Sms), None);
    }

    #[tokio::test]
    async fn test_all_channels_succeeding_reports_success() {
        let mut channels = BTreeMap::new();
        channels.insert(
            NotificationChannel::Sms,
            channel(vec![
                ScriptedProvider::failing("sms-a", "down"),
                ScriptedProvider::succeeding("sms-b"),
            ]),
        );
        let sender = Sender::new(channels).unwrap();

        let status = sender
            .send(&NotificationRequest::new().with_sms(sms()))
            .await
            .unwrap();

        assert!(status.is_success());
        assert!(status.errors.is_none());
        assert_eq!(
            status
                .channel(NotificationChannel::Sms)
                .and_then(|c| c.provider_id.as_deref()),
            Some("sms-b")
        );
    }

    #[tokio::test]
    async fn test_only_requested_channels_are_sent() {
        let log = CallLog::default();
        let mut channels = BTreeMap::new();
        channels.insert(
            NotificationChannel::Sms,
            channel(vec![ScriptedProvider::succeeding("sms").with_log(log.clone())]),
        );
        channels.insert(
            NotificationChannel::Email,
            channel(vec![ScriptedProvider::succeeding("email").with_log(log.clone())]),
        );
        let sender = Sender::new(channels).unwrap();

        let status = sender
            .send(&NotificationRequest::new().with_email(email()))
            .await
            .unwrap();

        assert_eq!(log.calls(), vec!["email"]);
        assert_eq!(status.channels.as_ref().map(BTreeMap::len), Some(1));
    }

    #[tokio::test]
    async fn test_unconfigured_channel_uses_logger_provider() {
        let sender = Sender::new(BTreeMap::new()).unwrap();

        let status = sender
            .send(&NotificationRequest::new().with_push(PushRequest {
                registration_token: "token".to_string(),
                title: "Alert".to_string(),
                body: "Balance below threshold".to_string(),
                ..Default::default()
            }))
            .await
            .unwrap();

        let push = status.channel(NotificationChannel::Push).unwrap();
        assert_eq!(push.provider_id.as_deref(), Some("push-logger-provider"));
        assert!(push.id.as_deref().unwrap().starts_with("id-"));
    }

    #[tokio::test]
    async fn test_channel_without_providers_ignores_configured_strategy() {
        let mut channels = BTreeMap::new();
        channels.insert(
            NotificationChannel::Slack,
            ChannelConfig::new(
                StrategySpec::custom(|_| Err(ConfigurationError::Invalid("unused".to_string()))),
                Vec::new(),
            ),
        );
        channels.insert(
            NotificationChannel::Voice,
            ChannelConfig::new(StrategyKind::RoundRobin, Vec::new()),
        );
        let sender = format!("{:?}", Sender::new(channels).unwrap());

        assert!(sender.contains("Slack: \"fallback\""));
        assert!(sender.contains("Voice: \"fallback\""));
        assert!(sender.contains("Email: \"fallback\""));
    }

    #[tokio::test]
    async fn test_top_level_metadata_fills_channel_requests() {
        let capturing = CapturingProvider::default();
        let mut channels = BTreeMap::new();
        channels.insert(
            NotificationChannel::Sms,
            ChannelConfig::new(
                StrategyKind::NoFallback,
                vec![ConfiguredProvider::new(capturing.clone())],
            ),
        );
        let sender = Sender::new(channels).unwrap();

        let request = NotificationRequest::new()
            .with_id("notif-1")
            .with_user_id("user-1")
            .with_sms(sms());
        sender.send(&request).await.unwrap();

        let mut own = sms_request();
        own.id = Some("sms-specific".to_string());
        let request = NotificationRequest::new()
            .with_id("notif-2")
            .with_user_id("user-2")
            .with_request(own);
        sender.send(&request).await.unwrap();

        assert_eq!(
            capturing.seen.lock().clone(),
            vec![
                (Some("notif-1".to_string()), Some("user-1".to_string())),
                (Some("sms-specific".to_string()), Some("user-2".to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn test_mismatched_channel_payload_is_rejected() {
        let sender = Sender::new(BTreeMap::new()).unwrap();
        let request =
            NotificationRequest::new().with_channel_request(NotificationChannel::Email, sms_request());

        let err = sender.send(&request).await.unwrap_err();
        assert_eq!(
            err,
            SendError::InvalidRequest {
                key: NotificationChannel::Email,
                payload: NotificationChannel::Sms,
            }
        );
    }

    #[tokio::test]
    async fn test_empty_request_is_success_without_maps() {
        let sender = Sender::new(BTreeMap::new()).unwrap();
        let status = sender.send(&NotificationRequest::new()).await.unwrap();

        assert!(status.is_success());
        assert!(status.channels.is_none());
        assert!(status.errors.is_none());
    }

    #[test]
    fn test_strategy_configuration_errors_surface_at_construction() {
        let mut channels = BTreeMap::new();
        channels.insert(
            NotificationChannel::Sms,
            ChannelConfig::new(
                StrategyKind::NoFallback,
                vec![
                    ConfiguredProvider::new(ScriptedProvider::succeeding("a")),
                    ConfiguredProvider::new(ScriptedProvider::succeeding("b")),
                ],
            ),
        );

        let err = Sender::new(channels).unwrap_err();
        assert_eq!(err.error_code(), "WRONG_PROVIDER_COUNT");
    }

    #[tokio::test(start_paused = true)]
    async fn test_channels_are_sent_concurrently() {
        let mut channels = BTreeMap::new();
        for (channel, id) in [
            (NotificationChannel::Sms, "sms-slow"),
            (NotificationChannel::Email, "email-slow"),
        ] {
            channels.insert(
                channel,
                ChannelConfig::new(
                    StrategyKind::Fallback,
                    vec![ConfiguredProvider::new(SlowProvider {
                        id: id.to_string(),
                        delay: Duration::from_millis(500),
                    })],
                ),
            );
        }
        let sender = Sender::new(channels).unwrap();

        let start = tokio::time::Instant::now();
        let status = sender
            .send(&NotificationRequest::new().with_sms(sms()).with_email(email()))
            .await
            .unwrap();

        assert!(status.is_success());
        assert!(start.elapsed() < Duration::from_millis(1000));
    }
}

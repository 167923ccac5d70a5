//! Turns [`DispatcherConfig`] into live providers and a [`Sender`]

use crate::config::{DispatcherConfig, ProviderKind, ProviderSettings, WebhookSettings};
use crate::sender::{ChannelConfig, Sender};
use crate::strategy::{ConfiguredProvider, RandomSource, SeededRandom, ThreadRandom};
use crate::webhook::WebhookProvider;
use notification_common::{ConfigurationError, HttpExecutor, LoggerProvider, NotificationChannel};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

fn http_executor(timeout_ms: u64) -> Result<HttpExecutor, ConfigurationError> {
    HttpExecutor::with_timeout(Duration::from_millis(timeout_ms))
        .map_err(|e| ConfigurationError::Invalid(e.to_string()))
}

fn build_webhook(
    id: String,
    channel: NotificationChannel,
    settings: &WebhookSettings,
    shared_http: &HttpExecutor,
    signal: &CancellationToken,
) -> Result<WebhookProvider, ConfigurationError> {
    let http = match settings.timeout_ms {
        Some(timeout_ms) => http_executor(timeout_ms)?,
        None => shared_http.clone(),
    };

    let mut provider = WebhookProvider::new(id, channel, settings.url.clone(), http)
        .with_method(settings.method()?)
        .with_id_field(settings.id_field.clone())
        .with_retry(settings.retry.to_options())
        .with_signal(signal.clone());

    for (name, value) in &settings.headers {
        provider = provider.with_header(name.clone(), value.clone());
    }

    Ok(provider)
}

/// Build the provider at `index` of `channel`'s configured list.
///
/// Providers without an explicit id are named after their channel and kind.
pub fn build_provider(
    channel: NotificationChannel,
    index: usize,
    settings: &ProviderSettings,
    http: &HttpExecutor,
    signal: &CancellationToken,
) -> Result<ConfiguredProvider, ConfigurationError> {
    let configured = match &settings.kind {
        ProviderKind::Logger => {
            let provider = match &settings.id {
                Some(id) => LoggerProvider::with_id(id.clone(), channel),
                None => LoggerProvider::new(channel),
            };
            ConfiguredProvider::new(provider)
        }
        ProviderKind::Webhook(webhook) => {
            let id = settings
                .id
                .clone()
                .unwrap_or_else(|| format!("{}-webhook-provider-{}", channel, index));
            ConfiguredProvider::new(build_webhook(id, channel, webhook, http, signal)?)
        }
    };

    Ok(match settings.weight {
        Some(weight) => configured.with_weight(weight),
        None => configured,
    })
}

/// Validate `config` and build a sender from it.
///
/// `signal` is handed to every network provider so in-flight requests and
/// retry delays stop when it is cancelled.
pub fn build_sender(
    config: &DispatcherConfig,
    signal: CancellationToken,
) -> Result<Sender, ConfigurationError> {
    config.validate()?;

    let http = http_executor(config.http_timeout_ms)?;
    let mut channels = BTreeMap::new();

    for (channel, settings) in &config.channels {
        let providers = settings
            .providers
            .iter()
            .enumerate()
            .map(|(index, provider)| build_provider(*channel, index, provider, &http, &signal))
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            channel = %channel,
            strategy = %settings.multi_provider_strategy,
            providers = providers.len(),
            "Configured channel"
        );

        channels.insert(
            *channel,
            ChannelConfig::new(settings.multi_provider_strategy, providers),
        );
    }

    let random: Arc<dyn RandomSource> = match config.random_seed {
        Some(seed) => Arc::new(SeededRandom::new(seed)),
        None => Arc::new(ThreadRandom),
    };

    Sender::with_random(channels, random)
}

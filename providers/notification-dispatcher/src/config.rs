use crate::strategy::StrategyKind;
use config::{Config, ConfigError, Environment, File, FileFormat};
use notification_common::{ConfigurationError, NotificationChannel, RetryConfig};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::env;
use url::Url;

/// Dispatcher configuration: which providers serve each channel and how
/// they are combined
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    pub channels: BTreeMap<NotificationChannel, ChannelSettings>,
    /// Seed for weighted selection; unseeded when absent
    pub random_seed: Option<u64>,
    /// Request timeout for webhook providers without their own
    pub http_timeout_ms: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            channels: BTreeMap::new(),
            random_seed: None,
            http_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelSettings {
    pub multi_provider_strategy: StrategyKind,
    pub providers: Vec<ProviderSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(flatten)]
    pub kind: ProviderKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderKind {
    Logger,
    Webhook(WebhookSettings),
}

/// HTTP endpoint receiving the channel request as JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookSettings {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Response JSON field holding the message id
    #[serde(default = "default_id_field")]
    pub id_field: String,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_method() -> String {
    "POST".to_string()
}

fn default_id_field() -> String {
    "id".to_string()
}

impl WebhookSettings {
    pub fn method(&self) -> Result<Method, ConfigurationError> {
        Method::from_bytes(self.method.to_uppercase().as_bytes()).map_err(|_| {
            ConfigurationError::Invalid(format!("invalid HTTP method: {}", self.method))
        })
    }
}

impl DispatcherConfig {
    /// Load from an optional file at `DISPATCHER_CONFIG_PATH`, then
    /// `DISPATCHER_*` environment variables (`__` separates nested keys)
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut builder = Config::builder().set_default("http_timeout_ms", 30_000)?;

        if let Ok(config_path) = env::var("DISPATCHER_CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path));
        }

        builder = builder.add_source(
            Environment::with_prefix("DISPATCHER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Create configuration from a flat properties map with dotted keys,
    /// e.g. `channels.sms.multi_provider_strategy`
    pub fn from_properties(props: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().set_default("http_timeout_ms", 30_000)?;

        for (key, value) in props {
            builder = builder.set_override(key.as_str(), value.as_str())?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("http_timeout_ms", 30_000)?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    /// Check everything that can be checked without building providers
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.http_timeout_ms == 0 {
            return Err(ConfigurationError::Invalid(
                "http_timeout_ms must be greater than 0".to_string(),
            ));
        }

        for (channel, settings) in &self.channels {
            for (index, provider) in settings.providers.iter().enumerate() {
                let provider_id = provider
                    .id
                    .clone()
                    .unwrap_or_else(|| format!("{}[{}]", channel, index));

                if let Some(weight) = provider.weight {
                    if !weight.is_finite() || weight < 0.0 {
                        return Err(ConfigurationError::InvalidWeight {
                            provider_id,
                            weight,
                        });
                    }
                }

                if let ProviderKind::Webhook(webhook) = &provider.kind {
                    validate_webhook(channel, &provider_id, webhook)?;
                }
            }
        }

        Ok(())
    }
}

fn validate_webhook(
    channel: &NotificationChannel,
    provider_id: &str,
    webhook: &WebhookSettings,
) -> Result<(), ConfigurationError> {
    let invalid = |reason: String| {
        ConfigurationError::Invalid(format!("{} provider {}: {}", channel, provider_id, reason))
    };

    match Url::parse(&webhook.url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => return Err(invalid(format!("unsupported URL scheme: {}", url.scheme()))),
        Err(e) => return Err(invalid(format!("invalid URL \"{}\": {}", webhook.url, e))),
    }

    webhook.method()?;

    if webhook.timeout_ms == Some(0) {
        return Err(invalid("timeout_ms must be greater than 0".to_string()));
    }

    webhook.retry.validate().map_err(invalid)?;

    if webhook.id_field.is_empty() {
        return Err(invalid("id_field must not be empty".to_string()));
    }

    Ok(())
}

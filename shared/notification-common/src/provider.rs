//! Common provider interface
//!
//! This module defines the interface every notification provider implements,
//! plus the logging provider used when a channel has nothing configured.

use crate::error::ProviderError;
use crate::payloads::ChannelRequest;
use crate::NotificationChannel;
use async_trait::async_trait;
use tracing::info;

/// A single backend able to deliver one channel's requests
#[async_trait]
pub trait Provider: Send + Sync {
    /// Identity used for attribution in results and errors
    fn id(&self) -> &str;

    /// Send the request, returning the provider's message id
    async fn send(&self, request: &ChannelRequest) -> Result<String, ProviderError>;
}

/// Provider that only logs the request
#[derive(Debug, Clone)]
pub struct LoggerProvider {
    id: String,
    channel: NotificationChannel,
}

impl LoggerProvider {
    /// Logger with the default id `<channel>-logger-provider`
    pub fn new(channel: NotificationChannel) -> Self {
        Self::with_id(format!("{}-logger-provider", channel.as_str()), channel)
    }

    pub fn with_id(id: impl Into<String>, channel: NotificationChannel) -> Self {
        Self {
            id: id.into(),
            channel,
        }
    }
}

#[async_trait]
impl Provider for LoggerProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send(&self, request: &ChannelRequest) -> Result<String, ProviderError> {
        let payload = request.customized_payload(&self.id).await?;
        let message_id = format!("id-{}", uuid::Uuid::new_v4());

        info!(
            provider_id = %self.id,
            channel = %self.channel,
            notification_id = request.id.as_deref().unwrap_or("-"),
            user_id = request.user_id.as_deref().unwrap_or("-"),
            message_id = %message_id,
            "[{}] Sent by \"{}\": {:?}",
            self.channel.as_str().to_uppercase(),
            self.id,
            payload
        );

        Ok(message_id)
    }
}

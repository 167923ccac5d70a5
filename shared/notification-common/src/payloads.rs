//! Notification payload structures
//!
//! This module defines the channel-specific payloads carried by a
//! [`NotificationRequest`], the per-channel [`ChannelRequest`] envelope handed to
//! strategies and providers, and the optional `customize` hook providers run
//! before transmission.

use crate::error::{BoxError, ErrorCode, ProviderError};
use crate::NotificationChannel;
use futures::future::BoxFuture;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Email payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailRequest {
    pub from: String,
    pub to: String,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bcc: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
}

/// SMS payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsRequest {
    pub from: String,
    pub to: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<SmsType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmsType {
    Text,
    Unicode,
}

/// Mobile push payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRequest {
    pub registration_token: String,
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub custom: HashMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
}

/// Voice call payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceRequest {
    pub from: String,
    pub to: String,
    /// URL of the TwiML-like document describing the call
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_callback: Option<String>,
}

/// Browser push subscription keys
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebpushKeys {
    pub auth: String,
    pub p256dh: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebpushSubscription {
    pub endpoint: String,
    pub keys: WebpushKeys,
}

/// Browser push payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebpushRequest {
    pub subscription: WebpushSubscription,
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
}

/// Slack payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlackRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    pub text: String,
}

/// WhatsApp payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatsappRequest {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_name: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub template_data: HashMap<String, serde_json::Value>,
}

/// Telegram payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramRequest {
    pub chat_id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<String>,
    #[serde(default)]
    pub disable_notification: bool,
}

/// Channel-specific payload, opaque to the strategy layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChannelPayload {
    Email(EmailRequest),
    Sms(SmsRequest),
    Push(PushRequest),
    Voice(VoiceRequest),
    Webpush(WebpushRequest),
    Slack(SlackRequest),
    Whatsapp(WhatsappRequest),
    Telegram(TelegramRequest),
}

impl ChannelPayload {
    /// The channel this payload belongs to
    pub fn channel(&self) -> NotificationChannel {
        match self {
            ChannelPayload::Email(_) => NotificationChannel::Email,
            ChannelPayload::Sms(_) => NotificationChannel::Sms,
            ChannelPayload::Push(_) => NotificationChannel::Push,
            ChannelPayload::Voice(_) => NotificationChannel::Voice,
            ChannelPayload::Webpush(_) => NotificationChannel::Webpush,
            ChannelPayload::Slack(_) => NotificationChannel::Slack,
            ChannelPayload::Whatsapp(_) => NotificationChannel::Whatsapp,
            ChannelPayload::Telegram(_) => NotificationChannel::Telegram,
        }
    }

    /// Decode a JSON document as the payload of `channel`
    pub fn from_value(
        channel: NotificationChannel,
        value: serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        Ok(match channel {
            NotificationChannel::Email => ChannelPayload::Email(serde_json::from_value(value)?),
            NotificationChannel::Sms => ChannelPayload::Sms(serde_json::from_value(value)?),
            NotificationChannel::Push => ChannelPayload::Push(serde_json::from_value(value)?),
            NotificationChannel::Voice => ChannelPayload::Voice(serde_json::from_value(value)?),
            NotificationChannel::Webpush => {
                ChannelPayload::Webpush(serde_json::from_value(value)?)
            }
            NotificationChannel::Slack => ChannelPayload::Slack(serde_json::from_value(value)?),
            NotificationChannel::Whatsapp => {
                ChannelPayload::Whatsapp(serde_json::from_value(value)?)
            }
            NotificationChannel::Telegram => {
                ChannelPayload::Telegram(serde_json::from_value(value)?)
            }
        })
    }
}

macro_rules! impl_payload_from {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for ChannelPayload {
                fn from(request: $ty) -> Self {
                    ChannelPayload::$variant(request)
                }
            }
        )*
    };
}

impl_payload_from! {
    Email => EmailRequest,
    Sms => SmsRequest,
    Push => PushRequest,
    Voice => VoiceRequest,
    Webpush => WebpushRequest,
    Slack => SlackRequest,
    Whatsapp => WhatsappRequest,
    Telegram => TelegramRequest,
}

/// Signature of the per-request customization hook
pub type CustomizeFn = dyn Fn(&str, ChannelPayload) -> BoxFuture<'static, Result<ChannelPayload, BoxError>>
    + Send
    + Sync;

/// Hook a provider may run to rewrite the payload for itself
#[derive(Clone)]
pub struct Customizer(Arc<CustomizeFn>);

impl Customizer {
    pub fn new<F>(hook: F) -> Self
    where
        F: Fn(&str, ChannelPayload) -> BoxFuture<'static, Result<ChannelPayload, BoxError>>
            + Send
            + Sync
            + 'static,
    {
        Self(Arc::new(hook))
    }

    pub async fn apply(
        &self,
        provider_id: &str,
        payload: ChannelPayload,
    ) -> Result<ChannelPayload, BoxError> {
        (self.0)(provider_id, payload).await
    }
}

impl std::fmt::Debug for Customizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Customizer(..)")
    }
}

/// A single channel's share of a notification
#[derive(Debug, Clone)]
pub struct ChannelRequest {
    pub id: Option<String>,
    pub user_id: Option<String>,
    pub payload: ChannelPayload,
    pub customize: Option<Customizer>,
}

impl ChannelRequest {
    pub fn new(payload: impl Into<ChannelPayload>) -> Self {
        Self {
            id: None,
            user_id: None,
            payload: payload.into(),
            customize: None,
        }
    }

    pub fn with_customize(mut self, customizer: Customizer) -> Self {
        self.customize = Some(customizer);
        self
    }

    pub fn channel(&self) -> NotificationChannel {
        self.payload.channel()
    }

    /// Fill `id`/`user_id` from the enclosing request where the channel
    /// request does not set its own.
    pub fn with_metadata_defaults(mut self, id: Option<&str>, user_id: Option<&str>) -> Self {
        if self.id.is_none() {
            self.id = id.map(str::to_string);
        }
        if self.user_id.is_none() {
            self.user_id = user_id.map(str::to_string);
        }
        self
    }

    /// Payload to transmit for `provider_id`, after running the customize hook
    pub async fn customized_payload(&self, provider_id: &str) -> Result<ChannelPayload, ProviderError> {
        match &self.customize {
            None => Ok(self.payload.clone()),
            Some(customizer) => customizer
                .apply(provider_id, self.payload.clone())
                .await
                .map_err(|e| {
                    ProviderError::new(ErrorCode::Customize, format!("customize failed: {}", e))
                        .with_provider_id(provider_id)
                        .with_channel(self.channel())
                        .with_source(e)
                }),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelMetadata {
    id: Option<String>,
    user_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNotificationRequest {
    id: Option<String>,
    user_id: Option<String>,
    #[serde(flatten)]
    channels: BTreeMap<NotificationChannel, serde_json::Value>,
}

/// Multi-channel notification request handed to the sender
#[derive(Debug, Clone, Default)]
pub struct NotificationRequest {
    pub id: Option<String>,
    pub user_id: Option<String>,
    pub channels: BTreeMap<NotificationChannel, ChannelRequest>,
}

impl NotificationRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Add a channel request keyed by the channel its payload belongs to
    pub fn with_request(mut self, request: ChannelRequest) -> Self {
        self.channels.insert(request.channel(), request);
        self
    }

    /// Add a channel request under an explicit key.
    ///
    /// The sender rejects requests whose key and payload channel disagree.
    pub fn with_channel_request(mut self, channel: NotificationChannel, request: ChannelRequest) -> Self {
        self.channels.insert(channel, request);
        self
    }

    pub fn with_email(self, email: EmailRequest) -> Self {
        self.with_request(ChannelRequest::new(email))
    }

    pub fn with_sms(self, sms: SmsRequest) -> Self {
        self.with_request(ChannelRequest::new(sms))
    }

    pub fn with_push(self, push: PushRequest) -> Self {
        self.with_request(ChannelRequest::new(push))
    }

    pub fn with_voice(self, voice: VoiceRequest) -> Self {
        self.with_request(ChannelRequest::new(voice))
    }

    pub fn with_webpush(self, webpush: WebpushRequest) -> Self {
        self.with_request(ChannelRequest::new(webpush))
    }

    pub fn with_slack(self, slack: SlackRequest) -> Self {
        self.with_request(ChannelRequest::new(slack))
    }

    pub fn with_whatsapp(self, whatsapp: WhatsappRequest) -> Self {
        self.with_request(ChannelRequest::new(whatsapp))
    }

    pub fn with_telegram(self, telegram: TelegramRequest) -> Self {
        self.with_request(ChannelRequest::new(telegram))
    }
}

impl<'de> Deserialize<'de> for NotificationRequest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawNotificationRequest::deserialize(deserializer)?;
        let mut channels = BTreeMap::new();

        for (channel, value) in raw.channels {
            let metadata: ChannelMetadata =
                serde_json::from_value(value.clone()).map_err(serde::de::Error::custom)?;
            let payload = ChannelPayload::from_value(channel, value)
                .map_err(|e| serde::de::Error::custom(format!("invalid {} request: {}", channel, e)))?;

            channels.insert(
                channel,
                ChannelRequest {
                    id: metadata.id,
                    user_id: metadata.user_id,
                    payload,
                    customize: None,
                },
            );
        }

        Ok(Self {
            id: raw.id,
            user_id: raw.user_id,
            channels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use serde_json::json;

    #[test]
    fn test_request_deserializes_channels_by_key() {
        let request: NotificationRequest = serde_json::from_value(json!({
            "id": "notif-1",
            "userId": "user-42",
            "sms": { "from": "Ekko", "to": "+15555550100", "text": "hello" },
            "email": {
                "from": "noreply@example.com",
                "to": "user@example.com",
                "subject": "Hi",
                "html": "<b>hi</b>",
                "id": "email-override"
            }
        }))
        .unwrap();

        assert_eq!(request.id.as_deref(), Some("notif-1"));
        assert_eq!(request.user_id.as_deref(), Some("user-42"));
        assert_eq!(request.channels.len(), 2);

        let sms = &request.channels[&NotificationChannel::Sms];
        assert_eq!(sms.channel(), NotificationChannel::Sms);
        assert!(sms.id.is_none());

        let email = &request.channels[&NotificationChannel::Email];
        assert_eq!(email.id.as_deref(), Some("email-override"));
        match &email.payload {
            ChannelPayload::Email(e) => assert_eq!(e.subject, "Hi"),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_request_rejects_unknown_channel_and_bad_payload() {
        let unknown = serde_json::from_value::<NotificationRequest>(json!({
            "fax": { "to": "123" }
        }));
        assert!(unknown.is_err());

        let missing_field = serde_json::from_value::<NotificationRequest>(json!({
            "sms": { "from": "Ekko" }
        }));
        assert!(missing_field.is_err());
    }

    #[test]
    fn test_metadata_defaults_do_not_override_channel_values() {
        let mut request = ChannelRequest::new(SmsRequest::default());
        request.id = Some("channel-id".to_string());

        let merged = request.with_metadata_defaults(Some("top-id"), Some("top-user"));
        assert_eq!(merged.id.as_deref(), Some("channel-id"));
        assert_eq!(merged.user_id.as_deref(), Some("top-user"));
    }

    #[tokio::test]
    async fn test_customize_hook_receives_provider_id() {
        let request = ChannelRequest::new(SmsRequest {
            from: "Ekko".to_string(),
            to: "+15555550100".to_string(),
            text: "hello".to_string(),
            ..Default::default()
        })
        .with_customize(Customizer::new(|provider_id, payload| {
            let provider_id = provider_id.to_string();
            async move {
                match payload {
                    ChannelPayload::Sms(mut sms) => {
                        sms.text = format!("[{}] {}", provider_id, sms.text);
                        Ok(ChannelPayload::Sms(sms))
                    }
                    other => Ok(other),
                }
            }
            .boxed()
        }));

        match request.customized_payload("sms-primary").await.unwrap() {
            ChannelPayload::Sms(sms) => assert_eq!(sms.text, "[sms-primary] hello"),
            other => panic!("unexpected payload {:?}", other),
        }
        // The original payload is left untouched
        match &request.payload {
            ChannelPayload::Sms(sms) => assert_eq!(sms.text, "hello"),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_customize_failure_is_attributed() {
        let request = ChannelRequest::new(SlackRequest {
            webhook_url: None,
            text: "hi".to_string(),
        })
        .with_customize(Customizer::new(|_, _| {
            async move { Err::<ChannelPayload, BoxError>("template missing".into()) }.boxed()
        }));

        let err = request.customized_payload("slack-a").await.unwrap_err();
        assert_eq!(err.provider_id(), Some("slack-a"));
        assert_eq!(err.channel(), Some(NotificationChannel::Slack));
        assert_eq!(err.code(), ErrorCode::Customize);
    }
}

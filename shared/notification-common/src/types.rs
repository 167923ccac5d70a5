//! Core types for the notification system
//!
//! Channels, per-send results and the aggregated status returned to callers
//! of the sender.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Notification channels supported by the system
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannel {
    Email,
    Sms,
    Push,
    Voice,
    Webpush,
    Slack,
    Whatsapp,
    Telegram,
}

impl NotificationChannel {
    /// Every channel, in declaration order
    pub const ALL: [NotificationChannel; 8] = [
        NotificationChannel::Email,
        NotificationChannel::Sms,
        NotificationChannel::Push,
        NotificationChannel::Voice,
        NotificationChannel::Webpush,
        NotificationChannel::Slack,
        NotificationChannel::Whatsapp,
        NotificationChannel::Telegram,
    ];

    /// Get channel name as lowercase string
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationChannel::Email => "email",
            NotificationChannel::Sms => "sms",
            NotificationChannel::Push => "push",
            NotificationChannel::Voice => "voice",
            NotificationChannel::Webpush => "webpush",
            NotificationChannel::Slack => "slack",
            NotificationChannel::Whatsapp => "whatsapp",
            NotificationChannel::Telegram => "telegram",
        }
    }
}

impl std::fmt::Display for NotificationChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationChannel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NotificationChannel::ALL
            .into_iter()
            .find(|channel| channel.as_str() == s)
            .ok_or_else(|| format!("unknown notification channel: {}", s))
    }
}

/// Outcome of one successful strategy invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSendResult {
    pub provider_id: String,
    pub id: String,
}

/// Overall outcome of a multi-channel send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendStatus {
    Success,
    Error,
}

/// Per-channel result recorded in a [`NotificationStatus`]
///
/// `id` is absent when the channel failed; `provider_id` still names the
/// provider the channel resolved to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
}

/// Aggregated result of [`NotificationRequest`](crate::NotificationRequest) delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationStatus {
    pub status: SendStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<BTreeMap<NotificationChannel, ChannelStatus>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<BTreeMap<NotificationChannel, String>>,
}

impl NotificationStatus {
    /// Build a status from collected channel results and errors.
    ///
    /// `status` is `Error` iff `errors` is non-empty; empty maps are omitted.
    pub fn from_parts(
        channels: BTreeMap<NotificationChannel, ChannelStatus>,
        errors: BTreeMap<NotificationChannel, String>,
    ) -> Self {
        let status = if errors.is_empty() {
            SendStatus::Success
        } else {
            SendStatus::Error
        };

        Self {
            status,
            channels: (!channels.is_empty()).then_some(channels),
            errors: (!errors.is_empty()).then_some(errors),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == SendStatus::Success
    }

    /// Result recorded for a channel, if any
    pub fn channel(&self, channel: NotificationChannel) -> Option<&ChannelStatus> {
        self.channels.as_ref().and_then(|c| c.get(&channel))
    }

    /// Error message recorded for a channel, if any
    pub fn error(&self, channel: NotificationChannel) -> Option<&str> {
        self.errors
            .as_ref()
            .and_then(|e| e.get(&channel))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_round_trips_through_str() {
        for channel in NotificationChannel::ALL {
            assert_eq!(channel.as_str().parse::<NotificationChannel>(), Ok(channel));
        }
        assert!("fax".parse::<NotificationChannel>().is_err());
    }

    #[test]
    fn test_status_is_error_iff_errors_present() {
        let mut channels = BTreeMap::new();
        channels.insert(
            NotificationChannel::Sms,
            ChannelStatus {
                id: Some("msg-1".to_string()),
                provider_id: Some("sms-a".to_string()),
            },
        );

        let status = NotificationStatus::from_parts(channels.clone(), BTreeMap::new());
        assert!(status.is_success());
        assert!(status.errors.is_none());

        let mut errors = BTreeMap::new();
        errors.insert(NotificationChannel::Email, "boom".to_string());
        let status = NotificationStatus::from_parts(channels, errors);
        assert_eq!(status.status, SendStatus::Error);
        assert_eq!(status.error(NotificationChannel::Email), Some("boom"));
        assert_eq!(
            status.channel(NotificationChannel::Sms).and_then(|c| c.id.as_deref()),
            Some("msg-1")
        );
    }

    #[test]
    fn test_status_serializes_camel_case_and_skips_empty_maps() {
        let mut channels = BTreeMap::new();
        channels.insert(
            NotificationChannel::Email,
            ChannelStatus {
                id: None,
                provider_id: Some("email-a".to_string()),
            },
        );
        let mut errors = BTreeMap::new();
        errors.insert(NotificationChannel::Email, "down".to_string());

        let value = serde_json::to_value(NotificationStatus::from_parts(channels, errors)).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "status": "error",
                "channels": { "email": { "providerId": "email-a" } },
                "errors": { "email": "down" }
            })
        );

        let value =
            serde_json::to_value(NotificationStatus::from_parts(BTreeMap::new(), BTreeMap::new()))
                .unwrap();
        assert_eq!(value, serde_json::json!({ "status": "success" }));
    }
}

use async_trait::async_trait;
use notification_common::{
    ChannelPayload, ChannelRequest, ErrorCode, HttpExecutor, HttpRequestOptions,
    NotificationChannel, Provider, ProviderError, RetryOptions,
};
use reqwest::Method;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Body posted to the webhook endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookBody<'a> {
    channel: NotificationChannel,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
    payload: &'a ChannelPayload,
}

/// Provider that forwards channel requests to an HTTP endpoint
#[derive(Debug, Clone)]
pub struct WebhookProvider {
    id: String,
    channel: NotificationChannel,
    url: String,
    method: Method,
    headers: Vec<(String, String)>,
    id_field: String,
    retry: RetryOptions,
    http: HttpExecutor,
    signal: Option<CancellationToken>,
}

impl WebhookProvider {
    pub fn new(
        id: impl Into<String>,
        channel: NotificationChannel,
        url: impl Into<String>,
        http: HttpExecutor,
    ) -> Self {
        Self {
            id: id.into(),
            channel,
            url: url.into(),
            method: Method::POST,
            headers: Vec::new(),
            id_field: "id".to_string(),
            retry: RetryOptions::default(),
            http,
            signal: None,
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_id_field(mut self, id_field: impl Into<String>) -> Self {
        self.id_field = id_field.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Message id from the response body, when it carries one
    fn message_id(&self, body: &str) -> Option<String> {
        let value: serde_json::Value = serde_json::from_str(body).ok()?;
        match value.get(&self.id_field)? {
            serde_json::Value::String(id) if !id.is_empty() => Some(id.clone()),
            serde_json::Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }
}

#[async_trait]
impl Provider for WebhookProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send(&self, request: &ChannelRequest) -> Result<String, ProviderError> {
        let payload = request.customized_payload(&self.id).await?;

        let body = WebhookBody {
            channel: self.channel,
            id: request.id.as_deref(),
            user_id: request.user_id.as_deref(),
            payload: &payload,
        };

        let mut options = HttpRequestOptions::new(self.method.clone())
            .json(&body)
            .map_err(|e| {
                ProviderError::new(
                    ErrorCode::InvalidPayload,
                    format!("failed to serialize webhook body: {}", e),
                )
                .with_channel(self.channel)
                .with_source(e)
            })?
            .retry(self.retry.clone())
            .throw_on_error(true);

        for (name, value) in &self.headers {
            options = options.header(name.clone(), value.clone());
        }
        if let Some(signal) = &self.signal {
            options = options.signal(signal.clone());
        }

        debug!(provider_id = %self.id, url = %self.url, "Posting notification to webhook");

        let response = self
            .http
            .execute(&self.url, options)
            .await
            .map_err(|e| ProviderError::from(e).with_channel(self.channel))?;

        let message_id = self
            .message_id(&response.body)
            .unwrap_or_else(|| format!("id-{}", uuid::Uuid::new_v4()));

        info!(
            provider_id = %self.id,
            status = response.status,
            message_id = %message_id,
            "Webhook accepted notification"
        );

        Ok(message_id)
    }
}

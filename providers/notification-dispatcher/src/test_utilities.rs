//! Test doubles for strategy and sender tests

use crate::strategy::RandomSource;
use async_trait::async_trait;
use notification_common::{ChannelRequest, Provider, ProviderError, SmsRequest};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared record of provider ids in the order they were called
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn record(&self, provider_id: &str) {
        self.0.lock().push(provider_id.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

/// Provider that always succeeds or always fails with a fixed message
#[derive(Debug, Clone)]
pub struct ScriptedProvider {
    id: String,
    failure: Option<String>,
    calls: Arc<AtomicUsize>,
    log: Option<CallLog>,
}

impl ScriptedProvider {
    pub fn succeeding(id: &str) -> Self {
        Self {
            id: id.to_string(),
            failure: None,
            calls: Arc::new(AtomicUsize::new(0)),
            log: None,
        }
    }

    pub fn failing(id: &str, message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::succeeding(id)
        }
    }

    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send(&self, _request: &ChannelRequest) -> Result<String, ProviderError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(log) = &self.log {
            log.record(&self.id);
        }

        match &self.failure {
            Some(message) => Err(ProviderError::provider(message.clone())),
            None => Ok(format!("{}-msg-{}", self.id, n)),
        }
    }
}

/// Random source that always returns the same draw
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom(pub f64);

impl RandomSource for FixedRandom {
    fn next_f64(&self) -> f64 {
        self.0
    }
}

pub fn sms_request() -> ChannelRequest {
    ChannelRequest::new(SmsRequest {
        from: "Ekko".to_string(),
        to: "+15555550100".to_string(),
        text: "Balance below threshold".to_string(),
        ..Default::default()
    })
}

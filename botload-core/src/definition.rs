use std::time::Duration;

use serde::{Deserialize, Serialize, Serializer};

use crate::error::{Error, Result};

pub const DEFAULT_API_METHOD: &str = "sendMessage";

/// Hard ceiling on workers per run, whatever the configured limit says.
pub const THREAD_COUNT_LIMIT: u32 = 10_000;

/// Values applied to fields a [`TestRequest`] leaves out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Defaults {
    pub thread_count: u32,
    /// Largest `threadCount` a request may ask for.
    pub max_thread_count: u32,
    pub requests_per_worker: u32,
    pub delay: Duration,
    pub base_url: Option<String>,
    pub api_method: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            thread_count: 10,
            max_thread_count: 1_000,
            requests_per_worker: 100,
            delay: Duration::from_millis(100),
            base_url: None,
            api_method: DEFAULT_API_METHOD.to_string(),
        }
    }
}

/// A validated load test. Immutable once accepted by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestDefinition {
    pub chat_id: String,
    pub message_text: String,
    pub thread_count: u32,
    #[serde(rename = "requestsPerThread")]
    pub requests_per_worker: u32,
    #[serde(rename = "delayBetweenRequests", serialize_with = "serialize_millis")]
    pub delay: Duration,
    #[serde(rename = "botUrl")]
    pub base_url: String,
    pub api_method: String,
}

impl TestDefinition {
    /// Requests the run is budgeted for: `thread_count * requests_per_worker`.
    pub fn total_requests(&self) -> u64 {
        u64::from(self.thread_count).saturating_mul(u64::from(self.requests_per_worker))
    }

    pub fn validate(&self) -> Result<()> {
        if self.chat_id.trim().is_empty() {
            return Err(Error::BlankChatId);
        }
        if self.message_text.trim().is_empty() {
            return Err(Error::BlankMessageText);
        }
        if self.thread_count == 0 {
            return Err(Error::InvalidThreadCount);
        }
        if self.thread_count > THREAD_COUNT_LIMIT {
            return Err(Error::ThreadCountTooLarge {
                max: THREAD_COUNT_LIMIT,
            });
        }
        if self.requests_per_worker == 0 {
            return Err(Error::InvalidRequestsPerWorker);
        }
        if self.base_url.trim().is_empty() {
            return Err(Error::BlankBaseUrl);
        }
        if self.api_method.trim().is_empty() {
            return Err(Error::BlankApiMethod);
        }
        Ok(())
    }
}

/// The payload accepted by the start endpoint. Absent fields fall back to [`Defaults`];
/// present fields are validated as given.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRequest {
    #[serde(default)]
    pub chat_id: String,
    #[serde(default)]
    pub message_text: String,
    pub thread_count: Option<u32>,
    #[serde(alias = "requestsPerWorker")]
    pub requests_per_thread: Option<u32>,
    /// Milliseconds.
    #[serde(alias = "delayMs")]
    pub delay_between_requests: Option<u64>,
    pub bot_url: Option<String>,
    pub api_method: Option<String>,
}

impl TestRequest {
    pub fn resolve(self, defaults: &Defaults) -> Result<TestDefinition> {
        // An empty bot url means "use the configured one".
        let base_url = self
            .bot_url
            .filter(|url| !url.trim().is_empty())
            .or_else(|| defaults.base_url.clone())
            .unwrap_or_default();

        let definition = TestDefinition {
            chat_id: self.chat_id,
            message_text: self.message_text,
            thread_count: self.thread_count.unwrap_or(defaults.thread_count),
            requests_per_worker: self
                .requests_per_thread
                .unwrap_or(defaults.requests_per_worker),
            delay: self
                .delay_between_requests
                .map_or(defaults.delay, Duration::from_millis),
            base_url,
            api_method: self
                .api_method
                .unwrap_or_else(|| defaults.api_method.clone()),
        };

        definition.validate()?;
        if definition.thread_count > defaults.max_thread_count {
            return Err(Error::ThreadCountTooLarge {
                max: defaults.max_thread_count,
            });
        }
        Ok(definition)
    }
}

fn serialize_millis<S>(value: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
}

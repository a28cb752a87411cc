use botload_http::HttpRequest;
use bytes::Bytes;
use serde::Serialize;

use crate::definition::TestDefinition;
use crate::error::{Error, Result};

/// Resolved endpoint and message template of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    endpoint: String,
    chat_id: String,
    message_text: String,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: String,
}

impl Target {
    /// Joins `base_url` and `api_method` into the endpoint url.
    pub fn from_definition(definition: &TestDefinition) -> Result<Self> {
        let endpoint = format!(
            "{}/{}",
            definition.base_url.trim().trim_end_matches('/'),
            definition.api_method.trim().trim_start_matches('/')
        );

        let parsed = url::Url::parse(&endpoint).map_err(|err| Error::InvalidTarget {
            url: endpoint.clone(),
            reason: err.to_string(),
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(Error::InvalidTarget {
                url: endpoint,
                reason: "expected an http:// or https:// url".to_string(),
            });
        }

        Ok(Self {
            endpoint,
            chat_id: definition.chat_id.clone(),
            message_text: definition.message_text.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Message text for the `sequence`-th request (1-based) of a worker.
    pub fn message(&self, sequence: u64) -> String {
        format!("{} #{sequence}", self.message_text)
    }

    pub fn request(&self, sequence: u64) -> Result<HttpRequest> {
        let body = serde_json::to_vec(&SendMessage {
            chat_id: &self.chat_id,
            text: self.message(sequence),
        })?;
        Ok(HttpRequest::post_json(&self.endpoint, Bytes::from(body)))
    }
}

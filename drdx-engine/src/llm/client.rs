//! HTTP client for the external vision LLM
//!
//! **[DRX-LLM-010]** The engine depends only on the documented contract:
//! request is a single prompt string, response is free text. Everything
//! else (transport, auth, rate limiting) lives behind the `VisionModel`
//! trait so workflow code and tests never touch the network directly.

use async_trait::async_trait;
use drdx_common::config::LlmConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Errors at the vision LLM boundary
#[derive(Debug, Error)]
pub enum VisionModelError {
    /// Transport-level failure (connect, TLS, body read)
    #[error("vision model transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status from the endpoint
    #[error("vision model returned HTTP {0}")]
    Status(u16),

    /// Response body did not contain a completion
    #[error("vision model reply was empty")]
    EmptyReply,
}

/// A model that answers a single prompt with free text
///
/// The consultation stage treats every error as recoverable and falls back
/// to the grading-mirroring default, so implementations should surface
/// failures rather than retry internally.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Submit one prompt and return the raw reply text
    async fn consult(&self, prompt: &str) -> Result<String, VisionModelError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Chat-completions client for the configured vision endpoint
///
/// Enforces a minimum interval between requests so a burst of concurrent
/// sessions cannot hammer the upstream service.
pub struct HttpVisionClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl HttpVisionClient {
    /// Build a client from the `[llm]` configuration section
    pub fn new(config: &LlmConfig) -> Result<Self, VisionModelError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            min_interval: Duration::from_millis(config.min_request_interval_ms),
            last_request: Mutex::new(None),
        })
    }

    /// Sleep until the minimum inter-request interval has elapsed
    async fn respect_rate_limit(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[async_trait]
impl VisionModel for HttpVisionClient {
    async fn consult(&self, prompt: &str) -> Result<String, VisionModelError> {
        self.respect_rate_limit().await;

        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let mut request = self.http.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        debug!(endpoint = %self.endpoint, model = %self.model, "Consulting vision model");
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(VisionModelError::Status(status.as_u16()));
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(VisionModelError::EmptyReply)
    }
}

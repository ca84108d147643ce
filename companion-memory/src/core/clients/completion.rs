//! Text completion clients

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::TextCompletionClient;
use crate::core::config::CompletionConfig;
use crate::core::retry::{CircuitBreaker, RetryConfig, RetryPolicy};
use crate::models::error::{MemoryError, MemoryResult};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// First choice's message content of a `/chat/completions` body
fn parse_completion(body: &str) -> MemoryResult<String> {
    let parsed: ChatResponse = serde_json::from_str(body)?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| MemoryError::collaborator("completion", "response contained no content"))
}

/// Client for any OpenAI-compatible `/chat/completions` endpoint
pub struct OpenAiCompatibleClient {
    client: reqwest::Client,
    config: CompletionConfig,
    retry: RetryPolicy,
    breaker: CircuitBreaker,
}

impl OpenAiCompatibleClient {
    pub fn new(config: CompletionConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        let retry = if config.max_retries == 0 {
            RetryPolicy::no_retry()
        } else {
            RetryPolicy::new(RetryConfig {
                max_attempts: config.max_retries + 1,
                ..RetryConfig::default()
            })
        };

        Ok(Self {
            client,
            config,
            retry,
            breaker: CircuitBreaker::new(5, Duration::from_secs(60)),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    async fn send_once(&self, prompt: &str) -> MemoryResult<String> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let mut request = self.client.post(self.endpoint()).json(&body);
        if let Some(ref key) = self.config.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(MemoryError::collaborator(
                "completion",
                format!("request failed ({}): {}", status, text),
            ));
        }

        parse_completion(&text)
    }
}

#[async_trait]
impl TextCompletionClient for OpenAiCompatibleClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        if self.breaker.is_open() {
            return Err(anyhow!("completion provider temporarily unavailable"));
        }

        let result = self
            .retry
            .execute("text completion", || self.send_once(prompt))
            .await
            .map_err(anyhow::Error::from);

        match &result {
            Ok(text) => {
                self.breaker.record_success();
                debug!("Completion returned {} chars", text.len());
            },
            Err(e) => {
                self.breaker.record_failure();
                warn!("Completion failed: {}", e);
            },
        }

        result
    }
}

/// Completion client for deployments without a text-generation provider
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableCompletion;

#[async_trait]
impl TextCompletionClient for UnavailableCompletion {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        Err(anyhow!("text completion is not configured"))
    }
}

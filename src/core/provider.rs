//! Provider seam and the OpenAI-compatible HTTP implementation.

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::history::ChatMessage;
use crate::error::{ChatError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Token usage reported by the provider for a chat call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ChatUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: String,
    pub usage: ChatUsage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Embeddings {
    /// One vector per input, in input order.
    pub vectors: Vec<Vec<f32>>,
    pub total_tokens: u64,
}

/// Anything that can answer a chat request and embed text.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<Completion>;

    async fn embed(&self, model: &str, inputs: &[String]) -> Result<Embeddings>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: ChatUsage,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    usage: EmbeddingUsage,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbeddingUsage {
    total_tokens: u64,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Client for the OpenAI REST API, or anything speaking the same dialect.
pub struct OpenAiProvider {
    http_client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_options(api_key, DEFAULT_BASE_URL, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_options(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(ChatError::MissingApiKey);
        }
        Ok(Self {
            http_client: Client::builder().timeout(timeout).build()?,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B, R>(&self, endpoint: &str, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: serde::de::DeserializeOwned,
    {
        let url = format!("{}/{endpoint}", self.base_url);
        debug!("POST {url}");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map_or(text, |envelope| envelope.error.message);
            debug!("Provider error {status}: {message}");
            return Err(ChatError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<Completion> {
        let request = ChatRequest {
            model,
            messages,
            temperature,
        };
        let response: ChatResponse = self.post("chat/completions", &request).await?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or(ChatError::EmptyResponse)?;

        Ok(Completion {
            content: choice.message.content.ok_or(ChatError::EmptyResponse)?,
            usage: response.usage,
        })
    }

    async fn embed(&self, model: &str, inputs: &[String]) -> Result<Embeddings> {
        let request = EmbeddingRequest {
            model,
            input: inputs,
        };
        let mut response: EmbeddingResponse = self.post("embeddings", &request).await?;
        response.data.sort_by_key(|d| d.index);

        Ok(Embeddings {
            vectors: response.data.into_iter().map(|d| d.embedding).collect(),
            total_tokens: response.usage.total_tokens,
        })
    }
}

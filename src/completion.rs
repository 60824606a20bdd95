//! Hosted chat-completion API used to phrase the final answer.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AppConfig;

pub const SYSTEM_INSTRUCTION: &str =
    "You are a helpful assistant. Answer user questions based only on the provided context.";

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("TOGETHER_API_KEY is not set")]
    MissingApiKey,
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("completion API returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed completion response: {0}")]
    Decode(String),
    #[error("completion API returned no answer")]
    EmptyResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// The system instruction plus a user turn carrying the evidence and question.
pub fn answer_messages(context: &str, query: &str) -> Vec<Message> {
    vec![
        Message::system(SYSTEM_INSTRUCTION),
        Message::user(format!(
            "Context:\n{context}\n\nUser Query:\n{query}\n\nAnswer the question based on the context above."
        )),
    ]
}

#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(&self, messages: &[Message]) -> Result<String, CompletionError>;
}

/// Client for Together's OpenAI-compatible `/chat/completions` route. Each
/// call is a single attempt bounded by the configured timeout.
#[derive(Clone)]
pub struct TogetherClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: usize,
    temperature: f32,
    top_p: f32,
    timeout: Duration,
}

impl TogetherClient {
    pub fn from_config(config: &AppConfig) -> Result<Self, CompletionError> {
        let completion = &config.completion;
        let api_key = completion
            .api_key
            .clone()
            .ok_or(CompletionError::MissingApiKey)?;

        let client = Client::builder()
            .timeout(completion.timeout)
            .build()
            .map_err(|e| CompletionError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: completion.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.models.answer_model.clone(),
            max_tokens: completion.max_output_tokens,
            temperature: completion.temperature,
            top_p: completion.top_p,
            timeout: completion.timeout,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: usize,
    temperature: f32,
    top_p: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: Message,
}

#[async_trait]
impl ChatCompletion for TogetherClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, CompletionError> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&CompletionRequest {
                model: &self.model,
                messages,
                max_tokens: self.max_tokens,
                temperature: self.temperature,
                top_p: self.top_p,
                stream: false,
            })
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, "completion API error");
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        let body = response
            .json::<CompletionResponse>()
            .await
            .map_err(|e| CompletionError::Decode(e.to_string()))?;

        parse_answer(body)
    }
}

impl TogetherClient {
    fn transport_error(&self, err: reqwest::Error) -> CompletionError {
        if err.is_timeout() {
            tracing::warn!(timeout = ?self.timeout, "completion request timed out");
            CompletionError::Timeout(self.timeout)
        } else {
            tracing::warn!("completion request failed: {err}");
            CompletionError::Network(err.to_string())
        }
    }
}

fn parse_answer(body: CompletionResponse) -> Result<String, CompletionError> {
    body.choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or(CompletionError::EmptyResponse)
}

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::embedding::Embedder;

const TRUNCATION_STEPS: [usize; 6] = [768, 512, 384, 256, 192, 128];

#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Embeds `text`, retrying with progressively shorter word prefixes when
    /// the model reports that the input exceeds its context window. Agenda
    /// items with long annexure tables routinely do.
    pub async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        let input = text.trim();
        if input.is_empty() {
            anyhow::bail!("cannot embed empty text input");
        }

        let mut last_err = match self.embed_with_endpoint_fallback(model, input).await {
            Ok(vector) => return Ok(vector),
            Err(err) if is_context_length_error(&err) => err,
            Err(err) => return Err(err),
        };

        let word_count = input.split_whitespace().count();
        for max_words in TRUNCATION_STEPS.iter().copied().filter(|&n| n < word_count) {
            tracing::debug!(model, word_count, max_words, "retrying embedding on shorter input");
            let truncated = truncate_to_word_limit(input, max_words);
            match self.embed_with_endpoint_fallback(model, &truncated).await {
                Ok(vector) => return Ok(vector),
                Err(err) if is_context_length_error(&err) => last_err = err,
                Err(err) => return Err(err),
            }
        }

        Err(anyhow::anyhow!(
            "embedding input still exceeds the context length of {model} after truncation \
             (words={word_count}): {last_err}"
        ))
    }

    /// Servers older than 0.3 have no `/api/embed` and answer it with a bare
    /// 404; only then is `/api/embeddings` tried. Any other failure is final.
    async fn embed_with_endpoint_fallback(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        match self.embed_modern(model, text).await? {
            Some(vector) => Ok(vector),
            None => {
                tracing::debug!("ollama has no /api/embed route, using /api/embeddings");
                self.embed_legacy(model, text)
                    .await
                    .with_context(|| format!("legacy embedding route failed; is `{model}` pulled?"))
            }
        }
    }

    async fn embed_modern(&self, model: &str, text: &str) -> Result<Option<Vec<f32>>> {
        #[derive(Serialize)]
        struct EmbedReq<'a> {
            model: &'a str,
            input: &'a str,
        }

        #[derive(Deserialize)]
        struct EmbedResp {
            embeddings: Vec<Vec<f32>>,
        }

        let url = format!("{}/api/embed", self.base_url);
        let response = self
            .client
            .post(url)
            .json(&EmbedReq { model, input: text })
            .send()
            .await
            .context("failed to call ollama embed endpoint")?;

        if response.status() != StatusCode::OK {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            if is_missing_route(status, &body) {
                return Ok(None);
            }
            anyhow::bail!(
                "ollama /api/embed returned {status}: {}",
                normalize_err_body(&body)
            );
        }

        let response = response
            .json::<EmbedResp>()
            .await
            .context("failed to decode ollama /api/embed response")?;

        let vector =
            response.embeddings.into_iter().next().ok_or_else(|| {
                anyhow::anyhow!("ollama /api/embed returned empty embeddings array")
            })?;

        Ok(Some(vector))
    }

    async fn embed_legacy(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        #[derive(Serialize)]
        struct EmbeddingReq<'a> {
            model: &'a str,
            prompt: &'a str,
        }

        #[derive(Deserialize)]
        struct EmbeddingResp {
            embedding: Vec<f32>,
        }

        let url = format!("{}/api/embeddings", self.base_url);
        let response = self
            .client
            .post(url)
            .json(&EmbeddingReq {
                model,
                prompt: text,
            })
            .send()
            .await
            .context("failed to call ollama embeddings endpoint")?;

        if response.status() != StatusCode::OK {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "ollama /api/embeddings returned {status}: {}",
                normalize_err_body(&body)
            );
        }

        let response = response
            .json::<EmbeddingResp>()
            .await
            .context("failed to decode ollama embeddings response")?;

        Ok(response.embedding)
    }
}

/// [`Embedder`] bound to one model served by a local Ollama instance.
#[derive(Clone)]
pub struct OllamaEmbedder {
    client: OllamaClient,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.client.embed(&self.model, text).await
    }
}

fn normalize_err_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }

    if let Ok(json) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(err) = json.get("error").and_then(|v| v.as_str()) {
            return err.to_string();
        }
    }

    trimmed.to_string()
}

/// A 404 carrying Ollama's JSON `error` field (e.g. an unknown model) comes
/// from a server that does have the route.
fn is_missing_route(status: StatusCode, body: &str) -> bool {
    status == StatusCode::NOT_FOUND
        && serde_json::from_str::<serde_json::Value>(body.trim())
            .ok()
            .and_then(|json| json.get("error").cloned())
            .is_none()
}

fn is_context_length_error(err: &anyhow::Error) -> bool {
    let msg = err.to_string().to_ascii_lowercase();
    msg.contains("input length exceeds the context length")
        || (msg.contains("context length") && msg.contains("input length"))
}

fn truncate_to_word_limit(text: &str, max_words: usize) -> String {
    text.split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ")
}

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use ordinance_chatbot::chat::ChatService;
use ordinance_chatbot::completion::TogetherClient;
use ordinance_chatbot::ollama::{OllamaClient, OllamaEmbedder};
use ordinance_chatbot::{run_server, AppConfig};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::from_env();
    let completion = TogetherClient::from_config(&config)
        .context("answer synthesis is unavailable; set TOGETHER_API_KEY")?;

    let embedder = OllamaEmbedder::new(
        OllamaClient::new(config.ollama_base_url.clone()),
        config.models.embedding_model.clone(),
    );

    let chat = ChatService::from_config(&config, Arc::new(embedder), Arc::new(completion))?;

    run_server(config, chat).await
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

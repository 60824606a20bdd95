use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ordinance_chatbot::chat::ChatService;
use ordinance_chatbot::completion::TogetherClient;
use ordinance_chatbot::config::AppConfig;
use ordinance_chatbot::ollama::{OllamaClient, OllamaEmbedder};

#[derive(Parser, Debug)]
#[command(name = "ask")]
#[command(about = "Ask questions about indexed meeting records from the terminal")]
struct Cli {
    /// Question to answer; omit to read one question per line from stdin
    question: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = AppConfig::from_env();
    let completion = TogetherClient::from_config(&config)
        .context("answer synthesis is unavailable; set TOGETHER_API_KEY")?;
    let embedder = OllamaEmbedder::new(
        OllamaClient::new(config.ollama_base_url.clone()),
        config.models.embedding_model.clone(),
    );
    let chat = ChatService::from_config(&config, Arc::new(embedder), Arc::new(completion))?;

    if !cli.question.is_empty() {
        println!("{}", chat.answer_text(&cli.question.join(" ")).await);
        return Ok(());
    }

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        println!("{}\n", chat.answer_text(line.trim_end_matches(['\r', '\n'])).await);
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

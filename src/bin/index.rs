use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ordinance_chatbot::config::AppConfig;
use ordinance_chatbot::ingest::{IndexEvent, Indexer};
use ordinance_chatbot::ollama::{OllamaClient, OllamaEmbedder};

#[derive(Parser, Debug)]
#[command(name = "index")]
#[command(about = "Build per-document and combined partitions from DOCX meeting records")]
struct Cli {
    /// Directory holding the .docx files (defaults to DOCS_DIR)
    #[arg(long)]
    docs: Option<PathBuf>,
    /// Partition root to write into (defaults to VECTOR_STORE_DIR)
    #[arg(long)]
    store: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = AppConfig::from_env();
    if let Some(docs) = cli.docs {
        config.docs_dir = docs;
    }
    if let Some(store) = cli.store {
        config.vector_store_dir = store;
    }

    let embedder = OllamaEmbedder::new(
        OllamaClient::new(config.ollama_base_url.clone()),
        config.models.embedding_model.clone(),
    );
    let indexer = Indexer::from_config(&config, Arc::new(embedder));

    let report = indexer
        .run(&config.docs_dir, |event| match event {
            IndexEvent::DocumentIndexed {
                file,
                partition,
                chunks,
            } => println!(
                "[ok] {file}: {chunks} chunks stored in {}",
                config.vector_store_dir.join(partition).display()
            ),
            IndexEvent::DocumentSkipped { file } => {
                println!("[skip] {file}: no chunks above the minimum length")
            }
            IndexEvent::DocumentFailed { file, error } => {
                println!("[fail] {file}: {error}")
            }
            IndexEvent::CombinedIndexed { partition, chunks } => println!(
                "[ok] combined partition: {chunks} chunks stored in {}",
                config.vector_store_dir.join(partition).display()
            ),
            IndexEvent::CombinedFailed { error } => {
                println!("[fail] combined partition: {error}")
            }
        })
        .await?;

    if report.files == 0 {
        println!("No DOCX files found in {}", config.docs_dir.display());
    } else {
        println!(
            "Indexing complete. documents={} indexed={} combined={}",
            report.files,
            report.indexed_documents(),
            report.combined_indexed()
        );
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

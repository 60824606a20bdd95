use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::partition::registry::ReloadPolicy;

#[derive(Clone, Debug)]
pub struct ModelConfig {
    pub answer_model: String,
    pub embedding_model: String,
}

#[derive(Clone, Debug)]
pub struct CompletionConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub max_output_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
    pub timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub min_chunk_length: usize,
    pub code_prefix: String,
    pub reload: ReloadPolicy,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,
    pub cors_origin: String,
    pub docs_dir: PathBuf,
    pub vector_store_dir: PathBuf,
    pub combined_partition: String,
    pub ollama_base_url: String,
    pub models: ModelConfig,
    pub completion: CompletionConfig,
    pub retrieval: RetrievalConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            bind_addr: env::var("CHATBOT_BIND").unwrap_or_else(|_| "127.0.0.1:8000".to_string()),
            cors_origin: env::var("CHATBOT_CORS_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            docs_dir: env::var("DOCS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            vector_store_dir: env::var("VECTOR_STORE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./vector_store")),
            combined_partition: env::var("COMBINED_PARTITION")
                .unwrap_or_else(|_| "combined".to_string()),
            ollama_base_url: env::var("OLLAMA_BASE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:11434".to_string()),
            models: ModelConfig {
                answer_model: env::var("ANSWER_MODEL")
                    .unwrap_or_else(|_| "mistralai/Mixtral-8x7B-Instruct-v0.1".to_string()),
                embedding_model: env::var("EMBEDDING_MODEL")
                    .unwrap_or_else(|_| "all-minilm".to_string()),
            },
            completion: CompletionConfig {
                base_url: env::var("TOGETHER_BASE_URL")
                    .unwrap_or_else(|_| "https://api.together.ai/v1".to_string()),
                api_key: env::var("TOGETHER_API_KEY")
                    .ok()
                    .filter(|key| !key.trim().is_empty()),
                max_output_tokens: parsed_env("MAX_OUTPUT_TOKENS", 1024),
                temperature: parsed_env("TEMPERATURE", 0.7),
                top_p: parsed_env("TOP_P", 0.9),
                timeout: Duration::from_secs(parsed_env("COMPLETION_TIMEOUT_SECS", 30)),
            },
            retrieval: RetrievalConfig {
                top_k: parsed_env("RETRIEVAL_TOP_K", 200),
                min_chunk_length: parsed_env("MIN_CHUNK_LENGTH", 100),
                code_prefix: env::var("PARTITION_CODE_PREFIX")
                    .unwrap_or_else(|_| "BoG".to_string()),
                reload: env::var("PARTITION_RELOAD")
                    .ok()
                    .and_then(|v| ReloadPolicy::parse(&v))
                    .unwrap_or_default(),
            },
        }
    }
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

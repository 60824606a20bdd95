pub mod chat;
pub mod completion;
pub mod config;
pub mod embedding;
pub mod evidence;
pub mod ingest;
pub mod models;
pub mod ollama;
pub mod partition;
pub mod server;

#[cfg(test)]
pub(crate) mod test_http;

pub use config::AppConfig;
pub use server::run_server;

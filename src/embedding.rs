use anyhow::Result;
use async_trait::async_trait;

/// Turns text into a fixed-length vector. Every chunk of one partition and the
/// queries searched against it must go through the same model.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn model(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

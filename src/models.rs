use serde::{Deserialize, Serialize};

/// A metadata-tagged fragment of one source document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub source: String,
    pub item_id: Option<String>,
    pub resolution_label: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub chunk: Chunk,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub question: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

/// Structural units of a source document in reading order.
#[derive(Debug, Clone, Default)]
pub struct DocumentUnits {
    pub paragraphs: Vec<String>,
    pub table_rows: Vec<String>,
}

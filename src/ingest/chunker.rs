use crate::models::{Chunk, DocumentUnits};

use super::normalize::normalize;
use super::segment::detect;

pub const DEFAULT_MIN_CHUNK_LENGTH: usize = 100;

/// Running state of the chunk walk. Metadata is carried forward across units
/// until a later marker overwrites it.
#[derive(Debug, Default)]
struct ChunkState {
    item_id: Option<String>,
    resolution_label: Option<String>,
    buffer: Vec<String>,
    chunks: Vec<Chunk>,
}

impl ChunkState {
    fn flush(mut self, source: &str, min_len: usize) -> Self {
        let text = self.buffer.join("\n").trim().to_string();
        if !text.is_empty() && text.chars().count() >= min_len {
            self.chunks.push(Chunk {
                text,
                source: source.to_string(),
                item_id: self.item_id.clone(),
                resolution_label: self.resolution_label.clone(),
            });
        }
        self.buffer.clear();
        self
    }

    fn paragraph(self, raw: &str, source: &str, min_len: usize) -> Self {
        let text = normalize(raw);
        if text.is_empty() {
            return self;
        }

        let segment = detect(&text);
        let mut state = if let Some(item_id) = segment.item_id {
            let mut flushed = self.flush(source, min_len);
            flushed.item_id = Some(item_id);
            if segment.resolution_label.is_some() {
                flushed.resolution_label = segment.resolution_label;
            }
            flushed
        } else if let Some(label) = segment.resolution_label {
            let mut state = self;
            state.resolution_label = Some(label);
            state
        } else {
            self
        };

        state.buffer.push(text);
        state
    }

    fn table_row(mut self, row: &str) -> Self {
        if !row.is_empty() {
            self.buffer.push(row.to_string());
        }
        self
    }
}

/// Splits a document into item-scoped chunks. Table rows always land in the
/// chunk that is still open once the paragraphs are exhausted.
pub fn build_chunks(units: &DocumentUnits, source: &str, min_len: usize) -> Vec<Chunk> {
    let state = units
        .paragraphs
        .iter()
        .fold(ChunkState::default(), |state, para| {
            state.paragraph(para, source, min_len)
        });

    let state = units
        .table_rows
        .iter()
        .fold(state, |state, row| state.table_row(row));

    state.flush(source, min_len).chunks
}

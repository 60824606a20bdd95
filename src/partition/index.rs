use std::cmp::Ordering;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Chunk, RetrievalResult};

pub const INDEX_FILE: &str = "index.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// Flat cosine k-NN store. Small enough per meeting document that a linear
/// scan beats maintaining an ANN structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionIndex {
    pub name: String,
    pub embedding_model: String,
    pub dimensions: usize,
    pub created_at: DateTime<Utc>,
    entries: Vec<IndexEntry>,
}

impl PartitionIndex {
    pub fn new(
        name: impl Into<String>,
        embedding_model: impl Into<String>,
        entries: Vec<IndexEntry>,
    ) -> Result<Self> {
        let name = name.into();
        let dimensions = entries
            .first()
            .map(|entry| entry.vector.len())
            .ok_or_else(|| anyhow::anyhow!("partition {name} has no entries"))?;

        if dimensions == 0 {
            anyhow::bail!("partition {name} has zero-length embeddings");
        }
        if let Some(bad) = entries.iter().find(|e| e.vector.len() != dimensions) {
            anyhow::bail!(
                "partition {name} mixes embedding sizes: expected {dimensions}, got {} for a chunk of {}",
                bad.vector.len(),
                bad.chunk.source
            );
        }

        Ok(Self {
            name,
            embedding_model: embedding_model.into(),
            dimensions,
            created_at: Utc::now(),
            entries,
        })
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<IndexEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Up to `k` chunks ranked by cosine similarity to `query`. Ties keep
    /// insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<RetrievalResult>> {
        if query.len() != self.dimensions {
            anyhow::bail!(
                "query embedding has {} dimensions but partition {} was built with {}",
                query.len(),
                self.name,
                self.dimensions
            );
        }

        let query_norm = norm(query);
        if k == 0 || query_norm == 0.0 {
            return Ok(vec![]);
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .filter_map(|(idx, entry)| {
                let entry_norm = norm(&entry.vector);
                if entry_norm == 0.0 {
                    return None;
                }
                Some((idx, dot(query, &entry.vector) / (query_norm * entry_norm)))
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(idx, score)| RetrievalResult {
                chunk: self.entries[idx].chunk.clone(),
                score,
            })
            .collect())
    }

    /// Writes `<dir>/index.json`, replacing any previous index atomically.
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create partition dir {}", dir.display()))?;

        let target = dir.join(INDEX_FILE);
        let staging = dir.join(format!("{INDEX_FILE}.tmp"));
        let bytes = serde_json::to_vec(self).context("failed to serialize partition index")?;
        fs::write(&staging, bytes)
            .with_context(|| format!("failed to write {}", staging.display()))?;
        fs::rename(&staging, &target)
            .with_context(|| format!("failed to move index into {}", target.display()))?;
        Ok(())
    }

    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(INDEX_FILE);
        let bytes =
            fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
        let index: PartitionIndex = serde_json::from_slice(&bytes)
            .with_context(|| format!("failed to decode {}", path.display()))?;

        if index.entries.iter().any(|e| e.vector.len() != index.dimensions) {
            anyhow::bail!("{} has entries that do not match its dimensions", path.display());
        }
        Ok(index)
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}

pub mod chunker;
pub mod docx;
pub mod normalize;
pub mod segment;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::AppConfig;
use crate::embedding::Embedder;
use crate::models::Chunk;
use crate::partition::{IndexEntry, PartitionIndex};

/// Progress of an offline indexing run, one event per document plus one for
/// the combined partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexEvent {
    DocumentIndexed {
        file: String,
        partition: String,
        chunks: usize,
    },
    DocumentSkipped {
        file: String,
    },
    DocumentFailed {
        file: String,
        error: String,
    },
    CombinedIndexed {
        partition: String,
        chunks: usize,
    },
    CombinedFailed {
        error: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct IndexReport {
    pub files: usize,
    pub events: Vec<IndexEvent>,
}

impl IndexReport {
    pub fn indexed_documents(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, IndexEvent::DocumentIndexed { .. }))
            .count()
    }

    pub fn combined_indexed(&self) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, IndexEvent::CombinedIndexed { .. }))
    }
}

/// Builds and persists one partition per DOCX document plus the combined
/// partition.
#[derive(Clone)]
pub struct Indexer {
    embedder: Arc<dyn Embedder>,
    store_dir: PathBuf,
    combined_name: String,
    min_chunk_length: usize,
}

impl Indexer {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store_dir: impl Into<PathBuf>,
        combined_name: impl Into<String>,
        min_chunk_length: usize,
    ) -> Self {
        Self {
            embedder,
            store_dir: store_dir.into(),
            combined_name: combined_name.into(),
            min_chunk_length,
        }
    }

    pub fn from_config(config: &AppConfig, embedder: Arc<dyn Embedder>) -> Self {
        Self::new(
            embedder,
            config.vector_store_dir.clone(),
            config.combined_partition.clone(),
            config.retrieval.min_chunk_length,
        )
    }

    /// Indexes every `.docx` directly inside `docs_dir`, in name order. A
    /// failing document is reported and skipped; partitions already written
    /// stay in place. An empty directory is a no-op.
    pub async fn run<F>(&self, docs_dir: &Path, mut progress: F) -> Result<IndexReport>
    where
        F: FnMut(&IndexEvent) + Send,
    {
        let files = list_docx_files(docs_dir)?;
        let mut report = IndexReport {
            files: files.len(),
            events: Vec::new(),
        };
        if files.is_empty() {
            tracing::info!("no DOCX files found in {}", docs_dir.display());
            return Ok(report);
        }

        let mut emit = |report: &mut IndexReport, event: IndexEvent| {
            progress(&event);
            report.events.push(event);
        };

        let mut combined_entries = Vec::new();
        for path in files {
            let file = file_name(&path);
            let partition = partition_name(&path);

            let chunks = match self.chunk_document(&path).await {
                Ok(chunks) => chunks,
                Err(err) => {
                    tracing::error!(file = %file, "failed to read document: {err:#}");
                    emit(
                        &mut report,
                        IndexEvent::DocumentFailed {
                            file,
                            error: format!("{err:#}"),
                        },
                    );
                    continue;
                }
            };

            if chunks.is_empty() {
                tracing::warn!(file = %file, "no chunks above the minimum length");
                emit(&mut report, IndexEvent::DocumentSkipped { file });
                continue;
            }

            match self.index_document(&partition, &chunks).await {
                Ok(index) => {
                    emit(
                        &mut report,
                        IndexEvent::DocumentIndexed {
                            file,
                            partition,
                            chunks: index.len(),
                        },
                    );
                    combined_entries.extend(index.into_entries());
                }
                Err(err) => {
                    tracing::error!(file = %file, "failed to embed/index document: {err:#}");
                    emit(
                        &mut report,
                        IndexEvent::DocumentFailed {
                            file,
                            error: format!("{err:#}"),
                        },
                    );
                }
            }
        }

        if !combined_entries.is_empty() {
            match self.index_combined(combined_entries).await {
                Ok(index) => emit(
                    &mut report,
                    IndexEvent::CombinedIndexed {
                        partition: index.name.clone(),
                        chunks: index.len(),
                    },
                ),
                Err(err) => {
                    tracing::error!("failed to store combined partition: {err:#}");
                    emit(
                        &mut report,
                        IndexEvent::CombinedFailed {
                            error: format!("{err:#}"),
                        },
                    );
                }
            }
        }

        Ok(report)
    }

    pub async fn chunk_document(&self, path: &Path) -> Result<Vec<Chunk>> {
        let path = path.to_path_buf();
        let min_len = self.min_chunk_length;
        tokio::task::spawn_blocking(move || -> Result<Vec<Chunk>> {
            let units = docx::extract_docx_units(&path)?;
            Ok(chunker::build_chunks(&units, &file_name(&path), min_len))
        })
        .await
        .context("DOCX extraction task panicked")?
    }

    /// Embeds `chunks` and persists them as partition `name`.
    pub async fn index_document(&self, name: &str, chunks: &[Chunk]) -> Result<PartitionIndex> {
        let mut entries = Vec::with_capacity(chunks.len());
        for (n, chunk) in chunks.iter().enumerate() {
            let vector = self
                .embedder
                .embed(&chunk.text)
                .await
                .with_context(|| format!("failed embedding chunk {n} of {}", chunk.source))?;
            entries.push(IndexEntry {
                chunk: chunk.clone(),
                vector,
            });
        }

        let index = PartitionIndex::new(name, self.embedder.model(), entries)?;
        self.persist(index).await
    }

    /// Persists already-embedded entries as the combined partition.
    pub async fn index_combined(&self, entries: Vec<IndexEntry>) -> Result<PartitionIndex> {
        let index = PartitionIndex::new(&self.combined_name, self.embedder.model(), entries)?;
        self.persist(index).await
    }

    async fn persist(&self, index: PartitionIndex) -> Result<PartitionIndex> {
        let dir = self.store_dir.join(&index.name);
        tokio::task::spawn_blocking(move || -> Result<PartitionIndex> {
            index.save(&dir)?;
            tracing::info!(
                partition = %index.name,
                chunks = index.len(),
                "stored partition in {}",
                dir.display()
            );
            Ok(index)
        })
        .await
        .context("partition write task panicked")?
    }
}

fn list_docx_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(vec![]);
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to list documents in {}", dir.display()))?
    {
        let path = entry?.path();
        let is_docx = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("docx"));
        if path.is_file() && is_docx {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// File stem, e.g. `BoG54_2021.docx` -> `BoG54_2021`.
pub fn partition_name(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

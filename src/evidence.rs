use std::collections::HashSet;

use anyhow::{Context, Result};

use crate::embedding::Embedder;
use crate::models::Chunk;
use crate::partition::PartitionRegistry;

/// Deduplicated chunks retrieved for one query, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evidence {
    chunks: Vec<Chunk>,
}

impl Evidence {
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.context().trim().is_empty()
    }

    /// Chunk texts joined by a blank line.
    pub fn context(&self) -> String {
        self.chunks
            .iter()
            .map(|chunk| chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Embeds `query` once and gathers up to `top_k` chunks from each partition,
/// in the given partition order.
pub async fn aggregate(
    embedder: &dyn Embedder,
    registry: &PartitionRegistry,
    query: &str,
    partitions: &[String],
    top_k: usize,
) -> Result<Evidence> {
    let query_vector = embedder
        .embed(query)
        .await
        .context("failed to embed query")?;
    collect(registry, embedder.model(), &query_vector, partitions, top_k)
}

/// Retrieval order is partition order, then similarity rank within the
/// partition. The first occurrence of a chunk text wins. Every partition must
/// have been built with `model`, the model that produced `query_vector`.
pub fn collect(
    registry: &PartitionRegistry,
    model: &str,
    query_vector: &[f32],
    partitions: &[String],
    top_k: usize,
) -> Result<Evidence> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut chunks = Vec::new();

    for name in partitions {
        let Some(index) = registry.get(name) else {
            tracing::warn!(partition = %name, "selected partition is not loaded");
            continue;
        };

        if index.embedding_model != model {
            anyhow::bail!(
                "partition {name} was embedded with {} but queries use {model}; reindex the documents",
                index.embedding_model
            );
        }

        let hits = index
            .search(query_vector, top_k)
            .with_context(|| format!("retrieval from partition {name} failed"))?;
        let top_score = hits.first().map(|hit| hit.score);
        let before = chunks.len();
        for hit in hits {
            if seen.insert(hit.chunk.text.clone()) {
                chunks.push(hit.chunk);
            }
        }
        tracing::debug!(
            partition = %name,
            new_chunks = chunks.len() - before,
            top_score = ?top_score,
            "retrieved evidence"
        );
    }

    tracing::info!(chunks = chunks.len(), partitions = partitions.len(), "evidence assembled");
    Ok(Evidence { chunks })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::testing::BagOfWordsEmbedder;
    use crate::partition::index::tests::chunk;
    use crate::partition::{IndexEntry, PartitionIndex};

    fn partition(name: &str, entries: &[(&str, [f32; 2])]) -> PartitionIndex {
        PartitionIndex::new(
            name,
            "test",
            entries
                .iter()
                .map(|(text, vector)| IndexEntry {
                    chunk: chunk(text, &format!("{name}.docx")),
                    vector: vector.to_vec(),
                })
                .collect(),
        )
        .unwrap()
    }

    fn registry() -> PartitionRegistry {
        let mut registry = PartitionRegistry::default();
        registry.insert(
            "BoG54_2021",
            partition(
                "BoG54_2021",
                &[("fee revision", [1.0, 0.0]), ("shared annexure", [0.9, 0.1])],
            ),
        );
        registry.insert(
            "BoG60_2022",
            partition(
                "BoG60_2022",
                &[("shared annexure", [1.0, 0.0]), ("hostel rules", [0.5, 0.5])],
            ),
        );
        registry
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn deduplicates_across_partitions_in_first_seen_order() {
        let evidence = collect(
            &registry(),
            "test",
            &[1.0, 0.0],
            &names(&["BoG54_2021", "BoG60_2022"]),
            10,
        )
        .unwrap();

        let texts: Vec<_> = evidence.chunks().iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["fee revision", "shared annexure", "hostel rules"]);
        assert_eq!(evidence.chunks()[1].source, "BoG54_2021.docx");
        assert_eq!(
            evidence.context(),
            "fee revision\n\nshared annexure\n\nhostel rules"
        );
    }

    #[test]
    fn partition_order_drives_result_order() {
        let evidence = collect(
            &registry(),
            "test",
            &[1.0, 0.0],
            &names(&["BoG60_2022", "BoG54_2021"]),
            10,
        )
        .unwrap();

        let texts: Vec<_> = evidence.chunks().iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["shared annexure", "hostel rules", "fee revision"]);
        assert_eq!(evidence.chunks()[0].source, "BoG60_2022.docx");
    }

    #[test]
    fn top_k_bounds_each_partition() {
        let evidence = collect(
            &registry(),
            "test",
            &[1.0, 0.0],
            &names(&["BoG54_2021", "BoG60_2022"]),
            1,
        )
        .unwrap();

        let texts: Vec<_> = evidence.chunks().iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["fee revision", "shared annexure"]);
    }

    #[test]
    fn empty_retrieval_is_an_empty_result_not_an_error() {
        let registry = registry();
        let selected = names(&["BoG54_2021"]);
        let evidence = collect(&registry, "test", &[0.0, 0.0], &selected, 10).unwrap();
        assert!(evidence.is_empty());
        assert_eq!(evidence.context(), "");

        let unknown = collect(&registry, "test", &[1.0, 0.0], &names(&["BoG99_2030"]), 10).unwrap();
        assert!(unknown.is_empty());
    }

    #[test]
    fn dimension_mismatch_is_a_retrieval_error() {
        let err = collect(&registry(), "test", &[1.0, 0.0, 0.0], &names(&["BoG54_2021"]), 10);
        assert!(err.is_err());
    }

    #[test]
    fn partitions_from_another_embedding_model_are_rejected() {
        let err = collect(
            &registry(),
            "all-minilm",
            &[1.0, 0.0],
            &names(&["BoG54_2021"]),
            10,
        )
        .unwrap_err();
        assert!(err.to_string().contains("reindex"));
    }

    #[tokio::test]
    async fn aggregate_embeds_the_query_once() {
        let embedder = BagOfWordsEmbedder::default();
        let mut registry = PartitionRegistry::default();
        let texts = ["CGPA of 6.5 required", "hostel fee revised"];
        let mut entries = Vec::new();
        for text in texts {
            entries.push(IndexEntry {
                chunk: chunk(text, "BoG54_2021.docx"),
                vector: embedder.embed(text).await.unwrap(),
            });
        }
        registry.insert("a", PartitionIndex::new("a", "bag-of-words", entries.clone()).unwrap());
        registry.insert("b", PartitionIndex::new("b", "bag-of-words", entries).unwrap());

        let before = embedder.call_count();
        let evidence = aggregate(&embedder, &registry, "required CGPA", &names(&["a", "b"]), 1)
            .await
            .unwrap();

        assert_eq!(embedder.call_count() - before, 1);
        assert_eq!(evidence.len(), 1);
        assert_eq!(evidence.chunks()[0].text, "CGPA of 6.5 required");
    }
}

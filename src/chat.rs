use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tokio::sync::Semaphore;

use crate::completion::{answer_messages, ChatCompletion};
use crate::config::AppConfig;
use crate::embedding::Embedder;
use crate::evidence;
use crate::partition::{PartitionLoader, PartitionSelector, SelectionError};

/// Prefix of every local or validation failure rendered as text.
pub const LOCAL_ERROR_PREFIX: &str = "Error:";
/// Prefix of every upstream (embedding, retrieval, completion) failure.
pub const UPSTREAM_ERROR_PREFIX: &str = "System error:";
pub const NO_EVIDENCE_MESSAGE: &str =
    "No relevant context found in the documents matched by your question.";

/// What a single question resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatOutcome {
    Answer(String),
    NoEvidence,
    Rejected(SelectionError),
    Upstream(String),
}

impl ChatOutcome {
    /// Renders the outcome for a text-only boundary (terminal, JSON body).
    pub fn into_text(self) -> String {
        match self {
            ChatOutcome::Answer(answer) => answer,
            ChatOutcome::NoEvidence => NO_EVIDENCE_MESSAGE.to_string(),
            ChatOutcome::Rejected(err) => format!("{LOCAL_ERROR_PREFIX} {err}"),
            ChatOutcome::Upstream(detail) => format!("{UPSTREAM_ERROR_PREFIX} {detail}"),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ChatOutcome::Rejected(_) | ChatOutcome::Upstream(_))
    }
}

#[derive(Clone)]
pub struct ChatService {
    partitions: Arc<PartitionLoader>,
    selector: PartitionSelector,
    embedder: Arc<dyn Embedder>,
    completion: Arc<dyn ChatCompletion>,
    top_k: usize,
    query_limit: Arc<Semaphore>,
}

impl ChatService {
    pub fn new(
        partitions: Arc<PartitionLoader>,
        selector: PartitionSelector,
        embedder: Arc<dyn Embedder>,
        completion: Arc<dyn ChatCompletion>,
        top_k: usize,
    ) -> Self {
        Self {
            partitions,
            selector,
            embedder,
            completion,
            top_k,
            query_limit: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn from_config(
        config: &AppConfig,
        embedder: Arc<dyn Embedder>,
        completion: Arc<dyn ChatCompletion>,
    ) -> Result<Self> {
        let partitions = Arc::new(PartitionLoader::new(
            config.vector_store_dir.clone(),
            config.retrieval.reload,
        ));
        let selector = PartitionSelector::new(&config.retrieval.code_prefix)?;
        Ok(Self::new(
            partitions,
            selector,
            embedder,
            completion,
            config.retrieval.top_k,
        ))
    }

    /// Answers one question end to end. Questions are processed one at a
    /// time: reload partitions, select, retrieve, synthesize.
    pub async fn handle(&self, query: &str) -> ChatOutcome {
        let started = Instant::now();
        if query.trim().is_empty() {
            return ChatOutcome::Rejected(SelectionError::EmptyQuery);
        }

        let _permit = match self.query_limit.acquire().await {
            Ok(permit) => permit,
            Err(err) => return ChatOutcome::Upstream(err.to_string()),
        };

        let registry = match self.partitions.refresh().await {
            Ok(registry) => registry,
            Err(err) => return ChatOutcome::Upstream(format!("{err:#}")),
        };

        let selected = match self.selector.select(query, registry.names()) {
            Ok(selected) => selected,
            Err(err) => {
                tracing::info!("question rejected: {err}");
                return ChatOutcome::Rejected(err);
            }
        };

        let evidence = match evidence::aggregate(
            self.embedder.as_ref(),
            &registry,
            query,
            &selected,
            self.top_k,
        )
        .await
        {
            Ok(evidence) => evidence,
            Err(err) => {
                tracing::error!("evidence retrieval failed: {err:#}");
                return ChatOutcome::Upstream(format!("{err:#}"));
            }
        };

        if evidence.is_empty() {
            return ChatOutcome::NoEvidence;
        }

        let messages = answer_messages(&evidence.context(), query);
        let outcome = match self.completion.complete(&messages).await {
            Ok(answer) => ChatOutcome::Answer(answer),
            Err(err) => {
                tracing::error!("answer synthesis failed: {err}");
                ChatOutcome::Upstream(err.to_string())
            }
        };

        tracing::info!(
            partitions = ?selected,
            chunks = evidence.len(),
            latency_ms = started.elapsed().as_millis() as u64,
            "question handled"
        );
        outcome
    }

    /// [`ChatService::handle`] rendered with the text prefix convention.
    pub async fn answer_text(&self, query: &str) -> String {
        self.handle(query).await.into_text()
    }
}

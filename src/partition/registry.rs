use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::OnceCell;

use super::index::PartitionIndex;

/// When the partition directory is re-read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReloadPolicy {
    /// Re-scan before every query so an offline reindex is visible at once.
    #[default]
    EveryQuery,
    /// Scan once, on first use, and keep that snapshot for the process lifetime.
    Startup,
}

impl ReloadPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "every_query" | "every-query" | "always" => Some(Self::EveryQuery),
            "startup" | "once" => Some(Self::Startup),
            _ => None,
        }
    }
}

/// Partition name -> loaded index. Names are the partition directory names.
#[derive(Debug, Default)]
pub struct PartitionRegistry {
    partitions: BTreeMap<String, PartitionIndex>,
}

impl PartitionRegistry {
    /// Loads every subdirectory of `root` as a partition. A partition that
    /// fails to load is logged and left out; a missing root gives an empty
    /// registry.
    pub fn scan(root: &Path) -> Self {
        let mut registry = Self::default();

        let dir_entries = match fs::read_dir(root) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!("partition root {} is not readable: {}", root.display(), err);
                return registry;
            }
        };

        for entry in dir_entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                tracing::warn!("skipping partition dir with non-UTF-8 name: {}", path.display());
                continue;
            };

            match PartitionIndex::load(&path) {
                Ok(index) => {
                    tracing::debug!(partition = %name, chunks = index.len(), "loaded partition");
                    registry.partitions.insert(name, index);
                }
                Err(err) => tracing::warn!(partition = %name, "failed to load partition: {err:#}"),
            }
        }

        tracing::info!(
            partitions = ?registry.partitions.keys().collect::<Vec<_>>(),
            "partition registry refreshed"
        );
        registry
    }

    pub fn insert(&mut self, name: impl Into<String>, index: PartitionIndex) {
        self.partitions.insert(name.into(), index);
    }

    pub fn get(&self, name: &str) -> Option<&PartitionIndex> {
        self.partitions.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.partitions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }
}

/// Pull-based access to the persisted partitions. Callers invoke
/// [`PartitionLoader::refresh`] at the start of each query; the
/// [`ReloadPolicy`] decides whether that touches the disk.
pub struct PartitionLoader {
    root: PathBuf,
    policy: ReloadPolicy,
    snapshot: OnceCell<Arc<PartitionRegistry>>,
}

impl PartitionLoader {
    pub fn new(root: impl Into<PathBuf>, policy: ReloadPolicy) -> Self {
        Self {
            root: root.into(),
            policy,
            snapshot: OnceCell::new(),
        }
    }

    pub async fn refresh(&self) -> Result<Arc<PartitionRegistry>> {
        match self.policy {
            ReloadPolicy::EveryQuery => self.scan().await,
            ReloadPolicy::Startup => self
                .snapshot
                .get_or_try_init(|| self.scan())
                .await
                .cloned(),
        }
    }

    async fn scan(&self) -> Result<Arc<PartitionRegistry>> {
        let root = self.root.clone();
        let registry = tokio::task::spawn_blocking(move || PartitionRegistry::scan(&root))
            .await
            .context("partition scan task panicked")?;
        Ok(Arc::new(registry))
    }
}

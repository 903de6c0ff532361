//! Indexing orchestrator: stage → build → persist.

use std::path::Path;
use std::time::Instant;

use athena_llm::LlmProvider;

use crate::builder::IndexBuilder;
use crate::error::{IndexError, Result};
use crate::key::IndexKey;
use crate::storage::StorageBackend;

/// Summary of an indexing run.
#[derive(Debug, Clone)]
pub struct IndexReport {
    pub key: IndexKey,
    pub files_loaded: usize,
    pub files_renamed: usize,
    pub chunks: usize,
    pub duration_ms: u64,
}

/// Stages sources, builds a vector index from them and persists it.
pub struct Indexer<P> {
    storage: StorageBackend,
    builder: IndexBuilder<P>,
    version: String,
}

impl<P: LlmProvider> Indexer<P> {
    #[must_use]
    pub fn new(
        storage: StorageBackend,
        builder: IndexBuilder<P>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            builder,
            version: version.into(),
        }
    }

    #[must_use]
    pub fn storage(&self) -> &StorageBackend {
        &self.storage
    }

    #[must_use]
    pub fn key(&self, index_name: &str) -> IndexKey {
        IndexKey::new(index_name, self.version.clone())
    }

    /// Index a single file under `index_name`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` before touching the disk if `index_name` or the version is
    /// not a plain name, or an error if staging, building or persisting fails.
    pub async fn index_file(&self, path: &Path, index_name: &str) -> Result<IndexReport> {
        self.key(index_name).validate()?;
        let file_name = path
            .file_name()
            .ok_or_else(|| IndexError::Other(format!("not a file path: {}", path.display())))?;
        let staging = self.storage.reset_staging(index_name).await?;
        self.storage
            .copy(path, &staging.join(file_name), false)
            .await?;
        self.run(index_name, &[]).await
    }

    /// Index a directory under `index_name`. A non-empty `file_list` restricts the
    /// build to those entries of the copied tree.
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` before touching the disk if `index_name` or the version is
    /// not a plain name, or an error if staging, building or persisting fails.
    pub async fn index_dir(
        &self,
        path: &Path,
        file_list: &[String],
        index_name: &str,
    ) -> Result<IndexReport> {
        self.key(index_name).validate()?;
        let staging = self.storage.reset_staging(index_name).await?;
        self.storage.copy(path, &staging, true).await?;
        self.run(index_name, file_list).await
    }

    async fn run(&self, index_name: &str, include: &[String]) -> Result<IndexReport> {
        let start = Instant::now();
        let key = self.key(index_name);

        let output = self.storage.build(&key, include, &self.builder).await?;
        self.storage.save(&key, &output.index).await?;

        let report = IndexReport {
            chunks: output.index.len(),
            files_loaded: output.files_loaded,
            files_renamed: output.files_renamed,
            duration_ms: start.elapsed().as_millis().try_into().unwrap_or(u64::MAX),
            key,
        };
        tracing::info!(
            index = %report.key,
            backend = self.storage.kind(),
            files = report.files_loaded,
            renamed = report.files_renamed,
            chunks = report.chunks,
            duration_ms = report.duration_ms,
            "indexing complete"
        );
        Ok(report)
    }
}

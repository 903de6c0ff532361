//! Build pipeline: clean → load → split → embed → assemble.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use athena_llm::LlmProvider;
use athena_memory::VectorIndex;
use athena_memory::document::{
    Chunk, DirectoryLoader, Document, DocumentLoader, SplitterConfig, TextSplitter,
};

use crate::cleaner::{CleanReport, clean};
use crate::error::{IndexError, Result};

#[derive(Debug, Clone)]
pub struct BuilderConfig {
    pub splitter: SplitterConfig,
    /// Inputs sent per embeddings request.
    pub embedding_batch_size: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            splitter: SplitterConfig::default(),
            embedding_batch_size: 1000,
        }
    }
}

/// Result of one build, before it is persisted.
#[derive(Debug)]
pub struct BuildOutput {
    pub index: VectorIndex,
    pub files_loaded: usize,
    pub files_renamed: usize,
}

pub struct IndexBuilder<P> {
    provider: Arc<P>,
    loader: DirectoryLoader,
    config: BuilderConfig,
}

impl<P: LlmProvider> IndexBuilder<P> {
    #[must_use]
    pub fn new(provider: Arc<P>, config: BuilderConfig) -> Self {
        Self {
            provider,
            loader: DirectoryLoader::default(),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Build one vector index from every root (file or directory).
    ///
    /// Chunk sources are reported relative to `source_root` under their
    /// pre-cleaning names.
    ///
    /// # Errors
    ///
    /// Returns `EmptyIndex` if the roots yield no chunks, or the first IO, loading or
    /// embedding error.
    pub async fn build(&self, roots: &[PathBuf], source_root: &Path) -> Result<BuildOutput> {
        let source_root = tokio::fs::canonicalize(source_root).await?;

        let mut renames = CleanReport::default();
        let mut chunks = Vec::new();
        let mut files_loaded = 0usize;

        let mut canonical = Vec::with_capacity(roots.len());
        for root in roots {
            canonical.push(tokio::fs::canonicalize(root).await?);
        }

        for root in distinct_roots(canonical) {
            let report = clean(&root).await?;
            let documents = self.loader.load(&report.current_path(&root)).await?;
            files_loaded += documents.len();
            for document in documents {
                chunks.extend(self.split(document, &report, &source_root));
            }
            renames.extend(report);
        }

        tracing::debug!(
            files = files_loaded,
            renamed = renames.len(),
            chunks = chunks.len(),
            "documents split"
        );

        if chunks.is_empty() {
            return Err(IndexError::EmptyIndex);
        }

        let embeddings = self.embed(&chunks).await?;
        let index = VectorIndex::from_embeddings(chunks, embeddings)?;

        Ok(BuildOutput {
            index,
            files_loaded,
            files_renamed: renames.len(),
        })
    }

    fn split(
        &self,
        mut document: Document,
        renames: &CleanReport,
        source_root: &Path,
    ) -> Vec<Chunk> {
        let loaded = PathBuf::from(&document.metadata.source);
        let original = renames
            .original_of(&loaded)
            .map_or_else(|| loaded.clone(), Path::to_path_buf);
        let label = original
            .strip_prefix(source_root)
            .unwrap_or(&original)
            .display()
            .to_string();
        document.metadata.source.clone_from(&label);

        let splitter = TextSplitter::for_path(self.config.splitter.clone(), &original);
        let mut chunks = splitter.split(&document);
        for chunk in &mut chunks {
            chunk.content = format!("{label}\n\n{}", chunk.content);
        }
        tracing::debug!(source = %label, chunks = chunks.len(), "split document");
        chunks
    }

    async fn embed(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let batch_size = self.config.embedding_batch_size.max(1);

        let mut embeddings = Vec::with_capacity(texts.len());
        for (i, batch) in texts.chunks(batch_size).enumerate() {
            tracing::debug!(batch = i, size = batch.len(), "embedding batch");
            embeddings.extend(self.provider.embed_batch(batch).await?);
        }
        Ok(embeddings)
    }
}

/// Drop roots equal to or nested inside another root, keeping first-seen order.
fn distinct_roots(roots: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut kept: Vec<PathBuf> = Vec::with_capacity(roots.len());
    for root in roots {
        if kept.iter().any(|k| root.starts_with(k)) {
            tracing::debug!(root = %root.display(), "root already covered, skipping");
            continue;
        }
        kept.retain(|k| !k.starts_with(&root));
        kept.push(root);
    }
    kept
}

//! Flat exact nearest-neighbour index over chunk embeddings.
//!
//! An index is persisted as two JSON documents: `index.json` holds the ids, vectors
//! and dimension, `docstore.json` maps every id to its chunk text and metadata.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::document::{Chunk, DocumentMetadata};

pub const INDEX_FILE: &str = "index.json";
pub const DOCSTORE_FILE: &str = "docstore.json";

#[derive(Debug, thiserror::Error)]
pub enum VectorIndexError {
    #[error("cannot build an index from zero chunks")]
    Empty,

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("corrupt index: {0}")]
    Corrupt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChunk {
    pub id: String,
    pub text: String,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: StoredChunk,
    pub score: f32,
}

#[derive(Serialize, Deserialize)]
struct IndexFile {
    dimension: usize,
    ids: Vec<String>,
    vectors: Vec<Vec<f32>>,
}

#[derive(Serialize, Deserialize)]
struct DocstoreEntry {
    text: String,
    metadata: DocumentMetadata,
}

#[derive(Debug, Clone)]
pub struct VectorIndex {
    dimension: usize,
    ids: Vec<String>,
    vectors: Vec<Vec<f32>>,
    docstore: HashMap<String, StoredChunk>,
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

impl VectorIndex {
    /// Pair every chunk with its embedding under a fresh id.
    ///
    /// # Errors
    ///
    /// Returns `Empty` for zero chunks, `Corrupt` when the counts differ and
    /// `DimensionMismatch` when the vectors do not share one dimension.
    pub fn from_embeddings(
        chunks: Vec<Chunk>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<Self, VectorIndexError> {
        if chunks.is_empty() {
            return Err(VectorIndexError::Empty);
        }
        if chunks.len() != embeddings.len() {
            return Err(VectorIndexError::Corrupt(format!(
                "{} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }

        let dimension = embeddings[0].len();
        let mut ids = Vec::with_capacity(chunks.len());
        let mut docstore = HashMap::with_capacity(chunks.len());
        for (chunk, vector) in chunks.into_iter().zip(&embeddings) {
            if vector.len() != dimension {
                return Err(VectorIndexError::DimensionMismatch {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            let id = uuid::Uuid::new_v4().to_string();
            docstore.insert(
                id.clone(),
                StoredChunk {
                    id: id.clone(),
                    text: chunk.content,
                    metadata: chunk.metadata,
                },
            );
            ids.push(id);
        }

        Ok(Self {
            dimension,
            ids,
            vectors: embeddings,
            docstore,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Stored chunks in insertion order.
    pub fn chunks(&self) -> impl Iterator<Item = &StoredChunk> {
        self.ids.iter().filter_map(|id| self.docstore.get(id))
    }

    /// Return the `k` chunks most similar to `query`, best first.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if `query` has a different dimension than the index.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, VectorIndexError> {
        if query.len() != self.dimension {
            return Err(VectorIndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, cosine_similarity(query, v)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .filter_map(|(i, score)| {
                self.docstore.get(&self.ids[i]).map(|chunk| ScoredChunk {
                    chunk: chunk.clone(),
                    score,
                })
            })
            .collect())
    }

    /// Serialize into the `(index.json, docstore.json)` byte pair.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<(Vec<u8>, Vec<u8>), VectorIndexError> {
        let index = IndexFile {
            dimension: self.dimension,
            ids: self.ids.clone(),
            vectors: self.vectors.clone(),
        };
        let docstore: BTreeMap<&str, DocstoreEntry> = self
            .chunks()
            .map(|c| {
                (
                    c.id.as_str(),
                    DocstoreEntry {
                        text: c.text.clone(),
                        metadata: c.metadata.clone(),
                    },
                )
            })
            .collect();
        Ok((serde_json::to_vec(&index)?, serde_json::to_vec(&docstore)?))
    }

    /// Rebuild an index from its persisted byte pair.
    ///
    /// # Errors
    ///
    /// Returns `Json` on malformed input and `Corrupt`, `DimensionMismatch` or `Empty`
    /// when the two documents disagree with each other.
    pub fn from_json(index: &[u8], docstore: &[u8]) -> Result<Self, VectorIndexError> {
        let index: IndexFile = serde_json::from_slice(index)?;
        let mut entries: HashMap<String, DocstoreEntry> = serde_json::from_slice(docstore)?;

        if index.ids.is_empty() {
            return Err(VectorIndexError::Empty);
        }
        if index.ids.len() != index.vectors.len() {
            return Err(VectorIndexError::Corrupt(format!(
                "{} ids but {} vectors",
                index.ids.len(),
                index.vectors.len()
            )));
        }
        if let Some(v) = index.vectors.iter().find(|v| v.len() != index.dimension) {
            return Err(VectorIndexError::DimensionMismatch {
                expected: index.dimension,
                actual: v.len(),
            });
        }

        let mut store = HashMap::with_capacity(index.ids.len());
        for id in &index.ids {
            let entry = entries
                .remove(id)
                .ok_or_else(|| VectorIndexError::Corrupt(format!("docstore has no entry for {id}")))?;
            store.insert(
                id.clone(),
                StoredChunk {
                    id: id.clone(),
                    text: entry.text,
                    metadata: entry.metadata,
                },
            );
        }

        Ok(Self {
            dimension: index.dimension,
            ids: index.ids,
            vectors: index.vectors,
            docstore: store,
        })
    }

    /// Write `index.json` and `docstore.json` into `dir`, creating it if needed and
    /// replacing existing files.
    ///
    /// # Errors
    ///
    /// Returns an error on serialization or filesystem failure.
    pub async fn save_dir(&self, dir: &Path) -> Result<(), VectorIndexError> {
        let (index, docstore) = self.to_json()?;
        tokio::fs::create_dir_all(dir).await?;
        tokio::fs::write(dir.join(INDEX_FILE), index).await?;
        tokio::fs::write(dir.join(DOCSTORE_FILE), docstore).await?;
        tracing::debug!(dir = %dir.display(), chunks = self.len(), "saved vector index");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if either file is missing or the contents are invalid.
    pub async fn load_dir(dir: &Path) -> Result<Self, VectorIndexError> {
        let index = tokio::fs::read(dir.join(INDEX_FILE)).await?;
        let docstore = tokio::fs::read(dir.join(DOCSTORE_FILE)).await?;
        let loaded = Self::from_json(&index, &docstore)?;
        tracing::debug!(dir = %dir.display(), chunks = loaded.len(), "loaded vector index");
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str) -> Chunk {
        Chunk {
            content: text.to_owned(),
            metadata: DocumentMetadata::new("notes.md", "text/markdown"),
            chunk_index: 0,
        }
    }

    fn sample() -> VectorIndex {
        VectorIndex::from_embeddings(
            vec![chunk("x axis"), chunk("y axis"), chunk("diagonal")],
            vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]],
        )
        .unwrap()
    }

    #[test]
    fn cosine_identical_vectors() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_vectors() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn cosine_zero_vector() {
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]).abs() < f32::EPSILON);
    }

    #[test]
    fn empty_build_fails() {
        let err = VectorIndex::from_embeddings(Vec::new(), Vec::new()).unwrap_err();
        assert!(matches!(err, VectorIndexError::Empty));
    }

    #[test]
    fn count_mismatch_fails() {
        let err = VectorIndex::from_embeddings(vec![chunk("a")], Vec::new()).unwrap_err();
        assert!(matches!(err, VectorIndexError::Corrupt(_)));
    }

    #[test]
    fn mixed_dimensions_fail() {
        let err = VectorIndex::from_embeddings(
            vec![chunk("a"), chunk("b")],
            vec![vec![1.0, 0.0], vec![1.0]],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            VectorIndexError::DimensionMismatch {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn search_orders_by_similarity() {
        let index = sample();
        let results = index.search(&[1.0, 0.1], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.text, "x axis");
        assert_eq!(results[1].chunk.text, "diagonal");
        assert!(results[0].score >= results[1].score);
    }

    #[test]
    fn search_k_larger_than_len() {
        let results = sample().search(&[0.0, 1.0], 10).unwrap();
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn search_rejects_wrong_dimension() {
        let err = sample().search(&[1.0, 0.0, 0.0], 1).unwrap_err();
        assert!(matches!(err, VectorIndexError::DimensionMismatch { .. }));
    }

    #[test]
    fn json_restores_chunks_and_order() {
        let index = sample();
        let (raw_index, raw_docstore) = index.to_json().unwrap();
        let restored = VectorIndex::from_json(&raw_index, &raw_docstore).unwrap();

        assert_eq!(restored.len(), 3);
        assert_eq!(restored.dimension(), 2);
        let original: Vec<_> = index.chunks().cloned().collect();
        let loaded: Vec<_> = restored.chunks().cloned().collect();
        assert_eq!(original, loaded);
    }

    #[test]
    fn missing_docstore_entry_is_corrupt() {
        let (raw_index, _) = sample().to_json().unwrap();
        let err = VectorIndex::from_json(&raw_index, b"{}").unwrap_err();
        assert!(matches!(err, VectorIndexError::Corrupt(_)));
    }

    #[test]
    fn malformed_json_is_rejected() {
        let err = VectorIndex::from_json(b"not json", b"{}").unwrap_err();
        assert!(matches!(err, VectorIndexError::Json(_)));
    }

    #[tokio::test]
    async fn save_and_load_dir() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/notes-v1");
        let index = sample();

        index.save_dir(&target).await.unwrap();
        assert!(target.join(INDEX_FILE).exists());
        assert!(target.join(DOCSTORE_FILE).exists());

        let loaded = VectorIndex::load_dir(&target).await.unwrap();
        assert_eq!(loaded.len(), index.len());
        let hit = loaded.search(&[0.0, 1.0], 1).unwrap();
        assert_eq!(hit[0].chunk.text, "y axis");
    }

    #[tokio::test]
    async fn save_replaces_previous_index() {
        let dir = tempfile::tempdir().unwrap();
        sample().save_dir(dir.path()).await.unwrap();

        let smaller =
            VectorIndex::from_embeddings(vec![chunk("only")], vec![vec![1.0, 0.0]]).unwrap();
        smaller.save_dir(dir.path()).await.unwrap();

        let loaded = VectorIndex::load_dir(dir.path()).await.unwrap();
        assert_eq!(loaded.len(), 1);
    }

    #[tokio::test]
    async fn load_missing_dir_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = VectorIndex::load_dir(&dir.path().join("absent")).await.unwrap_err();
        assert!(matches!(err, VectorIndexError::Io(_)));
    }
}

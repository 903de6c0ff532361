//! Where sources are staged and where built indexes live.
//!
//! Staging is always on local disk under `{base}/{name}/{name}-source`. A built index
//! is persisted either under `{base}/{name}-{version}/` or as two objects below
//! `{name}/{version}/index/` in a GCS bucket.

use std::path::{Component, Path, PathBuf};

use athena_llm::LlmProvider;
use athena_memory::VectorIndex;
use athena_memory::document::DocumentError;
use athena_memory::vector_index::{DOCSTORE_FILE, INDEX_FILE};

use crate::builder::{BuildOutput, IndexBuilder};
use crate::error::{IndexError, Result};
use crate::gcs::GcsClient;
use crate::key::{IndexKey, validate_name};

/// Entry-name prefixes left out of directory copies.
const SKIPPED_PREFIXES: &[&str] = &["node_modules", "dist", "build"];

#[derive(Debug, Clone)]
pub enum StorageBackend {
    Local { base: PathBuf },
    Cloud { base: PathBuf, gcs: GcsClient },
}

fn is_skipped(name: &std::ffi::OsStr) -> bool {
    let name = name.to_string_lossy();
    SKIPPED_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// Remove everything inside `dir`, creating it if absent.
async fn reset_dir(dir: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    tokio::fs::create_dir_all(dir).await?;
    Ok(())
}

impl StorageBackend {
    /// Local storage rooted at `{root}/{dir}`.
    #[must_use]
    pub fn local(root: impl AsRef<Path>, dir: &str) -> Self {
        Self::Local {
            base: root.as_ref().join(dir),
        }
    }

    /// Cloud storage staging under `{root}/{dir}`.
    #[must_use]
    pub fn cloud(root: impl AsRef<Path>, dir: &str, gcs: GcsClient) -> Self {
        Self::Cloud {
            base: root.as_ref().join(dir),
            gcs,
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Local { .. } => "local",
            Self::Cloud { .. } => "cloud",
        }
    }

    #[must_use]
    pub fn base_dir(&self) -> &Path {
        match self {
            Self::Local { base } | Self::Cloud { base, .. } => base,
        }
    }

    #[must_use]
    pub fn staging_dir(&self, name: &str) -> PathBuf {
        self.base_dir().join(name).join(format!("{name}-source"))
    }

    /// Local directory holding a persisted index.
    #[must_use]
    pub fn index_dir(&self, key: &IndexKey) -> PathBuf {
        self.base_dir().join(key.dir_name())
    }

    /// Empty the staging directory for `name` and return its path.
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` if `name` is not a plain component, or an error if the
    /// directory cannot be removed or recreated.
    pub async fn reset_staging(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        let staging = self.staging_dir(name);
        reset_dir(&staging).await?;
        Ok(staging)
    }

    /// Copy a file to `destination`, or a directory tree into `destination`.
    ///
    /// Directory copies skip `node_modules*`, `dist*` and `build*` entries at any
    /// depth and merge into existing contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or a copy fails.
    pub async fn copy(&self, source: &Path, destination: &Path, is_directory: bool) -> Result<()> {
        tracing::debug!(
            source = %source.display(),
            destination = %destination.display(),
            is_directory,
            "copying sources"
        );

        if !is_directory {
            if let Some(parent) = destination.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::copy(source, destination).await?;
            return Ok(());
        }

        tokio::fs::create_dir_all(destination).await?;
        for entry in ignore::WalkBuilder::new(source)
            .standard_filters(false)
            .filter_entry(|e| e.depth() == 0 || !is_skipped(e.file_name()))
            .build()
        {
            let entry = entry.map_err(DocumentError::from)?;
            let Ok(relative) = entry.path().strip_prefix(source) else {
                continue;
            };
            let target = destination.join(relative);
            match entry.file_type() {
                Some(ft) if ft.is_dir() => tokio::fs::create_dir_all(&target).await?,
                Some(ft) if ft.is_file() => {
                    tokio::fs::copy(entry.path(), &target).await?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Build an index from the staged sources of `key.name`.
    ///
    /// With an empty `include` list the whole staging directory is built; otherwise
    /// only `staging/<entry>` for each entry, where `"."` names the staging directory.
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` for a path-like key, `InvalidInclude` for absolute or
    /// parent-relative entries, or any error from the build pipeline.
    pub async fn build<P: LlmProvider>(
        &self,
        key: &IndexKey,
        include: &[String],
        builder: &IndexBuilder<P>,
    ) -> Result<BuildOutput> {
        key.validate()?;
        let staging = self.staging_dir(&key.name);
        let roots = if include.is_empty() {
            vec![staging.clone()]
        } else {
            include
                .iter()
                .map(|entry| resolve_include(&staging, entry))
                .collect::<Result<Vec<_>>>()?
        };
        builder.build(&roots, &staging).await
    }

    /// Persist `index` at `key`, replacing any previous version.
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` for a path-like key, or an error on serialization,
    /// filesystem or upload failure.
    pub async fn save(&self, key: &IndexKey, index: &VectorIndex) -> Result<()> {
        key.validate()?;
        match self {
            Self::Local { .. } => {
                let dir = self.index_dir(key);
                index.save_dir(&dir).await?;
            }
            Self::Cloud { gcs, .. } => {
                let (raw_index, raw_docstore) = index.to_json()?;
                let prefix = key.object_prefix();
                gcs.upload(&format!("{prefix}/{INDEX_FILE}"), raw_index).await?;
                gcs.upload(&format!("{prefix}/{DOCSTORE_FILE}"), raw_docstore)
                    .await?;
            }
        }
        tracing::debug!(backend = self.kind(), %key, chunks = index.len(), "index saved");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `InvalidName` for a path-like key, `NotFound` naming the key when nothing
    /// is persisted there, or an error if the stored index is unreadable.
    pub async fn load(&self, key: &IndexKey) -> Result<VectorIndex> {
        key.validate()?;
        let index = match self {
            Self::Local { .. } => {
                let dir = self.index_dir(key);
                if !tokio::fs::try_exists(dir.join(INDEX_FILE)).await? {
                    return Err(IndexError::NotFound(format!(
                        "{key} at {}",
                        dir.display()
                    )));
                }
                VectorIndex::load_dir(&dir).await?
            }
            Self::Cloud { gcs, .. } => {
                let raw_index = download_part(gcs, key, INDEX_FILE).await?;
                let raw_docstore = download_part(gcs, key, DOCSTORE_FILE).await?;
                VectorIndex::from_json(&raw_index, &raw_docstore)?
            }
        };
        tracing::debug!(backend = self.kind(), %key, chunks = index.len(), "index loaded");
        Ok(index)
    }
}

async fn download_part(gcs: &GcsClient, key: &IndexKey, file: &str) -> Result<Vec<u8>> {
    let object = format!("{}/{file}", key.object_prefix());
    gcs.download(&object).await.map_err(|e| match e {
        IndexError::NotFound(_) => {
            IndexError::NotFound(format!("{key} at gs://{}/{object}", gcs.bucket()))
        }
        other => other,
    })
}

fn resolve_include(staging: &Path, entry: &str) -> Result<PathBuf> {
    let relative = Path::new(entry);
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(IndexError::InvalidInclude(entry.to_owned()));
    }
    Ok(staging.join(relative))
}

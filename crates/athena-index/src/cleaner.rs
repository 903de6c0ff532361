//! Normalizes a staged tree so every file can be loaded as plain text.
//!
//! Files whose type is not recognized, and all JSON files, get a `.txt` suffix
//! appended. The returned [`CleanReport`] remembers each rename so chunk metadata can
//! point at the original path.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use athena_memory::document::{DocumentError, detect_language};

use crate::error::Result;

/// Extensions loaded as documents without renaming.
const DOCUMENT_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "rst", "html", "htm", "xml", "csv", "tsv", "org",
];

/// Renames performed by [`clean`], keyed by the new path.
#[derive(Debug, Clone, Default)]
pub struct CleanReport {
    renamed: BTreeMap<PathBuf, PathBuf>,
}

impl CleanReport {
    #[must_use]
    pub fn len(&self) -> usize {
        self.renamed.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.renamed.is_empty()
    }

    /// Path a renamed file had before cleaning.
    #[must_use]
    pub fn original_of(&self, renamed: &Path) -> Option<&Path> {
        self.renamed.get(renamed).map(PathBuf::as_path)
    }

    /// Current location of a file that may have been renamed.
    #[must_use]
    pub fn current_path(&self, original: &Path) -> PathBuf {
        self.renamed
            .iter()
            .find(|(_, from)| from.as_path() == original)
            .map_or_else(|| original.to_path_buf(), |(to, _)| to.clone())
    }

    pub fn extend(&mut self, other: CleanReport) {
        self.renamed.extend(other.renamed);
    }
}

fn needs_rename(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("json") => true,
        Some(ext) if DOCUMENT_EXTENSIONS.contains(&ext) => false,
        _ => detect_language(path).is_none(),
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// `<file>.txt`, or `<file>.N.txt` for the smallest `N` that names no existing file.
async fn free_txt_name(path: &Path) -> Result<PathBuf> {
    let candidate = with_suffix(path, ".txt");
    if !tokio::fs::try_exists(&candidate).await? {
        return Ok(candidate);
    }
    let mut n = 1u32;
    loop {
        let candidate = with_suffix(path, &format!(".{n}.txt"));
        if !tokio::fs::try_exists(&candidate).await? {
            tracing::warn!(
                path = %path.display(),
                to = %candidate.display(),
                "rename target already exists, using a numbered name"
            );
            return Ok(candidate);
        }
        n += 1;
    }
}

/// Rename unknown and JSON files under `root` (a directory or a single file) to
/// `<file>.txt`. `.git` directories are skipped. Paths in the report are canonical.
///
/// Existing files are never replaced: when `<file>.txt` is taken the file becomes
/// `<file>.1.txt` (or the next free number).
///
/// # Errors
///
/// Returns an error if the tree cannot be walked or a rename fails.
pub async fn clean(root: &Path) -> Result<CleanReport> {
    let root = tokio::fs::canonicalize(root).await?;
    tracing::debug!(root = %root.display(), "cleaning staged sources");

    let mut targets = Vec::new();
    for entry in ignore::WalkBuilder::new(&root)
        .standard_filters(false)
        .filter_entry(|e| e.file_name() != ".git")
        .build()
    {
        let entry = entry.map_err(DocumentError::from)?;
        if entry.file_type().is_some_and(|ft| ft.is_file()) && needs_rename(entry.path()) {
            targets.push(entry.into_path());
        }
    }

    let mut report = CleanReport::default();
    for original in targets {
        let renamed = free_txt_name(&original).await?;
        tokio::fs::rename(&original, &renamed).await?;
        tracing::debug!(
            from = %original.display(),
            to = %renamed.display(),
            "renamed for loading"
        );
        report.renamed.insert(renamed, original);
    }
    Ok(report)
}

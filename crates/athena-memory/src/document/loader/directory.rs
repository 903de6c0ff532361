use std::path::Path;
use std::pin::Pin;

use super::super::{Document, DocumentError, DocumentLoader};
use super::TextLoader;

/// Recursively loads every regular file under a root, in file-name order.
///
/// `.git` directories are never entered. Hidden files and ignore files are not
/// honoured: everything staged for indexing is loaded. A file path is loaded directly.
#[derive(Debug, Clone, Default)]
pub struct DirectoryLoader {
    pub text: TextLoader,
}

impl DirectoryLoader {
    #[must_use]
    pub fn new(text: TextLoader) -> Self {
        Self { text }
    }
}

impl DocumentLoader for DirectoryLoader {
    fn load(
        &self,
        path: &Path,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<Document>, DocumentError>> + Send + '_>>
    {
        let root = path.to_path_buf();
        Box::pin(async move {
            let meta = tokio::fs::metadata(&root).await?;
            if meta.is_file() {
                return self.text.load(&root).await;
            }

            let mut files = Vec::new();
            for entry in ignore::WalkBuilder::new(&root)
                .standard_filters(false)
                .filter_entry(|e| e.file_name() != ".git")
                .sort_by_file_name(std::cmp::Ord::cmp)
                .build()
            {
                let entry = entry?;
                if entry.file_type().is_some_and(|ft| ft.is_file()) {
                    files.push(entry.into_path());
                }
            }

            tracing::debug!(root = %root.display(), files = files.len(), "loading directory");

            let mut documents = Vec::with_capacity(files.len());
            for file in &files {
                documents.extend(self.text.load(file).await?);
            }
            Ok(documents)
        })
    }
}

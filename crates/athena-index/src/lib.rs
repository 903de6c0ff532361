//! Index build pipeline for Athena: stage, clean, load, split, embed, persist.

pub mod builder;
pub mod cleaner;
pub mod error;
pub mod gcs;
pub mod indexer;
pub mod key;
pub mod storage;

pub use builder::{BuildOutput, BuilderConfig, IndexBuilder};
pub use error::{IndexError, Result};
pub use gcs::GcsClient;
pub use indexer::{IndexReport, Indexer};
pub use key::IndexKey;
pub use storage::StorageBackend;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::client::ClientConfig;
use crate::secret::Secret;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub splitter: SplitterSettings,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

fn default_base_url() -> String {
    athena_llm::openai::DEFAULT_BASE_URL.into()
}

fn default_embedding_model() -> String {
    athena_llm::openai::DEFAULT_EMBEDDING_MODEL.into()
}

fn default_embedding_batch_size() -> usize {
    1000
}

fn default_embed_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_embedding_batch_size")]
    pub embedding_batch_size: usize,
    #[serde(default = "default_embed_retries")]
    pub embed_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            embedding_model: default_embedding_model(),
            embedding_batch_size: default_embedding_batch_size(),
            embed_retries: default_embed_retries(),
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from(".")
}

/// Storage directory that selects the local backend.
pub const LOCAL_STORAGE_DIR: &str = "dist";

fn default_storage_dir() -> String {
    LOCAL_STORAGE_DIR.into()
}

fn default_version() -> String {
    "v1".into()
}

#[derive(Debug, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
    #[serde(default = "default_storage_dir")]
    pub dir: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub cloud: CloudStorageConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            dir: default_storage_dir(),
            version: default_version(),
            cloud: CloudStorageConfig::default(),
        }
    }
}

fn default_bucket() -> String {
    "athena-indexes".into()
}

fn default_gcs_base_url() -> String {
    athena_index::gcs::DEFAULT_GCS_BASE_URL.into()
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CloudStorageConfig {
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default = "default_gcs_base_url")]
    pub base_url: String,
}

impl Default for CloudStorageConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            base_url: default_gcs_base_url(),
        }
    }
}

fn default_chunk_size() -> usize {
    2000
}

fn default_chunk_overlap() -> usize {
    20
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SplitterSettings {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for SplitterSettings {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_top_k() -> usize {
    4
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

/// Credentials resolved from the environment, never read from or written to TOML.
#[derive(Debug, Default)]
pub struct ResolvedSecrets {
    pub openai_api_key: Option<Secret>,
    pub gcs_token: Option<Secret>,
}

mod env;
mod types;


pub use types::*;

use std::path::Path;

use anyhow::Context;
use athena_index::{BuilderConfig, GcsClient, StorageBackend};
use athena_llm::openai::OpenAiProvider;
use athena_memory::document::SplitterConfig;

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or if the
    /// resulting splitter settings are unusable.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns an error if `chunk_size` is zero or not larger than `chunk_overlap`.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.splitter.chunk_size == 0 {
            anyhow::bail!("splitter.chunk_size must be positive");
        }
        if self.splitter.chunk_overlap >= self.splitter.chunk_size {
            anyhow::bail!(
                "splitter.chunk_overlap ({}) must be smaller than splitter.chunk_size ({})",
                self.splitter.chunk_overlap,
                self.splitter.chunk_size
            );
        }
        Ok(())
    }

    #[must_use]
    pub fn splitter_config(&self) -> SplitterConfig {
        SplitterConfig {
            chunk_size: self.splitter.chunk_size,
            chunk_overlap: self.splitter.chunk_overlap,
        }
    }

    #[must_use]
    pub fn builder_config(&self) -> BuilderConfig {
        BuilderConfig {
            splitter: self.splitter_config(),
            embedding_batch_size: self.llm.embedding_batch_size,
        }
    }

    /// Storage for indexes under `{root}/{group}`: local disk for the `dist` group,
    /// the configured GCS bucket for any other.
    ///
    /// # Errors
    ///
    /// Returns an error if the cloud HTTP client cannot be built.
    pub fn storage_backend(&self, group: &str) -> anyhow::Result<StorageBackend> {
        if group == LOCAL_STORAGE_DIR {
            return Ok(StorageBackend::local(&self.storage.root, group));
        }
        let token = self
            .secrets
            .gcs_token
            .as_ref()
            .map(|t| t.expose().to_owned());
        let gcs = GcsClient::new(
            self.storage.cloud.bucket.clone(),
            self.storage.cloud.base_url.clone(),
            token,
        )
        .context("failed to create GCS client")?;
        Ok(StorageBackend::cloud(&self.storage.root, group, gcs))
    }

    /// # Errors
    ///
    /// Returns an error if `OPENAI_API_KEY` is unset or the HTTP client cannot be built.
    pub fn openai_provider(&self) -> anyhow::Result<OpenAiProvider> {
        let api_key = self
            .secrets
            .openai_api_key
            .as_ref()
            .map(|k| k.expose().to_owned())
            .unwrap_or_default();
        let provider = OpenAiProvider::new(
            api_key,
            self.llm.base_url.clone(),
            self.llm.embedding_model.clone(),
        )
        .context("set OPENAI_API_KEY to call the OpenAI API")?;
        Ok(provider.with_embed_retries(self.llm.embed_retries))
    }
}

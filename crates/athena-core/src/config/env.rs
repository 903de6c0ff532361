use super::Config;
use crate::secret::Secret;

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("OPENAI_API_KEY")
            && !v.is_empty()
        {
            self.secrets.openai_api_key = Some(Secret::new(v));
        }
        if let Ok(v) = std::env::var("ATHENA_GCS_TOKEN")
            && !v.is_empty()
        {
            self.secrets.gcs_token = Some(Secret::new(v));
        }
        if let Ok(v) = std::env::var("ATHENA_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("ATHENA_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }
        if let Ok(v) = std::env::var("ATHENA_STORAGE_ROOT") {
            self.storage.root = v.into();
        }
        if let Ok(v) = std::env::var("ATHENA_STORAGE_VERSION") {
            self.storage.version = v;
        }
        if let Ok(v) = std::env::var("ATHENA_GCS_BUCKET") {
            self.storage.cloud.bucket = v;
        }
        if let Ok(v) = std::env::var("ATHENA_TOP_K") {
            match v.parse::<usize>() {
                Ok(k) if k > 0 => self.retrieval.top_k = k,
                _ => tracing::warn!("ignoring invalid ATHENA_TOP_K value: {v}"),
            }
        }
        if let Ok(v) = std::env::var("ATHENA_CHUNK_SIZE") {
            match v.parse::<usize>() {
                Ok(size) if size > 0 => self.splitter.chunk_size = size,
                _ => tracing::warn!("ignoring invalid ATHENA_CHUNK_SIZE value: {v}"),
            }
        }
        if let Ok(v) = std::env::var("ATHENA_CHUNK_OVERLAP") {
            if let Ok(overlap) = v.parse::<usize>() {
                self.splitter.chunk_overlap = overlap;
            } else {
                tracing::warn!("ignoring invalid ATHENA_CHUNK_OVERLAP value: {v}");
            }
        }
    }
}

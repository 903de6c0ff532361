//! Minimal Google Cloud Storage client over the JSON API.

use std::fmt;

use crate::error::{IndexError, Result};

pub const DEFAULT_GCS_BASE_URL: &str = "https://storage.googleapis.com";

#[derive(Clone)]
pub struct GcsClient {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
    token: Option<String>,
}

impl fmt::Debug for GcsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GcsClient")
            .field("base_url", &self.base_url)
            .field("bucket", &self.bucket)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

fn encode(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes()).collect()
}

impl GcsClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        bucket: impl Into<String>,
        base_url: impl Into<String>,
        token: Option<String>,
    ) -> Result<Self> {
        Ok(Self {
            client: athena_llm::http::default_client()?,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            bucket: bucket.into(),
            token,
        })
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Upload `bytes` as `object`, replacing any existing object.
    ///
    /// # Errors
    ///
    /// Returns `Cloud` on a non-success status or `Http` on transport failure.
    pub async fn upload(&self, object: &str, bytes: Vec<u8>) -> Result<()> {
        let url = format!(
            "{}/upload/storage/v1/b/{}/o?uploadType=media&name={}",
            self.base_url,
            encode(&self.bucket),
            encode(object)
        );
        let response = self
            .authorize(self.client.post(&url))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, object, body = %body, "GCS upload failed");
            return Err(IndexError::Cloud { status });
        }
        tracing::debug!(bucket = %self.bucket, object, "uploaded object");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `NotFound` for a missing object, `Cloud` on any other non-success
    /// status or `Http` on transport failure.
    pub async fn download(&self, object: &str) -> Result<Vec<u8>> {
        let url = format!(
            "{}/storage/v1/b/{}/o/{}?alt=media",
            self.base_url,
            encode(&self.bucket),
            encode(object)
        );
        let response = self.authorize(self.client.get(&url)).send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(IndexError::NotFound(format!("gs://{}/{object}", self.bucket)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, object, body = %body, "GCS download failed");
            return Err(IndexError::Cloud { status });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

//! Rate-limit handling for embedding requests.

use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};

use crate::error::LlmError;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// How long to wait before retry number `attempt` (zero-based).
///
/// A numeric `Retry-After` header wins; otherwise the wait doubles per attempt, capped at
/// one minute.
pub(crate) fn backoff(headers: &HeaderMap, attempt: u32) -> Duration {
    let advertised = headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    advertised
        .unwrap_or_else(|| INITIAL_BACKOFF.saturating_mul(1 << attempt.min(16)))
        .min(MAX_BACKOFF)
}

/// Issue the request built by `send`, re-issuing it while the server answers 429.
///
/// Any other response, success or not, is returned for the caller to inspect.
///
/// # Errors
///
/// `LlmError::RateLimited` once `max_retries` retries were all rate limited, or
/// `LlmError::Http` on transport failure.
pub(crate) async fn send_with_retry<F, Fut>(
    provider: &'static str,
    max_retries: u32,
    mut send: F,
) -> Result<reqwest::Response, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    let mut attempt = 0;
    loop {
        let response = send().await?;
        if response.status() != StatusCode::TOO_MANY_REQUESTS {
            return Ok(response);
        }
        if attempt >= max_retries {
            tracing::error!(provider, attempts = attempt + 1, "rate limit retries exhausted");
            return Err(LlmError::RateLimited);
        }

        let delay = backoff(response.headers(), attempt);
        attempt += 1;
        tracing::warn!(
            provider,
            attempt,
            max_retries,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "rate limited, backing off"
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use reqwest::header::HeaderValue;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn headers(retry_after: Option<&'static str>) -> HeaderMap {
        let mut map = HeaderMap::new();
        if let Some(v) = retry_after {
            map.insert(RETRY_AFTER, HeaderValue::from_static(v));
        }
        map
    }

    async fn post(server: &MockServer, retries: u32) -> Result<reqwest::Response, LlmError> {
        let client = reqwest::Client::new();
        let url = format!("{}/embeddings", server.uri());
        send_with_retry("test", retries, || client.post(&url).send()).await
    }

    #[test]
    fn retry_after_header_wins() {
        assert_eq!(backoff(&headers(Some("7")), 3), Duration::from_secs(7));
        assert_eq!(backoff(&headers(Some("0")), 2), Duration::ZERO);
    }

    #[test]
    fn unparseable_retry_after_falls_back_to_exponential() {
        let map = headers(Some("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(backoff(&map, 2), Duration::from_secs(4));
    }

    #[test]
    fn backoff_is_capped() {
        assert_eq!(backoff(&headers(None), 30), MAX_BACKOFF);
        assert_eq!(backoff(&headers(Some("3600")), 0), MAX_BACKOFF);
    }

    proptest! {
        #[test]
        fn backoff_never_shrinks(attempt in 0u32..32) {
            let map = headers(None);
            prop_assert!(backoff(&map, attempt + 1) >= backoff(&map, attempt));
        }
    }

    #[tokio::test]
    async fn first_success_is_returned() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let response = post(&server, 3).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn retries_after_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let response = post(&server, 2).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn gives_up_when_retries_run_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
            .expect(2)
            .mount(&server)
            .await;

        let err = post(&server, 1).await.unwrap_err();
        assert!(matches!(err, LlmError::RateLimited));
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let response = post(&server, 3).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

use std::time::Duration;

use reqwest::{Client, Url};

use super::SyncError;

/// Retry schedule for feed fetches: up to `max_attempts` tries, sleeping
/// `base_delay * 2^n` between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// A single attempt, no retry.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// HTTP(S) client for calendar feeds.
#[derive(Debug, Clone)]
pub struct FeedClient {
    client: Client,
    timeout: Duration,
    retry: RetryPolicy,
}

impl FeedClient {
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            client: Client::new(),
            timeout,
            retry,
        }
    }

    /// Fetch the feed body. Each attempt, body included, is bounded by the
    /// client timeout. Transport failures, timeouts and 5xx responses are
    /// retried; other failures are returned immediately.
    pub async fn fetch(&self, url: &str) -> Result<String, SyncError> {
        let url = Url::parse(url).map_err(|e| SyncError::Network(format!("invalid URL: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SyncError::Network(format!(
                "unsupported URL scheme: {}",
                url.scheme()
            )));
        }

        let attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.fetch_once(url.clone()).await {
                Ok(body) => return Ok(body),
                Err(e) if attempt < attempts && e.is_transient() => {
                    let delay = self.retry.delay_after(attempt);
                    tracing::debug!(
                        "Feed fetch attempt {}/{} failed: {}; retrying in {:?}",
                        attempt,
                        attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, url: Url) -> Result<String, SyncError> {
        let request = async {
            let response = self.client.get(url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(SyncError::Http(status));
            }
            Ok::<_, SyncError>(response.text().await?)
        };

        tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| SyncError::Timeout(self.timeout))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn rejects_unsupported_scheme() {
        let client = FeedClient::new(Duration::from_secs(1), RetryPolicy::none());
        let err = client.fetch("ftp://example.com/cal.ics").await.unwrap_err();
        assert!(matches!(err, SyncError::Network(_)));
    }

    #[tokio::test]
    async fn rejects_unparseable_url() {
        let client = FeedClient::new(Duration::from_secs(1), RetryPolicy::none());
        let err = client.fetch("not a url").await.unwrap_err();
        assert!(matches!(err, SyncError::Network(_)));
    }
}

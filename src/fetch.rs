//! Outbound HTTP.
//!
//! Both stages talk to the network through the [`Fetcher`] trait so they can
//! be driven by an in-memory fake in tests. [`HttpFetcher`] is the real
//! implementation: one `reqwest` client per timeout profile, no retries.

use crate::config::Timeouts;
use crate::error::{ConfigError, FetchError};
use std::time::Instant;
use tracing::{debug, instrument};

/// Fetch a URL and return its body as text.
pub trait Fetcher {
    /// Perform one GET. Non-success status codes are not errors; their body is
    /// returned like any other.
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError>;
}

/// `reqwest`-backed [`Fetcher`] with its own connect and read timeouts.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeouts: Timeouts, user_agent: &str) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeouts.connect())
            .read_timeout(timeouts.read())
            .user_agent(user_agent)
            .build()
            .map_err(ConfigError::Client)?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let t0 = Instant::now();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| transport_error(url, source))?;

        let status = response.status();
        let body = response.text().await.map_err(|source| {
            if source.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                }
            } else {
                FetchError::Decode {
                    url: url.to_string(),
                    source,
                }
            }
        })?;

        debug!(
            %status,
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched"
        );
        Ok(body)
    }
}

fn transport_error(url: &str, source: reqwest::Error) -> FetchError {
    if source.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Transport {
            url: url.to_string(),
            source,
        }
    }
}

/// In-memory [`Fetcher`] for tests.
#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    /// Serves canned bodies. Unknown URLs and URLs registered with
    /// [`FakeFetcher::timeout`] fail with [`FetchError::Timeout`].
    #[derive(Debug, Default)]
    pub struct FakeFetcher {
        bodies: HashMap<String, String>,
        cancel_on: HashMap<String, CancellationToken>,
        requests: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn body(mut self, url: &str, body: &str) -> Self {
            self.bodies.insert(url.to_string(), body.to_string());
            self
        }

        pub fn timeout(mut self, url: &str) -> Self {
            self.bodies.remove(url);
            self
        }

        /// Cancel `token` when `url` is requested. The request itself then
        /// fails like an unknown URL.
        pub fn cancel_on(mut self, url: &str, token: &CancellationToken) -> Self {
            self.bodies.remove(url);
            self.cancel_on.insert(url.to_string(), token.clone());
            self
        }

        /// Every URL requested so far, in request order.
        pub fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    impl Fetcher for FakeFetcher {
        async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
            self.requests.lock().unwrap().push(url.to_string());
            if let Some(token) = self.cancel_on.get(url) {
                token.cancel();
            }
            self.bodies
                .get(url)
                .cloned()
                .ok_or_else(|| FetchError::Timeout {
                    url: url.to_string(),
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeFetcher;
    use super::*;

    #[test]
    fn test_http_fetcher_builds() {
        let timeouts = Timeouts {
            connect_ms: 3_100,
            read_ms: 10_100,
        };
        assert!(HttpFetcher::new(timeouts, "interview_scraper/test").is_ok());
    }

    #[tokio::test]
    async fn test_fake_fetcher_records_requests() {
        let fetcher = FakeFetcher::new()
            .body("https://example.com/a", "A")
            .timeout("https://example.com/b");

        assert_eq!(fetcher.fetch_text("https://example.com/a").await.unwrap(), "A");
        assert!(matches!(
            fetcher.fetch_text("https://example.com/b").await,
            Err(FetchError::Timeout { .. })
        ));
        assert_eq!(
            fetcher.requests(),
            vec!["https://example.com/a", "https://example.com/b"]
        );
    }
}

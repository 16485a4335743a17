//! Multi-host fetching with bounded retry rounds.

use reqwest::header::HeaderMap;
use tracing::{debug, error, instrument, warn};
use url::Url;

use super::client::{Page, Transport};
use super::error::FetchError;
use super::retry::RetryPolicy;
use crate::events::{OPERATIONAL, Severity};

/// Fetches a URL, trying each fallback host in order for a bounded number
/// of rounds.
///
/// Each round walks the full candidate list; the first 2xx answer wins.
/// After a round where every candidate failed, the fetcher sleeps for the
/// policy delay before starting the next one.
#[derive(Debug, Clone)]
pub struct Fetcher<T> {
    transport: T,
    policy: RetryPolicy,
}

impl<T: Transport> Fetcher<T> {
    /// Creates a fetcher over `transport`.
    #[must_use]
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Returns the retry policy.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Returns the underlying transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetches `url`, joined against each of `fallback_hosts` when non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidUrl`] if a candidate cannot be built, a
    /// non-retryable error as soon as one occurs, or
    /// [`FetchError::Exhausted`] after the last round.
    pub async fn fetch(&self, url: &str, fallback_hosts: &[String]) -> Result<Page, FetchError> {
        self.fetch_with_headers(url, &HeaderMap::new(), fallback_hosts)
            .await
    }

    /// Like [`fetch`](Self::fetch) with extra request headers.
    ///
    /// # Errors
    ///
    /// See [`fetch`](Self::fetch).
    #[instrument(level = "debug", skip(self, headers, fallback_hosts), fields(hosts = fallback_hosts.len()))]
    pub async fn fetch_with_headers(
        &self,
        url: &str,
        headers: &HeaderMap,
        fallback_hosts: &[String],
    ) -> Result<Page, FetchError> {
        let candidates = candidate_urls(url, fallback_hosts)?;
        let max_rounds = self.policy.max_rounds();
        let mut last_error = None;

        for round in 1..=max_rounds {
            for candidate in &candidates {
                match self.transport.get(candidate, headers).await {
                    Ok(page) => {
                        debug!(url = %candidate, round, "fetch succeeded");
                        return Ok(page);
                    }
                    Err(e) if !e.is_retryable() => return Err(e),
                    Err(e) => {
                        warn!(
                            target: OPERATIONAL,
                            severity = %Severity::Warning,
                            url = %candidate,
                            round,
                            max_rounds,
                            error = %e,
                            "fetch failed, retrying"
                        );
                        last_error = Some(e);
                    }
                }
            }

            if round < max_rounds {
                tokio::time::sleep(self.policy.delay_after(round)).await;
            }
        }

        let last = last_error.unwrap_or_else(|| FetchError::invalid_url(url));
        error!(
            target: OPERATIONAL,
            severity = %Severity::Error,
            url,
            max_rounds,
            error = %last,
            "reached the maximum number of retries"
        );
        Err(FetchError::exhausted(url, max_rounds, last))
    }
}

/// Builds the ordered candidate list for `url`.
///
/// With no fallback hosts the URL is used verbatim. Otherwise it is joined
/// against each host the way a browser resolves a relative reference, so an
/// absolute `url` yields itself once per host.
///
/// # Errors
///
/// Returns [`FetchError::InvalidUrl`] for a malformed host or join.
pub fn candidate_urls(url: &str, fallback_hosts: &[String]) -> Result<Vec<String>, FetchError> {
    if fallback_hosts.is_empty() {
        return Ok(vec![url.to_string()]);
    }

    fallback_hosts
        .iter()
        .map(|host| {
            let base = Url::parse(host).map_err(|_| FetchError::invalid_url(host.clone()))?;
            base.join(url)
                .map(String::from)
                .map_err(|_| FetchError::invalid_url(url))
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;

    /// Records every requested URL and answers from a scripted closure.
    struct ScriptedTransport<F> {
        calls: Mutex<Vec<String>>,
        respond: F,
    }

    impl<F> ScriptedTransport<F>
    where
        F: Fn(&str, usize) -> Result<Page, FetchError> + Send + Sync,
    {
        fn new(respond: F) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                respond,
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl<F> Transport for ScriptedTransport<F>
    where
        F: Fn(&str, usize) -> Result<Page, FetchError> + Send + Sync,
    {
        async fn get(&self, url: &str, _headers: &HeaderMap) -> Result<Page, FetchError> {
            let index = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(url.to_string());
                calls.len()
            };
            (self.respond)(url, index)
        }
    }

    fn ok_page(url: &str) -> Page {
        Page {
            url: url.to_string(),
            status: 200,
            headers: HeaderMap::new(),
            body: String::from("<html></html>"),
        }
    }

    fn no_delay(rounds: u32) -> RetryPolicy {
        RetryPolicy::new(rounds, Duration::ZERO)
    }

    // ==================== Candidate Construction ====================

    #[test]
    fn test_candidate_urls_without_hosts_is_verbatim() {
        let candidates = candidate_urls("https://example.com/a?page=2", &[]).unwrap();
        assert_eq!(candidates, vec!["https://example.com/a?page=2"]);
    }

    #[test]
    fn test_candidate_urls_joins_each_host_in_order() {
        let hosts = vec![
            "https://primary.example/".to_string(),
            "https://mirror.example".to_string(),
        ];
        let candidates = candidate_urls("browse/1/", &hosts).unwrap();
        assert_eq!(
            candidates,
            vec![
                "https://primary.example/browse/1/",
                "https://mirror.example/browse/1/"
            ]
        );
    }

    #[test]
    fn test_candidate_urls_rejects_malformed_host() {
        let hosts = vec!["not a host".to_string()];
        let result = candidate_urls("browse/1", &hosts);
        assert!(matches!(result, Err(FetchError::InvalidUrl { .. })));
    }

    // ==================== Retry Rounds ====================

    #[tokio::test]
    async fn test_fetch_first_success_short_circuits() {
        let transport = ScriptedTransport::new(|url, _| Ok(ok_page(url)));
        let fetcher = Fetcher::new(transport, no_delay(3));
        let hosts = vec!["https://a.example/".to_string(), "https://b.example/".to_string()];

        let page = fetcher.fetch("list", &hosts).await.unwrap();

        assert_eq!(page.url, "https://a.example/list");
        assert_eq!(fetcher.transport().calls().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_falls_back_to_second_host() {
        let transport = ScriptedTransport::new(|url, _| {
            if url.starts_with("https://a.example") {
                Err(FetchError::http_status(url, 502))
            } else {
                Ok(ok_page(url))
            }
        });
        let fetcher = Fetcher::new(transport, no_delay(3));
        let hosts = vec!["https://a.example/".to_string(), "https://b.example/".to_string()];

        let page = fetcher.fetch("list", &hosts).await.unwrap();

        assert_eq!(page.url, "https://b.example/list");
        assert_eq!(
            fetcher.transport().calls(),
            vec!["https://a.example/list", "https://b.example/list"]
        );
    }

    #[tokio::test]
    async fn test_fetch_exhaustion_tries_every_host_every_round() {
        let transport = ScriptedTransport::new(|url, _| Err(FetchError::timeout(url)));
        let fetcher = Fetcher::new(transport, no_delay(3));
        let hosts = vec!["https://a.example/".to_string(), "https://b.example/".to_string()];

        let result = fetcher.fetch("list", &hosts).await;

        assert!(matches!(result, Err(FetchError::Exhausted { rounds: 3, .. })));
        let calls = fetcher.transport().calls();
        assert_eq!(calls.len(), 6);
        assert_eq!(
            calls.iter().filter(|u| u.starts_with("https://a.example")).count(),
            3
        );
        assert_eq!(
            calls.iter().filter(|u| u.starts_with("https://b.example")).count(),
            3
        );
    }

    #[tokio::test]
    async fn test_fetch_exhaustion_single_url_makes_exactly_max_attempts() {
        let transport = ScriptedTransport::new(|url, _| Err(FetchError::http_status(url, 500)));
        let fetcher = Fetcher::new(transport, no_delay(3));

        let result = fetcher.fetch("https://only.example/page", &[]).await;

        let err = result.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(fetcher.transport().calls().len(), 3);
    }

    #[tokio::test]
    async fn test_fetch_succeeds_in_later_round() {
        let transport = ScriptedTransport::new(|url, index| {
            if index < 3 {
                Err(FetchError::timeout(url))
            } else {
                Ok(ok_page(url))
            }
        });
        let fetcher = Fetcher::new(transport, no_delay(5));

        let page = fetcher.fetch("https://slow.example/", &[]).await;

        assert!(page.is_ok());
        assert_eq!(fetcher.transport().calls().len(), 3);
    }

    #[tokio::test]
    async fn test_fetch_non_retryable_error_stops_immediately() {
        let transport = ScriptedTransport::new(|url, _| Err(FetchError::invalid_url(url)));
        let fetcher = Fetcher::new(transport, no_delay(4));

        let result = fetcher.fetch("https://x.example/", &[]).await;

        assert!(matches!(result, Err(FetchError::InvalidUrl { .. })));
        assert_eq!(fetcher.transport().calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_sleeps_between_rounds_only() {
        let transport = ScriptedTransport::new(|url, _| Err(FetchError::timeout(url)));
        let fetcher = Fetcher::new(transport, RetryPolicy::new(3, Duration::from_secs(5)));

        let started = tokio::time::Instant::now();
        let _ = fetcher.fetch("https://x.example/", &[]).await;

        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }
}

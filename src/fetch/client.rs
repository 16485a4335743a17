//! HTTP transport for listing and detail pages.
//!
//! [`Transport`] is the seam the [`Fetcher`](super::Fetcher) drives; the
//! production implementation is [`HttpClient`], a thin wrapper over a pooled
//! `reqwest::Client` that sends browser-like headers and turns every non-2xx
//! response into a [`FetchError`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, REFERER};
use tracing::{debug, instrument};

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use super::error::FetchError;
use crate::user_agent;

/// A successfully fetched page.
#[derive(Debug, Clone)]
pub struct Page {
    /// Final URL after redirects; relative links resolve against it.
    pub url: String,
    /// HTTP status (always 2xx).
    pub status: u16,
    /// Response headers.
    pub headers: HeaderMap,
    /// Decoded response body.
    pub body: String,
}

/// Performs one GET against one concrete URL.
///
/// Implementations must map every non-2xx status to
/// [`FetchError::HttpStatus`] so the fetcher can treat it as transient.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetches `url` with `headers` layered over the transport defaults.
    async fn get(&self, url: &str, headers: &HeaderMap) -> Result<Page, FetchError>;
}

/// Timeouts and identity used to build an [`HttpClient`].
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Whole-request timeout.
    pub read_timeout: Duration,
    /// User-Agent header value.
    pub user_agent: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(READ_TIMEOUT_SECS),
            user_agent: user_agent::default_browser_user_agent().to_string(),
        }
    }
}

/// reqwest-backed [`Transport`].
///
/// Create once and reuse; cloning shares the connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a client with the given settings.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientBuild`] if reqwest rejects the configuration.
    pub fn new(settings: &ClientSettings) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.read_timeout)
            .gzip(true)
            .user_agent(settings.user_agent.clone())
            .default_headers(default_headers())
            .build()
            .map_err(|source| FetchError::ClientBuild { source })?;
        Ok(Self { client })
    }

    /// Returns a reference to the underlying reqwest client.
    ///
    /// The direct download tool uses it to stream bodies to disk.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl Transport for HttpClient {
    #[instrument(level = "debug", skip(self, headers))]
    async fn get(&self, url: &str, headers: &HeaderMap) -> Result<Page, FetchError> {
        let response = self
            .client
            .get(url)
            .headers(headers.clone())
            .send()
            .await
            .map_err(|e| map_send_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::http_status(url, status.as_u16()));
        }

        let final_url = response.url().to_string();
        let response_headers = response.headers().clone();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::timeout(url)
            } else {
                FetchError::body(url, e.to_string())
            }
        })?;

        debug!(url = %final_url, bytes = body.len(), "page fetched");

        Ok(Page {
            url: final_url,
            status: status.as_u16(),
            headers: response_headers,
            body,
        })
    }
}

pub(crate) fn map_send_error(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::timeout(url)
    } else {
        FetchError::network(url, error)
    }
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
    headers.insert(REFERER, HeaderValue::from_static("https://www.google.com/"));
    headers
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> HttpClient {
        HttpClient::new(&ClientSettings::default()).unwrap()
    }

    #[tokio::test]
    async fn test_get_returns_body_and_final_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/browse/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let url = format!("{}/browse/1", server.uri());
        let page = client().get(&url, &HeaderMap::new()).await.unwrap();

        assert_eq!(page.status, 200);
        assert_eq!(page.url, url);
        assert_eq!(page.body, "<html>ok</html>");
    }

    #[tokio::test]
    async fn test_get_maps_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = client().get(&server.uri(), &HeaderMap::new()).await;

        assert!(matches!(result, Err(FetchError::HttpStatus { status: 503, .. })));
    }

    #[tokio::test]
    async fn test_get_sends_browser_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("referer", "https://www.google.com/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let page = client().get(&server.uri(), &HeaderMap::new()).await;
        assert!(page.is_ok(), "Expected browser headers to match: {page:?}");
    }

    #[tokio::test]
    async fn test_get_connection_refused_is_network_error() {
        let result = client()
            .get("http://127.0.0.1:1/unreachable", &HeaderMap::new())
            .await;
        assert!(result.is_err());
        assert!(result.unwrap_err().is_retryable());
    }
}

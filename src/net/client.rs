//! HTTP GET collaborator for shell downloads, lazy cache population,
//! and bulk prefetch.

use reqwest::{header, Client};
use tracing::debug;

use super::FetchError;

/// HTTP request timeout in seconds.
/// 30s allows for slow responses while failing fast enough that an
/// offline fallback is still useful.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// A fetched response: status plus full body bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchedResponse {
    /// Whether the response reported a 2xx success status.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx response into a typed error. Used where a
    /// download must succeed outright (shell install, bulk prefetch).
    pub fn ensure_ok(self, url: &str) -> Result<Self, FetchError> {
        if self.is_ok() {
            Ok(self)
        } else {
            Err(FetchError::Status {
                url: url.to_string(),
                status: self.status,
            })
        }
    }
}

/// Issue HTTP GETs for the synchronizer.
#[allow(async_fn_in_trait)]
pub trait Fetcher {
    /// Plain GET; intermediary HTTP caches may answer.
    async fn get(&self, url: &str) -> Result<FetchedResponse, FetchError>;

    /// GET that bypasses intermediary HTTP caches. Install-time shell
    /// downloads use this so a new deployment is never served stale
    /// shell files by a proxy.
    async fn get_fresh(&self, url: &str) -> Result<FetchedResponse, FetchError>;
}

/// Stock reqwest fetcher.
/// Clone is cheap - reqwest::Client uses Arc internally for connection
/// pooling.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }

    async fn send(&self, url: &str, fresh: bool) -> Result<FetchedResponse, FetchError> {
        let mut request = self.client.get(url);
        if fresh {
            request = request
                .header(header::CACHE_CONTROL, "no-cache")
                .header(header::PRAGMA, "no-cache");
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) if err.is_timeout() => return Err(FetchError::Timeout(url.to_string())),
            Err(err) => return Err(err.into()),
        };

        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        debug!(url = %url, status, bytes = body.len(), "fetched");
        Ok(FetchedResponse { status, body })
    }
}

impl Fetcher for HttpFetcher {
    async fn get(&self, url: &str) -> Result<FetchedResponse, FetchError> {
        self.send(url, false).await
    }

    async fn get_fresh(&self, url: &str) -> Result<FetchedResponse, FetchError> {
        self.send(url, true).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetched_response_is_ok() {
        assert!(FetchedResponse { status: 200, body: vec![] }.is_ok());
        assert!(!FetchedResponse { status: 404, body: vec![] }.is_ok());
    }

    #[test]
    fn test_ensure_ok_passes_success_through() {
        let resp = FetchedResponse {
            status: 201,
            body: b"created".to_vec(),
        };
        let resp = resp.ensure_ok("https://x/a").unwrap();
        assert_eq!(resp.body, b"created");
    }

    #[test]
    fn test_ensure_ok_rejects_error_status() {
        let resp = FetchedResponse {
            status: 503,
            body: vec![],
        };
        match resp.ensure_ok("https://x/a") {
            Err(FetchError::Status { url, status }) => {
                assert_eq!(url, "https://x/a");
                assert_eq!(status, 503);
            }
            other => panic!("expected status error, got {:?}", other.map(|r| r.status)),
        }
    }
}

// src/ingest/fetch.rs
//! Single-attempt HTTP fetch with a hard timeout. Failures never propagate:
//! callers get `FetchOutcome::Unavailable` and skip the source for this cycle.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "ReconIntel/1.0 (PR News Monitor)";
pub const FEED_ACCEPT: &str = "application/rss+xml, application/atom+xml, application/xml, text/xml, */*";
pub const JSON_ACCEPT: &str = "application/json";

/// Result of one fetch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Body(String),
    Unavailable { reason: String },
}

impl FetchOutcome {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        FetchOutcome::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn into_body(self) -> Option<String> {
        match self {
            FetchOutcome::Body(b) => Some(b),
            FetchOutcome::Unavailable { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestMethod {
    Get,
    /// Reserved for form-style record APIs; no scan domain issues it yet.
    Post { body: String, content_type: String },
}

#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: RequestMethod,
    pub timeout: Duration,
    pub accept: String,
    pub headers: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn get(timeout: Duration) -> Self {
        Self {
            method: RequestMethod::Get,
            timeout,
            accept: FEED_ACCEPT.to_string(),
            headers: Vec::new(),
        }
    }

    pub fn json(timeout: Duration) -> Self {
        Self {
            accept: JSON_ACCEPT.to_string(),
            ..Self::get(timeout)
        }
    }
}

/// Issue exactly one request. Network errors, timeouts and non-2xx statuses
/// all come back as `Unavailable`.
pub async fn safe_request(
    client: &reqwest::Client,
    url: &str,
    opts: &RequestOptions,
) -> FetchOutcome {
    let mut req = match &opts.method {
        RequestMethod::Get => client.get(url),
        RequestMethod::Post { body, content_type } => client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, content_type.as_str())
            .body(body.clone()),
    };
    req = req
        .timeout(opts.timeout)
        .header(reqwest::header::ACCEPT, opts.accept.as_str());
    for (k, v) in &opts.headers {
        req = req.header(k.as_str(), v.as_str());
    }

    let outcome = match req.send().await {
        Ok(resp) if resp.status().is_success() => match resp.text().await {
            Ok(body) => FetchOutcome::Body(body),
            Err(e) => FetchOutcome::unavailable(format!("body read failed: {e}")),
        },
        Ok(resp) => FetchOutcome::unavailable(format!("http status {}", resp.status())),
        Err(e) if e.is_timeout() => {
            FetchOutcome::unavailable(format!("timed out after {:?}", opts.timeout))
        }
        Err(e) => FetchOutcome::unavailable(format!("request failed: {e}")),
    };

    if let FetchOutcome::Unavailable { reason } = &outcome {
        tracing::debug!(target: "ingest", url, reason = %reason, "request failed");
    }
    outcome
}

/// Seam between the scan modules and the network.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> FetchOutcome;

    /// Record APIs. Same as `fetch` unless the transport negotiates content.
    async fn fetch_json(&self, url: &str, timeout: Duration) -> FetchOutcome {
        self.fetch(url, timeout).await
    }
}

/// reqwest-backed fetcher used by the binary.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> FetchOutcome {
        safe_request(&self.client, url, &RequestOptions::get(timeout)).await
    }

    async fn fetch_json(&self, url: &str, timeout: Duration) -> FetchOutcome {
        safe_request(&self.client, url, &RequestOptions::json(timeout)).await
    }
}

/// In-memory fetcher keyed by URL; unknown URLs are unavailable.
/// Useful for replaying captured feeds and for tests.
#[derive(Debug, Clone, Default)]
pub struct StaticFetcher {
    bodies: HashMap<String, String>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, body: &str) -> Self {
        self.bodies.insert(url.to_string(), body.to_string());
        self
    }
}

#[async_trait]
impl FeedFetcher for StaticFetcher {
    async fn fetch(&self, url: &str, _timeout: Duration) -> FetchOutcome {
        match self.bodies.get(url) {
            Some(b) => FetchOutcome::Body(b.clone()),
            None => FetchOutcome::unavailable("no fixture for url"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// One-connection server on an ephemeral port; `reply` of `None` accepts
    /// and then stays silent.
    async fn serve_once(reply: Option<&'static str>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = sock.read(&mut buf).await;
            match reply {
                Some(r) => {
                    let _ = sock.write_all(r.as_bytes()).await;
                    let _ = sock.shutdown().await;
                }
                None => tokio::time::sleep(Duration::from_secs(30)).await,
            }
        });
        format!("http://{addr}/feed")
    }

    #[tokio::test]
    async fn static_fetcher_serves_known_urls_only() {
        let f = StaticFetcher::new().with("https://a.test/feed", "<rss/>");
        let t = Duration::from_secs(1);
        assert_eq!(
            f.fetch("https://a.test/feed", t).await,
            FetchOutcome::Body("<rss/>".into())
        );
        assert!(f.fetch("https://b.test/feed", t).await.into_body().is_none());
    }

    #[tokio::test]
    async fn unreachable_host_is_unavailable_not_error() {
        let client = reqwest::Client::new();
        // Port 9 on localhost: nothing listens, connection is refused quickly.
        let out = safe_request(
            &client,
            "http://127.0.0.1:9/feed",
            &RequestOptions::get(Duration::from_secs(2)),
        )
        .await;
        assert!(matches!(out, FetchOutcome::Unavailable { .. }));
    }

    #[tokio::test]
    async fn server_error_status_is_unavailable() {
        let url = serve_once(Some(
            "HTTP/1.1 500 Internal Server Error\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        ))
        .await;
        let out = safe_request(&reqwest::Client::new(), &url, &RequestOptions::get(Duration::from_secs(5))).await;
        match out {
            FetchOutcome::Unavailable { reason } => assert!(reason.contains("500"), "{reason}"),
            other => panic!("expected unavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn silent_server_times_out_within_bound() {
        let url = serve_once(None).await;
        let t0 = Instant::now();
        let out = safe_request(&reqwest::Client::new(), &url, &RequestOptions::get(Duration::from_secs(1))).await;
        assert!(t0.elapsed() < Duration::from_secs(5));
        match out {
            FetchOutcome::Unavailable { reason } => assert!(reason.contains("timed out"), "{reason}"),
            other => panic!("expected unavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn json_fetch_sends_json_accept_header() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = sock.read(&mut buf).await.unwrap();
            let body = "{}";
            let reply = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            sock.write_all(reply.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&buf[..n]).to_lowercase()
        });

        let fetcher = HttpFetcher::new(DEFAULT_USER_AGENT).unwrap();
        let out = fetcher.fetch_json(&format!("http://{addr}/records"), Duration::from_secs(5)).await;
        assert_eq!(out, FetchOutcome::Body("{}".into()));
        let request = server.await.unwrap();
        assert!(request.contains("accept: application/json"), "{request}");
    }
}

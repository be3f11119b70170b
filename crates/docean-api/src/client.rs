//! HTTP client for the DigitalOcean API
//!
//! All services share one [`Client`]: bearer-token authentication, JSON
//! bodies, transport-level retries for rate limiting and server failures,
//! and optional client-side request pacing.

use crate::error::{ApiError, Error, Result, is_retryable_status};
use docean_config::Config;
use reqwest::Method;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

const USER_AGENT: &str = concat!("docean/", env!("CARGO_PKG_VERSION"));

/// Transport retry policy
///
/// Applies to 429 and 5xx responses and to connection failures. Waits grow
/// exponentially from `wait_min` and are capped at `wait_max`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub wait_min: Duration,
    pub wait_max: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 4,
            wait_min: Duration::from_secs(1),
            wait_max: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_retries: config.http_retry_max,
            wait_min: config.http_retry_wait_min,
            wait_max: config.http_retry_wait_max,
            ..Self::default()
        }
    }

    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Wait before retry number `attempt` (0-indexed)
    ///
    /// A `Retry-After` hint from the server takes precedence but is still
    /// capped at `wait_max`.
    pub fn delay_for_attempt(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(hint) = retry_after {
            return hint.min(self.wait_max);
        }
        let factor = self.backoff_multiplier.powi(attempt as i32);
        let secs = self.wait_min.as_secs_f64() * factor;
        Duration::try_from_secs_f64(secs)
            .unwrap_or(self.wait_max)
            .min(self.wait_max)
    }
}

/// Spaces requests evenly at a fixed rate
#[derive(Debug)]
struct RateLimiter {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    fn new(requests_per_second: f64) -> Option<Self> {
        if requests_per_second <= 0.0 {
            return None;
        }
        Some(Self {
            interval: Duration::from_secs_f64(1.0 / requests_per_second),
            next_slot: Mutex::new(None),
        })
    }

    async fn acquire(&self) {
        let wait_until = {
            let mut slot = self.next_slot.lock().await;
            let now = Instant::now();
            let at = match *slot {
                Some(next) if next > now => next,
                _ => now,
            };
            *slot = Some(at + self.interval);
            at
        };
        tokio::time::sleep_until(wait_until).await;
    }
}

/// DigitalOcean API client
#[derive(Debug)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    token: String,
    retry: RetryPolicy,
    limiter: Option<RateLimiter>,
}

impl Client {
    pub fn new(token: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            retry: RetryPolicy::default(),
            limiter: None,
        })
    }

    /// Build a client from the resolved provider configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Self::new(config.token()?, &config.api_endpoint)?
            .with_retry(RetryPolicy::from_config(config))
            .with_rate_limit(config.requests_per_second);
        Ok(client)
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_rate_limit(mut self, requests_per_second: f64) -> Self {
        self.limiter = RateLimiter::new(requests_per_second);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Send a request, retrying transient failures, and return the body of
    /// a successful response
    pub(crate) async fn send<B>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<String>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url(path);
        let mut attempt = 0;

        loop {
            if let Some(limiter) = &self.limiter {
                limiter.acquire().await;
            }

            let mut request = self
                .http
                .request(method.clone(), &url)
                .bearer_auth(&self.token)
                .query(query);
            if let Some(body) = body {
                request = request.json(body);
            }

            tracing::debug!("{} {} (attempt {})", method, url, attempt + 1);

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    let err = Error::Transport(e);
                    if err.is_retryable_transport() && attempt < self.retry.max_retries {
                        let delay = self.retry.delay_for_attempt(attempt, None);
                        tracing::warn!("{} {} failed: {}; retrying in {:?}", method, url, err, delay);
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(err);
                }
            };

            let status = response.status().as_u16();
            let retry_after = retry_after(response.headers());
            let text = response.text().await?;

            if (200..300).contains(&status) {
                return Ok(text);
            }

            let err = ApiError::from_body(method.as_str(), &url, status, &text);
            if is_retryable_status(status) && attempt < self.retry.max_retries {
                let delay = self.retry.delay_for_attempt(attempt, retry_after);
                tracing::warn!(
                    "{} {} returned {}; retrying in {:?} ({}/{})",
                    method,
                    url,
                    status,
                    delay,
                    attempt + 1,
                    self.retry.max_retries
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }
            return Err(err.into());
        }
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let text = self.send::<()>(Method::GET, path, query, None).await?;
        decode(&text)
    }

    pub(crate) async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let text = self.send(Method::POST, path, &[], Some(body)).await?;
        decode(&text)
    }

    /// POST whose response body is irrelevant
    pub(crate) async fn post_empty<B>(&self, path: &str, body: &B) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        self.send(Method::POST, path, &[], Some(body)).await?;
        Ok(())
    }

    pub(crate) async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let text = self.send(Method::PUT, path, &[], Some(body)).await?;
        decode(&text)
    }

    pub(crate) async fn patch_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let text = self.send(Method::PATCH, path, &[], Some(body)).await?;
        decode(&text)
    }

    pub(crate) async fn send_delete(&self, path: &str) -> Result<()> {
        self.send::<()>(Method::DELETE, path, &[], None).await?;
        Ok(())
    }

    pub(crate) async fn send_delete_with_body<B>(&self, path: &str, body: &B) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        self.send(Method::DELETE, path, &[], Some(body)).await?;
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(text: &str) -> Result<T> {
    // Some endpoints answer 204 with an empty body
    let text = if text.trim().is_empty() { "null" } else { text };
    serde_json::from_str(text).map_err(Error::from)
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_delay_calculation() {
        let policy = RetryPolicy {
            max_retries: 5,
            wait_min: Duration::from_secs(1),
            wait_max: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        };

        assert_eq!(policy.delay_for_attempt(0, None), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(1, None), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(2, None), Duration::from_secs(4));
        assert_eq!(policy.delay_for_attempt(3, None), Duration::from_secs(8));
        assert_eq!(policy.delay_for_attempt(4, None), Duration::from_secs(10)); // capped at max
    }

    #[test]
    fn test_retry_after_hint_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.delay_for_attempt(0, Some(Duration::from_secs(5))),
            Duration::from_secs(5)
        );
        assert_eq!(
            policy.delay_for_attempt(0, Some(Duration::from_secs(300))),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_retry_after_header_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);
        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(7)));
        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(retry_after(&headers), None);
    }

    #[test]
    fn test_policy_from_config() {
        let config = Config::builder()
            .token("t")
            .http_retry_max(2)
            .http_retry_wait(0.5, 4.0)
            .build_with(|_| None)
            .unwrap();
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.wait_min, Duration::from_millis(500));
        assert_eq!(policy.wait_max, Duration::from_secs(4));
    }

    #[test]
    fn test_url_joining() {
        let client = Client::new("t", "https://api.digitalocean.com/").unwrap();
        assert_eq!(
            client.url("/v2/droplets/1"),
            "https://api.digitalocean.com/v2/droplets/1"
        );
        assert_eq!(client.url("v2/account"), "https://api.digitalocean.com/v2/account");
    }

    #[test]
    fn test_client_requires_token() {
        let config = Config::builder().build_with(|_| None).unwrap();
        assert!(matches!(Client::from_config(&config), Err(Error::Config(_))));
    }

    /// Answers every request with `status` and counts the requests
    async fn serve_status(status: &'static str) -> (String, std::sync::Arc<std::sync::atomic::AtomicUsize>) {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = vec![0u8; 4096];
                let mut read = 0;
                while !buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf[read..]).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => read += n,
                    }
                }
                counter.fetch_add(1, Ordering::SeqCst);
                let body = r#"{"id":"error","message":"try again"}"#;
                let response = format!(
                    "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
        (format!("http://{addr}"), hits)
    }

    fn quick_retry(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            wait_min: Duration::from_millis(1),
            wait_max: Duration::from_millis(5),
            backoff_multiplier: 2.0,
        }
    }

    #[tokio::test]
    async fn test_server_errors_are_retried_up_to_max() {
        use crate::account::AccountService;
        use std::sync::atomic::Ordering;

        let (url, hits) = serve_status("503 Service Unavailable").await;
        let client = Client::new("t", url).unwrap().with_retry(quick_retry(2));
        let err = client.get().await.unwrap_err();
        assert!(matches!(&err, Error::Api(e) if e.status == 503));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        use crate::account::AccountService;
        use std::sync::atomic::Ordering;

        let (url, hits) = serve_status("404 Not Found").await;
        let client = Client::new("t", url).unwrap().with_retry(quick_retry(4));
        let err = client.get().await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_spaces_requests() {
        let limiter = RateLimiter::new(2.0).unwrap();
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(1000));
        assert!(RateLimiter::new(0.0).is_none());
    }
}

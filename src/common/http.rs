use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use rand::Rng;
use reqwest::{Method, StatusCode};
use serde_json::Value;

use super::errors::{Error, Result};
use crate::configs::{HttpConfig, RetryConfig};

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/143.0.0.0 Safari/537.36";

/// Pooled transport shared across resolutions. Thread-safe; every request
/// can override the user agent so one pool serves all personas.
pub struct HttpClient {
    inner: reqwest::Client,
    retry: RetryConfig,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .gzip(true)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            inner,
            retry: config.retry.clone(),
        })
    }

    pub async fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<String> {
        let res = self
            .send_with_retry(|| self.request(Method::GET, url, headers, None))
            .await?;
        Ok(res.text().await?)
    }

    pub async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &Value,
    ) -> Result<Value> {
        let res = self
            .send_with_retry(|| self.request(Method::POST, url, headers, Some(body)))
            .await?;
        Ok(res.json().await?)
    }

    /// HEAD status without treating non-2xx as an error; the caller decides
    /// what a 403 means.
    pub async fn head(&self, url: &str) -> Result<StatusCode> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.request(Method::HEAD, url, &[], None).send().await {
                Ok(res) => {
                    let status = res.status();
                    let transient = status.is_server_error()
                        || status == StatusCode::TOO_MANY_REQUESTS;
                    if !transient || attempt >= self.retry.max_attempts {
                        return Ok(status);
                    }
                }
                Err(e) => {
                    let err = Error::from(e);
                    if !err.is_transient() || attempt >= self.retry.max_attempts {
                        return Err(err);
                    }
                }
            }
            tokio::time::sleep(self.backoff_delay(attempt)).await;
        }
    }

    /// Content length via HEAD, falling back to a ranged GET. Unknown on
    /// any failure.
    pub async fn probe_content_length(&self, url: &str) -> Option<u64> {
        if let Ok(res) = self.inner.head(url).send().await {
            if res.status().is_success() {
                if let Some(len) = res.content_length().filter(|len| *len > 0) {
                    return Some(len);
                }
            }
        }

        let res = self
            .inner
            .get(url)
            .header("Range", "bytes=0-0")
            .send()
            .await
            .ok()?;
        if !res.status().is_success() {
            return None;
        }
        // "bytes 0-0/123456" -> 123456
        let range = res.headers().get("Content-Range")?.to_str().ok()?;
        range.rsplit('/').next()?.parse().ok().filter(|len| *len > 0)
    }

    /// Raw byte stream for media playback, optionally ranged.
    pub async fn stream(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        range: Option<(u64, Option<u64>)>,
    ) -> Result<impl Stream<Item = reqwest::Result<Bytes>>> {
        let res = self
            .send_with_retry(|| {
                let mut req = self.request(Method::GET, url, headers, None);
                if let Some((start, end)) = range {
                    let value = match end {
                        Some(end) => format!("bytes={start}-{end}"),
                        None => format!("bytes={start}-"),
                    };
                    req = req.header("Range", value);
                }
                req
            })
            .await?;
        Ok(res.bytes_stream())
    }

    fn request(
        &self,
        method: Method,
        url: &str,
        headers: &[(&str, &str)],
        body: Option<&Value>,
    ) -> reqwest::RequestBuilder {
        let mut req = self.inner.request(method, url);
        for (name, value) in headers {
            req = req.header(*name, *value);
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        req
    }

    async fn send_with_retry<F>(&self, build: F) -> Result<reqwest::Response>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let err = match build().send().await {
                Ok(res) => {
                    let status = res.status();
                    if status.is_success() {
                        return Ok(res);
                    }
                    Error::Status { status }
                }
                Err(e) => Error::from(e),
            };

            if !err.is_transient() || attempt >= self.retry.max_attempts {
                return Err(err);
            }

            let delay = self.backoff_delay(attempt);
            tracing::debug!(
                "transient failure ({err}), retrying in {}ms (attempt {attempt}/{})",
                delay.as_millis(),
                self.retry.max_attempts
            );
            tokio::time::sleep(delay).await;
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.retry.base_delay_ms as f64
            * f64::from(self.retry.factor).powi(attempt.saturating_sub(1) as i32);
        let jitter = if self.retry.jitter > 0.0 {
            rand::thread_rng().gen_range(-self.retry.jitter..=self.retry.jitter)
        } else {
            0.0
        };
        Duration::from_millis((base * (1.0 + jitter)).max(0.0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(jitter: f64) -> HttpClient {
        let mut config = HttpConfig::default();
        config.retry.jitter = jitter;
        HttpClient::new(&config).unwrap()
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let client = client(0.0);
        assert_eq!(client.backoff_delay(1), Duration::from_millis(250));
        assert_eq!(client.backoff_delay(2), Duration::from_millis(500));
        assert_eq!(client.backoff_delay(3), Duration::from_millis(1000));
        assert_eq!(client.backoff_delay(4), Duration::from_millis(2000));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let client = client(0.2);
        for _ in 0..64 {
            let delay = client.backoff_delay(1).as_millis() as u64;
            assert!((200..=300).contains(&delay), "delay {delay} out of range");
        }
    }
}

//! Shared HTTP retry wrapper with 429/5xx handling and Retry-After support.
//!
//! `send_with_retry()` replaces `client.execute(request)` and adds:
//! - Exponential backoff with jitter on 429, 5xx and transport failures
//! - Retry-After header parsing (seconds form)
//! - A typed `ProviderError::RetryExhausted` once every attempt has failed,
//!   so callers can report how many attempts were made

use reqwest::{Client, Request, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::ProviderError;

/// Configuration for HTTP retry behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpRetryConfig {
    /// Maximum number of retry attempts after the first request (default: 2)
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff (default: 3000)
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds (default: 6000)
    pub max_delay_ms: u64,
    /// Backoff multiplier (default: 2.0)
    pub backoff_multiplier: f64,
}

impl Default for HttpRetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 3000,
            max_delay_ms: 6000,
            backoff_multiplier: 2.0,
        }
    }
}

impl HttpRetryConfig {
    /// Total number of requests made before giving up
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

/// Determine if a status code is retryable
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Transport failures worth another attempt
fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

/// Parse Retry-After header value (seconds only)
fn parse_retry_after(response: &Response) -> Option<Duration> {
    let value = response.headers().get("retry-after")?.to_str().ok()?;
    let secs = value.trim().parse::<u64>().ok()?;
    Some(Duration::from_secs(secs.min(300)))
}

/// Calculate delay for a given retry attempt with jitter
fn calculate_delay(attempt: u32, config: &HttpRetryConfig) -> Duration {
    let base = config.base_delay_ms as f64 * config.backoff_multiplier.powi(attempt as i32);
    let capped = base.min(config.max_delay_ms as f64);
    // 10-30% jitter
    let jitter = capped * (0.1 + rand::random::<f64>() * 0.2);
    Duration::from_millis((capped + jitter) as u64)
}

/// Send an HTTP request, retrying 429/5xx responses and transport errors.
///
/// The request is cloned for every attempt, so it must not carry a
/// streaming body. Non-retryable statuses are returned as-is for the
/// caller to inspect.
pub async fn send_with_retry(
    client: &Client,
    request: Request,
    config: &HttpRetryConfig,
) -> Result<Response, ProviderError> {
    let total = config.max_attempts();
    let mut last_error = String::new();

    for attempt in 0..total {
        let Some(current) = request.try_clone() else {
            return client
                .execute(request)
                .await
                .map_err(|e| ProviderError::NetworkError(e.to_string()));
        };

        let delay = match client.execute(current).await {
            Ok(response) if !is_retryable_status(response.status().as_u16()) => {
                return Ok(response);
            }
            Ok(response) => {
                last_error = format!("HTTP {}", response.status());
                parse_retry_after(&response).unwrap_or_else(|| calculate_delay(attempt, config))
            }
            Err(e) if is_retryable_error(&e) => {
                last_error = e.to_string();
                calculate_delay(attempt, config)
            }
            Err(e) => return Err(ProviderError::NetworkError(e.to_string())),
        };

        if attempt + 1 < total {
            tracing::debug!(
                "{} {} failed ({}). Retry {}/{} after {:?}",
                request.method(), request.url(), last_error, attempt + 1, config.max_retries, delay
            );
            tokio::time::sleep(delay).await;
        }
    }

    Err(ProviderError::RetryExhausted { attempts: total, last_error })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_is_retryable_status() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(500));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(200));
        assert!(!is_retryable_status(403));
        assert!(!is_retryable_status(404));
    }

    #[test]
    fn test_calculate_delay_bounded() {
        let config = HttpRetryConfig::default();
        for attempt in 0..10 {
            let delay = calculate_delay(attempt, &config);
            assert!(delay.as_millis() <= (config.max_delay_ms as u128 * 2));
        }
    }

    #[test]
    fn test_max_attempts() {
        assert_eq!(HttpRetryConfig::default().max_attempts(), 3);
    }

    /// Serves `status` to every connection and counts requests
    async fn serve_status(status: &'static str) -> (String, tokio::task::JoinHandle<u32>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let mut served = 0;
            while let Ok(Ok((mut socket, _))) =
                tokio::time::timeout(Duration::from_millis(500), listener.accept()).await
            {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }
                let reply = format!(
                    "HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                    status
                );
                let _ = socket.write_all(reply.as_bytes()).await;
                served += 1;
            }
            served
        });
        (format!("http://{}/files", addr), handle)
    }

    #[tokio::test]
    async fn test_exhausted_after_all_attempts() {
        let (url, server) = serve_status("503 Service Unavailable").await;
        let client = Client::new();
        let config = HttpRetryConfig {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 5,
            backoff_multiplier: 1.0,
        };
        let request = client.get(&url).build().unwrap();

        let err = send_with_retry(&client, request, &config).await.unwrap_err();
        assert_eq!(err.attempts(), Some(3));
        assert!(err.to_string().contains("503"));
        assert_eq!(server.await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_status_passes_through() {
        let (url, server) = serve_status("404 Not Found").await;
        let client = Client::new();
        let request = client.get(&url).build().unwrap();

        let response = send_with_retry(&client, request, &HttpRetryConfig::default())
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 404);
        assert_eq!(server.await.unwrap(), 1);
    }
}

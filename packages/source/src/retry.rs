//! HTTP retry helpers for transient errors.
//!
//! Adapters should use [`send_json`] instead of calling
//! `reqwest::RequestBuilder::send()` directly so every upstream request
//! gets retried with exponential backoff on timeouts, connection resets,
//! server errors and rate limiting.
//!
//! # Usage
//!
//! ```ignore
//! use crate::retry;
//!
//! let body = retry::send_json(|| client.get(&url).query(&params)).await?;
//! ```
//!
//! Total backoff stays under two seconds. Every fetch is still bounded by
//! the engine's per-source deadline.

use std::time::Duration;

use crate::SourceError;

/// Maximum number of retry attempts for transient HTTP errors.
///
/// With exponential backoff (250ms, 500ms, 1s) the total wait before
/// giving up is under two seconds.
const MAX_RETRIES: u32 = 3;

/// Initial backoff delay, doubled on each attempt.
const BASE_DELAY_MS: u64 = 250;

/// Maximum length of the response body preview included in error logs.
const BODY_PREVIEW_LEN: usize = 300;

/// Sends an HTTP request and parses the response body as JSON.
///
/// The `build_request` closure is called on each attempt to construct a
/// fresh [`reqwest::RequestBuilder`] (builders are consumed by `.send()`).
///
/// Does **not** retry HTTP 4xx (except 429). Those are permanent.
///
/// # Errors
///
/// Returns [`SourceError`] if the request fails after all retries, the
/// server returns a non-retryable status code, or the body is not JSON.
#[allow(clippy::future_not_send)]
pub async fn send_json<F>(build_request: F) -> Result<serde_json::Value, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let response = send_inner(&build_request, MAX_RETRIES).await?;
    let url = response.url().to_string();
    let text = response.text().await?;

    serde_json::from_str(&text).map_err(|e| {
        let preview: String = text.chars().take(BODY_PREVIEW_LEN).collect();
        log::warn!("JSON parse failed for {url}: {e}\n  body preview: {preview}");
        SourceError::Json(e)
    })
}

/// Core retry loop.
///
/// Sends the request built by `build_request`, retrying on transient
/// errors up to `max_retries` times with exponential backoff. Returns the
/// successful [`reqwest::Response`] (status 2xx or 3xx).
#[allow(clippy::future_not_send)]
async fn send_inner<F>(
    build_request: &F,
    max_retries: u32,
) -> Result<reqwest::Response, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut last_error: Option<SourceError> = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_millis(BASE_DELAY_MS << (attempt - 1));
            log::warn!("  retry {attempt}/{max_retries} in {delay:?}...");
            tokio::time::sleep(delay).await;
        }

        match build_request().send().await {
            Err(e) => {
                if is_transient(&e) && attempt < max_retries {
                    log::warn!("  transient error: {e}");
                    last_error = Some(SourceError::Http(e));
                    continue;
                }
                return Err(SourceError::Http(e));
            }
            Ok(response) => {
                let status = response.status();

                match classify_status(status) {
                    StatusDisposition::Success => return Ok(response),
                    StatusDisposition::Permanent => {
                        return Err(SourceError::Other {
                            message: format!("HTTP {status}"),
                        });
                    }
                    StatusDisposition::Retry if attempt < max_retries => {
                        log::warn!("  HTTP {status}");
                        last_error = Some(SourceError::Other {
                            message: format!("HTTP {status}"),
                        });
                    }
                    StatusDisposition::Retry => {
                        return Err(SourceError::Other {
                            message: format!("HTTP {status} after {max_retries} retries"),
                        });
                    }
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| SourceError::Other {
        message: "request failed after all retries".to_string(),
    }))
}

/// What to do with a response, judged by its status code alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusDisposition {
    /// 2xx or 3xx: hand the response to the caller.
    Success,
    /// 429 or 5xx: try again after backoff.
    Retry,
    /// Any other 4xx: give up immediately.
    Permanent,
}

fn classify_status(status: reqwest::StatusCode) -> StatusDisposition {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        StatusDisposition::Retry
    } else if status.is_client_error() {
        StatusDisposition::Permanent
    } else {
        StatusDisposition::Success
    }
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_request()
}

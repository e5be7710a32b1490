use crate::feed::item::FeedItem;
use crate::feed::parser::{parse_feed, ParseError};
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(2);
const DEFAULT_MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while loading a feed.
///
/// These cover the full lifecycle of a load: network issues, HTTP errors,
/// oversized or truncated bodies, and unparseable XML.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Server returned 429 Too Many Requests after max retries
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// Feed body was not well-formed XML
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

/// Limits applied to a single feed load.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Timeout for each HTTP attempt
    pub timeout: Duration,
    /// Retries after a 429, a 5xx or a truncated body
    pub max_retries: u32,
    /// Backoff before retry `n` (0-based) is `retry_base_delay * 2^n`
    pub retry_base_delay: Duration,
    /// Upper bound on the response body, in bytes
    pub max_feed_size: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
            max_feed_size: DEFAULT_MAX_FEED_SIZE,
        }
    }
}

impl FetchOptions {
    fn backoff(&self, retry: u32) -> Duration {
        self.retry_base_delay.saturating_mul(2u32.saturating_pow(retry))
    }
}

/// Outcome of a background load, delivered once on the channel given to
/// [`spawn_load`].
#[derive(Debug)]
pub struct LoadOutcome {
    /// The URL that was loaded
    pub url: String,
    pub result: Result<Vec<FeedItem>, FetchError>,
}

/// Fetches a feed over HTTP and parses it.
///
/// # Behavior
///
/// - Each attempt has `options.timeout`
/// - Rate limiting (HTTP 429) and server errors (5xx) are retried with
///   exponential backoff, up to `options.max_retries` times
/// - Other non-2xx statuses fail immediately
/// - Bodies over `options.max_feed_size` are rejected while streaming
/// - Bodies shorter than their `Content-Length` are retried like 5xx
///
/// # Errors
///
/// - [`FetchError::Network`] - Connection or TLS errors
/// - [`FetchError::Timeout`] - An attempt exceeded the timeout
/// - [`FetchError::HttpStatus`] - Non-2xx response (5xx after retries)
/// - [`FetchError::RateLimited`] - 429 response after max retries
/// - [`FetchError::ResponseTooLarge`] - Body exceeded the size limit
/// - [`FetchError::IncompleteResponse`] - Truncated body after max retries
/// - [`FetchError::Parse`] - Body is not well-formed XML
pub async fn fetch_feed(
    client: &reqwest::Client,
    url: &str,
    options: &FetchOptions,
) -> Result<Vec<FeedItem>, FetchError> {
    let bytes = fetch_bytes(client, url, options).await?;

    let items = parse_feed(&bytes).map_err(|e| {
        tracing::warn!(feed = %url, error = %e, "Feed is not well-formed XML");
        FetchError::Parse(e)
    })?;

    tracing::info!(feed = %url, items = items.len(), "Loaded feed");
    Ok(items)
}

/// Completion-callback form of [`fetch_feed`].
///
/// `on_complete` is called exactly once, with the items or with the error,
/// so callers can always leave their loading state.
pub async fn load_feed<F>(client: &reqwest::Client, url: &str, options: &FetchOptions, on_complete: F)
where
    F: FnOnce(Result<Vec<FeedItem>, FetchError>),
{
    let result = fetch_feed(client, url, options).await;
    if let Err(e) = &result {
        tracing::warn!(feed = %url, error = %e, "Feed load failed");
    }
    on_complete(result);
}

/// Loads a feed on a background task and reports the outcome on `tx`.
///
/// Exactly one [`LoadOutcome`] is sent per call. The receiver side decides
/// on which task the result is consumed, keeping display state on its
/// owner's task.
pub fn spawn_load(
    client: reqwest::Client,
    url: String,
    options: FetchOptions,
    tx: mpsc::Sender<LoadOutcome>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let result = fetch_feed(&client, &url, &options).await;
        if let Err(e) = &result {
            tracing::warn!(feed = %url, error = %e, "Feed load failed");
        }
        if tx.send(LoadOutcome { url, result }).await.is_err() {
            tracing::warn!("Load outcome dropped (receiver closed)");
        }
    })
}

async fn fetch_bytes(
    client: &reqwest::Client,
    url: &str,
    options: &FetchOptions,
) -> Result<Vec<u8>, FetchError> {
    let mut retry_count = 0;

    loop {
        let response = tokio::time::timeout(options.timeout, client.get(url).send())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(FetchError::Network)?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            if retry_count >= options.max_retries {
                return Err(if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    FetchError::RateLimited(options.max_retries)
                } else {
                    FetchError::HttpStatus(status.as_u16())
                });
            }

            let delay = options.backoff(retry_count);
            tracing::warn!(
                feed = %url,
                status = %status,
                retry = retry_count,
                delay_ms = delay.as_millis() as u64,
                "Retrying after delay"
            );
            tokio::time::sleep(delay).await;
            retry_count += 1;
            continue;
        }

        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let read = tokio::time::timeout(
            options.timeout,
            read_limited_bytes(response, options.max_feed_size),
        )
        .await
        .map_err(|_| FetchError::Timeout)?;

        match read {
            Ok(bytes) => return Ok(bytes),
            Err(FetchError::IncompleteResponse { expected, received })
                if retry_count < options.max_retries =>
            {
                let delay = options.backoff(retry_count);
                tracing::debug!(
                    feed = %url,
                    expected = expected,
                    received = received,
                    attempt = retry_count + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying incomplete download"
                );
                tokio::time::sleep(delay).await;
                retry_count += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}

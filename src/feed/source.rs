use crate::feed::parser::{parse_feed, FeedEntry};
use futures::StreamExt;
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while fetching the feed.
///
/// Every variant is non-fatal to the service: the poll loop logs the error
/// and tries again on the next tick.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the 30-second timeout
    #[error("Request timed out")]
    Timeout,
    /// Feed XML could not be parsed as RSS or Atom
    #[error("Parse error: {0}")]
    Parse(String),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// Fetches and parses the feed once.
///
/// One attempt, no in-call retries: the caller polls on a short fixed period,
/// so the retry is simply the next tick.
pub async fn fetch_feed(
    client: &reqwest::Client,
    url: &str,
) -> Result<Vec<FeedEntry>, FetchError> {
    let response = tokio::time::timeout(FETCH_TIMEOUT, client.get(url).send())
        .await
        .map_err(|_| FetchError::Timeout)?
        .map_err(FetchError::Network)?;

    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    let bytes = read_limited_bytes(response, MAX_FEED_SIZE).await?;

    parse_feed(&bytes).map_err(|e| FetchError::Parse(e.to_string()))
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Capture Content-Length for the completeness check below
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len as usize > limit {
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

    // A truncated body would otherwise parse as a truncated-but-valid feed
    // on lucky boundaries; surface it as an error instead.
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

/// Polling feed source with in-memory dedup.
///
/// `poll` fetches the feed and returns only entries whose guid has not been
/// returned before. The seen set lives in memory: a process restart re-reads
/// the current feed state, so the first poll after startup emits everything
/// the feed currently contains.
pub struct FeedSource {
    client: reqwest::Client,
    url: String,
    seen: HashSet<String>,
}

impl FeedSource {
    pub fn new(client: reqwest::Client, url: String) -> Self {
        Self {
            client,
            url,
            seen: HashSet::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch the feed and return the entries not yet emitted, in feed order.
    pub async fn poll(&mut self) -> Result<Vec<FeedEntry>, FetchError> {
        let entries = fetch_feed(&self.client, &self.url).await?;

        let fresh: Vec<FeedEntry> = entries
            .into_iter()
            .filter(|e| self.seen.insert(e.guid.clone()))
            .collect();

        if !fresh.is_empty() {
            tracing::debug!(
                url = %self.url,
                new_entries = fresh.len(),
                "Feed poll produced new entries"
            );
        }

        Ok(fresh)
    }
}

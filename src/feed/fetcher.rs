use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

use super::parser::{parse_feed, ParsedFeed};

/// Retries after the first attempt.
const MAX_RETRIES: u32 = 3;
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const BACKOFF_BASE: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, DNS or TLS failure, or a broken body stream.
    #[error("Feed request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Final non-success status.
    #[error("Feed server answered {0}")]
    HttpStatus(u16),
    #[error("Feed request timed out")]
    Timeout,
    /// Body is not RSS, Atom or JSON Feed.
    #[error("Parse error: {0}")]
    Parse(String),
    /// Still 429 after every retry.
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    #[error("Feed body exceeds the size limit")]
    ResponseTooLarge,
    /// Fewer bytes arrived than `Content-Length` announced.
    #[error("Truncated feed body: {received} of {expected} bytes")]
    IncompleteResponse { expected: u64, received: usize },
}

impl FetchError {
    /// Worth another attempt after a backoff.
    fn is_transient(&self) -> bool {
        match self {
            Self::HttpStatus(status) => *status >= 500,
            Self::RateLimited(_) | Self::IncompleteResponse { .. } => true,
            _ => false,
        }
    }
}

/// HTTP client for feed documents.
///
/// Retries 429, 5xx and truncated bodies with exponential backoff
/// (`backoff`, `2 * backoff`, `4 * backoff`), fails fast on other 4xx.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    timeout: Duration,
    backoff: Duration,
    max_body: usize,
}

impl Fetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("feedreader/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: REQUEST_TIMEOUT,
            backoff: BACKOFF_BASE,
            max_body: MAX_BODY_BYTES,
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Deadline for one attempt, headers and body together.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_body(mut self, max_body: usize) -> Self {
        self.max_body = max_body;
        self
    }

    /// Fetch and parse `url`. `fetched_at` stands in for missing entry dates.
    pub async fn fetch_feed(&self, url: &str, fetched_at: i64) -> Result<ParsedFeed, FetchError> {
        let bytes = self.fetch(url).await?;
        let feed = parse_feed(&bytes, fetched_at).map_err(|e| FetchError::Parse(e.to_string()))?;

        if feed.skipped > 0 {
            tracing::warn!(
                feed = %url,
                skipped = feed.skipped,
                "Entries without a usable link skipped"
            );
        }
        Ok(feed)
    }

    /// GET `url` and return the body.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let mut retry = 0;

        loop {
            let error = match self.attempt(url).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if e.is_transient() && retry < MAX_RETRIES => e,
                Err(e) => return Err(e),
            };

            let delay = self.delay(retry);
            tracing::warn!(
                feed = %url,
                error = %error,
                retry = retry + 1,
                delay_ms = delay.as_millis() as u64,
                "Transient fetch failure, backing off"
            );
            tokio::time::sleep(delay).await;
            retry += 1;
        }
    }

    async fn attempt(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        tokio::time::timeout(self.timeout, self.request(url))
            .await
            .map_err(|_| FetchError::Timeout)?
    }

    async fn request(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited(MAX_RETRIES));
        }
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }
        read_body(response, self.max_body).await
    }

    fn delay(&self, retry: u32) -> Duration {
        self.backoff.saturating_mul(2u32.saturating_pow(retry))
    }
}

/// Stream the body, refusing anything over `limit` bytes.
async fn read_body(response: reqwest::Response, limit: usize) -> Result<Vec<u8>, FetchError> {
    let announced = response.content_length();
    if announced.is_some_and(|len| usize::try_from(len).map_or(true, |len| len > limit)) {
        return Err(FetchError::ResponseTooLarge);
    }

    let mut body = Vec::with_capacity(announced.map_or(0, |len| len as usize));
    let mut chunks = response.bytes_stream();
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        if body.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        body.extend_from_slice(&chunk);
    }

    match announced {
        Some(expected) if (body.len() as u64) < expected => Err(FetchError::IncompleteResponse {
            expected,
            received: body.len(),
        }),
        _ => Ok(body),
    }
}

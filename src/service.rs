//! Use cases shared by the HTTP API and the background poller.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::feed::{FetchError, Fetcher};
use crate::pagination::{Options, Page, PaginationError};
use crate::storage::{
    Article, ArticleFilter, Database, DatabaseError, Feed, NewArticle, NewFeed,
};
use crate::util::{validate_url, HostPolicy, UrlValidationError};

/// Feeds refreshed at once by [`FeedService::refresh_all`].
const REFRESH_CONCURRENCY: usize = 4;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Pagination(#[from] PaginationError),

    #[error(transparent)]
    InvalidLink(#[from] UrlValidationError),

    #[error("Invalid published date: {0}")]
    InvalidDate(String),
}

/// Body of `POST /api/articles`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateArticleRequest {
    #[serde(default, alias = "feedID")]
    pub feed_id: Option<i64>,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub description: String,
    /// Any format accepted by [`parse_published`]. Absent means now.
    #[serde(default)]
    pub published: Option<String>,
}

/// Outcome of one pass over every subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub feeds: usize,
    pub added: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct FeedService {
    db: Database,
    fetcher: Fetcher,
    request_timeout: Duration,
    host_policy: HostPolicy,
}

impl FeedService {
    pub fn new(db: Database, fetcher: Fetcher) -> Self {
        Self {
            db,
            fetcher,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            host_policy: HostPolicy::PublicOnly,
        }
    }

    /// Deadline for paginated listings.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_host_policy(mut self, policy: HostPolicy) -> Self {
        self.host_policy = policy;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    /// Fetch `link`, store it as a feed titled after its channel, and ingest
    /// its current entries.
    pub async fn subscribe(&self, link: &str) -> Result<Feed, ServiceError> {
        let url = validate_url(link, self.host_policy)?;
        let now = Utc::now().timestamp();
        let parsed = self.fetcher.fetch_feed(url.as_str(), now).await?;

        let feed = self
            .db
            .create_feed(&NewFeed {
                title: parsed.title,
                rss_link: url.to_string(),
                site_link: parsed.site_link.unwrap_or_default(),
                description: parsed.description,
            })
            .await?;

        let added = self.db.insert_articles(feed.id, &parsed.articles).await?;
        self.db.record_feed_fetch(feed.id, None).await?;
        tracing::info!(feed_id = feed.id, link = %feed.rss_link, added = added, "Subscribed to feed");

        Ok(self.db.get_feed(feed.id).await?)
    }

    pub async fn delete_feed(&self, feed_id: i64) -> Result<(), ServiceError> {
        Ok(self.db.delete_feed(feed_id).await?)
    }

    // ========================================================================
    // Refresh
    // ========================================================================

    /// Fetch one feed and store entries whose link is new.
    ///
    /// The outcome is recorded on the feed row either way. Returns the
    /// number of articles added.
    pub async fn refresh_feed(&self, feed: &Feed) -> Result<usize, ServiceError> {
        let now = Utc::now().timestamp();
        let parsed = match self.fetcher.fetch_feed(&feed.rss_link, now).await {
            Ok(parsed) => parsed,
            Err(e) => {
                if let Err(db_err) = self.db.record_feed_fetch(feed.id, Some(&e.to_string())).await {
                    tracing::warn!(feed_id = feed.id, error = %db_err, "Failed to record feed error");
                }
                return Err(e.into());
            }
        };

        let added = self.db.insert_articles(feed.id, &parsed.articles).await?;
        self.db.record_feed_fetch(feed.id, None).await?;
        tracing::debug!(feed_id = feed.id, added = added, "Feed refreshed");
        Ok(added)
    }

    pub async fn refresh_feed_by_id(&self, feed_id: i64) -> Result<usize, ServiceError> {
        let feed = self.db.get_feed(feed_id).await?;
        self.refresh_feed(&feed).await
    }

    /// Refresh every feed, a few at a time.
    ///
    /// Individual feed failures are logged and counted, never returned.
    /// Cancelling stops scheduling further feeds; the summary covers the
    /// feeds that completed.
    pub async fn refresh_all(
        &self,
        cancel: &CancellationToken,
    ) -> Result<RefreshSummary, ServiceError> {
        let feeds = self.db.all_feeds(cancel).await?;

        let summary = stream::iter(feeds)
            .map(|feed| async move {
                let result = self.refresh_feed(&feed).await;
                if let Err(e) = &result {
                    tracing::warn!(feed_id = feed.id, link = %feed.rss_link, error = %e, "Feed refresh failed");
                }
                result
            })
            .buffer_unordered(REFRESH_CONCURRENCY)
            .take_until(cancel.cancelled())
            .fold(RefreshSummary::default(), |mut summary, result| async move {
                summary.feeds += 1;
                match result {
                    Ok(added) => summary.added += added,
                    Err(_) => summary.failed += 1,
                }
                summary
            })
            .await;

        Ok(summary)
    }

    // ========================================================================
    // Listings
    // ========================================================================

    pub async fn list_feeds(
        &self,
        options: &Options,
        cancel: &CancellationToken,
    ) -> Result<Page<Feed>, ServiceError> {
        Ok(self
            .with_deadline(self.db.list_feeds(options, cancel))
            .await?)
    }

    pub async fn list_articles(
        &self,
        filter: ArticleFilter,
        options: &Options,
        cancel: &CancellationToken,
    ) -> Result<Page<Article>, ServiceError> {
        Ok(self
            .with_deadline(self.db.list_articles(filter, options, cancel))
            .await?)
    }

    /// Articles of one feed. Unknown feeds are `NotFound`, not an empty page.
    pub async fn list_feed_articles(
        &self,
        feed_id: i64,
        options: &Options,
        cancel: &CancellationToken,
    ) -> Result<Page<Article>, ServiceError> {
        self.db.get_feed(feed_id).await?;
        Ok(self
            .with_deadline(self.db.list_articles_by_feed(feed_id, options, cancel))
            .await?)
    }

    async fn with_deadline<T>(
        &self,
        listing: impl Future<Output = Result<T, PaginationError>>,
    ) -> Result<T, PaginationError> {
        match tokio::time::timeout(self.request_timeout, listing).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.request_timeout.as_millis() as u64,
                    "Listing exceeded request deadline"
                );
                Err(PaginationError::TimedOut)
            }
        }
    }

    // ========================================================================
    // Articles
    // ========================================================================

    pub async fn create_article(
        &self,
        request: CreateArticleRequest,
    ) -> Result<Article, ServiceError> {
        let published = match request.published.as_deref().map(str::trim) {
            None | Some("") => Utc::now().timestamp(),
            Some(raw) => parse_published(raw)?,
        };

        Ok(self
            .db
            .create_article(&NewArticle {
                feed_id: request.feed_id,
                link: request.link,
                title: request.title,
                author: request.author,
                description: request.description,
                published,
            })
            .await?)
    }

    pub async fn get_article(&self, article_id: i64) -> Result<Article, ServiceError> {
        Ok(self.db.get_article(article_id).await?)
    }

    pub async fn mark_read(&self, article_id: i64) -> Result<Article, ServiceError> {
        Ok(self.db.mark_article_read(article_id).await?)
    }

    pub async fn toggle_favorite(&self, article_id: i64) -> Result<Article, ServiceError> {
        Ok(self.db.toggle_article_favorite(article_id).await?)
    }
}

/// Parse a publish date into unix seconds (UTC).
///
/// Accepts RFC 3339, RFC 2822, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD` and a
/// bare integer of unix seconds. Naive forms are read as UTC.
pub fn parse_published(raw: &str) -> Result<i64, ServiceError> {
    let raw = raw.trim();

    if let Ok(seconds) = raw.parse::<i64>() {
        return Ok(seconds);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.timestamp());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Ok(dt.timestamp());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt.and_utc().timestamp());
    }
    if let Some(dt) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(dt.and_utc().timestamp());
    }

    Err(ServiceError::InvalidDate(raw.to_string()))
}

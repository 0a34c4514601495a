use tokio_util::sync::CancellationToken;

use super::schema::Database;
use super::types::{DatabaseError, Feed, NewFeed, FEED_COLUMNS};
use crate::pagination::{paginate, Filters, Options, Order, Page, PaginationError};
use crate::util::site_link;

/// Page size for internal full walks over the feeds table.
const FEED_WALK_PAGE: usize = 50;

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Insert a new subscription and return the stored row.
    ///
    /// Title and rss link are required. An empty site link is derived from
    /// the rss link (`scheme://host`).
    ///
    /// # Errors
    ///
    /// - [`DatabaseError::Validation`] for missing fields or an unparseable link
    /// - [`DatabaseError::Conflict`] if the rss link is already subscribed
    pub async fn create_feed(&self, feed: &NewFeed) -> Result<Feed, DatabaseError> {
        let title = feed.title.trim();
        let rss_link = feed.rss_link.trim();
        if rss_link.is_empty() {
            return Err(DatabaseError::Validation("feed link is required".into()));
        }
        if title.is_empty() {
            return Err(DatabaseError::Validation("feed title is required".into()));
        }

        let site = if feed.site_link.trim().is_empty() {
            site_link(rss_link).map_err(|e| DatabaseError::Validation(e.to_string()))?
        } else {
            feed.site_link.trim().to_string()
        };
        let now = chrono::Utc::now().timestamp();

        let created = sqlx::query_as::<_, Feed>(&format!(
            "INSERT INTO feeds (title, rss_link, site_link, description, created_at) \
             VALUES (?, ?, ?, ?, ?) RETURNING {FEED_COLUMNS}"
        ))
        .bind(title)
        .bind(rss_link)
        .bind(&site)
        .bind(&feed.description)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::on_unique(format!("feed {rss_link}")))?;

        tracing::info!(feed_id = created.id, rss_link = %created.rss_link, "Feed created");
        Ok(created)
    }

    pub async fn get_feed(&self, feed_id: i64) -> Result<Feed, DatabaseError> {
        sqlx::query_as::<_, Feed>(&format!("SELECT {FEED_COLUMNS} FROM feeds WHERE id = ?"))
            .bind(feed_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("feed {feed_id}")))
    }

    /// The oldest feed published by `site` (a `scheme://host` value).
    pub async fn get_feed_by_site_link(&self, site: &str) -> Result<Option<Feed>, DatabaseError> {
        let feed = sqlx::query_as::<_, Feed>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds WHERE site_link = ? ORDER BY id LIMIT 1"
        ))
        .bind(site)
        .fetch_optional(&self.pool)
        .await?;
        Ok(feed)
    }

    /// One page of feeds, keyed by id.
    pub async fn list_feeds(
        &self,
        options: &Options,
        cancel: &CancellationToken,
    ) -> Result<Page<Feed>, PaginationError> {
        paginate(&self.feed_windows(), &Filters::none(), options, cancel).await
    }

    /// Every feed, oldest first, read page by page through the cursor.
    pub async fn all_feeds(&self, cancel: &CancellationToken) -> Result<Vec<Feed>, PaginationError> {
        let mut options = Options {
            limit: FEED_WALK_PAGE,
            order: Order::Ascending,
            ..Options::default()
        };
        let mut feeds = Vec::new();

        loop {
            let page = self.list_feeds(&options, cancel).await?;
            feeds.extend(page.items);
            if !page.cursor.has_next {
                break;
            }
            options = options.with_cursor(page.cursor.next);
        }

        Ok(feeds)
    }

    /// Delete a feed and, through the foreign key cascade, its articles.
    pub async fn delete_feed(&self, feed_id: i64) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM feeds WHERE id = ?")
            .bind(feed_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("feed {feed_id}")));
        }
        tracing::info!(feed_id = feed_id, "Feed deleted");
        Ok(())
    }

    /// Stamp `last_fetched` and set or clear the refresh error.
    pub async fn record_feed_fetch(
        &self,
        feed_id: i64,
        error: Option<&str>,
    ) -> Result<(), DatabaseError> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query("UPDATE feeds SET last_fetched = ?, error = ? WHERE id = ?")
            .bind(now)
            .bind(error)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

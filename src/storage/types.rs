use chrono::DateTime;
use serde::Serialize;
use thiserror::Error;

use crate::pagination::{FilterValue, Filters, PaginationKey};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds a lock on the database file
    #[error("Another instance of feedreader appears to be using the database. Please close it and try again.")]
    InstanceLocked,

    #[error("Schema setup failed: {0}")]
    Migration(String),

    /// The pool was closed
    #[error("Database is closed")]
    Unavailable,

    /// Input rejected before reaching SQLite
    #[error("{0}")]
    Validation(String),

    /// A unique column already holds this value
    #[error("{0} already exists")]
    Conflict(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Database error: {0}")]
    Other(#[source] sqlx::Error),
}

/// SQLITE_BUSY (5), SQLITE_LOCKED (6) or SQLITE_CANTOPEN (14). Extended
/// result codes carry the primary code in their low byte.
fn is_lock_error(err: &sqlx::Error) -> bool {
    let sqlx::Error::Database(db_err) = err else {
        return false;
    };
    db_err
        .code()
        .and_then(|code| code.parse::<i32>().ok())
        .is_some_and(|code| matches!(code & 0xff, 5 | 6 | 14))
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolClosed => DatabaseError::Unavailable,
            other => DatabaseError::Other(other),
        }
    }
}

impl DatabaseError {
    /// Like `From`, but lock and open failures become
    /// [`DatabaseError::InstanceLocked`]. Used while opening the file.
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if is_lock_error(&err) {
            DatabaseError::InstanceLocked
        } else {
            DatabaseError::from(err)
        }
    }

    /// Map a UNIQUE violation to [`DatabaseError::Conflict`] naming `what`.
    pub(crate) fn on_unique(what: impl Into<String>) -> impl FnOnce(sqlx::Error) -> Self {
        let what = what.into();
        move |err| match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DatabaseError::Conflict(what)
            }
            _ => DatabaseError::from(err),
        }
    }
}

// ============================================================================
// Feeds
// ============================================================================

/// A subscribed feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Feed {
    pub id: i64,
    pub title: String,
    /// `scheme://host` of the site publishing the feed
    pub site_link: String,
    pub rss_link: String,
    pub description: String,
    pub created_at: i64,
    pub last_fetched: Option<i64>,
    /// Error of the most recent refresh, cleared on success
    pub error: Option<String>,
}

impl PaginationKey for Feed {
    fn pagination_key(&self) -> String {
        self.id.to_string()
    }
}

/// Fields for a new subscription.
#[derive(Debug, Clone, Default)]
pub struct NewFeed {
    pub title: String,
    pub rss_link: String,
    /// Derived from `rss_link` when empty.
    pub site_link: String,
    pub description: String,
}

// ============================================================================
// Articles
// ============================================================================

/// An article as returned by the API.
///
/// The pagination key is `"{published}:{id}"`: publish time with the row id
/// as tie-break, so articles sharing a timestamp still have a total order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: i64,
    #[serde(rename = "feedID")]
    pub feed_id: i64,
    pub link: String,
    pub title: String,
    pub author: String,
    pub description: String,
    /// Unix seconds, UTC
    pub published: i64,
    /// Human-readable publish date, e.g. `Tue, 14 Nov 2023`
    pub published_on: String,
    pub read: bool,
    pub read_date: Option<i64>,
    pub favorited: bool,
    /// When the row was first stored
    #[serde(rename = "timestamp")]
    pub fetched_at: i64,
}

impl PaginationKey for Article {
    fn pagination_key(&self) -> String {
        article_key(self.published, self.id)
    }
}

pub(crate) fn article_key(published: i64, id: i64) -> String {
    format!("{}:{}", published, id)
}

/// Inverse of [`article_key`].
pub(crate) fn parse_article_key(key: &str) -> Option<(i64, i64)> {
    let (published, id) = key.split_once(':')?;
    Some((published.trim().parse().ok()?, id.trim().parse().ok()?))
}

/// Column-for-column image of an `articles` row.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ArticleRow {
    pub id: i64,
    pub feed_id: i64,
    pub link: String,
    pub title: String,
    pub author: String,
    pub description: String,
    pub published: i64,
    pub read: bool,
    pub read_date: Option<i64>,
    pub favorited: bool,
    pub fetched_at: i64,
}

impl ArticleRow {
    pub(crate) fn into_article(self) -> Article {
        let published_on = DateTime::from_timestamp(self.published, 0)
            .map(|dt| dt.format("%a, %d %b %Y").to_string())
            .unwrap_or_default();

        Article {
            id: self.id,
            feed_id: self.feed_id,
            link: self.link,
            title: self.title,
            author: self.author,
            description: self.description,
            published: self.published,
            published_on,
            read: self.read,
            read_date: self.read_date,
            favorited: self.favorited,
            fetched_at: self.fetched_at,
        }
    }
}

/// Columns selected for [`ArticleRow`].
pub(crate) const ARTICLE_COLUMNS: &str = "id, feed_id, link, title, author, description, \
     published, read, read_date, favorited, fetched_at";

/// Columns selected for [`Feed`].
pub(crate) const FEED_COLUMNS: &str =
    "id, title, site_link, rss_link, description, created_at, last_fetched, error";

/// An article extracted from a fetched feed, ready for batch insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedArticle {
    pub link: String,
    pub title: String,
    pub author: String,
    pub description: String,
    /// Unix seconds, UTC
    pub published: i64,
}

/// A single article submitted through the API.
#[derive(Debug, Clone, Default)]
pub struct NewArticle {
    /// Owning feed. When absent the feed is looked up by the site of `link`.
    pub feed_id: Option<i64>,
    pub link: String,
    pub title: String,
    pub author: String,
    pub description: String,
    pub published: i64,
}

/// Which articles a listing returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArticleFilter {
    #[default]
    All,
    Unread,
    Read,
    Favorited,
}

impl ArticleFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            ArticleFilter::All => "all",
            ArticleFilter::Unread => "unread",
            ArticleFilter::Read => "read",
            ArticleFilter::Favorited => "favorited",
        }
    }
}

impl From<ArticleFilter> for Filters {
    fn from(filter: ArticleFilter) -> Self {
        match filter {
            ArticleFilter::All => Filters::none(),
            ArticleFilter::Unread => Filters::none().eq("read", FilterValue::Bool(false)),
            ArticleFilter::Read => Filters::none().eq("read", FilterValue::Bool(true)),
            ArticleFilter::Favorited => Filters::none().eq("favorited", FilterValue::Bool(true)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i64, published: i64) -> ArticleRow {
        ArticleRow {
            id,
            feed_id: 1,
            link: format!("https://example.com/{id}"),
            title: "Title".to_string(),
            author: String::new(),
            description: String::new(),
            published,
            read: false,
            read_date: None,
            favorited: false,
            fetched_at: published,
        }
    }

    #[test]
    fn test_article_key_round_trip() {
        let article = row(17, 1_700_000_000).into_article();
        assert_eq!(article.pagination_key(), "1700000000:17");
        assert_eq!(
            parse_article_key(&article.pagination_key()),
            Some((1_700_000_000, 17))
        );
    }

    #[test]
    fn test_parse_article_key_rejects_garbage() {
        assert_eq!(parse_article_key("1700000000"), None);
        assert_eq!(parse_article_key("abc:1"), None);
        assert_eq!(parse_article_key(""), None);
        assert_eq!(
            parse_article_key(&article_key(i64::MIN, i64::MIN)),
            Some((i64::MIN, i64::MIN))
        );
    }

    #[test]
    fn test_published_on_format() {
        let article = row(1, 1_700_000_000).into_article();
        assert_eq!(article.published_on, "Tue, 14 Nov 2023");
    }

    #[test]
    fn test_article_json_shape() {
        let json = serde_json::to_value(row(3, 0).into_article()).unwrap();
        assert_eq!(json["feedID"], 1);
        assert_eq!(json["publishedOn"], "Thu, 01 Jan 1970");
        assert_eq!(json["timestamp"], 0);
        assert!(json["readDate"].is_null());
    }

    #[test]
    fn test_article_filter_names() {
        assert_eq!(ArticleFilter::default().as_str(), "all");
        assert_eq!(ArticleFilter::Unread.as_str(), "unread");
        assert_eq!(ArticleFilter::Favorited.as_str(), "favorited");
    }

    #[test]
    fn test_filters_for_article_filter() {
        assert!(Filters::from(ArticleFilter::All).is_empty());
        let unread = Filters::from(ArticleFilter::Unread);
        let predicate = unread.iter().next().unwrap();
        assert_eq!(predicate.column, "read");
        assert_eq!(predicate.value, FilterValue::Bool(false));
        let favorited = Filters::from(ArticleFilter::Favorited);
        assert_eq!(favorited.iter().next().unwrap().column, "favorited");
    }
}

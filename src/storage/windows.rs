//! Keyset window queries for feeds and articles.
//!
//! Each listing is served by two reads built here: a forward window beyond
//! the cursor and a backward window before it. The key comparison and the
//! `ORDER BY` come from [`Side::bounds`], so the two directions can never
//! disagree about the key.

use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::schema::Database;
use super::types::{
    article_key, parse_article_key, Article, ArticleRow, Feed, ARTICLE_COLUMNS, FEED_COLUMNS,
};
use crate::pagination::{FilterValue, Filters, Order, PaginationError, Side, WindowFetcher};

impl Database {
    pub fn feed_windows(&self) -> FeedWindows<'_> {
        FeedWindows { pool: &self.pool }
    }

    pub fn article_windows(&self) -> ArticleWindows<'_> {
        ArticleWindows { pool: &self.pool }
    }
}

/// AND each predicate into a query that already has a `WHERE` clause.
fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filters: &Filters) {
    for predicate in filters.iter() {
        builder.push(" AND ").push(predicate.column).push(" = ");
        match &predicate.value {
            FilterValue::Bool(value) => builder.push_bind(*value),
            FilterValue::Int(value) => builder.push_bind(*value),
        };
    }
}

fn sql_limit(row_limit: usize) -> i64 {
    i64::try_from(row_limit).unwrap_or(i64::MAX)
}

fn ensure_open(pool: &SqlitePool) -> Result<(), PaginationError> {
    if pool.is_closed() {
        return Err(PaginationError::StoreUnavailable);
    }
    Ok(())
}

// ============================================================================
// Feeds
// ============================================================================

/// Feeds keyed by id.
pub struct FeedWindows<'a> {
    pool: &'a SqlitePool,
}

impl FeedWindows<'_> {
    async fn window(
        &self,
        side: Side,
        filters: &Filters,
        boundary: &str,
        order: Order,
        row_limit: usize,
    ) -> Result<Vec<Feed>, PaginationError> {
        ensure_open(self.pool)?;

        let boundary = boundary.trim().parse::<i64>().unwrap_or_else(|_| {
            tracing::debug!(cursor = %boundary, "Unparseable feed cursor, starting from the beginning");
            feed_sentinel(order)
        });
        let (cmp, sort) = side.bounds(order);

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {FEED_COLUMNS} FROM feeds WHERE id "));
        builder.push(cmp).push(" ").push_bind(boundary);
        push_filters(&mut builder, filters);
        builder
            .push(" ORDER BY id ")
            .push(sort.as_sql())
            .push(" LIMIT ")
            .push_bind(sql_limit(row_limit));

        let feeds = builder
            .build_query_as::<Feed>()
            .fetch_all(self.pool)
            .await?;
        Ok(feeds)
    }
}

fn feed_sentinel(order: Order) -> i64 {
    match order {
        Order::Descending => i64::MAX,
        Order::Ascending => i64::MIN,
    }
}

impl WindowFetcher for FeedWindows<'_> {
    type Item = Feed;

    fn sentinel(&self, order: Order) -> String {
        feed_sentinel(order).to_string()
    }

    async fn forward_window(
        &self,
        filters: &Filters,
        boundary: &str,
        order: Order,
        row_limit: usize,
    ) -> Result<Vec<Feed>, PaginationError> {
        self.window(Side::Forward, filters, boundary, order, row_limit)
            .await
    }

    async fn backward_window(
        &self,
        filters: &Filters,
        boundary: &str,
        order: Order,
        row_limit: usize,
    ) -> Result<Vec<Feed>, PaginationError> {
        self.window(Side::Backward, filters, boundary, order, row_limit)
            .await
    }
}

// ============================================================================
// Articles
// ============================================================================

/// Articles keyed by `(published, id)`.
pub struct ArticleWindows<'a> {
    pool: &'a SqlitePool,
}

fn article_sentinel(order: Order) -> (i64, i64) {
    match order {
        Order::Descending => (i64::MAX, i64::MAX),
        Order::Ascending => (i64::MIN, i64::MIN),
    }
}

impl ArticleWindows<'_> {
    async fn window(
        &self,
        side: Side,
        filters: &Filters,
        boundary: &str,
        order: Order,
        row_limit: usize,
    ) -> Result<Vec<Article>, PaginationError> {
        ensure_open(self.pool)?;

        let (published, id) = parse_article_key(boundary).unwrap_or_else(|| {
            tracing::debug!(cursor = %boundary, "Unparseable article cursor, starting from the beginning");
            article_sentinel(order)
        });
        let (cmp, sort) = side.bounds(order);
        let sort = sort.as_sql();

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE (published, id) "
        ));
        builder
            .push(cmp)
            .push(" (")
            .push_bind(published)
            .push(", ")
            .push_bind(id)
            .push(")");
        push_filters(&mut builder, filters);
        builder
            .push(format!(" ORDER BY published {sort}, id {sort} LIMIT "))
            .push_bind(sql_limit(row_limit));

        let rows = builder
            .build_query_as::<ArticleRow>()
            .fetch_all(self.pool)
            .await?;
        Ok(rows.into_iter().map(ArticleRow::into_article).collect())
    }
}

impl WindowFetcher for ArticleWindows<'_> {
    type Item = Article;

    fn sentinel(&self, order: Order) -> String {
        let (published, id) = article_sentinel(order);
        article_key(published, id)
    }

    async fn forward_window(
        &self,
        filters: &Filters,
        boundary: &str,
        order: Order,
        row_limit: usize,
    ) -> Result<Vec<Article>, PaginationError> {
        self.window(Side::Forward, filters, boundary, order, row_limit)
            .await
    }

    async fn backward_window(
        &self,
        filters: &Filters,
        boundary: &str,
        order: Order,
        row_limit: usize,
    ) -> Result<Vec<Article>, PaginationError> {
        self.window(Side::Backward, filters, boundary, order, row_limit)
            .await
    }
}

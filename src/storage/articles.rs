use sqlx::QueryBuilder;
use tokio_util::sync::CancellationToken;

use super::schema::Database;
use super::types::{
    Article, ArticleFilter, ArticleRow, DatabaseError, NewArticle, ParsedArticle, ARTICLE_COLUMNS,
};
use crate::pagination::{paginate, FilterValue, Filters, Options, Page, PaginationError};
use crate::util::site_link;

/// Rows per INSERT. 7 bound columns * 50 stays well under SQLite's
/// 999 parameter limit.
const BATCH_SIZE: usize = 50;

impl Database {
    // ========================================================================
    // Article Inserts
    // ========================================================================

    /// Store a single article and return it.
    ///
    /// The owning feed is `article.feed_id` when given, otherwise the feed
    /// whose site link matches the site of `article.link`.
    ///
    /// # Errors
    ///
    /// - [`DatabaseError::Validation`] for a missing link or title
    /// - [`DatabaseError::NotFound`] when no owning feed exists
    /// - [`DatabaseError::Conflict`] when the link is already stored
    pub async fn create_article(&self, article: &NewArticle) -> Result<Article, DatabaseError> {
        let link = article.link.trim();
        let title = article.title.trim();
        if link.is_empty() {
            return Err(DatabaseError::Validation("article link is required".into()));
        }
        if title.is_empty() {
            return Err(DatabaseError::Validation("article title is required".into()));
        }

        let feed_id = match article.feed_id {
            Some(feed_id) => self.get_feed(feed_id).await?.id,
            None => {
                let site = site_link(link).map_err(|e| DatabaseError::Validation(e.to_string()))?;
                self.get_feed_by_site_link(&site)
                    .await?
                    .ok_or_else(|| DatabaseError::NotFound(format!("feed for site {site}")))?
                    .id
            }
        };
        let now = chrono::Utc::now().timestamp();

        let row = sqlx::query_as::<_, ArticleRow>(&format!(
            "INSERT INTO articles (feed_id, link, title, author, description, published, fetched_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING {ARTICLE_COLUMNS}"
        ))
        .bind(feed_id)
        .bind(link)
        .bind(title)
        .bind(&article.author)
        .bind(&article.description)
        .bind(article.published)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::on_unique(format!("article {link}")))?;

        tracing::debug!(article_id = row.id, feed_id = feed_id, "Article created");
        Ok(row.into_article())
    }

    /// Insert articles for a feed, skipping links already stored.
    /// Returns the number of new rows.
    pub async fn insert_articles(
        &self,
        feed_id: i64,
        articles: &[ParsedArticle],
    ) -> Result<usize, DatabaseError> {
        if articles.is_empty() {
            return Ok(0);
        }

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;
        let mut inserted: u64 = 0;

        for chunk in articles.chunks(BATCH_SIZE) {
            let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
                "INSERT INTO articles (feed_id, link, title, author, description, published, fetched_at) ",
            );

            builder.push_values(chunk, |mut b, article| {
                b.push_bind(feed_id)
                    .push_bind(&article.link)
                    .push_bind(&article.title)
                    .push_bind(&article.author)
                    .push_bind(&article.description)
                    .push_bind(article.published)
                    .push_bind(now);
            });
            builder.push(" ON CONFLICT(link) DO NOTHING");

            inserted += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;

        let inserted = usize::try_from(inserted).unwrap_or(usize::MAX);
        tracing::debug!(
            feed_id = feed_id,
            offered = articles.len(),
            inserted = inserted,
            "Inserted articles"
        );
        Ok(inserted)
    }

    // ========================================================================
    // Article Queries
    // ========================================================================

    pub async fn get_article(&self, article_id: i64) -> Result<Article, DatabaseError> {
        sqlx::query_as::<_, ArticleRow>(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = ?"
        ))
        .bind(article_id)
        .fetch_optional(&self.pool)
        .await?
        .map(ArticleRow::into_article)
        .ok_or_else(|| DatabaseError::NotFound(format!("article {article_id}")))
    }

    /// One page of articles across all feeds, keyed by `(published, id)`.
    pub async fn list_articles(
        &self,
        filter: ArticleFilter,
        options: &Options,
        cancel: &CancellationToken,
    ) -> Result<Page<Article>, PaginationError> {
        tracing::debug!(
            filter = filter.as_str(),
            limit = options.limit,
            order = %options.order,
            "Listing articles"
        );
        paginate(&self.article_windows(), &filter.into(), options, cancel).await
    }

    /// One page of a single feed's articles.
    pub async fn list_articles_by_feed(
        &self,
        feed_id: i64,
        options: &Options,
        cancel: &CancellationToken,
    ) -> Result<Page<Article>, PaginationError> {
        let filters = Filters::none().eq("feed_id", FilterValue::Int(feed_id));
        paginate(&self.article_windows(), &filters, options, cancel).await
    }

    // ========================================================================
    // Article Mutations
    // ========================================================================

    /// Mark an article as read and return it.
    ///
    /// Idempotent: `read_date` keeps the time of the first call.
    pub async fn mark_article_read(&self, article_id: i64) -> Result<Article, DatabaseError> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query_as::<_, ArticleRow>(&format!(
            "UPDATE articles SET read = 1, read_date = COALESCE(read_date, ?) \
             WHERE id = ? RETURNING {ARTICLE_COLUMNS}"
        ))
        .bind(now)
        .bind(article_id)
        .fetch_optional(&self.pool)
        .await?
        .map(ArticleRow::into_article)
        .ok_or_else(|| DatabaseError::NotFound(format!("article {article_id}")))
    }

    /// Atomically flip the favorite flag and return the updated article.
    pub async fn toggle_article_favorite(
        &self,
        article_id: i64,
    ) -> Result<Article, DatabaseError> {
        sqlx::query_as::<_, ArticleRow>(&format!(
            "UPDATE articles SET favorited = NOT favorited WHERE id = ? RETURNING {ARTICLE_COLUMNS}"
        ))
        .bind(article_id)
        .fetch_optional(&self.pool)
        .await?
        .map(ArticleRow::into_article)
        .ok_or_else(|| DatabaseError::NotFound(format!("article {article_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Feed, NewFeed};
    use pretty_assertions::assert_eq;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    async fn test_feed(db: &Database) -> Feed {
        db.create_feed(&NewFeed {
            title: "Example".into(),
            rss_link: "https://example.com/rss.xml".into(),
            ..NewFeed::default()
        })
        .await
        .unwrap()
    }

    fn parsed(n: i64, published: i64) -> ParsedArticle {
        ParsedArticle {
            link: format!("https://example.com/posts/{n}"),
            title: format!("Post {n}"),
            author: "Ann".into(),
            description: String::new(),
            published,
        }
    }

    #[tokio::test]
    async fn test_insert_articles_skips_existing_links() {
        let db = test_db().await;
        let feed = test_feed(&db).await;

        let first = db
            .insert_articles(feed.id, &[parsed(1, 10), parsed(2, 20)])
            .await
            .unwrap();
        assert_eq!(first, 2);

        let second = db
            .insert_articles(feed.id, &[parsed(2, 20), parsed(3, 30)])
            .await
            .unwrap();
        assert_eq!(second, 1);
    }

    #[tokio::test]
    async fn test_insert_articles_spans_batches() {
        let db = test_db().await;
        let feed = test_feed(&db).await;
        let articles: Vec<_> = (0..(BATCH_SIZE as i64 * 2 + 3)).map(|n| parsed(n, n)).collect();
        let inserted = db.insert_articles(feed.id, &articles).await.unwrap();
        assert_eq!(inserted, articles.len());
    }

    #[tokio::test]
    async fn test_insert_empty_is_noop() {
        let db = test_db().await;
        assert_eq!(db.insert_articles(1, &[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_create_article_resolves_feed_by_site() {
        let db = test_db().await;
        let feed = test_feed(&db).await;
        let article = db
            .create_article(&NewArticle {
                link: "https://example.com/posts/hello".into(),
                title: "Hello".into(),
                published: 1_700_000_000,
                ..NewArticle::default()
            })
            .await
            .unwrap();
        assert_eq!(article.feed_id, feed.id);
        assert!(!article.read);
        assert_eq!(db.get_article(article.id).await.unwrap(), article);
    }

    #[tokio::test]
    async fn test_create_article_without_matching_feed() {
        let db = test_db().await;
        test_feed(&db).await;
        let result = db
            .create_article(&NewArticle {
                link: "https://elsewhere.example/post".into(),
                title: "Hello".into(),
                ..NewArticle::default()
            })
            .await;
        assert!(matches!(result, Err(DatabaseError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_create_article_validation_and_conflict() {
        let db = test_db().await;
        let feed = test_feed(&db).await;
        let missing_title = NewArticle {
            feed_id: Some(feed.id),
            link: "https://example.com/x".into(),
            ..NewArticle::default()
        };
        assert!(matches!(
            db.create_article(&missing_title).await,
            Err(DatabaseError::Validation(_))
        ));

        let article = NewArticle {
            title: "X".into(),
            ..missing_title
        };
        db.create_article(&article).await.unwrap();
        assert!(matches!(
            db.create_article(&article).await,
            Err(DatabaseError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_mark_read_is_idempotent() {
        let db = test_db().await;
        let feed = test_feed(&db).await;
        db.insert_articles(feed.id, &[parsed(1, 10)]).await.unwrap();
        let id = db
            .list_articles(ArticleFilter::All, &Options::default(), &CancellationToken::new())
            .await
            .unwrap()
            .items[0]
            .id;

        let first = db.mark_article_read(id).await.unwrap();
        assert!(first.read);
        assert!(first.read_date.is_some());
        let second = db.mark_article_read(id).await.unwrap();
        assert_eq!(second.read_date, first.read_date);

        assert!(matches!(
            db.mark_article_read(id + 100).await,
            Err(DatabaseError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_toggle_favorite() {
        let db = test_db().await;
        let feed = test_feed(&db).await;
        db.insert_articles(feed.id, &[parsed(1, 10)]).await.unwrap();
        let id = db
            .list_articles(ArticleFilter::All, &Options::default(), &CancellationToken::new())
            .await
            .unwrap()
            .items[0]
            .id;

        assert!(db.toggle_article_favorite(id).await.unwrap().favorited);
        assert!(!db.toggle_article_favorite(id).await.unwrap().favorited);
    }

    #[tokio::test]
    async fn test_list_articles_filters() {
        let db = test_db().await;
        let feed = test_feed(&db).await;
        db.insert_articles(feed.id, &[parsed(1, 10), parsed(2, 20), parsed(3, 30)])
            .await
            .unwrap();
        let cancel = CancellationToken::new();
        let all = db
            .list_articles(ArticleFilter::All, &Options::default(), &cancel)
            .await
            .unwrap();
        let titles: Vec<_> = all.items.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Post 3", "Post 2", "Post 1"]);

        db.mark_article_read(all.items[0].id).await.unwrap();
        db.toggle_article_favorite(all.items[2].id).await.unwrap();

        let unread = db
            .list_articles(ArticleFilter::Unread, &Options::default(), &cancel)
            .await
            .unwrap();
        assert_eq!(unread.items.len(), 2);
        let read = db
            .list_articles(ArticleFilter::Read, &Options::default(), &cancel)
            .await
            .unwrap();
        assert_eq!(read.items[0].title, "Post 3");
        let favorited = db
            .list_articles(ArticleFilter::Favorited, &Options::default(), &cancel)
            .await
            .unwrap();
        assert_eq!(favorited.items[0].title, "Post 1");
    }

    #[tokio::test]
    async fn test_list_articles_by_feed() {
        let db = test_db().await;
        let feed = test_feed(&db).await;
        let other = db
            .create_feed(&NewFeed {
                title: "Other".into(),
                rss_link: "https://other.example/rss".into(),
                ..NewFeed::default()
            })
            .await
            .unwrap();
        db.insert_articles(feed.id, &[parsed(1, 10)]).await.unwrap();
        db.insert_articles(
            other.id,
            &[ParsedArticle {
                link: "https://other.example/a".into(),
                ..parsed(2, 20)
            }],
        )
        .await
        .unwrap();

        let page = db
            .list_articles_by_feed(other.id, &Options::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].feed_id, other.id);
    }

    #[tokio::test]
    async fn test_deleting_feed_cascades_to_articles() {
        let db = test_db().await;
        let feed = test_feed(&db).await;
        db.insert_articles(feed.id, &[parsed(1, 10)]).await.unwrap();
        db.delete_feed(feed.id).await.unwrap();
        let page = db
            .list_articles(ArticleFilter::All, &Options::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(page.items.is_empty());
    }
}

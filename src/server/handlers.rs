use axum::{
    extract::{Path, RawQuery, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use super::error::ApiError;
use super::AppState;
use crate::pagination::{Options, Page};
use crate::service::CreateArticleRequest;
use crate::storage::{Article, ArticleFilter, Feed};

/// Body of `POST /api/feeds`.
#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub link: String,
}

/// Page options from the raw query string. Never rejects a request.
fn page_options(query: Option<&str>) -> Options {
    let query = query.unwrap_or_default();
    Options::from_params(url::form_urlencoded::parse(query.as_bytes()))
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "up": true }))
}

// ============================================================================
// Feeds
// ============================================================================

pub async fn list_feeds(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Json<Page<Feed>>, ApiError> {
    let options = page_options(query.as_deref());
    let cancel = state.shutdown.child_token();
    let page = state.service.list_feeds(&options, &cancel).await?;
    Ok(Json(page))
}

pub async fn subscribe(
    State(state): State<AppState>,
    Json(request): Json<SubscribeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let feed = state.service.subscribe(&request.link).await?;
    Ok((StatusCode::CREATED, Json(feed)))
}

pub async fn delete_feed(
    State(state): State<AppState>,
    Path(feed_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.service.delete_feed(feed_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn refresh_feed(
    State(state): State<AppState>,
    Path(feed_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let added = state.service.refresh_feed_by_id(feed_id).await?;
    Ok(Json(json!({ "added": added })))
}

pub async fn list_feed_articles(
    State(state): State<AppState>,
    Path(feed_id): Path<i64>,
    RawQuery(query): RawQuery,
) -> Result<Json<Page<Article>>, ApiError> {
    let options = page_options(query.as_deref());
    let cancel = state.shutdown.child_token();
    let page = state
        .service
        .list_feed_articles(feed_id, &options, &cancel)
        .await?;
    Ok(Json(page))
}

// ============================================================================
// Articles
// ============================================================================

async fn list_filtered(
    state: AppState,
    query: Option<String>,
    filter: ArticleFilter,
) -> Result<Json<Page<Article>>, ApiError> {
    let options = page_options(query.as_deref());
    let cancel = state.shutdown.child_token();
    let page = state
        .service
        .list_articles(filter, &options, &cancel)
        .await?;
    Ok(Json(page))
}

pub async fn list_articles(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Json<Page<Article>>, ApiError> {
    list_filtered(state, query, ArticleFilter::All).await
}

pub async fn list_unread_articles(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Json<Page<Article>>, ApiError> {
    list_filtered(state, query, ArticleFilter::Unread).await
}

pub async fn list_read_articles(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Json<Page<Article>>, ApiError> {
    list_filtered(state, query, ArticleFilter::Read).await
}

pub async fn list_favorite_articles(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Json<Page<Article>>, ApiError> {
    list_filtered(state, query, ArticleFilter::Favorited).await
}

pub async fn create_article(
    State(state): State<AppState>,
    Json(request): Json<CreateArticleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let article = state.service.create_article(request).await?;
    Ok((StatusCode::CREATED, Json(article)))
}

pub async fn get_article(
    State(state): State<AppState>,
    Path(article_id): Path<i64>,
) -> Result<Json<Article>, ApiError> {
    Ok(Json(state.service.get_article(article_id).await?))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(article_id): Path<i64>,
) -> Result<Json<Article>, ApiError> {
    Ok(Json(state.service.mark_read(article_id).await?))
}

pub async fn toggle_favorite(
    State(state): State<AppState>,
    Path(article_id): Path<i64>,
) -> Result<Json<Article>, ApiError> {
    Ok(Json(state.service.toggle_favorite(article_id).await?))
}

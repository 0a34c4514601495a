//! JSON HTTP API.
//!
//! ```text
//! /healthz
//! /api/feeds                   GET list, POST subscribe
//! /api/feeds/{id}              DELETE
//! /api/feeds/{id}/refresh      POST
//! /api/feeds/{id}/articles     GET
//! /api/articles                GET all, POST create
//! /api/articles/unread         GET
//! /api/articles/read           GET
//! /api/articles/favorites      GET
//! /api/articles/{id}           GET
//! /api/articles/{id}/read      POST
//! /api/articles/{id}/favorite  POST
//! ```
//!
//! Every listing accepts `limit`, `cursor` and `order` query parameters and
//! answers with `{"cursor": {...}, "items": [...]}`.

mod error;
mod handlers;

use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
    Router,
};
use std::time::Instant;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub use error::ApiError;
pub use handlers::SubscribeRequest;

use crate::service::FeedService;

#[derive(Clone)]
pub struct AppState {
    pub service: FeedService,
    /// Server shutdown. Listings run under a child token, so in-flight
    /// pagination is cancelled when the server stops.
    pub shutdown: CancellationToken,
}

pub fn router(state: AppState) -> Router {
    let feeds = Router::new()
        .route("/", get(handlers::list_feeds).post(handlers::subscribe))
        .route("/{id}", delete(handlers::delete_feed))
        .route("/{id}/refresh", post(handlers::refresh_feed))
        .route("/{id}/articles", get(handlers::list_feed_articles));

    let articles = Router::new()
        .route(
            "/",
            get(handlers::list_articles).post(handlers::create_article),
        )
        .route("/unread", get(handlers::list_unread_articles))
        .route("/read", get(handlers::list_read_articles))
        .route("/favorites", get(handlers::list_favorite_articles))
        .route("/{id}", get(handlers::get_article))
        .route("/{id}/read", post(handlers::mark_read))
        .route("/{id}/favorite", post(handlers::toggle_favorite));

    Router::new()
        .route("/healthz", get(handlers::health))
        .nest("/api/feeds", feeds)
        .nest("/api/articles", articles)
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Handled request"
    );
    response
}

/// Serve the API on `listener` until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    service: FeedService,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let app = router(AppState {
        service,
        shutdown: shutdown.clone(),
    });

    if let Ok(addr) = listener.local_addr() {
        tracing::info!(addr = %addr, "HTTP API listening");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

//! HTTP API tests against a live server on an ephemeral port.
//!
//! Feeds are served by wiremock on localhost, so the service runs with
//! [`HostPolicy::AllowPrivate`].

use feedreader::feed::Fetcher;
use feedreader::server;
use feedreader::service::FeedService;
use feedreader::storage::Database;
use feedreader::util::HostPolicy;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Example Blog</title>
    <link>https://blog.example/</link>
    <description>Posts</description>
    <item>
      <title>First</title>
      <link>https://blog.example/first</link>
      <pubDate>Mon, 13 Nov 2023 10:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Second</title>
      <link>https://blog.example/second</link>
      <pubDate>Tue, 14 Nov 2023 10:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Third</title>
      <link>https://blog.example/third</link>
      <pubDate>Wed, 15 Nov 2023 10:00:00 GMT</pubDate>
    </item>
  </channel>
</rss>"#;

struct TestApp {
    base: String,
    client: reqwest::Client,
    shutdown: CancellationToken,
    feeds: MockServer,
}

impl TestApp {
    async fn start() -> Self {
        let feeds = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rss"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RSS))
            .mount(&feeds)
            .await;

        let db = Database::open(":memory:").await.unwrap();
        let fetcher = Fetcher::new()
            .unwrap()
            .with_backoff(Duration::from_millis(1));
        let service = FeedService::new(db, fetcher).with_host_policy(HostPolicy::AllowPrivate);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        tokio::spawn(server::serve(listener, service, shutdown.clone()));

        Self {
            base: format!("http://{}", addr),
            client: reqwest::Client::new(),
            shutdown,
            feeds,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn get(&self, path: &str) -> (u16, Value) {
        let response = self.client.get(self.url(path)).send().await.unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    async fn post(&self, path: &str, body: Value) -> (u16, Value) {
        let response = self
            .client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap_or(Value::Null))
    }

    async fn subscribe(&self) -> Value {
        let link = format!("{}/rss", self.feeds.uri());
        let (status, feed) = self.post("/api/feeds", json!({ "link": link })).await;
        assert_eq!(status, 201, "{feed}");
        feed
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn titles(page: &Value) -> Vec<&str> {
    page["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["title"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::start().await;
    let (status, body) = app.get("/healthz").await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({ "up": true }));
}

#[tokio::test]
async fn test_subscribe_returns_feed() {
    let app = TestApp::start().await;
    let feed = app.subscribe().await;

    assert_eq!(feed["title"], "Example Blog");
    assert_eq!(feed["siteLink"], "https://blog.example");
    assert!(feed["rssLink"].as_str().unwrap().ends_with("/rss"));
    assert!(feed["lastFetched"].is_i64());

    let (status, page) = app.get("/api/feeds").await;
    assert_eq!(status, 200);
    assert_eq!(page["items"].as_array().unwrap().len(), 1);
    assert_eq!(page["cursor"]["hasNext"], false);
}

#[tokio::test]
async fn test_subscribe_twice_conflicts() {
    let app = TestApp::start().await;
    app.subscribe().await;

    let link = format!("{}/rss", app.feeds.uri());
    let (status, body) = app.post("/api/feeds", json!({ "link": link })).await;
    assert_eq!(status, 409);
    assert!(body["error"].as_str().unwrap().contains("already exists"));
}

#[tokio::test]
async fn test_subscribe_rejects_bad_link() {
    let app = TestApp::start().await;
    let (status, body) = app
        .post("/api/feeds", json!({ "link": "ftp://example.com/rss" }))
        .await;
    assert_eq!(status, 400);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_article_pages_follow_cursor() {
    let app = TestApp::start().await;
    app.subscribe().await;

    let (status, first) = app.get("/api/articles?limit=2").await;
    assert_eq!(status, 200);
    assert_eq!(titles(&first), vec!["Third", "Second"]);
    assert_eq!(first["cursor"]["hasNext"], true);
    assert_eq!(first["cursor"]["hasPrev"], false);

    let next = first["cursor"]["next"].as_str().unwrap();
    let (status, second) = app
        .get(&format!("/api/articles?limit=2&cursor={}", next))
        .await;
    assert_eq!(status, 200);
    assert_eq!(titles(&second), vec!["First"]);
    assert_eq!(second["cursor"]["hasNext"], false);

    let (_, ascending) = app.get("/api/articles?order=asc&limit=2").await;
    assert_eq!(titles(&ascending), vec!["First", "Second"]);
}

#[tokio::test]
async fn test_malformed_page_params_fall_back_to_defaults() {
    let app = TestApp::start().await;
    app.subscribe().await;

    let (status, page) = app
        .get("/api/articles?limit=banana&order=sideways&cursor=nonsense")
        .await;
    assert_eq!(status, 200);
    assert_eq!(titles(&page), vec!["Third", "Second", "First"]);
}

#[tokio::test]
async fn test_read_and_favorite_listings() {
    let app = TestApp::start().await;
    app.subscribe().await;

    let (_, all) = app.get("/api/articles").await;
    let id = all["items"][0]["id"].as_i64().unwrap();

    let (status, article) = app.post(&format!("/api/articles/{id}/read"), json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(article["read"], true);
    assert!(article["readDate"].is_i64());

    let (status, article) = app
        .post(&format!("/api/articles/{id}/favorite"), json!({}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(article["favorited"], true);

    let (status, fetched) = app.get(&format!("/api/articles/{id}")).await;
    assert_eq!(status, 200);
    assert_eq!(fetched, article);

    let (_, unread) = app.get("/api/articles/unread").await;
    let (_, read) = app.get("/api/articles/read").await;
    let (_, favorites) = app.get("/api/articles/favorites").await;
    assert_eq!(titles(&unread), vec!["Second", "First"]);
    assert_eq!(titles(&read), vec!["Third"]);
    assert_eq!(titles(&favorites), vec!["Third"]);
}

#[tokio::test]
async fn test_feed_articles_and_delete() {
    let app = TestApp::start().await;
    let feed = app.subscribe().await;
    let feed_id = feed["id"].as_i64().unwrap();

    let (status, page) = app
        .get(&format!("/api/feeds/{feed_id}/articles?limit=1"))
        .await;
    assert_eq!(status, 200);
    assert_eq!(titles(&page), vec!["Third"]);
    assert_eq!(page["items"][0]["feedID"], feed_id);

    let response = app
        .client
        .delete(app.url(&format!("/api/feeds/{feed_id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);

    let (status, _) = app.get(&format!("/api/feeds/{feed_id}/articles")).await;
    assert_eq!(status, 404);
    let (_, articles) = app.get("/api/articles").await;
    assert!(articles["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_create_article_for_known_site() {
    let app = TestApp::start().await;
    app.subscribe().await;

    let (status, article) = app
        .post(
            "/api/articles",
            json!({
                "link": "https://blog.example/manual",
                "title": "Manual",
                "published": "2023-11-16",
            }),
        )
        .await;
    assert_eq!(status, 201, "{article}");
    assert_eq!(article["publishedOn"], "Thu, 16 Nov 2023");

    let (status, body) = app
        .post(
            "/api/articles",
            json!({ "link": "https://unknown.example/post", "title": "Orphan" }),
        )
        .await;
    assert_eq!(status, 404, "{body}");
}

#[tokio::test]
async fn test_unknown_article_is_not_found() {
    let app = TestApp::start().await;
    let (status, body) = app.post("/api/articles/999/read", json!({})).await;
    assert_eq!(status, 404);
    assert!(body["error"].is_string());

    let (status, body) = app.get("/api/articles/999").await;
    assert_eq!(status, 404);
    assert!(body["error"].is_string());
}

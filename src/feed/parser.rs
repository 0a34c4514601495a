use std::collections::HashSet;

use feed_rs::model::{Entry, Link};
use feed_rs::parser::{self, ParseFeedError};

use crate::storage::ParsedArticle;
use crate::util::site_link;

/// Channel metadata plus the usable entries of one fetched document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFeed {
    pub title: String,
    /// `scheme://host` of the channel's home page, if it declares one
    pub site_link: Option<String>,
    pub description: String,
    pub articles: Vec<ParsedArticle>,
    /// Entries dropped for lacking an http(s) link
    pub skipped: usize,
}

/// Parse RSS 0.9x/1.0/2.0, Atom or JSON Feed.
///
/// Entries without an http(s) link are counted in `skipped`. Repeated links
/// (compared case-insensitively) keep their first entry. An entry's publish
/// time falls back to its `updated` time, then to `fetched_at`.
pub fn parse_feed(bytes: &[u8], fetched_at: i64) -> Result<ParsedFeed, ParseFeedError> {
    let feed = parser::parse(bytes)?;

    let mut seen = HashSet::new();
    let mut articles = Vec::with_capacity(feed.entries.len());
    let mut skipped = 0;

    for entry in feed.entries {
        let Some(article) = parse_entry(entry, fetched_at) else {
            skipped += 1;
            continue;
        };
        if !seen.insert(article.link.to_lowercase()) {
            tracing::debug!(link = %article.link, "Duplicate entry link in feed");
            continue;
        }
        articles.push(article);
    }

    Ok(ParsedFeed {
        title: feed
            .title
            .map(|t| t.content.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "Untitled".to_string()),
        site_link: http_link(&feed.links).and_then(|href| site_link(href).ok()),
        description: feed
            .description
            .map(|d| d.content.trim().to_string())
            .unwrap_or_default(),
        articles,
        skipped,
    })
}

fn parse_entry(entry: Entry, fetched_at: i64) -> Option<ParsedArticle> {
    let link = http_link(&entry.links)?.to_string();

    let title = entry
        .title
        .map(|t| t.content.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Untitled".to_string());
    let description = entry
        .summary
        .map(|s| s.content)
        .or_else(|| entry.content.and_then(|c| c.body))
        .unwrap_or_default();
    let author = entry
        .authors
        .into_iter()
        .next()
        .map(|p| p.name)
        .unwrap_or_default();
    let published = entry
        .published
        .or(entry.updated)
        .map(|dt| dt.timestamp())
        .unwrap_or(fetched_at);

    Some(ParsedArticle {
        link,
        title,
        author,
        description,
        published,
    })
}

/// First http(s) link, preferring `rel="alternate"` (or no rel at all).
fn http_link(links: &[Link]) -> Option<&str> {
    let is_http = |href: &str| href.starts_with("http://") || href.starts_with("https://");
    links
        .iter()
        .find(|l| is_http(&l.href) && l.rel.as_deref().is_none_or(|rel| rel == "alternate"))
        .or_else(|| links.iter().find(|l| is_http(&l.href)))
        .map(|l| l.href.trim())
}

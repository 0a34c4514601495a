//! Feed retrieval and parsing.
//!
//! - [`parser`] - RSS/Atom/JSON Feed parsing using the `feed-rs` crate
//! - [`fetcher`] - HTTP fetching with retries, size limits and timeouts
//!
//! # Example
//!
//! ```ignore
//! use feedreader::feed::Fetcher;
//!
//! let fetcher = Fetcher::new()?;
//! let feed = fetcher.fetch_feed("https://example.com/rss.xml", chrono::Utc::now().timestamp()).await?;
//! println!("{}: {} articles", feed.title, feed.articles.len());
//! ```

mod fetcher;
mod parser;

pub use fetcher::{FetchError, Fetcher};
pub use parser::{parse_feed, ParsedFeed};

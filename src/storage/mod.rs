mod articles;
mod feeds;
mod schema;
mod types;
mod windows;

pub use schema::Database;
pub use types::{
    Article, ArticleFilter, DatabaseError, Feed, NewArticle, NewFeed, ParsedArticle,
};
pub use windows::{ArticleWindows, FeedWindows};

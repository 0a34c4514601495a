//! Self-hosted RSS reader: feed subscriptions, background refresh and a JSON
//! API whose listings are keyset-paginated (see [`pagination`]).

pub mod config;
pub mod feed;
pub mod pagination;
pub mod poller;
pub mod server;
pub mod service;
pub mod storage;
pub mod util;

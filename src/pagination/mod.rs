//! Keyset (cursor) pagination over append-mostly, time-ordered collections.
//!
//! Instead of numeric offsets, a page request carries an opaque boundary
//! token: the pagination key of the last row the client saw. Each page is
//! computed from two independent reads against the store:
//!
//! - a **forward window** of `limit + 1` rows strictly beyond the boundary,
//!   which becomes the page (the extra row is a lookahead that answers "is
//!   there more?" without a count query), and
//! - a **backward window** of `limit + 1` rows strictly on the other side,
//!   which only decides whether and where a previous page exists.
//!
//! Concurrent inserts can never duplicate or skip a row that was visible on
//! both sides of a page boundary, because the boundary is a key, not a
//! position.
//!
//! # Components
//!
//! - [`Options`] - lenient parsing of `limit` / `cursor` / `order`
//! - [`WindowFetcher`] - the two-query contract a store implements
//! - [`build_page`] - pure merge of two windows into a [`Page`] and [`Cursor`]
//! - [`paginate`] - runs both windows concurrently and merges them
//!
//! # Example
//!
//! ```ignore
//! use feedreader::pagination::{paginate, Filters, Options};
//! use tokio_util::sync::CancellationToken;
//!
//! let options = Options::from_params([("limit", "20"), ("cursor", "")]);
//! let page = paginate(&db.feed_windows(), &Filters::none(), &options, &CancellationToken::new()).await?;
//! if page.cursor.has_next {
//!     let next = options.with_cursor(page.cursor.next);
//! }
//! ```

mod cursor;
mod error;
mod options;
mod query;
mod window;

pub use cursor::{build_page, Cursor, Page, PaginationKey};
pub use error::PaginationError;
pub use options::{Options, Order, DEFAULT_LIMIT, MAX_LIMIT};
pub use query::paginate;
pub use window::{FilterValue, Filters, Predicate, Side, WindowFetcher};

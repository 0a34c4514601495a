use std::future::Future;

use super::cursor::PaginationKey;
use super::error::PaginationError;
use super::options::Order;

/// Which side of the boundary a window reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Away from the traversal start; this window is the page payload.
    Forward,
    /// Back toward the traversal start; only locates the previous page.
    Backward,
}

impl Side {
    /// Comparison operator and sort order for a window on this side of the
    /// boundary when traversing in `order`.
    ///
    /// | order      | side     | filter           | sort |
    /// |------------|----------|------------------|------|
    /// | descending | forward  | `key < boundary` | DESC |
    /// | descending | backward | `key > boundary` | ASC  |
    /// | ascending  | forward  | `key > boundary` | ASC  |
    /// | ascending  | backward | `key < boundary` | DESC |
    pub fn bounds(self, order: Order) -> (&'static str, Order) {
        match (self, order) {
            (Side::Forward, Order::Descending) => ("<", Order::Descending),
            (Side::Forward, Order::Ascending) => (">", Order::Ascending),
            (Side::Backward, order) => {
                let (cmp, _) = Side::Forward.bounds(order.reverse());
                (cmp, order.reverse())
            }
        }
    }
}

/// Value side of an equality predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Bool(bool),
    Int(i64),
}

/// `column = value`. Columns come from code, never from request input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub column: &'static str,
    pub value: FilterValue,
}

/// Equality predicates ANDed into both window queries of a page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters(Vec<Predicate>);

impl Filters {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &'static str, value: FilterValue) -> Self {
        self.0.push(Predicate { column, value });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Predicate> {
        self.0.iter()
    }
}

/// A store that can read one directional, bounded window of a collection.
///
/// Implementations must honour `filters` in both methods and must treat
/// `boundary` as exclusive: the boundary row itself is never returned.
/// Returned rows are ordered nearest-to-boundary first.
pub trait WindowFetcher {
    type Item: PaginationKey;

    /// The key standing in for "no boundary yet" when traversing in `order`:
    /// the maximal key for descending, the minimal key for ascending.
    fn sentinel(&self, order: Order) -> String;

    /// Up to `row_limit` rows strictly beyond `boundary`, in `order`.
    fn forward_window(
        &self,
        filters: &Filters,
        boundary: &str,
        order: Order,
        row_limit: usize,
    ) -> impl Future<Output = Result<Vec<Self::Item>, PaginationError>> + Send;

    /// Up to `row_limit` rows strictly before `boundary`, in reverse `order`.
    fn backward_window(
        &self,
        filters: &Filters,
        boundary: &str,
        order: Order,
        row_limit: usize,
    ) -> impl Future<Output = Result<Vec<Self::Item>, PaginationError>> + Send;
}

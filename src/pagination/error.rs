use thiserror::Error;

/// Failures of a paginated read.
///
/// Malformed request options never show up here: they degrade to defaults
/// when [`Options`](super::Options) are built.
#[derive(Debug, Error)]
pub enum PaginationError {
    /// The backing store is closed or was never connected.
    #[error("Storage is not available")]
    StoreUnavailable,

    /// One of the two window queries failed. No partial page is produced.
    #[error("Window query failed: {0}")]
    Query(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The caller cancelled the request while windows were in flight.
    #[error("Pagination was cancelled")]
    Cancelled,

    /// The request deadline elapsed while windows were in flight.
    #[error("Pagination timed out")]
    TimedOut,
}

impl PaginationError {
    pub fn query<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Query(Box::new(err))
    }

    /// True for caller-side aborts (cancel or deadline), as opposed to store
    /// failures.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::TimedOut)
    }
}

impl From<sqlx::Error> for PaginationError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolClosed => Self::StoreUnavailable,
            other => Self::query(other),
        }
    }
}

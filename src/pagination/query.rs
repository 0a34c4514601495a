use tokio_util::sync::CancellationToken;

use super::cursor::{build_page, Page};
use super::error::PaginationError;
use super::options::Options;
use super::window::{Filters, WindowFetcher};

/// Fetch one page from `fetcher`.
///
/// Issues the forward and backward window reads concurrently (they are
/// independent and share no snapshot), then merges them with
/// [`build_page`]. Either read failing aborts the page and the error is
/// returned unchanged. If `cancel` fires first, both in-flight reads are
/// dropped and [`PaginationError::Cancelled`] is returned.
pub async fn paginate<F>(
    fetcher: &F,
    filters: &Filters,
    options: &Options,
    cancel: &CancellationToken,
) -> Result<Page<F::Item>, PaginationError>
where
    F: WindowFetcher + Sync,
{
    let sentinel = fetcher.sentinel(options.order);
    let boundary = if options.cursor.is_empty() {
        sentinel.as_str()
    } else {
        options.cursor.as_str()
    };
    let limit = options.limit.max(1);
    let row_limit = limit.saturating_add(1);

    let windows = async {
        futures::try_join!(
            fetcher.forward_window(filters, boundary, options.order, row_limit),
            fetcher.backward_window(filters, boundary, options.order, row_limit),
        )
    };

    let (forward, backward) = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::debug!(cursor = %options.cursor, "Pagination cancelled with windows in flight");
            return Err(PaginationError::Cancelled);
        }
        result = windows => result?,
    };

    tracing::trace!(
        cursor = %options.cursor,
        order = %options.order,
        limit = limit,
        forward = forward.len(),
        backward = backward.len(),
        "Fetched pagination windows"
    );

    Ok(build_page(forward, backward, limit, &sentinel))
}

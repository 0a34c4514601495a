use serde::Serialize;

/// Implemented by every entity that can be paginated.
///
/// The key is derived from a monotonic field and must sort the same way the
/// store sorts the rows, so that a key handed back as a cursor identifies an
/// exact boundary.
pub trait PaginationKey {
    fn pagination_key(&self) -> String;
}

/// Forward/backward continuation tokens for a page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cursor {
    pub next: String,
    pub prev: String,
    pub has_next: bool,
    pub has_prev: bool,
}

/// One page of results plus the cursor to move from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub cursor: Cursor,
    pub items: Vec<T>,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            cursor: Cursor::default(),
            items: Vec::new(),
        }
    }
}

/// Merge a forward and a backward window into a page and its cursor.
///
/// `forward` holds up to `limit + 1` rows beyond the boundary in primary
/// order; the extra row is a lookahead used only to detect that more data
/// exists. `backward` holds up to `limit + 1` rows on the other side of the
/// boundary, nearest first, and only decides `has_prev`/`prev`. `sentinel`
/// is the start-of-traversal key handed out as `prev` when the previous page
/// is the first one.
///
/// A short forward window (fewer than `limit + 1` rows) is terminal:
/// `has_next` is false even though `next` still carries the last key.
///
/// With more than `limit` rows behind, `prev` is the `limit`-th of them, so a
/// forward read from it returns the previous page, which ends at the
/// boundary row.
pub fn build_page<T: PaginationKey>(
    mut forward: Vec<T>,
    backward: Vec<T>,
    limit: usize,
    sentinel: &str,
) -> Page<T> {
    let mut cursor = Cursor::default();

    if limit == 0 {
        return Page {
            cursor,
            items: Vec::new(),
        };
    }

    // Forward side: page contents and `next`.
    if forward.len() > limit {
        forward.truncate(limit);
        cursor.has_next = true;
        cursor.next = forward[limit - 1].pagination_key();
    } else if let Some(last) = forward.last() {
        cursor.next = last.pagination_key();
    }

    // Backward side: existence and position of the previous page.
    let behind = backward.len();
    if behind > 1 {
        cursor.has_prev = true;
        cursor.prev = if behind > limit {
            backward[limit - 1].pagination_key()
        } else if behind == limit {
            backward[1].pagination_key()
        } else {
            sentinel.to_string()
        };
    }

    Page {
        cursor,
        items: forward,
    }
}

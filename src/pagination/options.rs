use serde::Serialize;
use std::fmt;

/// Page size used when the request does not carry a usable `limit`.
pub const DEFAULT_LIMIT: usize = 10;

/// Upper bound on page size (OOM protection). Larger requests are clamped.
pub const MAX_LIMIT: usize = 500;

/// Traversal order over a collection's pagination key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    Ascending,
    /// Newest (largest key) first.
    #[default]
    Descending,
}

impl Order {
    /// Lenient parse: anything unrecognized is `None` so callers can fall back.
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ascending" | "asc" => Some(Self::Ascending),
            "descending" | "desc" => Some(Self::Descending),
            _ => None,
        }
    }

    /// SQL keyword for sorting in this order.
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }

    pub fn reverse(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascending => f.write_str("ascending"),
            Self::Descending => f.write_str("descending"),
        }
    }
}

/// A normalized page request.
///
/// Built per request from raw query parameters and consumed once. Parsing is
/// lenient: malformed values silently degrade to the defaults, so building
/// options can never fail a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Options {
    /// Opaque boundary token (a previous `next` or `prev`). Empty means
    /// start of traversal.
    pub cursor: String,
    /// Page size, always in `1..=MAX_LIMIT`.
    pub limit: usize,
    pub order: Order,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            cursor: String::new(),
            limit: DEFAULT_LIMIT,
            order: Order::Descending,
        }
    }
}

impl Options {
    /// Build options from raw key/value pairs (query string, headers, ...).
    ///
    /// - `limit`: absent, non-numeric, or `< 1` falls back to [`DEFAULT_LIMIT`];
    ///   values above [`MAX_LIMIT`] are clamped.
    /// - `cursor`: absent becomes the empty string.
    /// - `order`: `ascending`/`asc` or `descending`/`desc`, case-insensitive;
    ///   anything else falls back to descending.
    ///
    /// Unknown keys are ignored. When a key repeats, the last value wins.
    pub fn from_params<I, K, V>(params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut opts = Self::default();

        for (key, value) in params {
            let value = value.as_ref();
            match key.as_ref() {
                "limit" => opts.limit = parse_limit(value),
                "cursor" => opts.cursor = value.trim().to_string(),
                "order" => opts.order = Order::parse(value).unwrap_or_default(),
                _ => {}
            }
        }

        opts
    }

    /// Options positioned at `cursor`, keeping limit and order.
    pub fn with_cursor(&self, cursor: impl Into<String>) -> Self {
        Self {
            cursor: cursor.into(),
            ..self.clone()
        }
    }
}

fn parse_limit(raw: &str) -> usize {
    match raw.trim().parse::<i64>() {
        Ok(n) if n >= 1 => usize::try_from(n).unwrap_or(MAX_LIMIT).min(MAX_LIMIT),
        Ok(n) => {
            tracing::debug!(limit = n, "Non-positive page limit, using default");
            DEFAULT_LIMIT
        }
        Err(_) => {
            tracing::debug!(limit = %raw, "Unparseable page limit, using default");
            DEFAULT_LIMIT
        }
    }
}

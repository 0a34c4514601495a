//! Utility functions for common operations.
//!
//! - **URL validation**: Security-focused validation to prevent SSRF attacks
//! - **Site links**: deriving the `scheme://host` a feed or article belongs to

mod url_validator;

pub use url_validator::{site_link, validate_url, HostPolicy, UrlValidationError};

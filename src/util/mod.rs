//! Utility functions for common operations.
//!
//! This module provides reusable utilities for:
//!
//! - **URL validation**: scheme and host checks for configured endpoints
//! - **Text processing**: character-limit truncation and XML-safe text
//!
//! # Examples
//!
//! ```
//! use diffhook::util::{strip_control_chars, truncate_chars, validate_url};
//!
//! let url = validate_url("https://example.com/w/api.php").unwrap();
//! assert_eq!(url.host_str(), Some("example.com"));
//!
//! assert_eq!(truncate_chars("A long page title", 9), "A long...");
//! assert_eq!(strip_control_chars("a\u{1}b"), "ab");
//! ```

mod text;
mod url_validator;

pub use text::{strip_control_chars, truncate_chars};
pub use url_validator::{validate_url, UrlValidationError};

//! Recent-changes feed handling.
//!
//! - [`parser`] - feed-rs based parsing into typed [`FeedEntry`] records
//! - [`fetcher`] - HTTP retrieval with timeout and size limits
//! - [`watermark`] - selection of entries newer than the last processed one
//!
//! # Example
//!
//! ```ignore
//! use diffhook::feed::{FeedFetcher, Watermark};
//!
//! let fetcher = FeedFetcher::new(client, url, timeout);
//! let mut watermark = Watermark::starting_now(chrono::Duration::zero());
//! let fresh = watermark.admit(fetcher.fetch().await?.entries);
//! ```

mod fetcher;
mod parser;
mod watermark;

pub use fetcher::{FeedFetcher, FetchError};
pub use parser::{parse_feed, FeedEntry, ParseResult, UNKNOWN_AUTHOR};
pub use watermark::Watermark;

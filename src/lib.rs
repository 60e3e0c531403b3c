//! Wiki recent-changes to chat webhook bridge.
//!
//! Polls a MediaWiki recent-changes RSS feed, renders the HTML diff of
//! every new change to a cropped PNG and posts it as an embed to a
//! Discord-compatible webhook.

pub mod config;
pub mod driver;
pub mod feed;
pub mod render;
pub mod util;
pub mod webhook;

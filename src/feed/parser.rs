use chrono::{DateTime, Utc};
use feed_rs::parser;

/// Author name used when a feed item carries none.
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// One change from the recent-changes feed, validated at the parse boundary.
///
/// Every field downstream code needs is present and typed; items that
/// cannot provide them are dropped by [`parse_feed`] and counted in
/// [`ParseResult::skipped`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    /// Feed GUID (feed-rs synthesizes one when the item has none).
    pub id: String,
    pub title: String,
    pub author: String,
    /// Link to the diff, usually with `diff`/`oldid` query parameters.
    pub link: String,
    pub published: DateTime<Utc>,
    /// HTML diff fragment. Empty when the item has no description.
    pub summary: String,
}

/// Entries parsed from one feed document.
#[derive(Debug, Default)]
pub struct ParseResult {
    /// Valid entries, in document order.
    pub entries: Vec<FeedEntry>,
    /// Items dropped for lacking a timestamp or link.
    pub skipped: usize,
}

/// Parses an RSS or Atom document into [`FeedEntry`] records.
///
/// Field fallbacks:
/// - `published` → `updated`; neither → item skipped
/// - first link; none → item skipped
/// - summary → content body → empty string
/// - first author name → [`UNKNOWN_AUTHOR`]
/// - title → `"Untitled"`
///
/// # Errors
///
/// Returns the `feed-rs` error when the document is not a feed at all.
pub fn parse_feed(bytes: &[u8]) -> Result<ParseResult, parser::ParseFeedError> {
    let feed = parser::parse(bytes)?;

    let mut result = ParseResult::default();
    for entry in feed.entries {
        let Some(published) = entry.published.or(entry.updated) else {
            tracing::debug!(id = %entry.id, "Feed item without timestamp, skipping");
            result.skipped += 1;
            continue;
        };
        let Some(link) = entry.links.first().map(|l| l.href.trim().to_string()) else {
            tracing::debug!(id = %entry.id, "Feed item without link, skipping");
            result.skipped += 1;
            continue;
        };

        let title = entry
            .title
            .map(|t| t.content.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "Untitled".to_string());
        let author = entry
            .authors
            .first()
            .map(|p| p.name.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());
        let summary = entry
            .summary
            .map(|s| s.content)
            .or_else(|| entry.content.and_then(|c| c.body))
            .unwrap_or_default();

        result.entries.push(FeedEntry {
            id: entry.id,
            title,
            author,
            link,
            published,
            summary,
        });
    }

    Ok(result)
}

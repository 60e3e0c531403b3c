use crate::feed::FeedEntry;
use chrono::{DateTime, Duration, Utc};

/// Publish-time boundary below which feed entries count as processed.
///
/// Only moves forward. Lives for the process lifetime; a restart starts
/// again from "now" (minus the configured lookback).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Watermark(DateTime<Utc>);

impl Watermark {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    /// A watermark `lookback` before the current time, saturating at the
    /// earliest representable instant.
    pub fn starting_now(lookback: Duration) -> Self {
        let now = Utc::now();
        Self(now.checked_sub_signed(lookback).unwrap_or(DateTime::<Utc>::MIN_UTC))
    }

    pub fn get(&self) -> DateTime<Utc> {
        self.0
    }

    /// Keeps the entries published strictly after the watermark, in their
    /// original order, and advances the watermark to the newest of them.
    ///
    /// With no new entries the watermark is left untouched.
    pub fn admit(&mut self, entries: Vec<FeedEntry>) -> Vec<FeedEntry> {
        let fresh: Vec<FeedEntry> = entries
            .into_iter()
            .filter(|e| e.published > self.0)
            .collect();

        if let Some(newest) = fresh.iter().map(|e| e.published).max() {
            self.0 = self.0.max(newest);
        }
        fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn entry(title: &str, published: DateTime<Utc>) -> FeedEntry {
        FeedEntry {
            id: title.to_string(),
            title: title.to_string(),
            author: "Tester".to_string(),
            link: format!("https://wiki.example.org/index.php?title={}", title),
            published,
            summary: "<p>x</p>".to_string(),
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_800_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_old_entries_rejected_and_watermark_unchanged() {
        let mut wm = Watermark::new(at(100));
        let fresh = wm.admit(vec![entry("a", at(50)), entry("b", at(100))]);
        assert!(fresh.is_empty());
        assert_eq!(wm.get(), at(100));
    }

    #[test]
    fn test_advances_to_newest_and_keeps_feed_order() {
        let mut wm = Watermark::new(at(0));
        let fresh = wm.admit(vec![
            entry("b", at(20)),
            entry("old", at(-5)),
            entry("c", at(30)),
            entry("a", at(10)),
        ]);
        let titles: Vec<_> = fresh.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["b", "c", "a"]);
        assert_eq!(wm.get(), at(30));
    }

    #[test]
    fn test_second_poll_does_not_repeat() {
        let mut wm = Watermark::new(at(0));
        let feed = vec![entry("a", at(10)), entry("b", at(20))];
        assert_eq!(wm.admit(feed.clone()).len(), 2);
        assert!(wm.admit(feed).is_empty());
    }

    #[test]
    fn test_starting_now_applies_lookback() {
        let wm = Watermark::starting_now(Duration::minutes(30));
        let expected = Utc::now() - Duration::minutes(30);
        assert!((wm.get() - expected).num_seconds().abs() < 5);
    }

    #[test]
    fn test_starting_now_saturates_out_of_range_lookback() {
        // ~270k years, past chrono's representable range
        let wm = Watermark::starting_now(Duration::days(100_000_000));
        assert_eq!(wm.get(), DateTime::<Utc>::MIN_UTC);
    }

    proptest! {
        #[test]
        fn prop_watermark_is_max_of_admitted(
            start in -1000i64..1000,
            stamps in proptest::collection::vec(-2000i64..2000, 0..20),
        ) {
            let mut wm = Watermark::new(at(start));
            let entries: Vec<_> = stamps.iter().map(|s| entry("e", at(*s))).collect();
            let fresh = wm.admit(entries);

            prop_assert!(wm.get() >= at(start));
            prop_assert!(fresh.iter().all(|e| e.published > at(start)));
            prop_assert_eq!(fresh.len(), stamps.iter().filter(|s| **s > start).count());
            match fresh.iter().map(|e| e.published).max() {
                Some(newest) => prop_assert_eq!(wm.get(), newest),
                None => prop_assert_eq!(wm.get(), at(start)),
            }
        }
    }
}

//! Poll loop: fetch, select new entries, render, post, sleep.

use crate::feed::{FeedEntry, FeedFetcher, Watermark};
use crate::render::{render_blocking, Render, RenderError, RenderResult};
use crate::webhook::{PostOutcome, WebhookPoster};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Counts for one poll cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Entries in the feed document.
    pub fetched: usize,
    /// Entries newer than the watermark.
    pub new: usize,
    pub delivered: usize,
    /// Posts rejected by the endpoint or lost on the way.
    pub failed: usize,
    pub render_failed: usize,
}

/// Owns the watermark and the pending queue; one cycle runs to completion
/// before the next starts.
pub struct Driver {
    fetcher: FeedFetcher,
    renderer: Arc<dyn Render>,
    poster: WebhookPoster,
    watermark: Watermark,
    pending: VecDeque<FeedEntry>,
    interval: Duration,
}

impl Driver {
    pub fn new(
        fetcher: FeedFetcher,
        renderer: impl Render + 'static,
        poster: WebhookPoster,
        watermark: Watermark,
        interval: Duration,
    ) -> Self {
        Self {
            fetcher,
            renderer: Arc::new(renderer),
            poster,
            watermark,
            pending: VecDeque::new(),
            interval,
        }
    }

    pub fn watermark(&self) -> Watermark {
        self.watermark
    }

    /// Fetches the feed once and posts every new entry.
    ///
    /// A failed fetch yields an empty cycle. Entries leave the queue as
    /// they are dispatched, whatever the outcome.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport::default();

        match self.fetcher.fetch().await {
            Ok(result) => {
                report.fetched = result.entries.len();
                let fresh = self.watermark.admit(result.entries);
                report.new = fresh.len();
                self.pending.extend(fresh);
            }
            Err(e) => {
                tracing::warn!(feed = %self.fetcher.url(), error = %e, "Feed fetch failed");
            }
        }

        while let Some(entry) = self.pending.pop_front() {
            tracing::info!(
                title = %entry.title,
                published = %entry.published.to_rfc2822(),
                "Posting entry"
            );

            let render = match self.render(&entry).await {
                Ok(render) => render,
                Err(e) => {
                    tracing::warn!(
                        title = %entry.title,
                        link = %entry.link,
                        error = %e,
                        "Failed to render entry, skipping"
                    );
                    report.render_failed += 1;
                    continue;
                }
            };

            match self.poster.post(&entry, &render).await {
                PostOutcome::Delivered => report.delivered += 1,
                PostOutcome::Rejected { .. } | PostOutcome::Failed { .. } => report.failed += 1,
            }
        }

        tracing::info!(
            fetched = report.fetched,
            new = report.new,
            delivered = report.delivered,
            failed = report.failed,
            render_failed = report.render_failed,
            watermark = %self.watermark.get().to_rfc3339(),
            "Poll cycle complete"
        );
        report
    }

    async fn render(&self, entry: &FeedEntry) -> Result<RenderResult, RenderError> {
        render_blocking(Arc::clone(&self.renderer), entry.summary.clone()).await
    }

    /// Runs cycles separated by the poll interval until `shutdown`
    /// resolves. Shutdown is only observed between cycles.
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            self.run_cycle().await;

            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    tracing::info!("Shutting down");
                    break;
                }

                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::fonts::FontBook;
    use crate::render::{DiffRenderer, RenderOptions};
    use crate::webhook::EmbedOptions;
    use chrono::{DateTime, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use secrecy::SecretString;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn rss(items: &[(&str, DateTime<Utc>)]) -> String {
        let items: Vec<_> = items
            .iter()
            .map(|(title, published)| (*title, *published, "<p>hello</p>"))
            .collect();
        rss_with_bodies(&items)
    }

    fn rss_with_bodies(items: &[(&str, DateTime<Utc>, &str)]) -> String {
        let items: String = items
            .iter()
            .map(|(title, published, html)| {
                format!(
                    "<item><guid>{title}</guid><title>{title}</title>\
                     <link>https://wiki.example.org/index.php?title={title}&amp;diff=2</link>\
                     <pubDate>{}</pubDate>\
                     <description>{}</description></item>",
                    published.to_rfc2822(),
                    quick_xml::escape::escape(*html),
                )
            })
            .collect();
        format!("<?xml version=\"1.0\"?><rss version=\"2.0\"><channel>{items}</channel></rss>")
    }

    /// Fails on fragments containing `marker`, renders the rest.
    struct FailingOn {
        marker: &'static str,
        inner: DiffRenderer,
    }

    impl Render for FailingOn {
        fn render(&self, fragment: &str) -> Result<RenderResult, RenderError> {
            if fragment.contains(self.marker) {
                return Err(RenderError::Svg("unsupported content".to_string()));
            }
            self.inner.render(fragment)
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_800_000_000 + secs, 0).unwrap()
    }

    fn small_renderer() -> DiffRenderer {
        DiffRenderer::with_fonts(
            RenderOptions {
                dpi: 48.0,
                page_size_in: 4.0,
                page_margin_px: 20.0,
                ..RenderOptions::default()
            },
            FontBook::empty(),
        )
        .unwrap()
    }

    fn driver(server: &MockServer, watermark: DateTime<Utc>) -> Driver {
        driver_with(server, watermark, small_renderer())
    }

    fn driver_with(
        server: &MockServer,
        watermark: DateTime<Utc>,
        renderer: impl Render + 'static,
    ) -> Driver {
        let client = reqwest::Client::new();
        let timeout = Duration::from_secs(5);
        Driver::new(
            FeedFetcher::new(client.clone(), format!("{}/feed", server.uri()), timeout),
            renderer,
            WebhookPoster::new(
                client,
                SecretString::from(format!("{}/hook", server.uri())),
                timeout,
                EmbedOptions::default(),
            ),
            Watermark::new(watermark),
            Duration::from_millis(10),
        )
    }

    async fn serve_feed(server: &MockServer, body: String) {
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_old_entries_post_nothing() {
        let server = MockServer::start().await;
        serve_feed(&server, rss(&[("A", at(-10)), ("B", at(0))])).await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let mut driver = driver(&server, at(0));
        let report = driver.run_cycle().await;
        assert_eq!(
            report,
            CycleReport {
                fetched: 2,
                ..CycleReport::default()
            }
        );
        assert_eq!(driver.watermark().get(), at(0));
    }

    #[tokio::test]
    async fn test_new_entries_posted_once() {
        let server = MockServer::start().await;
        serve_feed(&server, rss(&[("A", at(30)), ("Old", at(-5)), ("B", at(20))])).await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(204))
            .expect(2)
            .mount(&server)
            .await;

        let mut driver = driver(&server, at(0));
        let first = driver.run_cycle().await;
        assert_eq!(first.new, 2);
        assert_eq!(first.delivered, 2);
        assert_eq!(driver.watermark().get(), at(30));

        // Same feed again: nothing new
        let second = driver.run_cycle().await;
        assert_eq!(second.new, 0);
        assert_eq!(second.delivered, 0);
    }

    #[tokio::test]
    async fn test_failed_post_is_dropped() {
        let server = MockServer::start().await;
        serve_feed(&server, rss(&[("A", at(10))])).await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let mut driver = driver(&server, at(0));
        let report = driver.run_cycle().await;
        assert_eq!(report.failed, 1);
        assert!(driver.pending.is_empty());

        let again = driver.run_cycle().await;
        assert_eq!(again.failed, 0);
        assert_eq!(driver.watermark().get(), at(10));
    }

    #[tokio::test]
    async fn test_render_failure_skips_entry_and_continues() {
        let server = MockServer::start().await;
        serve_feed(
            &server,
            rss_with_bodies(&[
                ("Broken", at(10), "<p>broken diff</p>"),
                ("Fine", at(20), "<p>hello</p>"),
            ]),
        )
        .await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let renderer = FailingOn {
            marker: "broken",
            inner: small_renderer(),
        };
        let mut driver = driver_with(&server, at(0), renderer);
        let report = driver.run_cycle().await;
        assert_eq!(
            report,
            CycleReport {
                fetched: 2,
                new: 2,
                delivered: 1,
                failed: 0,
                render_failed: 1,
            }
        );
        assert!(driver.pending.is_empty());
        assert_eq!(driver.watermark().get(), at(20));

        // The skipped entry is not picked up again
        assert_eq!(driver.run_cycle().await.render_failed, 0);
    }

    #[tokio::test]
    async fn test_panicking_render_is_contained() {
        struct Panics;
        impl Render for Panics {
            fn render(&self, _fragment: &str) -> Result<RenderResult, RenderError> {
                panic!("renderer bug");
            }
        }

        let server = MockServer::start().await;
        serve_feed(&server, rss(&[("A", at(10))])).await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let mut driver = driver_with(&server, at(0), Panics);
        let report = driver.run_cycle().await;
        assert_eq!(report.render_failed, 1);
        assert_eq!(report.delivered, 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_empty_cycle() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let mut driver = driver(&server, at(0));
        assert_eq!(driver.run_cycle().await, CycleReport::default());
        assert_eq!(driver.watermark().get(), at(0));
    }

    #[tokio::test]
    async fn test_run_until_stops_on_shutdown() {
        let server = MockServer::start().await;
        serve_feed(&server, rss(&[])).await;

        let mut driver = driver(&server, at(0));
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        tx.send(()).unwrap();
        driver
            .run_until(async {
                let _ = rx.await;
            })
            .await;

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
    }
}

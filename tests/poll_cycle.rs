//! Integration tests for a full poll cycle: feed → watermark → render → webhook.
//!
//! Each test runs its own mock server playing both the wiki and the chat
//! webhook. Rendering uses the built-in approximate metrics so the images
//! do not depend on the fonts installed on the machine.

use chrono::{DateTime, TimeZone, Utc};
use diffhook::driver::{CycleReport, Driver};
use diffhook::feed::{FeedFetcher, Watermark};
use diffhook::render::fonts::FontBook;
use diffhook::render::{DiffRenderer, RenderOptions};
use diffhook::webhook::{EmbedOptions, WebhookPoster};
use pretty_assertions::assert_eq;
use resvg::tiny_skia::Pixmap;
use secrecy::SecretString;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const BORDER: u32 = 20;
const PAGE_SIDE: u32 = 384;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 17, 9, 30, 0).unwrap()
}

fn rss_item(title: &str, published: DateTime<Utc>, html: &str) -> String {
    format!(
        "<item><guid>{title}-{ts}</guid><title>{title}</title>\
         <link>https://wiki.example.org/index.php?title=X&amp;diff={ts}&amp;oldid=1</link>\
         <dc:creator>Alice</dc:creator>\
         <pubDate>{date}</pubDate><description>{html}</description></item>",
        ts = published.timestamp(),
        date = published.to_rfc2822(),
        html = quick_xml::escape::escape(html),
    )
}

fn rss(items: &[String]) -> String {
    format!(
        "<?xml version=\"1.0\"?>\
         <rss version=\"2.0\" xmlns:dc=\"http://purl.org/dc/elements/1.1/\"><channel>\
         <title>Wiki - Recent changes</title>{}</channel></rss>",
        items.concat()
    )
}

fn renderer() -> DiffRenderer {
    DiffRenderer::with_fonts(
        RenderOptions {
            dpi: 96.0,
            page_size_in: 4.0,
            page_margin_px: 20.0,
            border_px: BORDER,
            ..RenderOptions::default()
        },
        FontBook::empty(),
    )
    .unwrap()
}

fn driver(server: &MockServer, watermark: DateTime<Utc>) -> Driver {
    let client = reqwest::Client::new();
    let timeout = Duration::from_secs(5);
    Driver::new(
        FeedFetcher::new(client.clone(), format!("{}/w/api.php", server.uri()), timeout),
        renderer(),
        WebhookPoster::new(
            client,
            SecretString::from(format!("{}/api/webhooks/1/token", server.uri())),
            timeout,
            EmbedOptions::default(),
        ),
        Watermark::new(watermark),
        Duration::from_secs(60),
    )
}

async fn serve_feed(server: &MockServer, body: String) {
    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("Content-Type", "application/rss+xml"),
        )
        .mount(server)
        .await;
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

/// Splits a multipart/form-data body into (part headers, part content).
fn multipart_parts(request: &Request) -> Vec<(String, Vec<u8>)> {
    let content_type = request
        .headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap();
    let boundary = content_type.split("boundary=").nth(1).unwrap().trim_matches('"');
    let delimiter = format!("--{boundary}").into_bytes();

    let mut starts = Vec::new();
    let mut at = 0;
    while let Some(pos) = find(&request.body, &delimiter, at) {
        starts.push(pos);
        at = pos + delimiter.len();
    }

    starts
        .windows(2)
        .map(|w| {
            let chunk = &request.body[w[0] + delimiter.len()..w[1]];
            let header_end = find(chunk, b"\r\n\r\n", 0).unwrap();
            let headers = String::from_utf8_lossy(&chunk[..header_end]).into_owned();
            let content = chunk[header_end + 4..chunk.len() - 2].to_vec();
            (headers, content)
        })
        .collect()
}

fn part<'a>(parts: &'a [(String, Vec<u8>)], name: &str) -> &'a (String, Vec<u8>) {
    let marker = format!("name=\"{name}\"");
    parts
        .iter()
        .find(|(headers, _)| headers.contains(&marker))
        .unwrap_or_else(|| panic!("no part named {name}"))
}

async fn webhook_posts(server: &MockServer) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.method.as_str() == "POST")
        .collect()
}

#[tokio::test]
async fn test_new_entry_is_rendered_and_posted() {
    let server = MockServer::start().await;
    serve_feed(&server, rss(&[rss_item("Edit X", t0(), "<p>hello</p>")])).await;
    Mock::given(method("POST"))
        .and(path("/api/webhooks/1/token"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let mut driver = driver(&server, t0() - chrono::Duration::minutes(5));
    let report = driver.run_cycle().await;

    assert_eq!(
        report,
        CycleReport {
            fetched: 1,
            new: 1,
            delivered: 1,
            failed: 0,
            render_failed: 0,
        }
    );
    assert_eq!(driver.watermark().get(), t0());

    let posts = webhook_posts(&server).await;
    assert_eq!(posts.len(), 1);
    let parts = multipart_parts(&posts[0]);

    let (_, json) = part(&parts, "payload_json");
    let payload: serde_json::Value = serde_json::from_slice(json).unwrap();
    let embed = &payload["embeds"][0];
    assert_eq!(embed["title"], "Edit X");
    assert_eq!(embed["author"]["name"], "Alice");
    assert_eq!(embed["color"], 0x7289da);
    assert_eq!(embed["timestamp"], "2026-10-17T09:30:00Z");
    assert_eq!(embed["url"], "https://wiki.example.org/index.php?title=X");
    assert_eq!(embed["image"]["url"], "attachment://render.png");

    let (file_headers, png) = part(&parts, "file");
    assert!(file_headers.contains("filename=\"render.png\""));
    assert!(file_headers.contains("image/png"));

    let image = Pixmap::decode_png(png).unwrap();
    assert!(image.width() < PAGE_SIDE && image.height() < PAGE_SIDE);
    assert!(image.width() > 2 * BORDER && image.height() > 2 * BORDER);

    let is_background = |x: u32, y: u32| {
        let p = image.pixel(x, y).unwrap();
        (p.red(), p.green(), p.blue()) == (0xf5, 0xf5, 0xf5)
    };
    // The padding ring is pure background
    for x in 0..image.width() {
        for y in (0..BORDER).chain(image.height() - BORDER..image.height()) {
            assert!(is_background(x, y), "pixel ({x}, {y}) in top/bottom border");
        }
    }
    for y in 0..image.height() {
        for x in (0..BORDER).chain(image.width() - BORDER..image.width()) {
            assert!(is_background(x, y), "pixel ({x}, {y}) in side border");
        }
    }
    // and the text reaches the inner edge of the ring
    let inner = BORDER..image.width() - BORDER;
    assert!(inner.clone().any(|x| !is_background(x, BORDER)));
}

#[tokio::test]
async fn test_webhook_500_is_logged_not_retried() {
    let server = MockServer::start().await;
    serve_feed(
        &server,
        rss(&[
            rss_item("Edit A", t0(), "<p>a</p>"),
            rss_item("Edit B", t0() + chrono::Duration::seconds(10), "<p>b</p>"),
        ]),
    )
    .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .expect(2)
        .mount(&server)
        .await;

    let mut driver = driver(&server, t0() - chrono::Duration::minutes(5));
    let first = driver.run_cycle().await;
    assert_eq!(first.new, 2);
    assert_eq!(first.failed, 2);
    assert_eq!(first.delivered, 0);

    // Same feed on the next poll: the failed entries are not sent again
    let second = driver.run_cycle().await;
    assert_eq!(second.fetched, 2);
    assert_eq!(second.new, 0);
    assert_eq!(webhook_posts(&server).await.len(), 2);
}

#[tokio::test]
async fn test_overlong_diff_posts_incomplete_color() {
    let server = MockServer::start().await;
    let html = "<p>line</p>".repeat(60);
    serve_feed(&server, rss(&[rss_item("Huge", t0(), &html)])).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut driver = driver(&server, t0() - chrono::Duration::minutes(5));
    assert_eq!(driver.run_cycle().await.delivered, 1);

    let posts = webhook_posts(&server).await;
    let parts = multipart_parts(&posts[0]);
    let (_, json) = part(&parts, "payload_json");
    let payload: serde_json::Value = serde_json::from_slice(json).unwrap();
    assert_eq!(payload["embeds"][0]["color"], 0xeb6420);
}

#[tokio::test]
async fn test_unreachable_feed_then_recovery() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    serve_feed(&server, rss(&[rss_item("Edit X", t0(), "<p>hello</p>")])).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let mut driver = driver(&server, t0() - chrono::Duration::minutes(5));
    assert_eq!(driver.run_cycle().await, CycleReport::default());
    assert_eq!(driver.run_cycle().await.delivered, 1);
    assert_eq!(driver.watermark().get(), t0());
}

use crate::feed::FeedEntry;
use crate::util::truncate_chars;
use serde::{Deserialize, Serialize};
use url::Url;

/// Embed title limit, in characters.
const MAX_TITLE_CHARS: usize = 256;
/// Embed author name limit, in characters.
const MAX_AUTHOR_CHARS: usize = 256;

/// Query parameters that identify a page rather than a revision.
const PAGE_PARAMS: &[&str] = &["title", "curid"];

/// `[embed]` section of the config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbedOptions {
    /// Accent color when the image shows the whole diff.
    pub complete_color: u32,
    /// Accent color when the diff was cut at the page bottom.
    pub incomplete_color: u32,
    /// File name of the uploaded PNG.
    pub attachment_name: String,
    /// Reference the upload as the embed image instead of a loose
    /// attachment.
    pub embed_image: bool,
}

impl Default for EmbedOptions {
    fn default() -> Self {
        Self {
            complete_color: 0x7289da,
            incomplete_color: 0xeb6420,
            attachment_name: "render.png".to_string(),
            embed_image: true,
        }
    }
}

/// Body of the `payload_json` form part.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookPayload {
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Embed {
    pub title: String,
    pub author: EmbedAuthor,
    pub timestamp: String,
    pub url: String,
    pub color: u32,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<EmbedImage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedAuthor {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedImage {
    pub url: String,
}

impl WebhookPayload {
    /// Builds the single-embed message announcing `entry`.
    pub fn for_entry(entry: &FeedEntry, complete: bool, options: &EmbedOptions) -> Self {
        let color = if complete {
            options.complete_color
        } else {
            options.incomplete_color
        };
        let image = options.embed_image.then(|| EmbedImage {
            url: format!("attachment://{}", options.attachment_name),
        });

        Self {
            embeds: vec![Embed {
                title: truncate_chars(&entry.title, MAX_TITLE_CHARS).into_owned(),
                author: EmbedAuthor {
                    name: truncate_chars(&entry.author, MAX_AUTHOR_CHARS).into_owned(),
                },
                timestamp: entry.published.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
                url: base_url(&entry.link),
                color,
                description: format!("[Full diff]({})", entry.link),
                image,
            }],
        }
    }
}

/// Canonical page link for a diff link.
///
/// Keeps only the query parameters naming the page (`title`, `curid`),
/// verbatim and in order, and drops the query altogether when none
/// remain. Links that do not parse are cut at the first `&`.
///
/// ```
/// use diffhook::webhook::base_url;
///
/// assert_eq!(base_url("https://site/page?action=diff&oldid=123"), "https://site/page");
/// assert_eq!(
///     base_url("https://site/w/index.php?title=Foo&diff=2&oldid=1"),
///     "https://site/w/index.php?title=Foo"
/// );
/// ```
pub fn base_url(link: &str) -> String {
    let Ok(mut url) = Url::parse(link) else {
        return link.split('&').next().unwrap_or_default().to_string();
    };

    let kept: Vec<String> = url
        .query()
        .unwrap_or_default()
        .split('&')
        .filter(|pair| {
            let key = pair.split('=').next().unwrap_or_default();
            PAGE_PARAMS.contains(&key)
        })
        .map(str::to_string)
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.set_query(Some(&kept.join("&")));
    }
    url.to_string()
}

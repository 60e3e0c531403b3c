//! Configuration file parser for `diffhook.toml`.
//!
//! The config file is optional: a missing file yields `Config::default()`,
//! which polls the Switchbrew wiki every five minutes. Unknown keys are
//! accepted by serde but logged as warnings since they are usually typos.
//!
//! The webhook URL is a credential: it is resolved once at startup from the
//! environment, the config file or a side file, and held as a
//! [`SecretString`] afterwards.
use crate::render::RenderOptions;
use crate::util::{validate_url, UrlValidationError};
use crate::webhook::EmbedOptions;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable that overrides every other webhook URL source.
pub const WEBHOOK_ENV_VAR: &str = "DIFFHOOK_WEBHOOK_URL";

/// Upper bound for `initial_lookback_minutes` (one year).
pub const MAX_LOOKBACK_MINUTES: u64 = 365 * 24 * 60;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// A value parsed but is outside its allowed range.
    #[error("Invalid config value for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },

    /// A configured endpoint URL failed validation.
    #[error("Invalid URL for `{key}`: {source}")]
    Url {
        key: &'static str,
        #[source]
        source: UrlValidationError,
    },

    /// No source produced a webhook URL.
    #[error(
        "No webhook URL configured: set {WEBHOOK_ENV_VAR}, `webhook_url`, or put it in '{0}'"
    )]
    MissingWebhook(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
///
/// Custom Debug impl masks `webhook_url` so the secret never reaches logs.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds to sleep between poll cycles.
    pub poll_interval_secs: u64,

    /// How far before process start the initial watermark is placed.
    /// 0 = only changes published after startup are posted.
    pub initial_lookback_minutes: u64,

    /// Timeout applied to every HTTP request (feed fetch and webhook post).
    pub http_timeout_secs: u64,

    /// Webhook URL. `DIFFHOOK_WEBHOOK_URL` takes precedence over this key.
    pub webhook_url: Option<String>,

    /// File holding the webhook URL, read when neither the env var nor
    /// `webhook_url` is set. Relative paths resolve against the working dir.
    pub webhook_url_file: PathBuf,

    pub feed: FeedConfig,

    pub render: RenderOptions,

    pub embed: EmbedOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5 * 60,
            initial_lookback_minutes: 0,
            http_timeout_secs: 30,
            webhook_url: None,
            webhook_url_file: PathBuf::from("webhook.url"),
            feed: FeedConfig::default(),
            render: RenderOptions::default(),
            embed: EmbedOptions::default(),
        }
    }
}

/// Mask `webhook_url` in Debug output to prevent secret leakage.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("initial_lookback_minutes", &self.initial_lookback_minutes)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("webhook_url", &self.webhook_url.as_ref().map(|_| "[REDACTED]"))
            .field("webhook_url_file", &self.webhook_url_file)
            .field("feed", &self.feed)
            .field("render", &self.render)
            .field("embed", &self.embed)
            .finish()
    }
}

/// Where the recent-changes feed lives and which changes it lists.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// MediaWiki `api.php` endpoint.
    pub api_url: String,

    /// Full feed URL. When set, `api_url`, `days`, `limit` and `hide_bots`
    /// are ignored.
    pub url: Option<String>,

    /// Days of history the feed covers.
    pub days: u32,

    /// Maximum number of changes per feed document.
    pub limit: u32,

    /// Exclude edits flagged as bot edits.
    pub hide_bots: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            api_url: "https://switchbrew.org/w/api.php".to_string(),
            url: None,
            days: 7,
            limit: 50,
            hide_bots: false,
        }
    }
}

impl FeedConfig {
    /// Builds the recent-changes feed URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Url`] if `url` or `api_url` is not an
    /// acceptable endpoint.
    pub fn feed_url(&self) -> Result<String, ConfigError> {
        if let Some(url) = &self.url {
            let parsed = validate_url(url).map_err(|source| ConfigError::Url {
                key: "feed.url",
                source,
            })?;
            return Ok(parsed.into());
        }

        let mut url = validate_url(&self.api_url).map_err(|source| ConfigError::Url {
            key: "feed.api_url",
            source,
        })?;
        url.query_pairs_mut()
            .append_pair("action", "feedrecentchanges")
            .append_pair("feedformat", "rss")
            .append_pair("hidebots", if self.hide_bots { "1" } else { "0" })
            .append_pair("days", &self.days.to_string())
            .append_pair("limit", &self.limit.to_string());
        Ok(url.into())
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Keys accepted at each level of the file, used for typo warnings.
    const KNOWN_KEYS: &'static [&'static str] = &[
        "poll_interval_secs",
        "initial_lookback_minutes",
        "http_timeout_secs",
        "webhook_url",
        "webhook_url_file",
        "feed",
        "render",
        "embed",
    ];
    const KNOWN_FEED_KEYS: &'static [&'static str] =
        &["api_url", "url", "days", "limit", "hide_bots"];
    const KNOWN_RENDER_KEYS: &'static [&'static str] = &[
        "background",
        "dpi",
        "page_size_in",
        "page_margin_px",
        "border_px",
        "trim_tolerance",
        "max_trim_passes",
    ];
    const KNOWN_EMBED_KEYS: &'static [&'static str] = &[
        "complete_color",
        "incomplete_color",
        "attachment_name",
        "embed_image",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            warn_unknown_keys(&raw, "", Self::KNOWN_KEYS);
            for (section, known) in [
                ("feed", Self::KNOWN_FEED_KEYS),
                ("render", Self::KNOWN_RENDER_KEYS),
                ("embed", Self::KNOWN_EMBED_KEYS),
            ] {
                if let Some(toml::Value::Table(table)) = raw.get(section) {
                    warn_unknown_keys(table, section, known);
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            poll_interval_secs = config.poll_interval_secs,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Checks value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "poll_interval_secs",
                reason: "must be at least 1 second".to_string(),
            });
        }
        if self.initial_lookback_minutes > MAX_LOOKBACK_MINUTES {
            return Err(ConfigError::Invalid {
                key: "initial_lookback_minutes",
                reason: format!("must be at most {MAX_LOOKBACK_MINUTES} (one year)"),
            });
        }
        if self.http_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "http_timeout_secs",
                reason: "must be at least 1 second".to_string(),
            });
        }
        if self.feed.limit == 0 {
            return Err(ConfigError::Invalid {
                key: "feed.limit",
                reason: "must be at least 1".to_string(),
            });
        }
        self.render
            .validate()
            .map_err(|(key, reason)| ConfigError::Invalid { key, reason })?;
        self.feed.feed_url()?;
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn initial_lookback(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.initial_lookback_minutes.min(MAX_LOOKBACK_MINUTES) as i64)
    }

    /// Resolves the webhook URL using the process environment.
    ///
    /// See [`Config::resolve_webhook_url`] for the precedence rules.
    pub fn webhook_url_from_env(&self) -> Result<SecretString, ConfigError> {
        self.resolve_webhook_url(std::env::var(WEBHOOK_ENV_VAR).ok())
    }

    /// Resolves the webhook URL.
    ///
    /// Precedence: `env_value` (the `DIFFHOOK_WEBHOOK_URL` variable), then
    /// the `webhook_url` key, then the trimmed contents of
    /// `webhook_url_file`. Blank values count as unset. The resolved URL is
    /// validated before it is returned.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingWebhook`] if every source is empty or the file
    ///   does not exist
    /// - [`ConfigError::Io`] if the file exists but cannot be read
    /// - [`ConfigError::Url`] if the URL is not an acceptable endpoint
    pub fn resolve_webhook_url(
        &self,
        env_value: Option<String>,
    ) -> Result<SecretString, ConfigError> {
        let candidate = env_value
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.webhook_url.clone().filter(|v| !v.trim().is_empty()));

        let url = match candidate {
            Some(url) => url.trim().to_string(),
            None => match std::fs::read_to_string(&self.webhook_url_file) {
                Ok(content) => content.trim().to_string(),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(ConfigError::MissingWebhook(
                        self.webhook_url_file.display().to_string(),
                    ));
                }
                Err(e) => return Err(ConfigError::Io(e)),
            },
        };

        if url.is_empty() {
            return Err(ConfigError::MissingWebhook(
                self.webhook_url_file.display().to_string(),
            ));
        }

        let secret = SecretString::from(url);
        validate_url(secret.expose_secret()).map_err(|source| ConfigError::Url {
            key: "webhook_url",
            source,
        })?;
        Ok(secret)
    }
}

fn warn_unknown_keys(table: &toml::Table, section: &str, known: &[&str]) {
    for key in table.keys() {
        if !known.contains(&key.as_str()) {
            if section.is_empty() {
                tracing::warn!(key = %key, "Unknown key in config file, ignoring");
            } else {
                tracing::warn!(section = %section, key = %key, "Unknown key in config file, ignoring");
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config(name: &str, content: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(format!("diffhook_config_test_{}", name));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("diffhook.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.poll_interval_secs, 300);
        assert_eq!(config.initial_lookback_minutes, 0);
        assert_eq!(config.http_timeout_secs, 30);
        assert!(config.webhook_url.is_none());
        assert_eq!(config.webhook_url_file, PathBuf::from("webhook.url"));
        assert_eq!(config.feed.days, 7);
        assert_eq!(config.feed.limit, 50);
        assert!(!config.feed.hide_bots);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_feed_url() {
        let url = FeedConfig::default().feed_url().unwrap();
        assert_eq!(
            url,
            "https://switchbrew.org/w/api.php?action=feedrecentchanges&feedformat=rss&hidebots=0&days=7&limit=50"
        );
    }

    #[test]
    fn test_feed_url_override() {
        let feed = FeedConfig {
            url: Some("https://wiki.example.org/feed.xml".to_string()),
            ..FeedConfig::default()
        };
        assert_eq!(feed.feed_url().unwrap(), "https://wiki.example.org/feed.xml");
    }

    #[test]
    fn test_feed_url_hide_bots() {
        let feed = FeedConfig {
            hide_bots: true,
            days: 1,
            limit: 10,
            ..FeedConfig::default()
        };
        let url = feed.feed_url().unwrap();
        assert!(url.contains("hidebots=1"));
        assert!(url.contains("days=1"));
        assert!(url.contains("limit=10"));
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/diffhook_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.poll_interval_secs, 300);
    }

    #[test]
    fn test_empty_file_returns_default() {
        let (dir, path) = temp_config("empty", "   \n  ");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.poll_interval_secs, 300);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let (dir, path) = temp_config("partial", "poll_interval_secs = 60\n[feed]\ndays = 2\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.poll_interval_secs, 60);
        assert_eq!(config.feed.days, 2);
        assert_eq!(config.feed.limit, 50); // default
        assert_eq!(config.render.dpi, 300.0); // default
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let content = r##"
poll_interval_secs = 120
initial_lookback_minutes = 30
http_timeout_secs = 10
webhook_url = "https://discord.com/api/webhooks/1/token"
webhook_url_file = "/etc/diffhook/webhook.url"

[feed]
api_url = "https://wiki.example.org/w/api.php"
days = 3
limit = 20
hide_bots = true

[render]
background = "#ffffff"
dpi = 150.0
border_px = 10

[embed]
complete_color = 0x00ff00
incomplete_color = 0xff0000
"##;
        let (dir, path) = temp_config("full", content);
        let config = Config::load(&path).unwrap();
        assert_eq!(config.poll_interval_secs, 120);
        assert_eq!(config.initial_lookback_minutes, 30);
        assert_eq!(config.http_timeout(), Duration::from_secs(10));
        assert_eq!(config.feed.limit, 20);
        assert!(config.feed.hide_bots);
        assert_eq!(config.render.background, "#ffffff");
        assert_eq!(config.render.dpi, 150.0);
        assert_eq!(config.render.border_px, 10);
        assert_eq!(config.embed.complete_color, 0x00ff00);
        assert_eq!(config.embed.incomplete_color, 0xff0000);
        assert!(config.validate().is_ok());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let (dir, path) = temp_config("invalid", "this is not [valid toml");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let (dir, path) = temp_config(
            "unknown",
            "poll_interval_secs = 10\ntotally_fake_key = 1\n[render]\nnot_a_key = true\n",
        );
        let config = Config::load(&path).unwrap();
        assert_eq!(config.poll_interval_secs, 10);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let (dir, path) = temp_config("wrongtype", "poll_interval_secs = \"soon\"\n");
        assert!(Config::load(&path).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_too_large_file_rejected() {
        let (dir, path) = temp_config("too_large", &"a".repeat(1_048_577));
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let config = Config {
            poll_interval_secs: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                key: "poll_interval_secs",
                ..
            })
        ));
    }

    #[test]
    fn test_validate_rejects_huge_lookback() {
        let config = Config {
            initial_lookback_minutes: u64::MAX,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                key: "initial_lookback_minutes",
                ..
            })
        ));
        // Never panics, even unvalidated
        assert_eq!(
            config.initial_lookback(),
            chrono::Duration::minutes(MAX_LOOKBACK_MINUTES as i64)
        );

        let config = Config {
            initial_lookback_minutes: MAX_LOOKBACK_MINUTES,
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_feed_url() {
        let mut config = Config::default();
        config.feed.api_url = "http://example.com/w/api.php".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Url {
                key: "feed.api_url",
                ..
            })
        ));
    }

    #[test]
    fn test_webhook_env_takes_precedence() {
        let config = Config {
            webhook_url: Some("https://discord.com/api/webhooks/config".to_string()),
            ..Config::default()
        };
        let url = config
            .resolve_webhook_url(Some("https://discord.com/api/webhooks/env".to_string()))
            .unwrap();
        assert_eq!(url.expose_secret(), "https://discord.com/api/webhooks/env");
    }

    #[test]
    fn test_webhook_config_key_used_without_env() {
        let config = Config {
            webhook_url: Some("https://discord.com/api/webhooks/config".to_string()),
            ..Config::default()
        };
        let url = config.resolve_webhook_url(Some("   ".to_string())).unwrap();
        assert_eq!(url.expose_secret(), "https://discord.com/api/webhooks/config");
    }

    #[test]
    fn test_webhook_read_from_file_and_trimmed() {
        let dir = std::env::temp_dir().join("diffhook_config_test_webhook_file");
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("webhook.url");
        std::fs::write(&file, "  https://discord.com/api/webhooks/file\n").unwrap();

        let config = Config {
            webhook_url_file: file,
            ..Config::default()
        };
        let url = config.resolve_webhook_url(None).unwrap();
        assert_eq!(url.expose_secret(), "https://discord.com/api/webhooks/file");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_webhook_missing_everywhere_is_error() {
        let config = Config {
            webhook_url_file: PathBuf::from("/tmp/diffhook_test_no_such_webhook.url"),
            ..Config::default()
        };
        let err = config.resolve_webhook_url(None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingWebhook(_)));
        assert!(err.to_string().contains(WEBHOOK_ENV_VAR));
    }

    #[test]
    fn test_webhook_empty_file_is_error() {
        let dir = std::env::temp_dir().join("diffhook_config_test_webhook_empty");
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("webhook.url");
        std::fs::write(&file, "\n").unwrap();

        let config = Config {
            webhook_url_file: file,
            ..Config::default()
        };
        assert!(matches!(
            config.resolve_webhook_url(None),
            Err(ConfigError::MissingWebhook(_))
        ));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_webhook_insecure_url_rejected() {
        let config = Config::default();
        let err = config
            .resolve_webhook_url(Some("http://discord.com/api/webhooks/1".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Url { key: "webhook_url", .. }));
    }

    #[test]
    fn test_debug_masks_webhook_url() {
        let config = Config {
            webhook_url: Some("https://discord.com/api/webhooks/super-secret".to_string()),
            ..Config::default()
        };
        let debug_output = format!("{:?}", config);
        assert!(!debug_output.contains("super-secret"));
        assert!(debug_output.contains("[REDACTED]"));
    }
}

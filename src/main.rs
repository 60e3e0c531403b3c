use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use diffhook::config::Config;
use diffhook::driver::Driver;
use diffhook::feed::{FeedFetcher, Watermark};
use diffhook::render::{render_blocking, DiffRenderer};
use diffhook::webhook::WebhookPoster;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Parser, Debug)]
#[command(
    name = "diffhook",
    version,
    about = "Posts rendered wiki diffs from a recent-changes feed to a chat webhook"
)]
struct Args {
    /// Config file; a missing file means defaults
    #[arg(long, value_name = "FILE", default_value = "diffhook.toml", global = true)]
    config: PathBuf,

    /// Run a single poll cycle and exit
    #[arg(long)]
    once: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render an HTML diff fragment to a PNG file
    Render {
        #[arg(value_name = "INPUT")]
        input: PathBuf,
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config '{}'", args.config.display()))?;
    config.validate().context("Invalid configuration")?;

    match args.command {
        Some(Command::Render { input, output }) => render_file(&config, &input, &output).await,
        None => poll(config, args.once).await,
    }
}

async fn render_file(config: &Config, input: &Path, output: &Path) -> Result<()> {
    let html = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read '{}'", input.display()))?;
    let renderer =
        DiffRenderer::new(config.render.clone()).context("Failed to set up the renderer")?;
    let result = render_blocking(Arc::new(renderer), html)
        .await
        .with_context(|| format!("Failed to render '{}'", input.display()))?;
    std::fs::write(output, &result.png)
        .with_context(|| format!("Failed to write '{}'", output.display()))?;

    println!(
        "Wrote {} ({}x{}{})",
        output.display(),
        result.width,
        result.height,
        if result.complete { "" } else { ", truncated" }
    );
    Ok(())
}

async fn poll(config: Config, once: bool) -> Result<()> {
    let webhook_url = config
        .webhook_url_from_env()
        .context("Failed to resolve the webhook URL")?;
    let feed_url = config.feed.feed_url().context("Invalid feed URL")?;

    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(config.http_timeout())
        .build()
        .context("Failed to build HTTP client")?;

    let renderer =
        DiffRenderer::new(config.render.clone()).context("Failed to set up the renderer")?;
    let mut driver = Driver::new(
        FeedFetcher::new(client.clone(), feed_url.clone(), config.http_timeout()),
        renderer,
        WebhookPoster::new(
            client,
            webhook_url,
            config.http_timeout(),
            config.embed.clone(),
        ),
        Watermark::starting_now(config.initial_lookback()),
        config.poll_interval(),
    );

    tracing::info!(
        feed = %feed_url,
        interval_secs = config.poll_interval_secs,
        watermark = %driver.watermark().get().to_rfc3339(),
        "Watching recent changes"
    );

    if once {
        driver.run_cycle().await;
    } else {
        driver.run_until(shutdown_signal()).await;
    }
    Ok(())
}

/// Resolves on SIGTERM or Ctrl-C.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down gracefully"),
                    _ = tokio::signal::ctrl_c() => tracing::info!("Received SIGINT, shutting down gracefully"),
                }
                return;
            }
            Err(e) => tracing::warn!(error = %e, "Cannot install SIGTERM handler"),
        }
    }

    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Received SIGINT, shutting down gracefully");
    }
}

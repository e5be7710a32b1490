use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::mpsc;

use headlines::config::Config;
use headlines::feed::{spawn_load, FeedItem, LoadOutcome};
use headlines::util::validate_url_for_open;
use headlines::view::{render_detail, render_list, DEFAULT_WIDTH};

/// Get the default config file path (~/.config/headlines/config.toml)
fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("headlines")
        .join("config.toml"))
}

/// Terminal width from `COLUMNS`, falling back to 80.
fn terminal_width() -> usize {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|c| c.trim().parse().ok())
        .filter(|&w: &usize| w > 0)
        .unwrap_or(DEFAULT_WIDTH)
}

#[derive(Parser, Debug)]
#[command(name = "headlines", about = "Read the headlines of an RSS feed")]
struct Args {
    /// Config file (default: ~/.config/headlines/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Feed URL, overriding the configured one
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Show the full article with this number from the list
    #[arg(long, value_name = "N", conflicts_with = "open")]
    show: Option<usize>,

    /// Open the link of the article with this number in the browser
    #[arg(long, value_name = "N")]
    open: Option<usize>,

    /// Print the items as JSON instead of text
    #[arg(long)]
    json: bool,
}

fn select(items: &[FeedItem], number: usize) -> Result<&FeedItem> {
    if number == 0 || number > items.len() {
        bail!(
            "No article number {} (feed has {} article{})",
            number,
            items.len(),
            if items.len() == 1 { "" } else { "s" }
        );
    }
    Ok(&items[number - 1])
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so list and JSON output stay clean on stdout
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    if let Some(url) = &args.url {
        config = config.with_feed_url(url).context("Invalid --url")?;
    }

    let client = reqwest::Client::builder()
        .user_agent(concat!("headlines/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;

    // Background load; the outcome comes back to this task over the channel
    let (tx, mut rx) = mpsc::channel::<LoadOutcome>(1);
    spawn_load(client, config.feed_url.clone(), config.fetch_options(), tx);

    let outcome = rx
        .recv()
        .await
        .context("Feed loader stopped without reporting a result")?;
    let items = outcome
        .result
        .with_context(|| format!("Failed to load feed {}", outcome.url))?;

    if let Some(number) = args.open {
        let item = select(&items, number)?;
        let url = validate_url_for_open(&item.link)
            .with_context(|| format!("Refusing to open link '{}'", item.link))?;
        open::that(url.as_str()).with_context(|| format!("Failed to open {}", url))?;
        return Ok(());
    }

    if args.json {
        let json = match args.show {
            Some(number) => serde_json::to_string_pretty(select(&items, number)?)?,
            None => serde_json::to_string_pretty(&items)?,
        };
        println!("{json}");
        return Ok(());
    }

    match args.show {
        Some(number) => print!("{}", render_detail(select(&items, number)?)),
        None => print!("{}", render_list(&items, terminal_width())),
    }

    Ok(())
}

//! Feed loading: fetching, parsing and date formatting for RSS feeds.
//!
//! - [`parser`] - Streaming RSS parser built on `quick-xml`
//! - [`item`] - The [`FeedItem`] record and its per-item builder
//! - [`date`] - `pubDate` reformatting for display
//! - [`fetcher`] - HTTP retrieval with timeouts, retries and a size limit
//!
//! # Example
//!
//! ```ignore
//! use headlines::feed::{fetch_feed, FetchOptions};
//!
//! let client = reqwest::Client::new();
//! let items = fetch_feed(&client, "https://lenta.ru/rss", &FetchOptions::default()).await?;
//! for item in &items {
//!     println!("{} ({})", item.title, item.pub_date);
//! }
//! ```

pub mod date;
mod fetcher;
mod item;
mod parser;

pub use fetcher::{fetch_feed, load_feed, spawn_load, FetchError, FetchOptions, LoadOutcome};
pub use item::{FeedItem, ItemBuilder, ItemField};
pub use parser::{
    parse_feed, parse_feed_at, parse_feed_with, FeedEvent, FeedEvents, FeedVisitor, ParseError,
    MAX_DEPTH,
};

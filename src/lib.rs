//! Headline reader for RSS feeds.
//!
//! The library half of the `headlines` binary: a streaming RSS parser
//! ([`feed::parse_feed`]), an HTTP loader ([`feed::fetch_feed`]), text views
//! for the headline list and article detail, and the configuration and text
//! helpers the front end uses.

pub mod config;
pub mod feed;
pub mod util;
pub mod view;

//! Utility functions shared by the parser and the command-line front end.
//!
//! - **Text processing**: newline stripping for feed character data, and
//!   terminal-safe rendering (control-character stripping, width-aware truncation)
//! - **URL validation**: scheme checks for the configured feed URL and for
//!   article links opened in the browser

mod text;
mod url_validator;

pub use text::{display_width, strip_control_chars, strip_newlines, truncate_to_width};
pub use url_validator::{validate_feed_url, validate_url_for_open, UrlValidationError};

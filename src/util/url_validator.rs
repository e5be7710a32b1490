use thiserror::Error;
use url::Url;

/// Errors that can occur during URL validation.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host to connect to.
    #[error("URL has no host")]
    MissingHost,
}

/// Validates a feed URL before it is fetched.
///
/// Only `http` and `https` URLs with a host are accepted. Unlike a
/// subscription importer, the feed URL here comes from the user's own
/// configuration, so local and private addresses are allowed (useful for
/// self-hosted feeds).
///
/// # Examples
///
/// ```
/// use headlines::util::validate_feed_url;
///
/// assert!(validate_feed_url("https://lenta.ru/rss").is_ok());
/// assert!(validate_feed_url("file:///etc/passwd").is_err());
/// ```
pub fn validate_feed_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlValidationError::MissingHost);
    }

    Ok(url)
}

/// Validates an article link before handing it to the system browser.
///
/// SEC: `open::that()` passes its argument to the platform opener, so anything
/// that is not a plain http(s) URL (`file:`, `javascript:`, custom handlers)
/// is refused.
pub fn validate_url_for_open(url_str: &str) -> Result<Url, UrlValidationError> {
    validate_feed_url(url_str)
}

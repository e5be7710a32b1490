//! Publication-date reformatting.
//!
//! RSS `<pubDate>` values arrive as `Mon, 02 Jan 2023 15:04:05 +0000` and are
//! shown to the reader as `15:04, 2 January 2023`. Names are matched in
//! English regardless of the process locale.

use chrono::{DateTime, FixedOffset};

/// `<day-name>, <day> <month-abbrev> <year> <hour>:<minute>:<second> <offset>`
pub const PUB_DATE_INPUT_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// `<hour>:<minute>, <day> <full-month-name> <year>`
pub const PUB_DATE_DISPLAY_FORMAT: &str = "%H:%M, %-d %B %Y";

/// The input pattern with the day name removed.
const PUB_DATE_NO_WEEKDAY_FORMAT: &str = "%d %b %Y %H:%M:%S %z";

/// Parses a raw `<pubDate>` value.
///
/// The fixed pattern is tried first. RFC 2822 is accepted as a second attempt,
/// which covers feeds that write `GMT` or a named US zone instead of a
/// numeric offset. If both reject the value, the day name is dropped and the
/// rest parsed again: the date is taken from day, month and year, and a
/// weekday that contradicts them is ignored.
pub fn parse_pub_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(date) = DateTime::parse_from_str(raw, PUB_DATE_INPUT_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
    {
        return Some(date);
    }

    let (_, rest) = raw.split_once(", ")?;
    let rest = rest.trim_start();
    DateTime::parse_from_str(rest, PUB_DATE_NO_WEEKDAY_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc2822(rest))
        .ok()
}

/// Reformats a raw `<pubDate>` value for display.
///
/// The date is rendered in the offset it was published with. When `raw` does
/// not parse, `fallback` is rendered instead: an unreadable date never drops
/// the item.
pub fn reformat_pub_date(raw: &str, fallback: DateTime<FixedOffset>) -> String {
    let date = match parse_pub_date(raw) {
        Some(date) => date,
        None => {
            tracing::debug!(pub_date = %raw, "Unparseable pubDate, substituting current time");
            fallback
        }
    };
    date.format(PUB_DATE_DISPLAY_FORMAT).to_string()
}

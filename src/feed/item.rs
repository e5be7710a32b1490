use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use crate::feed::date::reformat_pub_date;
use crate::util::strip_newlines;

/// One `<item>` of an RSS feed, ready for display.
///
/// Items carry no identity of their own; their position in the parsed
/// sequence is their order in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedItem {
    pub title: String,
    pub description: String,
    /// Display form, e.g. `15:04, 2 January 2023`
    pub pub_date: String,
    /// `url` attribute of the item's `<enclosure>`, if it had one
    pub image_url: Option<String>,
    pub link: String,
}

/// Character-data fields collected from an item's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemField {
    Title,
    Description,
    PubDate,
    Link,
}

impl ItemField {
    /// Maps a child element name to the field it feeds, if any.
    pub fn from_element(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Self::Title),
            b"description" => Some(Self::Description),
            b"pubDate" => Some(Self::PubDate),
            b"link" => Some(Self::Link),
            _ => None,
        }
    }
}

/// Accumulates one `<item>` while it is open.
///
/// Created when `<item>` opens and consumed by [`ItemBuilder::finish`] when
/// it closes, so nothing carries over from one item to the next.
#[derive(Debug, Default)]
pub struct ItemBuilder {
    title: String,
    description: String,
    pub_date: String,
    image_url: Option<String>,
    link: String,
}

impl ItemBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk of character data to `field`, dropping line breaks.
    ///
    /// Chunks are concatenated in arrival order; an element's text may arrive
    /// in several pieces (around CDATA sections or entity references).
    pub fn push_text(&mut self, field: ItemField, chunk: &str) {
        let chunk = strip_newlines(chunk);
        let target = match field {
            ItemField::Title => &mut self.title,
            ItemField::Description => &mut self.description,
            ItemField::PubDate => &mut self.pub_date,
            ItemField::Link => &mut self.link,
        };
        target.push_str(&chunk);
    }

    /// Records the enclosure URL. The first enclosure of an item wins.
    pub fn set_image_url(&mut self, url: String) {
        if self.image_url.is_none() {
            self.image_url = Some(url);
        }
    }

    /// Finalizes the item.
    ///
    /// Title, description and link are trimmed. The publication date is
    /// reformatted for display, using `now` when it cannot be parsed.
    pub fn finish(self, now: DateTime<FixedOffset>) -> FeedItem {
        FeedItem {
            title: trimmed(self.title),
            description: trimmed(self.description),
            pub_date: reformat_pub_date(&self.pub_date, now),
            image_url: self.image_url,
            link: trimmed(self.link),
        }
    }
}

fn trimmed(s: String) -> String {
    let t = s.trim();
    if t.len() == s.len() {
        s
    } else {
        t.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_field_mapping() {
        assert_eq!(ItemField::from_element(b"title"), Some(ItemField::Title));
        assert_eq!(ItemField::from_element(b"pubDate"), Some(ItemField::PubDate));
        // element names are case-sensitive in XML
        assert_eq!(ItemField::from_element(b"pubdate"), None);
        assert_eq!(ItemField::from_element(b"guid"), None);
    }

    #[test]
    fn test_chunks_accumulate_in_order() {
        let mut b = ItemBuilder::new();
        b.push_text(ItemField::Title, "  Markets ");
        b.push_text(ItemField::Title, "rally\n");
        b.push_text(ItemField::Title, " on rate news ");
        let item = b.finish(now());
        assert_eq!(item.title, "Markets rally on rate news");
    }

    #[test]
    fn test_newlines_stripped_everywhere() {
        let mut b = ItemBuilder::new();
        b.push_text(ItemField::Description, "\n   First line\nsecond line\n");
        b.push_text(ItemField::Link, "\nhttps://example.com/a\n");
        b.push_text(ItemField::PubDate, "\nMon, 02 Jan 2023 15:04:05 +0000\n");
        let item = b.finish(now());
        assert_eq!(item.description, "First linesecond line");
        assert_eq!(item.link, "https://example.com/a");
        assert_eq!(item.pub_date, "15:04, 2 January 2023");
    }

    #[test]
    fn test_empty_builder_finishes() {
        let item = ItemBuilder::new().finish(now());
        assert_eq!(
            item,
            FeedItem {
                title: String::new(),
                description: String::new(),
                pub_date: "12:00, 1 June 2024".to_string(),
                image_url: None,
                link: String::new(),
            }
        );
    }

    #[test]
    fn test_first_enclosure_wins() {
        let mut b = ItemBuilder::new();
        b.set_image_url("https://img.example.com/1.jpg".to_string());
        b.set_image_url("https://img.example.com/2.jpg".to_string());
        let item = b.finish(now());
        assert_eq!(item.image_url.as_deref(), Some("https://img.example.com/1.jpg"));
    }

    #[test]
    fn test_serializes_missing_image_as_null() {
        let item = ItemBuilder::new().finish(now());
        let json = serde_json::to_value(&item).unwrap();
        assert!(json["image_url"].is_null());
        assert_eq!(json["pub_date"], "12:00, 1 June 2024");
    }
}

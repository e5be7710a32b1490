//! Streaming RSS parser.
//!
//! A single forward pass over the document: [`FeedEvents`] pulls XML events
//! from `quick-xml` and reduces them to the handful the feed schema cares
//! about, and the driver folds those into [`FeedItem`]s, one
//! [`ItemBuilder`] per open `<item>`. No tree is materialized.

use chrono::{DateTime, FixedOffset, Local};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use crate::feed::item::{FeedItem, ItemBuilder, ItemField};

/// SEC-003: Maximum element nesting depth accepted in a feed document.
pub const MAX_DEPTH: usize = 64;

/// Errors that make a feed document unreadable.
///
/// An unparseable `<pubDate>` is not among them; see [`crate::feed::date`].
#[derive(Debug, Error)]
pub enum ParseError {
    /// Syntax error, mismatched end tag, bad escape or invalid UTF-8.
    #[error("XML parse error at byte {position}: {message}")]
    Xml { position: u64, message: String },

    /// Input ended while elements were still open.
    #[error("Unexpected end of document with {open} unclosed element(s)")]
    UnexpectedEof { open: usize },

    /// Input contained no element at all.
    #[error("Document has no root element")]
    NoRootElement,

    /// SEC-003: Nesting depth exceeds safety limit.
    #[error("Feed nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),
}

/// The events the feed parser reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// An element opened. `url` carries the `url` attribute of an
    /// `<enclosure>`; it is `None` for every other element.
    Open { name: String, url: Option<String> },
    /// A chunk of character data, unescaped. CDATA sections arrive here too.
    Text(String),
    /// An element closed. Self-closing elements produce `Open` then `Close`.
    Close(String),
    /// The document ended cleanly.
    End,
}

/// Pull-based event source over a feed document.
///
/// Call [`FeedEvents::next_event`] until it yields [`FeedEvent::End`] or an
/// error. Also usable as an [`Iterator`], which stops after `End` or after
/// the first error.
pub struct FeedEvents<'a> {
    reader: Reader<&'a [u8]>,
    depth: usize,
    seen_root: bool,
    done: bool,
}

impl<'a> FeedEvents<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        // SEC-002: XXE protection. quick-xml (0.37) never parses <!ENTITY> declarations;
        // only the five predefined entities and character references are resolved,
        // anything else fails in `unescape()` / `decode_and_unescape_value()`.
        let mut reader = Reader::from_reader(bytes);
        let config = reader.config_mut();
        config.expand_empty_elements = true;
        config.check_end_names = true;

        Self {
            reader,
            depth: 0,
            seen_root: false,
            done: false,
        }
    }

    fn xml_error(&self, err: impl std::fmt::Display) -> ParseError {
        ParseError::Xml {
            position: self.reader.error_position(),
            message: err.to_string(),
        }
    }

    fn ill_formed(&self, message: &str) -> ParseError {
        ParseError::Xml {
            position: self.reader.buffer_position(),
            message: message.to_string(),
        }
    }

    /// Root element has been opened and closed again.
    fn after_root(&self) -> bool {
        self.seen_root && self.depth == 0
    }

    fn decode(&self, raw: &[u8]) -> Result<String, ParseError> {
        self.reader
            .decoder()
            .decode(raw)
            .map(|s| s.into_owned())
            .map_err(|e| self.xml_error(e))
    }

    fn open(&mut self, start: &BytesStart<'_>) -> Result<FeedEvent, ParseError> {
        if self.after_root() {
            return Err(self.ill_formed("second root element after the end of the document"));
        }
        self.depth += 1;
        self.seen_root = true;
        // SEC-003: Reject excessively nested documents
        if self.depth > MAX_DEPTH {
            return Err(ParseError::MaxDepthExceeded(MAX_DEPTH));
        }

        let name = self.decode(start.name().as_ref())?;
        let url = if name == "enclosure" {
            match start.try_get_attribute("url").map_err(|e| self.xml_error(e))? {
                Some(attr) => Some(
                    attr.decode_and_unescape_value(self.reader.decoder())
                        .map_err(|e| self.xml_error(e))?
                        .into_owned(),
                ),
                None => None,
            }
        } else {
            None
        };

        Ok(FeedEvent::Open { name, url })
    }

    /// Pulls the next feed event.
    pub fn next_event(&mut self) -> Result<FeedEvent, ParseError> {
        loop {
            let event = self.reader.read_event().map_err(|e| self.xml_error(e))?;
            match event {
                Event::Start(e) => return self.open(&e),
                Event::End(e) => {
                    self.depth = self.depth.saturating_sub(1);
                    return Ok(FeedEvent::Close(self.decode(e.name().as_ref())?));
                }
                Event::Text(e) if self.depth > 0 => {
                    let text = e.unescape().map_err(|err| self.xml_error(err))?;
                    return Ok(FeedEvent::Text(text.into_owned()));
                }
                Event::CData(e) if self.depth > 0 => {
                    return Ok(FeedEvent::Text(self.decode(&e)?));
                }
                Event::Text(e) if self.after_root() && !e.iter().all(u8::is_ascii_whitespace) => {
                    return Err(self.ill_formed("extra content at the end of the document"));
                }
                Event::CData(_) if self.after_root() => {
                    return Err(self.ill_formed("extra content at the end of the document"));
                }
                Event::Eof => {
                    if self.depth > 0 {
                        return Err(ParseError::UnexpectedEof { open: self.depth });
                    }
                    if !self.seen_root {
                        return Err(ParseError::NoRootElement);
                    }
                    return Ok(FeedEvent::End);
                }
                // declarations, comments, processing instructions, doctype,
                // whitespace outside the root
                _ => {}
            }
        }
    }
}

impl Iterator for FeedEvents<'_> {
    type Item = Result<FeedEvent, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let next = self.next_event();
        if matches!(next, Ok(FeedEvent::End) | Err(_)) {
            self.done = true;
        }
        Some(next)
    }
}

/// Receives each item as soon as its `</item>` closes.
pub trait FeedVisitor {
    fn on_item(&mut self, item: FeedItem);
}

impl FeedVisitor for Vec<FeedItem> {
    fn on_item(&mut self, item: FeedItem) {
        self.push(item);
    }
}

/// Parses an RSS document into its items, in document order.
///
/// Items whose `<pubDate>` cannot be read get the current local time as
/// their display date.
///
/// # Errors
///
/// Returns [`ParseError`] if the document is not well-formed XML. No partial
/// item list is returned in that case.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<FeedItem>, ParseError> {
    parse_feed_at(bytes, Local::now().fixed_offset())
}

/// Like [`parse_feed`], with an explicit fallback time for unreadable dates.
pub fn parse_feed_at(
    bytes: &[u8],
    now: DateTime<FixedOffset>,
) -> Result<Vec<FeedItem>, ParseError> {
    let mut items = Vec::new();
    run(bytes, now, &mut items)?;
    Ok(items)
}

/// Visitor form of [`parse_feed`]. Returns the number of items visited.
///
/// Items are handed to the visitor while parsing continues, so on error the
/// visitor may already have seen some items from before the failure point.
pub fn parse_feed_with<V: FeedVisitor>(bytes: &[u8], visitor: &mut V) -> Result<usize, ParseError> {
    run(bytes, Local::now().fixed_offset(), visitor)
}

fn run<V: FeedVisitor>(
    bytes: &[u8],
    now: DateTime<FixedOffset>,
    visitor: &mut V,
) -> Result<usize, ParseError> {
    let mut events = FeedEvents::new(bytes);
    // innermost open element is the cursor for character data
    let mut open: Vec<String> = Vec::new();
    let mut current: Option<ItemBuilder> = None;
    let mut count = 0;

    loop {
        match events.next_event()? {
            FeedEvent::Open { name, url } => {
                if name == "item" {
                    current = Some(ItemBuilder::new());
                } else if name == "enclosure" {
                    if let (Some(builder), Some(url)) = (current.as_mut(), url) {
                        builder.set_image_url(url);
                    }
                }
                open.push(name);
            }
            FeedEvent::Text(chunk) => {
                let field = open
                    .last()
                    .and_then(|name| ItemField::from_element(name.as_bytes()));
                if let (Some(builder), Some(field)) = (current.as_mut(), field) {
                    builder.push_text(field, &chunk);
                }
            }
            FeedEvent::Close(name) => {
                open.pop();
                if name == "item" {
                    if let Some(builder) = current.take() {
                        visitor.on_item(builder.finish(now));
                        count += 1;
                    }
                }
            }
            FeedEvent::End => break,
        }
    }

    tracing::debug!(items = count, "Parsed feed");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn fixed_now() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 5, 8, 7, 0)
            .unwrap()
    }

    fn parse(xml: &str) -> Result<Vec<FeedItem>, ParseError> {
        parse_feed_at(xml.as_bytes(), fixed_now())
    }

    fn rss(items: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Channel title</title>
    <link>https://example.com/</link>
    <description>Channel description</description>
    {items}
  </channel>
</rss>"#
        )
    }

    #[test]
    fn test_items_in_document_order() {
        let xml = rss(r#"
    <item><title>First</title></item>
    <item><title>Second</title></item>
    <item><title>Third</title></item>"#);
        let titles: Vec<_> = parse(&xml).unwrap().into_iter().map(|i| i.title).collect();
        assert_eq!(titles, vec!["First", "Second", "Third"]);
    }

    #[test]
    fn test_full_item() {
        let xml = rss(r#"
    <item>
      <guid>https://example.com/news/1</guid>
      <title>
        Headline text
      </title>
      <link>https://example.com/news/1</link>
      <description>
        <![CDATA[Body of the story.]]>
      </description>
      <pubDate>Mon, 02 Jan 2023 15:04:05 +0000</pubDate>
      <enclosure url="https://img.example.com/1.jpg" type="image/jpeg" length="1000"/>
      <category>World</category>
    </item>"#);

        let items = parse(&xml).unwrap();
        assert_eq!(
            items,
            vec![FeedItem {
                title: "Headline text".to_string(),
                description: "Body of the story.".to_string(),
                pub_date: "15:04, 2 January 2023".to_string(),
                image_url: Some("https://img.example.com/1.jpg".to_string()),
                link: "https://example.com/news/1".to_string(),
            }]
        );
    }

    #[test]
    fn test_channel_fields_do_not_leak_into_items() {
        let xml = rss("<item><link>https://example.com/a</link></item>");
        let items = parse(&xml).unwrap();
        assert_eq!(items[0].title, "");
        assert_eq!(items[0].description, "");
    }

    #[test]
    fn test_whitespace_after_close_not_attributed() {
        // text between </pubDate> and the next tag belongs to <item>
        let xml = rss(
            "<item><pubDate>Mon, 02 Jan 2023 15:04:05 +0000</pubDate>\n      <title>T</title></item>",
        );
        assert_eq!(parse(&xml).unwrap()[0].pub_date, "15:04, 2 January 2023");
    }

    #[test]
    fn test_split_character_data_concatenates() {
        let xml = rss(
            "<item><title>Tom &amp; Jerry <![CDATA[<live>]]> tonight</title>\
             <description>a&#10;b<![CDATA[c]]>d</description></item>",
        );
        let item = &parse(&xml).unwrap()[0];
        assert_eq!(item.title, "Tom & Jerry <live> tonight");
        assert_eq!(item.description, "abcd");
    }

    #[test]
    fn test_enclosure_without_content() {
        let xml = rss(
            r#"<item><enclosure url="https://img.example.com/a.jpg"></enclosure></item>
               <item><enclosure url="https://img.example.com/b.jpg?w=1&amp;h=2"/></item>
               <item><enclosure type="image/png"/></item>
               <item><title>no enclosure</title></item>"#,
        );
        let urls: Vec<_> = parse(&xml).unwrap().into_iter().map(|i| i.image_url).collect();
        assert_eq!(
            urls,
            vec![
                Some("https://img.example.com/a.jpg".to_string()),
                Some("https://img.example.com/b.jpg?w=1&h=2".to_string()),
                None,
                None,
            ]
        );
    }

    #[test]
    fn test_unparseable_date_falls_back() {
        let xml = rss("<item><title>T</title><pubDate>sometime last week</pubDate></item>");
        let items = parse(&xml).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].pub_date, "08:07, 5 March 2024");
    }

    #[test]
    fn test_empty_feed() {
        assert_eq!(parse(&rss("")).unwrap(), Vec::<FeedItem>::new());
    }

    #[test]
    fn test_self_closing_item() {
        let items = parse(&rss("<item/>")).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].image_url, None);
    }

    #[test]
    fn test_malformed_documents() {
        assert!(parse("<not valid xml").is_err());
        assert!(matches!(
            parse("<rss><channel><item></channel></rss>"),
            Err(ParseError::Xml { .. })
        ));
        assert!(matches!(
            parse("<rss><channel><item><title>x</title>"),
            Err(ParseError::UnexpectedEof { open: 3 })
        ));
        assert!(matches!(parse(""), Err(ParseError::NoRootElement)));
        assert!(matches!(
            parse("<rss><item><title>&nbsp;</title></item></rss>"),
            Err(ParseError::Xml { .. })
        ));
    }

    #[test]
    fn test_content_after_root_rejected() {
        assert!(matches!(parse("<rss></rss>garbage"), Err(ParseError::Xml { .. })));
        assert!(matches!(
            parse("<rss></rss><![CDATA[x]]>"),
            Err(ParseError::Xml { .. })
        ));
        // a second root's items must not be emitted
        assert!(matches!(
            parse("<rss></rss><rss><item><title>x</title></item></rss>"),
            Err(ParseError::Xml { .. })
        ));
        // trailing whitespace and comments are fine
        assert_eq!(parse("<rss><item/></rss>\n  <!-- end -->\n").unwrap().len(), 1);
    }

    #[test]
    fn test_declared_single_byte_encoding() {
        // "Новости" in windows-1251
        let mut bytes = br#"<?xml version="1.0" encoding="windows-1251"?><rss><item><title>"#.to_vec();
        bytes.extend_from_slice(&[0xcd, 0xee, 0xe2, 0xee, 0xf1, 0xf2, 0xe8]);
        bytes.extend_from_slice(br#"</title><enclosure url="https://img.example.com/&#1085;.jpg"/></item></rss>"#);

        let items = parse_feed_at(&bytes, fixed_now()).unwrap();
        assert_eq!(items[0].title, "Новости");
        assert_eq!(items[0].image_url.as_deref(), Some("https://img.example.com/н.jpg"));
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let mut bytes = b"<rss><item><title>".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe]);
        bytes.extend_from_slice(b"</title></item></rss>");
        assert!(parse_feed_at(&bytes, fixed_now()).is_err());
    }

    #[test]
    fn test_depth_limit() {
        let deep = format!("{}{}", "<a>".repeat(MAX_DEPTH + 1), "</a>".repeat(MAX_DEPTH + 1));
        assert!(matches!(parse(&deep), Err(ParseError::MaxDepthExceeded(MAX_DEPTH))));
    }

    #[test]
    fn test_event_stream() {
        let xml = r#"<rss><item><enclosure url="u"/>t</item></rss>"#;
        let events: Vec<_> = FeedEvents::new(xml.as_bytes())
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(
            events,
            vec![
                FeedEvent::Open { name: "rss".into(), url: None },
                FeedEvent::Open { name: "item".into(), url: None },
                FeedEvent::Open { name: "enclosure".into(), url: Some("u".into()) },
                FeedEvent::Close("enclosure".into()),
                FeedEvent::Text("t".into()),
                FeedEvent::Close("item".into()),
                FeedEvent::Close("rss".into()),
                FeedEvent::End,
            ]
        );
    }

    #[test]
    fn test_iterator_stops_after_error() {
        let mut events = FeedEvents::new(b"<rss><item></rss>");
        let results: Vec<_> = events.by_ref().collect();
        assert!(results.last().unwrap().is_err());
        assert!(events.next().is_none());
    }

    struct Counter(usize);

    impl FeedVisitor for Counter {
        fn on_item(&mut self, _item: FeedItem) {
            self.0 += 1;
        }
    }

    #[test]
    fn test_visitor_sees_every_item() {
        let xml = rss("<item/><item/>");
        let mut counter = Counter(0);
        let visited = parse_feed_with(xml.as_bytes(), &mut counter).unwrap();
        assert_eq!(visited, 2);
        assert_eq!(counter.0, 2);
    }
}

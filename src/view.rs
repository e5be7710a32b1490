//! Plain-text renderings of the headline list and the article detail view.
//!
//! All feed text passes through [`strip_control_chars`] before it reaches
//! the terminal.

use std::fmt;

use crate::feed::FeedItem;
use crate::util::{display_width, strip_control_chars, truncate_to_width};

/// Width used when the terminal width is unknown.
pub const DEFAULT_WIDTH: usize = 80;

/// Label in front of the article link in the detail view.
const READ_MORE: &str = "Read more:";

/// Numbered headline list: one title line per item, the date indented beneath.
///
/// Titles are truncated to fit `width` columns including the number prefix.
pub struct HeadlineList<'a> {
    pub items: &'a [FeedItem],
    pub width: usize,
}

impl fmt::Display for HeadlineList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.items.is_empty() {
            return writeln!(f, "No headlines in this feed.");
        }

        let number_width = self.items.len().to_string().len();

        for (idx, item) in self.items.iter().enumerate() {
            let prefix = format!("{:>number_width$}. ", idx + 1);
            let budget = self.width.saturating_sub(display_width(&prefix));
            let title = strip_control_chars(&item.title);
            let title = if title.is_empty() { "(untitled)".into() } else { title };

            writeln!(f, "{prefix}{}", truncate_to_width(&title, budget))?;
            writeln!(
                f,
                "{:indent$}{}",
                "",
                strip_control_chars(&item.pub_date),
                indent = prefix.len()
            )?;
        }

        Ok(())
    }
}

/// Detail view of one article.
pub struct ArticleDetail<'a>(pub &'a FeedItem);

impl fmt::Display for ArticleDetail<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let item = self.0;

        writeln!(f, "{}", strip_control_chars(&item.title))?;
        writeln!(f, "{}", strip_control_chars(&item.pub_date))?;
        if let Some(image_url) = &item.image_url {
            writeln!(f, "Image: {}", strip_control_chars(image_url))?;
        }
        if !item.description.is_empty() {
            writeln!(f)?;
            writeln!(f, "{}", strip_control_chars(&item.description))?;
        }
        if !item.link.is_empty() {
            writeln!(f)?;
            writeln!(f, "{READ_MORE}")?;
            writeln!(f, "{}", strip_control_chars(&item.link))?;
        }

        Ok(())
    }
}

pub fn render_list(items: &[FeedItem], width: usize) -> String {
    HeadlineList { items, width }.to_string()
}

pub fn render_detail(item: &FeedItem) -> String {
    ArticleDetail(item).to_string()
}

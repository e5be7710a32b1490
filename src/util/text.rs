use std::borrow::Cow;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Ellipsis appended to truncated headlines
const ELLIPSIS: &str = "...";
const ELLIPSIS_WIDTH: usize = 3;

/// Removes line breaks from a chunk of feed character data.
///
/// Both `\n` and `\r` are dropped without substituting a space, so a title
/// wrapped over two lines in the XML source reads as one line. Returns
/// `Cow::Borrowed` when the chunk contains no line breaks.
///
/// # Examples
///
/// ```
/// use headlines::util::strip_newlines;
///
/// assert_eq!(strip_newlines("Breaking\nnews"), "Breakingnews");
/// assert_eq!(strip_newlines("  indented\r\n"), "  indented");
/// ```
pub fn strip_newlines(s: &str) -> Cow<'_, str> {
    if !s.contains(['\n', '\r']) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(s.chars().filter(|c| !matches!(c, '\n' | '\r')).collect())
}

/// Display width of a string in terminal columns (CJK and emoji count double).
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Truncates a string to at most `max_width` terminal columns.
///
/// When the string does not fit, it is cut at a character boundary and
/// `"..."` is appended, with the result still within `max_width`. Widths too
/// narrow for the ellipsis get as many whole characters as fit.
///
/// # Examples
///
/// ```
/// use headlines::util::truncate_to_width;
///
/// assert_eq!(truncate_to_width("Short", 10), "Short");
/// assert_eq!(truncate_to_width("Hello World", 8), "Hello...");
/// assert_eq!(truncate_to_width("Test", 2), "Te");
/// ```
pub fn truncate_to_width(s: &str, max_width: usize) -> Cow<'_, str> {
    if display_width(s) <= max_width {
        return Cow::Borrowed(s);
    }

    let (budget, suffix) = if max_width > ELLIPSIS_WIDTH {
        (max_width - ELLIPSIS_WIDTH, ELLIPSIS)
    } else {
        (max_width, "")
    };

    let mut used = 0;
    let mut end = 0;
    for (idx, c) in s.char_indices() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        end = idx + c.len_utf8();
    }

    Cow::Owned(format!("{}{}", &s[..end], suffix))
}

fn is_unsafe_control(c: char) -> bool {
    c == '\u{7f}' || (c.is_ascii_control() && !matches!(c, '\t' | '\n' | '\r'))
}

/// SEC-001: Strip terminal control characters and ANSI escape sequences.
///
/// Feed text is attacker-controlled; printing it raw could move the cursor or
/// retitle the terminal. CSI (`ESC [ ... final`) and OSC (`ESC ] ... BEL|ST`)
/// sequences are removed whole, other C0 controls and DEL byte by byte. Tab,
/// newline and carriage return are kept.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(is_unsafe_control) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\x1b' {
            if !is_unsafe_control(c) {
                out.push(c);
            }
            continue;
        }

        match chars.peek() {
            Some('[') => {
                chars.next();
                // parameter and intermediate bytes run until a final byte in 0x40..=0x7e
                for p in chars.by_ref() {
                    if ('\x40'..='\x7e').contains(&p) {
                        break;
                    }
                }
            }
            Some(']') => {
                chars.next();
                while let Some(p) = chars.next() {
                    if p == '\x07' {
                        break;
                    }
                    if p == '\x1b' && chars.peek() == Some(&'\\') {
                        chars.next();
                        break;
                    }
                }
            }
            _ => {}
        }
    }

    Cow::Owned(out)
}

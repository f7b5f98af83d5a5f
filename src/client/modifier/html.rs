//! HTML entity escaping.

use std::fmt::Write as _;

use super::MessageModifier;
use crate::priority::{Facility, Severity};

/// Escapes markup characters so messages can be shown in a browser.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HtmlEscapeModifier;

impl MessageModifier for HtmlEscapeModifier {
    fn modify(&self, _facility: Facility, _severity: Severity, message: &str) -> String {
        if message.trim().is_empty() {
            return message.to_owned();
        }
        escape_html(message)
    }
}

/// Replace `<`, `>`, `"`, `'` and `&` with entities.
///
/// Printable ASCII passes through, whitespace and non-ASCII characters
/// become numeric entities, and other control characters are dropped.
///
/// ```
/// use syslog_wire::client::modifier::escape_html;
///
/// assert_eq!(escape_html("<b>\"hi\" & bye</b>"), "&lt;b&gt;&quot;hi&quot; &amp; bye&lt;/b&gt;");
/// assert_eq!(escape_html("caf\u{e9}\ttab"), "caf&#233;&#9;tab");
/// ```
#[must_use]
pub fn escape_html(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    for ch in message.chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '&' => out.push_str("&amp;"),
            ' '..='~' => out.push(ch),
            c if c.is_control() && !c.is_whitespace() => {}
            c => {
                let _ = write!(out, "&#{};", u32::from(c));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printable_ascii_is_unchanged() {
        let plain = "Disk /dev/sda1 at 93% (warn=90, crit=95)";
        assert_eq!(escape_html(plain), plain);
        assert_eq!(escape_html(&escape_html(plain)), plain);
    }

    #[test]
    fn apostrophes_and_newlines_become_numeric_entities() {
        assert_eq!(escape_html("it's\nfine"), "it&#39;s&#10;fine");
    }

    #[test]
    fn control_characters_are_dropped() {
        assert_eq!(escape_html("a\u{7}b\u{1b}c"), "abc");
    }

    #[test]
    fn blank_messages_are_left_alone() {
        assert_eq!(HtmlEscapeModifier.modify(Facility::User, Severity::Info, "  \t"), "  \t");
    }
}

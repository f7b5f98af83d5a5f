//! Outgoing message modifiers.
//!
//! A [`ModifierPipeline`] rewrites the body of every message a client sends,
//! in registration order, before the header is formatted. Modifiers that
//! append an annotation (a sequence number, digest or checksum) wrap it in a
//! configurable prefix and suffix so [`MessageModifier::verify`] can find it
//! again with [`parse_inline_modifier`].

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::priority::{Facility, Severity};

mod checksum;
mod hash;
mod html;
mod sequential;

pub use checksum::{ChecksumAlgorithm, ChecksumModifier};
pub use hash::{HashAlgorithm, HashModifier};
pub use html::{HtmlEscapeModifier, escape_html};
pub use sequential::{SequentialConfig, SequentialModifier};

/// A transform applied to the body of an outgoing message.
pub trait MessageModifier: Send + Sync {
    /// Return the rewritten message.
    fn modify(&self, facility: Facility, severity: Severity, message: &str) -> String;

    /// Check an annotation previously appended by [`modify`](Self::modify).
    ///
    /// Modifiers without a checkable annotation accept every message.
    fn verify(&self, message: &str) -> bool {
        let _ = message;
        true
    }
}

/// Text surrounding an annotation appended to a message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModifierDelimiters {
    pub prefix: String,
    pub suffix: String,
}

impl Default for ModifierDelimiters {
    fn default() -> Self { Self::new(" {", "}") }
}

impl ModifierDelimiters {
    #[must_use]
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    pub(crate) fn wrap(&self, message: &str, annotation: &str) -> String {
        let mut out =
            String::with_capacity(message.len() + self.prefix.len() + annotation.len() + self.suffix.len());
        out.push_str(message);
        out.push_str(&self.prefix);
        out.push_str(annotation);
        out.push_str(&self.suffix);
        out
    }
}

/// Split `message` into the original text and its right-most annotation.
///
/// The suffix is located first, searching from the end, then the nearest
/// prefix before it. With an empty suffix everything after the last prefix
/// is the annotation. An empty prefix is treated as a single space. Blank
/// messages and messages without the delimiters yield `None`.
///
/// ```
/// use syslog_wire::client::modifier::{ModifierDelimiters, parse_inline_modifier};
///
/// let delimiters = ModifierDelimiters::default();
/// assert_eq!(
///     parse_inline_modifier("disk full {a} {b}", &delimiters),
///     Some(("disk full {a}", "b"))
/// );
/// ```
#[must_use]
pub fn parse_inline_modifier<'a>(
    message: &'a str,
    delimiters: &ModifierDelimiters,
) -> Option<(&'a str, &'a str)> {
    if message.trim().is_empty() {
        return None;
    }
    let prefix = if delimiters.prefix.is_empty() {
        " "
    } else {
        delimiters.prefix.as_str()
    };

    if delimiters.suffix.is_empty() {
        let start = message.rfind(prefix)?;
        return Some((&message[..start], &message[start + prefix.len()..]));
    }

    let end = message.rfind(delimiters.suffix.as_str())?;
    let start = message[..end].rfind(prefix)?;
    Some((&message[..start], &message[start + prefix.len()..end]))
}

/// Ordered chain of modifiers run over every outgoing message.
#[derive(Clone, Default)]
pub struct ModifierPipeline {
    modifiers: Vec<Arc<dyn MessageModifier>>,
}

impl ModifierPipeline {
    /// Append a modifier; it runs after those already registered.
    pub fn push(&mut self, modifier: Arc<dyn MessageModifier>) { self.modifiers.push(modifier); }

    /// Remove every modifier.
    pub fn clear(&mut self) { self.modifiers.clear(); }

    #[must_use]
    pub fn len(&self) -> usize { self.modifiers.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.modifiers.is_empty() }

    /// Run `message` through every modifier in order.
    #[must_use]
    pub fn apply(&self, facility: Facility, severity: Severity, message: &str) -> String {
        self.modifiers
            .iter()
            .fold(message.to_owned(), |acc, modifier| modifier.modify(facility, severity, &acc))
    }
}

impl fmt::Debug for ModifierPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModifierPipeline")
            .field("modifiers", &self.modifiers.len())
            .finish()
    }
}

//! Structured-data codec and stream framing.
//!
//! [`StructuredMessage`] models the `MSGID STRUCTURED-DATA MSG` tail of a
//! structured syslog line and converts it to and from its wire text.
//! [`line::DelimitedCodec`] splits TCP streams into individual messages.
//!
//! ```
//! use syslog_wire::codec::StructuredMessage;
//!
//! let message = StructuredMessage::parse(r#"msgId1 [data1 a="b"] my message!!"#)?;
//! assert_eq!(message.message_id(), Some("msgId1"));
//! assert_eq!(message.param("data1", "a"), Some("b"));
//! assert_eq!(message.message(), "my message!!");
//!
//! let empty = StructuredMessage::new("msgId").serialize()?;
//! assert_eq!(empty, "msgId [0@0]");
//! # Ok::<(), syslog_wire::codec::CodecError>(())
//! ```

use std::{fmt::Write as _, str::FromStr};

use indexmap::IndexMap;

pub mod error;
pub mod line;

pub use error::CodecError;
pub use line::DelimitedCodec;

/// Token denoting an intentionally absent field.
pub const NILVALUE: &str = "-";

/// Token written in place of an empty structured-data section.
pub const EMPTY_STRUCTURED_DATA: &str = "[0@0]";

/// Parameters of one structured-data element in insertion order.
pub type SdParams = IndexMap<String, String>;

/// Structured-data elements keyed by SD-ID, in insertion order.
pub type StructuredData = IndexMap<String, SdParams>;

/// The message id, structured data and free text of a structured message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StructuredMessage {
    message_id: Option<String>,
    structured_data: StructuredData,
    message: String,
}

impl StructuredMessage {
    /// Create a message with the given id and no structured data.
    ///
    /// A blank id, or the NILVALUE token, is treated as absent.
    #[must_use]
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message_id: normalize_id(message_id.into()),
            ..Self::default()
        }
    }

    /// Assemble a message from all of its parts.
    #[must_use]
    pub fn from_parts(
        message_id: Option<String>,
        structured_data: StructuredData,
        message: impl Into<String>,
    ) -> Self {
        Self {
            message_id: message_id.and_then(normalize_id),
            structured_data,
            message: message.into(),
        }
    }

    /// Wrap text that could not be parsed as structured data.
    #[must_use]
    pub fn unparsed(text: impl Into<String>) -> Self {
        Self {
            message: text.into(),
            ..Self::default()
        }
    }

    /// Add an element with no parameters, keeping any existing one.
    #[must_use]
    pub fn with_element(mut self, sd_id: impl Into<String>) -> Self {
        self.structured_data.entry(sd_id.into()).or_default();
        self
    }

    /// Set a parameter, creating its element when needed.
    #[must_use]
    pub fn with_param(
        mut self,
        sd_id: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.structured_data
            .entry(sd_id.into())
            .or_default()
            .insert(name.into(), value.into());
        self
    }

    /// Set the free text.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    #[must_use]
    pub fn message_id(&self) -> Option<&str> { self.message_id.as_deref() }

    #[must_use]
    pub fn structured_data(&self) -> &StructuredData { &self.structured_data }

    #[must_use]
    pub fn message(&self) -> &str { &self.message }

    /// Parameters of the element `sd_id`, if present.
    #[must_use]
    pub fn element(&self, sd_id: &str) -> Option<&SdParams> { self.structured_data.get(sd_id) }

    /// Value of parameter `name` inside element `sd_id`.
    #[must_use]
    pub fn param(&self, sd_id: &str, name: &str) -> Option<&str> {
        self.element(sd_id)?.get(name).map(String::as_str)
    }

    /// Decode `MSGID [SD-ID name="value" ...]... MSG`.
    ///
    /// The structured section runs from the first `[` to the last `]`; one
    /// separator character after it is skipped and the rest is the message.
    /// Quoted values are returned as written: escape sequences produced by
    /// [`serialize`](Self::serialize) are not undone.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::MalformedHeader`] when there is no `[` or the
    /// text before it is not exactly one token, and
    /// [`CodecError::MalformedStructuredData`] when an element is not
    /// bracketed, a parameter has no `=`, or its value is not quoted or
    /// contains `=`.
    pub fn parse(text: &str) -> Result<Self, CodecError> {
        let open = text
            .find('[')
            .ok_or_else(|| CodecError::header("no structured data section"))?;
        let message_id = parse_header(&text[..open])?;

        let close = text
            .rfind(']')
            .filter(|close| *close > open)
            .ok_or_else(|| CodecError::structured("unterminated element"))?;
        let section = &text[open..=close];

        let structured_data = if section == EMPTY_STRUCTURED_DATA {
            StructuredData::new()
        } else {
            parse_elements(section)?
        };

        let mut tail = text[close + 1..].chars();
        tail.next();

        Ok(Self {
            message_id,
            structured_data,
            message: tail.as_str().to_owned(),
        })
    }

    /// Encode the message as wire text.
    ///
    /// # Errors
    ///
    /// Rejects ids and names that are empty, contain characters outside
    /// printable ASCII (33-126), or contain `=`, `]` or `"`.
    pub fn serialize(&self) -> Result<String, CodecError> {
        let mut out = String::new();
        match &self.message_id {
            Some(id) if !is_printable(id) => return Err(CodecError::InvalidMessageId(id.clone())),
            Some(id) => out.push_str(id),
            None => out.push_str(NILVALUE),
        }
        out.push(' ');

        if self.structured_data.is_empty() {
            out.push_str(EMPTY_STRUCTURED_DATA);
        }
        for (sd_id, params) in &self.structured_data {
            if !is_valid_name(sd_id) {
                return Err(CodecError::InvalidSdId(sd_id.clone()));
            }
            out.push('[');
            out.push_str(sd_id);
            for (name, value) in params {
                if !is_valid_name(name) {
                    return Err(CodecError::InvalidParamName {
                        sd_id: sd_id.clone(),
                        name: name.clone(),
                    });
                }
                let _ = write!(out, " {name}=\"");
                escape_into(&mut out, value);
                out.push('"');
            }
            out.push(']');
        }

        if !self.message.is_empty() {
            out.push(' ');
            out.push_str(nil_protect(&self.message));
        }
        Ok(out)
    }
}

impl FromStr for StructuredMessage {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> { Self::parse(s) }
}

fn normalize_id(id: String) -> Option<String> {
    let blank = id.trim().is_empty() || id == NILVALUE;
    (!blank).then_some(id)
}

fn nil_protect(text: &str) -> &str {
    if text.trim().is_empty() { NILVALUE } else { text }
}

fn is_printable(text: &str) -> bool { text.bytes().all(|b| (33..=126).contains(&b)) }

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && is_printable(name) && !name.contains(['=', ']', '"'])
}

fn escape_into(out: &mut String, value: &str) {
    for c in value.chars() {
        if matches!(c, '"' | '\\' | ']') {
            out.push('\\');
        }
        out.push(c);
    }
}

fn parse_header(header: &str) -> Result<Option<String>, CodecError> {
    let mut tokens = header.trim_end_matches(' ').split(' ');
    match (tokens.next(), tokens.next()) {
        (Some(token), None) if !token.is_empty() => Ok(normalize_id(token.to_owned())),
        (_, Some(_)) => Err(CodecError::header(format!(
            "expected a single message id token, found {header:?}"
        ))),
        _ => Err(CodecError::header("missing message id")),
    }
}

fn parse_elements(section: &str) -> Result<StructuredData, CodecError> {
    let mut cursor = Cursor::new(section);
    let mut elements = StructuredData::new();
    while !cursor.is_empty() {
        if cursor.bump() != Some('[') {
            return Err(CodecError::structured(format!(
                "expected '[' at {:?}",
                cursor.rest()
            )));
        }
        let (sd_id, params) = parse_element(&mut cursor)?;
        elements.insert(sd_id, params);
    }
    Ok(elements)
}

fn parse_element(cursor: &mut Cursor<'_>) -> Result<(String, SdParams), CodecError> {
    let sd_id = cursor.take_until(|c| c == ' ' || c == ']');
    if sd_id.is_empty() {
        return Err(CodecError::structured("empty SD-ID"));
    }
    let mut params = SdParams::new();
    loop {
        match cursor.bump() {
            Some(']') => return Ok((sd_id.to_owned(), params)),
            Some(' ') => {}
            _ => return Err(CodecError::structured(format!("unterminated element {sd_id:?}"))),
        }
        if cursor.peek() == Some(']') {
            continue;
        }
        let name = cursor.take_until(|c| matches!(c, '=' | ' ' | ']'));
        if cursor.bump() != Some('=') {
            return Err(CodecError::structured(format!(
                "parameter {name:?} in {sd_id:?} has no '='"
            )));
        }
        if name.is_empty() {
            return Err(CodecError::structured(format!("empty parameter name in {sd_id:?}")));
        }
        let value = parse_quoted(cursor)
            .map_err(|reason| CodecError::structured(format!("{sd_id}/{name}: {reason}")))?;
        params.insert(name.to_owned(), value);
    }
}

fn parse_quoted(cursor: &mut Cursor<'_>) -> Result<String, &'static str> {
    if cursor.bump() != Some('"') {
        return Err("value is not quoted");
    }
    let mut value = String::new();
    loop {
        match cursor.bump() {
            Some('"') => break,
            Some('=') => return Err("value contains '='"),
            Some('\\') => {
                value.push('\\');
                if let Some(c @ ('"' | '\\' | ']')) = cursor.peek() {
                    cursor.bump();
                    value.push(c);
                }
            }
            Some(c) => value.push(c),
            None => return Err("unterminated quoted value"),
        }
    }
    match cursor.peek() {
        Some(' ' | ']') => Ok(value),
        _ => Err("unexpected text after closing quote"),
    }
}

struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self { Self { text, pos: 0 } }

    fn rest(&self) -> &'a str { &self.text[self.pos..] }

    fn is_empty(&self) -> bool { self.pos >= self.text.len() }

    fn peek(&self) -> Option<char> { self.rest().chars().next() }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn take_until(&mut self, stop: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if stop(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        &self.text[start..self.pos]
    }
}

//! Parsed representations of received syslog messages.
//!
//! [`SyslogEvent::parse`] classifies a datagram or line as legacy or
//! structured by looking at the character after the first `>`: a digit is
//! taken to be the structured `VERSION` field. The check is a heuristic and
//! a raw message whose text starts with a digit is parsed as structured; the
//! structured parser is permissive enough to cope with that.

use bytes::Bytes;
use chrono::{DateTime, FixedOffset, Local};

use crate::{
    codec::{NILVALUE, StructuredData, StructuredMessage},
    metrics,
    priority::{self, DEFAULT_PRIORITY, Facility, Severity},
};

pub mod timestamp;

/// Returns `true` when `payload` looks like a structured message.
#[must_use]
pub fn is_structured(payload: &[u8]) -> bool {
    payload
        .iter()
        .position(|b| *b == b'>')
        .and_then(|index| payload.get(index + 1))
        .is_some_and(u8::is_ascii_digit)
}

/// A received message with its legacy header fields decoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawEvent {
    raw: Bytes,
    facility: Facility,
    severity: Severity,
    date: DateTime<FixedOffset>,
    host: Option<String>,
    message: String,
}

impl RawEvent {
    /// Parse `<PRI>MMM dd HH:mm:ss HOST MESSAGE`.
    ///
    /// Missing or invalid parts fall back to defaults: priority
    /// `user.notice`, the current time, and no host.
    #[must_use]
    pub fn parse(raw: impl Into<Bytes>) -> Self { Self::parse_at(raw, Local::now()) }

    /// Parse as [`RawEvent::parse`] with an explicit reference time.
    #[must_use]
    pub fn parse_at(raw: impl Into<Bytes>, now: DateTime<Local>) -> Self {
        let raw = raw.into();
        let text = decode_text(&raw);
        let (facility, severity, rest) = take_priority(&text);

        let (date, rest) =
            timestamp::parse_legacy(rest, now).unwrap_or_else(|| (now.fixed_offset(), rest));
        let (host, message) = match rest.split_once(' ') {
            Some((host, message)) => (non_nil(host.trim()), message),
            None => (None, rest),
        };

        Self {
            facility,
            severity,
            date,
            host,
            message: message.to_owned(),
            raw,
        }
    }

    /// The bytes exactly as received.
    #[must_use]
    pub fn raw(&self) -> &Bytes { &self.raw }

    #[must_use]
    pub fn facility(&self) -> Facility { self.facility }

    #[must_use]
    pub fn severity(&self) -> Severity { self.severity }

    /// The packed `facility * 8 + severity` value.
    #[must_use]
    pub fn priority(&self) -> u8 { priority::encode(self.facility, self.severity) }

    #[must_use]
    pub fn date(&self) -> DateTime<FixedOffset> { self.date }

    #[must_use]
    pub fn host(&self) -> Option<&str> { self.host.as_deref() }

    /// Text remaining once the header has been stripped.
    #[must_use]
    pub fn message(&self) -> &str { &self.message }
}

/// A received message with structured header fields and payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructuredEvent {
    base: RawEvent,
    version: Option<String>,
    app_name: Option<String>,
    proc_id: Option<String>,
    structured: StructuredMessage,
}

impl StructuredEvent {
    /// Parse `<PRI>VERSION TIMESTAMP HOST APP PROCID MSGID SD MSG`.
    ///
    /// Fields are consumed left to right up to the next space; parsing stops
    /// at the first field with no following space and the remainder becomes
    /// the message. A payload whose tail is not valid structured data is
    /// kept whole as the message with no id or elements.
    #[must_use]
    pub fn parse(raw: impl Into<Bytes>) -> Self { Self::parse_at(raw, Local::now()) }

    /// Parse as [`StructuredEvent::parse`] with an explicit reference time.
    #[must_use]
    pub fn parse_at(raw: impl Into<Bytes>, now: DateTime<Local>) -> Self {
        let raw = raw.into();
        let text = decode_text(&raw);
        let (facility, severity, rest) = take_priority(&text);

        let mut fields = Fields::new(rest);
        let version = fields.next_token().map(str::to_owned);
        let mut date = now.fixed_offset();
        let mut host = None;
        let mut app_name = None;
        let mut proc_id = None;

        if let Some(stamp) = fields.peek_token() {
            if stamp == NILVALUE {
                fields.next_token();
            } else if let Some(parsed) = timestamp::parse_structured(stamp) {
                date = parsed;
                fields.next_token();
            } else if let Some((parsed, remainder)) = timestamp::parse_legacy(fields.rest, now) {
                date = parsed;
                fields.rest = remainder;
            }
            if let Some(token) = fields.next_token() {
                host = non_nil(token);
                if let Some(token) = fields.next_token() {
                    app_name = non_nil(token);
                    if let Some(token) = fields.next_token() {
                        proc_id = non_nil(token);
                    }
                }
            }
        }

        let message = fields.rest.to_owned();
        let structured = StructuredMessage::parse(&message).unwrap_or_else(|err| {
            tracing::trace!(error = %err, "structured payload fell back to raw text");
            metrics::inc_parse_fallbacks();
            StructuredMessage::unparsed(message.clone())
        });

        Self {
            base: RawEvent {
                raw,
                facility,
                severity,
                date,
                host,
                message,
            },
            version,
            app_name,
            proc_id,
            structured,
        }
    }

    /// Header fields shared with legacy events.
    #[must_use]
    pub fn base(&self) -> &RawEvent { &self.base }

    #[must_use]
    pub fn version(&self) -> Option<&str> { self.version.as_deref() }

    #[must_use]
    pub fn app_name(&self) -> Option<&str> { self.app_name.as_deref() }

    #[must_use]
    pub fn proc_id(&self) -> Option<&str> { self.proc_id.as_deref() }

    /// The decoded `MSGID SD MSG` tail.
    #[must_use]
    pub fn structured_message(&self) -> &StructuredMessage { &self.structured }

    #[must_use]
    pub fn message_id(&self) -> Option<&str> { self.structured.message_id() }

    #[must_use]
    pub fn structured_data(&self) -> &StructuredData { self.structured.structured_data() }
}

/// Either kind of parsed event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyslogEvent {
    Raw(RawEvent),
    Structured(StructuredEvent),
}

impl SyslogEvent {
    /// Parse a received payload, classifying it when `use_structured_data`
    /// is enabled and treating everything as legacy otherwise.
    #[must_use]
    pub fn parse(raw: impl Into<Bytes>, use_structured_data: bool) -> Self {
        let raw = raw.into();
        if use_structured_data && is_structured(&raw) {
            Self::Structured(StructuredEvent::parse(raw))
        } else {
            Self::Raw(RawEvent::parse(raw))
        }
    }

    /// Legacy header view, available for both variants.
    #[must_use]
    pub fn raw_event(&self) -> &RawEvent {
        match self {
            Self::Raw(event) => event,
            Self::Structured(event) => event.base(),
        }
    }

    #[must_use]
    pub fn as_structured(&self) -> Option<&StructuredEvent> {
        match self {
            Self::Structured(event) => Some(event),
            Self::Raw(_) => None,
        }
    }

    #[must_use]
    pub fn facility(&self) -> Facility { self.raw_event().facility() }

    #[must_use]
    pub fn severity(&self) -> Severity { self.raw_event().severity() }

    #[must_use]
    pub fn date(&self) -> DateTime<FixedOffset> { self.raw_event().date() }

    #[must_use]
    pub fn host(&self) -> Option<&str> { self.raw_event().host() }

    #[must_use]
    pub fn message(&self) -> &str { self.raw_event().message() }
}

impl From<RawEvent> for SyslogEvent {
    fn from(event: RawEvent) -> Self { Self::Raw(event) }
}

impl From<StructuredEvent> for SyslogEvent {
    fn from(event: StructuredEvent) -> Self { Self::Structured(event) }
}

fn decode_text(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_end_matches(['\n', '\r', '\0'])
        .to_owned()
}

fn take_priority(text: &str) -> (Facility, Severity, &str) {
    let parsed = text.strip_prefix('<').and_then(|body| {
        let end = body.find('>').filter(|end| *end <= 3)?;
        let value = body[..end].parse::<u8>().ok()?;
        let (facility, severity) = priority::decode(value)?;
        Some((facility, severity, &body[end + 1..]))
    });
    parsed.unwrap_or_else(|| {
        let (facility, severity) = priority::decode(DEFAULT_PRIORITY)
            .unwrap_or((Facility::User, Severity::Notice));
        (facility, severity, text)
    })
}

fn non_nil(token: &str) -> Option<String> {
    (!token.is_empty() && token != NILVALUE).then(|| token.to_owned())
}

struct Fields<'a> {
    rest: &'a str,
}

impl<'a> Fields<'a> {
    fn new(rest: &'a str) -> Self { Self { rest } }

    fn peek_token(&self) -> Option<&'a str> {
        self.rest.split_once(' ').map(|(token, _)| token)
    }

    fn next_token(&mut self) -> Option<&'a str> {
        let (token, rest) = self.rest.split_once(' ')?;
        self.rest = rest;
        Some(token.trim())
    }
}

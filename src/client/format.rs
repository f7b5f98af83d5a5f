//! Header formatting for outgoing messages.
//!
//! A message longer than `max_message_length` is either truncated or split
//! into several frames that each repeat the header.

use chrono::{DateTime, Local, SecondsFormat};

use super::{ClientConfig, ClientError};
use crate::{
    codec::{NILVALUE, StructuredMessage},
    error::ConfigError,
    priority::{self, Severity},
};

/// Format a plain message body with the header selected by `config`.
///
/// # Errors
///
/// See [`format_structured`] and [`format_legacy`].
pub(crate) fn format_message(
    config: &ClientConfig,
    severity: Severity,
    body: &str,
    now: DateTime<Local>,
) -> Result<Vec<String>, ClientError> {
    if config.use_structured_data {
        format_structured(config, severity, &StructuredMessage::unparsed(body), now)
    } else {
        Ok(format_legacy(config, severity, body, now)?)
    }
}

/// `<PRI>MMM dd HH:MM:SS HOST IDENT: BODY`, omitting disabled fields.
///
/// # Errors
///
/// Returns [`ConfigError::MessageTooShort`] when a split is needed but the
/// header leaves no room for the body.
pub(crate) fn format_legacy(
    config: &ClientConfig,
    severity: Severity,
    body: &str,
    now: DateTime<Local>,
) -> Result<Vec<String>, ConfigError> {
    let mut header = format!("<{}>", priority::encode(config.facility, severity));
    if config.send_local_timestamp {
        header.push_str(&now.format("%b %e %H:%M:%S ").to_string());
    }
    if config.send_local_name {
        header.push_str(&config.local_name);
        header.push(' ');
    }
    if !config.ident.is_empty() {
        header.push_str(&config.ident);
        header.push_str(": ");
    }
    frame(config, &header, body)
}

/// `<PRI>1 TIMESTAMP HOST APP PROCID MSGID SD MSG`.
///
/// # Errors
///
/// Returns [`ClientError::Codec`] when the structured message cannot be
/// serialized, or a split error as [`format_legacy`].
pub(crate) fn format_structured(
    config: &ClientConfig,
    severity: Severity,
    message: &StructuredMessage,
    now: DateTime<Local>,
) -> Result<Vec<String>, ClientError> {
    let timestamp = if config.send_local_timestamp {
        now.to_rfc3339_opts(SecondsFormat::Millis, false)
    } else {
        NILVALUE.to_owned()
    };
    let host = if config.send_local_name && !config.local_name.is_empty() {
        config.local_name.as_str()
    } else {
        NILVALUE
    };
    let app = if config.ident.is_empty() {
        NILVALUE
    } else {
        config.ident.as_str()
    };
    let header = format!(
        "<{}>1 {timestamp} {host} {app} {} ",
        priority::encode(config.facility, severity),
        std::process::id(),
    );
    Ok(frame(config, &header, &message.serialize()?)?)
}

fn frame(config: &ClientConfig, header: &str, body: &str) -> Result<Vec<String>, ConfigError> {
    let max = config.max_message_length;
    if header.len() + body.len() <= max {
        return Ok(vec![format!("{header}{body}")]);
    }
    if config.truncate_message {
        let mut message = format!("{header}{body}");
        message.truncate(char_floor(&message, max));
        return Ok(vec![message]);
    }
    split(config, header, body)
}

/// Cut `body` into chunks that fit after `header`. Every chunk but the first
/// opens with the begin text; every chunk but the last closes with the end
/// text.
fn split(config: &ClientConfig, header: &str, body: &str) -> Result<Vec<String>, ConfigError> {
    let available = config.max_message_length.saturating_sub(header.len());
    let mut frames = Vec::new();
    let mut rest = body;
    while !rest.is_empty() {
        let begin = if frames.is_empty() {
            ""
        } else {
            config.split_message_begin_text.as_str()
        };
        let room = available.saturating_sub(begin.len());
        let end = if rest.len() > room {
            config.split_message_end_text.as_str()
        } else {
            ""
        };
        let cut = char_floor(rest, room.saturating_sub(end.len()));
        if cut == 0 {
            return Err(ConfigError::MessageTooShort {
                max_message_length: config.max_message_length,
                header: header.len(),
            });
        }
        let (chunk, tail) = rest.split_at(cut);
        frames.push(format!("{header}{begin}{chunk}{end}"));
        rest = tail;
    }
    Ok(frames)
}

fn char_floor(text: &str, index: usize) -> usize {
    let mut end = index.min(text.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    end
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rstest::{fixture, rstest};

    use super::*;
    use crate::priority::Facility;

    #[fixture]
    fn now() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 3, 5, 7, 8, 9)
            .single()
            .expect("unambiguous local time")
    }

    fn config() -> ClientConfig {
        ClientConfig::default()
            .facility(Facility::Local0)
            .local_name("web01")
            .ident("nginx")
    }

    #[rstest]
    fn legacy_header_carries_all_fields(now: DateTime<Local>) {
        let lines = format_legacy(&config(), Severity::Error, "upstream timed out", now).expect("format");
        assert_eq!(lines, ["<131>Mar  5 07:08:09 web01 nginx: upstream timed out"]);
    }

    #[rstest]
    fn legacy_header_omits_disabled_fields(now: DateTime<Local>) {
        let config = config().send_local_timestamp(false).send_local_name(false).ident("");
        assert_eq!(format_legacy(&config, Severity::Info, "hi", now).expect("format"), ["<134>hi"]);
    }

    #[rstest]
    fn structured_header_wraps_plain_text(now: DateTime<Local>) {
        let config = config().use_structured_data(true);
        let lines = format_message(&config, Severity::Notice, "started", now).expect("format");
        let timestamp = now.to_rfc3339_opts(SecondsFormat::Millis, false);
        assert_eq!(
            lines,
            [format!("<133>1 {timestamp} web01 nginx {} - [0@0] started", std::process::id())]
        );
    }

    #[rstest]
    fn structured_header_serializes_elements(now: DateTime<Local>) {
        let config = config().send_local_timestamp(false).send_local_name(false);
        let message = StructuredMessage::new("ID47")
            .with_param("exampleSDID@32473", "iut", "3")
            .with_message("event");
        let lines = format_structured(&config, Severity::Warning, &message, now).expect("format");
        assert_eq!(
            lines,
            [format!("<132>1 - - nginx {} ID47 [exampleSDID@32473 iut=\"3\"] event", std::process::id())]
        );
    }

    #[rstest]
    fn structured_header_rejects_invalid_ids(now: DateTime<Local>) {
        let message = StructuredMessage::default().with_element("bad id");
        assert!(format_structured(&config(), Severity::Info, &message, now).is_err());
    }

    #[rstest]
    fn truncation_respects_char_boundaries(now: DateTime<Local>) {
        let config = config()
            .send_local_timestamp(false)
            .send_local_name(false)
            .ident("")
            .truncate_message(8);
        let format = |body| format_legacy(&config, Severity::Info, body, now).expect("format");
        assert_eq!(format("h\u{e9}llo"), ["<134>h\u{e9}"]);
        assert_eq!(format("\u{e9}\u{e9}\u{e9}"), ["<134>\u{e9}"]);
    }

    #[rstest]
    fn long_messages_split_with_markers(now: DateTime<Local>) {
        let config = config()
            .send_local_timestamp(false)
            .send_local_name(false)
            .ident("")
            .max_message_length(12)
            .split_message_text("<", ">");
        let lines = format_legacy(&config, Severity::Info, "abcdefghijklm", now).expect("format");
        assert_eq!(lines, ["<134>abcdef>", "<134><ghijk>", "<134><lm"]);
        assert!(lines.iter().all(|line| line.len() <= 12));
    }

    #[rstest]
    fn split_keeps_multibyte_characters_whole(now: DateTime<Local>) {
        let config = config()
            .send_local_timestamp(false)
            .send_local_name(false)
            .ident("")
            .max_message_length(8)
            .split_message_text("", "");
        let lines = format_legacy(&config, Severity::Info, "\u{e9}\u{e9}\u{e9}", now).expect("format");
        assert_eq!(lines, ["<134>\u{e9}", "<134>\u{e9}", "<134>\u{e9}"]);
    }

    #[rstest]
    fn split_without_room_is_rejected(now: DateTime<Local>) {
        let config = config().send_local_timestamp(false).max_message_length(10);
        let err = format_legacy(&config, Severity::Info, "body", now).expect_err("no room");
        assert!(matches!(err, ConfigError::MessageTooShort { header: 18, .. }), "{err:?}");
    }
}

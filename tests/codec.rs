//! Tests for the structured-data codec and event parsing.

use chrono::{Local, TimeZone, Timelike};
use proptest::{collection::vec, prelude::*};
use rstest::rstest;
use syslog_wire::{
    CodecError,
    StructuredMessage,
    SyslogEvent,
    codec::{SdParams, StructuredData},
    event::{RawEvent, StructuredEvent},
    priority::{Facility, Severity},
};

#[test]
fn parses_documented_example() {
    let message = StructuredMessage::parse(r#"msgId1 [data1 a="b"] my message!!"#).expect("parse");
    assert_eq!(message.message_id(), Some("msgId1"));
    assert_eq!(message.structured_data().len(), 1);
    assert_eq!(message.param("data1", "a"), Some("b"));
    assert_eq!(message.message(), "my message!!");
}

#[test]
fn empty_structured_data_serializes_as_reserved_token() {
    assert_eq!(StructuredMessage::new("msgId").serialize().expect("serialize"), "msgId [0@0]");
    let with_text = StructuredMessage::new("msgId").with_message("hello");
    let wire = with_text.serialize().expect("serialize");
    assert_eq!(wire, "msgId [0@0] hello");
    assert!(!wire.contains("[]"));
}

#[test]
fn missing_id_serializes_as_nilvalue() {
    let message = StructuredMessage::from_parts(None, StructuredData::new(), "text");
    assert_eq!(message.serialize().expect("serialize"), "- [0@0] text");
}

#[test]
fn special_characters_in_values_are_escaped() {
    let message = StructuredMessage::new("id").with_param("origin", "path", r#"C:\logs\"a"]"#);
    let wire = message.serialize().expect("serialize");
    assert_eq!(wire, r#"id [origin path="C:\\logs\\\"a\"\]"]"#);
}

#[test]
fn escaped_values_are_parsed_verbatim() {
    let parsed = StructuredMessage::parse(r#"id [origin path="C:\\logs\"a\]"] text"#).expect("parse");
    assert_eq!(parsed.param("origin", "path"), Some(r#"C:\\logs\"a\]"#));
    assert_eq!(parsed.message(), "text");
}

#[test]
fn elements_keep_caller_order() {
    let wire = StructuredMessage::new("id")
        .with_param("origin", "ip", "10.0.0.1")
        .with_param("meta", "sequenceId", "7")
        .with_param("meta", "language", "en")
        .serialize()
        .expect("serialize");
    assert_eq!(
        wire,
        r#"id [origin ip="10.0.0.1"][meta sequenceId="7" language="en"]"#
    );
    let parsed = StructuredMessage::parse(&wire).expect("parse");
    let ids: Vec<&str> = parsed.structured_data().keys().map(String::as_str).collect();
    assert_eq!(ids, ["origin", "meta"]);
}

#[rstest]
#[case::unquoted_value("id [data a=b] text")]
#[case::missing_equals("id [data a] text")]
#[case::unterminated("id [data a=\"b\"")]
#[case::trailing_garbage("id [data a=\"b\"x] text")]
#[case::equals_in_value(r#"id [x a="b=c"]"#)]
fn malformed_structured_data_is_rejected(#[case] input: &str) {
    assert!(matches!(
        StructuredMessage::parse(input),
        Err(CodecError::MalformedStructuredData(_))
    ));
}

#[rstest]
#[case::no_bracket("msgId just text")]
#[case::two_tokens("msg id [data a=\"b\"]")]
#[case::no_token("[data a=\"b\"]")]
fn malformed_header_is_rejected(#[case] input: &str) {
    assert!(matches!(
        StructuredMessage::parse(input),
        Err(CodecError::MalformedHeader(_))
    ));
}

#[rstest]
#[case::empty_sd_id("", "a")]
#[case::space_in_sd_id("my data", "a")]
#[case::quote_in_name("data", "a\"b")]
#[case::control_in_name("data", "a\u{7}")]
#[case::non_ascii_name("data", "caf\u{e9}")]
fn invalid_names_are_rejected_on_serialize(#[case] sd_id: &str, #[case] name: &str) {
    let err = StructuredMessage::new("id")
        .with_param(sd_id, name, "v")
        .serialize()
        .expect_err("invalid name must be rejected");
    assert!(!err.is_parse_error());
}

fn message_strategy() -> impl Strategy<Value = StructuredMessage> {
    let id = proptest::option::of("[A-Za-z0-9._@]{1,12}");
    // Escapable characters are excluded: parsing does not undo escapes.
    let params = vec(("[a-z][a-z0-9_]{0,6}", "[A-Za-z0-9 ._:/@#!?'(){}-]{0,16}"), 0..4)
        .prop_map(|pairs| pairs.into_iter().collect::<SdParams>());
    let elements = vec(("[a-z][a-z0-9.]{0,8}", params), 0..4)
        .prop_map(|pairs| pairs.into_iter().collect::<StructuredData>());
    let text = "[A-Za-z0-9 .,:!?\\[(){}-]{0,40}".prop_filter("blank text is written as NILVALUE", |text| {
        text.is_empty() || !text.trim().is_empty()
    });
    (id, elements, text).prop_map(|(id, elements, text)| StructuredMessage::from_parts(id, elements, text))
}

proptest! {
    #[test]
    fn serialize_then_parse_is_identity(message in message_strategy()) {
        let wire = message.serialize().expect("generated messages are valid");
        prop_assert!(!wire.contains("[]"));
        let parsed = StructuredMessage::parse(&wire).expect("serialized text parses");
        prop_assert_eq!(parsed, message);
    }
}

#[test]
fn legacy_event_exposes_header_fields() {
    let now = Local.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).single().expect("local time");
    let event = RawEvent::parse_at(&b"<34>Oct 11 22:14:15 mymachine su: 'su root' failed"[..], now);
    assert_eq!(event.facility(), Facility::Auth);
    assert_eq!(event.severity(), Severity::Critical);
    assert_eq!(event.priority(), 34);
    assert_eq!(event.host(), Some("mymachine"));
    assert_eq!(event.message(), "su: 'su root' failed");
    assert_eq!(event.date().hour(), 22);
}

#[test]
fn missing_priority_defaults_to_user_notice() {
    let event = RawEvent::parse(&b"no header here"[..]);
    assert_eq!(event.priority(), 13);
    assert_eq!(event.facility(), Facility::User);
    assert_eq!(event.severity(), Severity::Notice);
}

#[test]
fn structured_event_exposes_all_fields() {
    let event = StructuredEvent::parse(
        &br#"<165>1 2003-10-11T22:14:15.003Z mymachine.example.com evntslog - ID47 [exampleSDID@32473 iut="3" eventSource="Application"] An application event"#[..],
    );
    assert_eq!(event.version(), Some("1"));
    assert_eq!(event.base().host(), Some("mymachine.example.com"));
    assert_eq!(event.app_name(), Some("evntslog"));
    assert_eq!(event.proc_id(), None);
    assert_eq!(event.message_id(), Some("ID47"));
    assert_eq!(
        event.structured_message().param("exampleSDID@32473", "eventSource"),
        Some("Application")
    );
    assert_eq!(event.structured_message().message(), "An application event");
    assert_eq!(event.base().date().timestamp_subsec_millis(), 3);
}

#[test]
fn unparseable_structured_tail_falls_back_to_plain_text() {
    let event = StructuredEvent::parse(&b"<13>1 - host app 42 not structured at all"[..]);
    assert_eq!(event.message_id(), None);
    assert!(event.structured_data().is_empty());
    assert_eq!(event.structured_message().message(), "not structured at all");
}

#[rstest]
#[case(&b"<13>1 - host app - - [0@0] hi"[..], true)]
#[case(&b"<13>Jan  1 00:00:00 host hi"[..], false)]
fn classification_looks_after_priority(#[case] payload: &'static [u8], #[case] structured: bool) {
    let event = SyslogEvent::parse(payload, true);
    assert_eq!(event.as_structured().is_some(), structured);
    assert!(SyslogEvent::parse(payload, false).as_structured().is_none());
}

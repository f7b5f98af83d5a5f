//! Timestamp grammars found in syslog headers.
//!
//! Structured messages carry an RFC 3339 timestamp with a mandatory offset;
//! legacy messages carry `MMM dd HH:mm:ss` in the sender's local time with no
//! year, so the receiver's current year is assumed.

use chrono::{DateTime, Datelike, FixedOffset, Local, NaiveDate, NaiveTime, TimeZone};

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Parse an RFC 3339 token such as `2003-10-11T22:14:15.003Z`.
#[must_use]
pub fn parse_structured(token: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(token).ok()
}

/// Parse a leading `MMM dd HH:mm:ss ` stamp, returning it with the text that
/// follows the single separating space.
///
/// Both `Oct  1` and `Oct 1` day forms are accepted.
#[must_use]
pub fn parse_legacy(text: &str, now: DateTime<Local>) -> Option<(DateTime<FixedOffset>, &str)> {
    let month = MONTHS.iter().position(|m| text.get(..3) == Some(*m))?;
    let rest = text.get(3..)?.strip_prefix(' ')?;
    let rest = rest.strip_prefix(' ').unwrap_or(rest);
    let (day, rest) = rest.split_once(' ')?;
    if day.is_empty() || day.len() > 2 {
        return None;
    }
    let day: u32 = day.parse().ok()?;
    let time = NaiveTime::parse_from_str(rest.get(..8)?, "%H:%M:%S").ok()?;
    let rest = &rest[8..];
    let rest = rest.strip_prefix(' ').unwrap_or(rest);

    let month = u32::try_from(month + 1).ok()?;
    let date = NaiveDate::from_ymd_opt(now.year(), month, day)?;
    let stamp = Local.from_local_datetime(&date.and_time(time)).earliest()?;
    Some((stamp.fixed_offset(), rest))
}

//! Syslog facility and severity codes.
//!
//! The priority prefix `<PRI>` packs both values as `facility * 8 + severity`.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Originating subsystem of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Facility {
    Kern = 0,
    User = 1,
    Mail = 2,
    Daemon = 3,
    Auth = 4,
    Syslog = 5,
    Lpr = 6,
    News = 7,
    Uucp = 8,
    Cron = 9,
    AuthPriv = 10,
    Ftp = 11,
    Ntp = 12,
    Audit = 13,
    Alert = 14,
    Clock = 15,
    Local0 = 16,
    Local1 = 17,
    Local2 = 18,
    Local3 = 19,
    Local4 = 20,
    Local5 = 21,
    Local6 = 22,
    Local7 = 23,
}

const FACILITIES: [Facility; 24] = [
    Facility::Kern,
    Facility::User,
    Facility::Mail,
    Facility::Daemon,
    Facility::Auth,
    Facility::Syslog,
    Facility::Lpr,
    Facility::News,
    Facility::Uucp,
    Facility::Cron,
    Facility::AuthPriv,
    Facility::Ftp,
    Facility::Ntp,
    Facility::Audit,
    Facility::Alert,
    Facility::Clock,
    Facility::Local0,
    Facility::Local1,
    Facility::Local2,
    Facility::Local3,
    Facility::Local4,
    Facility::Local5,
    Facility::Local6,
    Facility::Local7,
];

impl Facility {
    /// Numeric facility code.
    #[must_use]
    pub const fn code(self) -> u8 { self as u8 }

    /// Lowercase facility name as used in configuration files.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Kern => "kern",
            Self::User => "user",
            Self::Mail => "mail",
            Self::Daemon => "daemon",
            Self::Auth => "auth",
            Self::Syslog => "syslog",
            Self::Lpr => "lpr",
            Self::News => "news",
            Self::Uucp => "uucp",
            Self::Cron => "cron",
            Self::AuthPriv => "authpriv",
            Self::Ftp => "ftp",
            Self::Ntp => "ntp",
            Self::Audit => "audit",
            Self::Alert => "alert",
            Self::Clock => "clock",
            Self::Local0 => "local0",
            Self::Local1 => "local1",
            Self::Local2 => "local2",
            Self::Local3 => "local3",
            Self::Local4 => "local4",
            Self::Local5 => "local5",
            Self::Local6 => "local6",
            Self::Local7 => "local7",
        }
    }
}

impl Default for Facility {
    fn default() -> Self { Self::User }
}

impl fmt::Display for Facility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl TryFrom<u8> for Facility {
    type Error = ConfigError;

    fn try_from(code: u8) -> Result<Self, ConfigError> {
        FACILITIES
            .get(usize::from(code))
            .copied()
            .ok_or(ConfigError::CodeOutOfRange {
                kind: "facility",
                code,
            })
    }
}

impl FromStr for Facility {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        let name = match name.as_str() {
            "security" => "auth",
            "cron2" => "clock",
            other => other,
        };
        FACILITIES
            .iter()
            .copied()
            .find(|facility| facility.as_str() == name)
            .ok_or_else(|| ConfigError::UnknownFacility(s.to_owned()))
    }
}

/// Importance of a message; lower codes are more severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Severity {
    Emergency = 0,
    Alert = 1,
    Critical = 2,
    Error = 3,
    Warning = 4,
    Notice = 5,
    Info = 6,
    Debug = 7,
}

const SEVERITIES: [Severity; 8] = [
    Severity::Emergency,
    Severity::Alert,
    Severity::Critical,
    Severity::Error,
    Severity::Warning,
    Severity::Notice,
    Severity::Info,
    Severity::Debug,
];

impl Severity {
    /// Numeric severity code.
    #[must_use]
    pub const fn code(self) -> u8 { self as u8 }

    /// All severities ordered from most to least severe.
    #[must_use]
    pub const fn all() -> [Self; 8] { SEVERITIES }

    /// Uppercase level name, e.g. `WARN`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Emergency => "EMERGENCY",
            Self::Alert => "ALERT",
            Self::Critical => "CRITICAL",
            Self::Error => "ERROR",
            Self::Warning => "WARN",
            Self::Notice => "NOTICE",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl TryFrom<u8> for Severity {
    type Error = ConfigError;

    fn try_from(code: u8) -> Result<Self, ConfigError> {
        SEVERITIES
            .get(usize::from(code))
            .copied()
            .ok_or(ConfigError::CodeOutOfRange {
                kind: "severity",
                code,
            })
    }
}

impl FromStr for Severity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "emergency" | "emerg" | "panic" => Ok(Self::Emergency),
            "alert" => Ok(Self::Alert),
            "critical" | "crit" => Ok(Self::Critical),
            "error" | "err" => Ok(Self::Error),
            "warning" | "warn" => Ok(Self::Warning),
            "notice" => Ok(Self::Notice),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            _ => Err(ConfigError::UnknownSeverity(s.to_owned())),
        }
    }
}

/// Priority used when a message carries no valid `<PRI>` prefix (`user.notice`).
pub const DEFAULT_PRIORITY: u8 = 13;

/// Combine a facility and severity into a priority value.
#[must_use]
pub const fn encode(facility: Facility, severity: Severity) -> u8 {
    facility.code() * 8 + severity.code()
}

/// Split a priority value into facility and severity.
///
/// Returns `None` when the facility part exceeds `local7`.
#[must_use]
pub fn decode(priority: u8) -> Option<(Facility, Severity)> {
    let facility = Facility::try_from(priority >> 3).ok()?;
    let severity = Severity::try_from(priority & 0x07).ok()?;
    Some((facility, severity))
}

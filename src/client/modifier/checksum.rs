//! CRC32 and Adler-32 checksums appended in hexadecimal.

use std::{
    str::FromStr,
    sync::{Mutex, PoisonError},
};

use adler2::Adler32;
use serde::{Deserialize, Serialize};

use super::{MessageModifier, ModifierDelimiters, parse_inline_modifier};
use crate::{
    error::ConfigError,
    priority::{Facility, Severity},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    #[default]
    Crc32,
    Adler32,
}

impl FromStr for ChecksumAlgorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "crc32" | "crc-32" => Ok(Self::Crc32),
            "adler32" | "adler-32" => Ok(Self::Adler32),
            _ => Err(ConfigError::UnknownAlgorithm(s.to_owned())),
        }
    }
}

enum Running {
    Crc32(crc32fast::Hasher),
    Adler32(Adler32),
}

impl Running {
    fn new(algorithm: ChecksumAlgorithm) -> Self {
        match algorithm {
            ChecksumAlgorithm::Crc32 => Self::Crc32(crc32fast::Hasher::new()),
            ChecksumAlgorithm::Adler32 => Self::Adler32(Adler32::new()),
        }
    }

    fn update(&mut self, bytes: &[u8]) {
        match self {
            Self::Crc32(hasher) => hasher.update(bytes),
            Self::Adler32(hasher) => hasher.write_slice(bytes),
        }
    }

    fn value(&self) -> u32 {
        match self {
            Self::Crc32(hasher) => hasher.clone().finalize(),
            Self::Adler32(hasher) => hasher.checksum(),
        }
    }
}

/// Appends a checksum of the message body as uppercase hex.
///
/// A continuous checksum folds every message sent so far into the value,
/// so only per-message checksums can be checked with
/// [`MessageModifier::verify`].
pub struct ChecksumModifier {
    algorithm: ChecksumAlgorithm,
    delimiters: ModifierDelimiters,
    running: Option<Mutex<Running>>,
}

impl ChecksumModifier {
    /// Per-message checksum.
    #[must_use]
    pub fn new(algorithm: ChecksumAlgorithm) -> Self {
        Self {
            algorithm,
            delimiters: ModifierDelimiters::default(),
            running: None,
        }
    }

    /// Checksum carried across every message this modifier sees.
    #[must_use]
    pub fn continuous(algorithm: ChecksumAlgorithm) -> Self {
        Self {
            running: Some(Mutex::new(Running::new(algorithm))),
            ..Self::new(algorithm)
        }
    }

    #[must_use]
    pub fn delimiters(mut self, delimiters: ModifierDelimiters) -> Self {
        self.delimiters = delimiters;
        self
    }

    #[must_use]
    pub fn is_continuous(&self) -> bool { self.running.is_some() }

    /// Checksum of `bytes` alone.
    #[must_use]
    pub fn checksum(&self, bytes: &[u8]) -> u32 {
        let mut state = Running::new(self.algorithm);
        state.update(bytes);
        state.value()
    }
}

impl MessageModifier for ChecksumModifier {
    fn modify(&self, _facility: Facility, _severity: Severity, message: &str) -> String {
        let value = match &self.running {
            Some(running) => {
                let mut state = running.lock().unwrap_or_else(PoisonError::into_inner);
                state.update(message.as_bytes());
                state.value()
            }
            None => self.checksum(message.as_bytes()),
        };
        self.delimiters.wrap(message, &format!("{value:X}"))
    }

    fn verify(&self, message: &str) -> bool {
        parse_inline_modifier(message, &self.delimiters).is_some_and(|(body, hex)| {
            u32::from_str_radix(hex, 16).is_ok_and(|value| value == self.checksum(body.as_bytes()))
        })
    }
}

impl std::fmt::Debug for ChecksumModifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChecksumModifier")
            .field("algorithm", &self.algorithm)
            .field("delimiters", &self.delimiters)
            .field("continuous", &self.is_continuous())
            .finish()
    }
}

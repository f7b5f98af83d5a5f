//! Message digests appended as base64.

use std::{fmt, str::FromStr};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};

use super::{MessageModifier, ModifierDelimiters, parse_inline_modifier};
use crate::{
    error::ConfigError,
    priority::{Facility, Severity},
};

/// Supported digest algorithms.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashAlgorithm {
    #[serde(rename = "MD5")]
    Md5,
    #[serde(rename = "SHA1")]
    Sha1,
    #[default]
    #[serde(rename = "SHA-256")]
    Sha256,
    #[serde(rename = "SHA-384")]
    Sha384,
    #[serde(rename = "SHA-512")]
    Sha512,
}

impl HashAlgorithm {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA-256",
            Self::Sha384 => "SHA-384",
            Self::Sha512 => "SHA-512",
        }
    }

    /// Digest `bytes` with this algorithm.
    #[must_use]
    pub fn digest(self, bytes: &[u8]) -> Vec<u8> {
        match self {
            Self::Md5 => Md5::digest(bytes).to_vec(),
            Self::Sha1 => Sha1::digest(bytes).to_vec(),
            Self::Sha256 => Sha256::digest(bytes).to_vec(),
            Self::Sha384 => Sha384::digest(bytes).to_vec(),
            Self::Sha512 => Sha512::digest(bytes).to_vec(),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for HashAlgorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MD5" => Ok(Self::Md5),
            "SHA1" | "SHA-1" | "SHA160" | "SHA-160" => Ok(Self::Sha1),
            "SHA256" | "SHA-256" => Ok(Self::Sha256),
            "SHA384" | "SHA-384" => Ok(Self::Sha384),
            "SHA512" | "SHA-512" => Ok(Self::Sha512),
            _ => Err(ConfigError::UnknownAlgorithm(s.to_owned())),
        }
    }
}

/// Appends the base64 digest of the message body.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HashModifier {
    algorithm: HashAlgorithm,
    delimiters: ModifierDelimiters,
}

impl HashModifier {
    #[must_use]
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self {
            algorithm,
            delimiters: ModifierDelimiters::default(),
        }
    }

    /// Build a modifier from an algorithm name such as `SHA-256`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownAlgorithm`] for unsupported names.
    pub fn from_name(name: &str) -> Result<Self, ConfigError> { name.parse().map(Self::new) }

    #[must_use]
    pub fn delimiters(mut self, delimiters: ModifierDelimiters) -> Self {
        self.delimiters = delimiters;
        self
    }

    #[must_use]
    pub fn algorithm(&self) -> HashAlgorithm { self.algorithm }

    /// Check `message` against a base64 digest.
    #[must_use]
    pub fn verify_digest(&self, message: &str, encoded: &str) -> bool {
        STANDARD
            .decode(encoded)
            .is_ok_and(|expected| expected == self.algorithm.digest(message.as_bytes()))
    }
}

impl MessageModifier for HashModifier {
    fn modify(&self, _facility: Facility, _severity: Severity, message: &str) -> String {
        let digest = STANDARD.encode(self.algorithm.digest(message.as_bytes()));
        self.delimiters.wrap(message, &digest)
    }

    fn verify(&self, message: &str) -> bool {
        parse_inline_modifier(message, &self.delimiters)
            .is_some_and(|(body, digest)| self.verify_digest(body, digest))
    }
}

//! Error types for the structured-data codec.
//!
//! Parse failures are fatal to a single decode attempt only: the event layer
//! falls back to treating the payload as unparsed text. Serialize failures
//! reject a message that could not be read back by a conforming parser.

use thiserror::Error;

/// Failure raised while parsing or serializing a [`StructuredMessage`].
///
/// [`StructuredMessage`]: super::StructuredMessage
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// The message id section before the first `[` is missing or holds more
    /// than one token.
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// The bracketed structured-data section is not well formed.
    #[error("malformed structured data: {0}")]
    MalformedStructuredData(String),

    /// The message id contains characters outside printable ASCII.
    #[error("message id {0:?} is not printable ASCII")]
    InvalidMessageId(String),

    /// An SD-ID is empty or contains a reserved or non-printable character.
    #[error("invalid SD-ID {0:?}")]
    InvalidSdId(String),

    /// A parameter name is empty or contains a reserved or non-printable
    /// character.
    #[error("invalid parameter name {name:?} in SD-ID {sd_id:?}")]
    InvalidParamName {
        /// Element the parameter belongs to.
        sd_id: String,
        /// Rejected parameter name.
        name: String,
    },
}

impl CodecError {
    pub(crate) fn header(reason: impl Into<String>) -> Self { Self::MalformedHeader(reason.into()) }

    pub(crate) fn structured(reason: impl Into<String>) -> Self {
        Self::MalformedStructuredData(reason.into())
    }

    /// Returns `true` when the error was raised by the parser.
    #[must_use]
    pub fn is_parse_error(&self) -> bool {
        matches!(self, Self::MalformedHeader(_) | Self::MalformedStructuredData(_))
    }
}

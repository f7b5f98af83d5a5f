//! Canonical error types for the crate.
//!
//! Each layer owns a focused error enum ([`CodecError`], [`HandlerError`],
//! [`ServerError`], [`ClientError`]); [`SyslogError`] is the umbrella used by
//! callers that drive several layers at once. Setup-time validation failures
//! are reported as [`ConfigError`] and are fatal to initialisation only.

use thiserror::Error;

use crate::{
    client::ClientError,
    codec::CodecError,
    handler::HandlerError,
    server::ServerError,
};

/// Invalid names or values supplied while configuring a client or server.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The facility name is not one of `kern`, `user`, ..., `local7`.
    #[error("unknown syslog facility {0:?}")]
    UnknownFacility(String),
    /// The severity name is not one of `emergency`, ..., `debug`.
    #[error("unknown syslog severity {0:?}")]
    UnknownSeverity(String),
    /// A numeric facility or severity code was out of range.
    #[error("{kind} code {code} is out of range")]
    CodeOutOfRange {
        /// Either `facility` or `severity`.
        kind: &'static str,
        /// The rejected value.
        code: u8,
    },
    /// The digest or checksum algorithm name is not supported.
    #[error("unsupported algorithm {0:?}")]
    UnknownAlgorithm(String),
    /// The transport protocol name is not supported.
    #[error("unsupported protocol {0:?}")]
    UnknownProtocol(String),
    /// A sequential modifier was configured with `first >= last`.
    #[error("invalid sequence range; first={first}, last={last}; first must be below last")]
    InvalidSequenceRange {
        /// First number emitted after a wrap.
        first: u64,
        /// Exclusive upper bound of the sequence.
        last: u64,
    },
    /// An instance name was empty or blank.
    #[error("instance name cannot be empty")]
    EmptyInstanceName,
    /// An instance with the same name has already been registered.
    #[error("syslog instance {0:?} already defined")]
    DuplicateInstance(String),
    /// No instance is registered under the requested name.
    #[error("syslog instance {name:?} not defined; known instances: [{known}]")]
    UnknownInstance {
        /// Requested instance name.
        name: String,
        /// Space separated list of registered names.
        known: String,
    },
    /// `max_message_length` leaves no room for a message chunk after the
    /// header and split markers.
    #[error("max_message_length {max_message_length} cannot fit a message chunk after a {header}-byte header")]
    MessageTooShort {
        /// Configured limit in bytes.
        max_message_length: usize,
        /// Length of the formatted header in bytes.
        header: usize,
    },
}

/// Top-level error type exposed by `syslog-wire`.
#[derive(Debug, Error)]
pub enum SyslogError {
    /// Parsing or serializing a structured message failed.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// A handler callback failed.
    #[error(transparent)]
    Handler(#[from] HandlerError),
    /// The server could not bind or serve.
    #[error(transparent)]
    Server(#[from] ServerError),
    /// The client could not deliver a message.
    #[error(transparent)]
    Client(#[from] ClientError),
    /// Invalid configuration supplied at setup time.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Canonical result alias used by callers spanning several layers.
pub type Result<T> = std::result::Result<T, SyslogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_instance_lists_known_names() {
        let err = ConfigError::UnknownInstance {
            name: "udp2".into(),
            known: "tcp udp".into(),
        };
        assert_eq!(
            err.to_string(),
            "syslog instance \"udp2\" not defined; known instances: [tcp udp]"
        );
    }

    #[test]
    fn codec_errors_convert_transparently() {
        let err: SyslogError = CodecError::MalformedHeader("x".into()).into();
        assert_eq!(err.to_string(), CodecError::MalformedHeader("x".into()).to_string());
    }
}

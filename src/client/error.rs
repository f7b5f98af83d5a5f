//! Error types for the syslog client.

use std::io;

use thiserror::Error;

use crate::{codec::CodecError, error::ConfigError};

/// Failure to obtain a writer from a [`WriterPool`](super::pool::WriterPool).
#[derive(Debug, Error)]
pub enum PoolError {
    /// Every writer is borrowed and the pool is configured to fail or the
    /// wait timed out.
    #[error("writer pool exhausted")]
    Exhausted,
    /// The pool has been closed.
    #[error("writer pool closed")]
    Closed,
    /// Opening a new writer failed.
    #[error("failed to open writer: {0}")]
    Create(#[source] io::Error),
}

/// A single failed delivery attempt.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error("write failed: {0}")]
    Io(#[from] io::Error),
}

/// Errors surfaced by [`SyslogClient`](super::SyslogClient).
#[derive(Debug, Error)]
pub enum ClientError {
    /// Every delivery attempt failed.
    #[error("delivery failed after {attempts} attempt(s): {source}")]
    Transport {
        /// Writes attempted, including the first.
        attempts: u32,
        #[source]
        source: DeliveryError,
    },
    /// The client has been shut down.
    #[error("client has been shut down")]
    ShutDown,
    /// A structured message could not be serialized.
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Queued delivery needs a running tokio runtime.
    #[error("queued delivery requires a tokio runtime")]
    Runtime,
}

impl ClientError {
    /// Returns `true` for failures caused by the transport.
    #[must_use]
    pub fn is_transport(&self) -> bool { matches!(self, Self::Transport { .. }) }
}

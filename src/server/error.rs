//! Errors raised by [`SyslogServer`](super::SyslogServer) operations.

use std::io;

use thiserror::Error;

/// Errors that may occur while binding or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Binding the listener or socket failed.
    #[error("bind error: {0}")]
    Bind(#[source] io::Error),
    /// Accepting a connection failed.
    #[error("accept error: {0}")]
    Accept(#[from] io::Error),
    /// Configuring a bound socket failed.
    #[error("socket configuration error: {0}")]
    Io(#[source] io::Error),
}

//! Event handler capabilities invoked by the dispatch engine.
//!
//! A handler is registered either as session-capable, receiving connection
//! lifecycle callbacks and a per-connection token, or as sessionless,
//! receiving events only. [`EventHandler`] carries the capability as a tag so
//! the engine can switch on it.
//!
//! Callbacks run synchronously on the connection's task. Slow work should be
//! handed off internally; a callback that blocks stalls only its own
//! connection.

use std::{any::Any, error::Error, fmt, io, net::SocketAddr, sync::Arc};

use thiserror::Error;

use crate::{event::SyslogEvent, server::ServerProtocol, session::ConnectionId};

mod print;

pub use print::PrintStreamHandler;

/// Opaque per-connection state returned from `session_opened`.
pub type SessionToken = Arc<dyn Any + Send + Sync>;

/// Failure raised by, or reported to, a handler callback.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The callback returned an error.
    #[error("handler failed: {0}")]
    Failed(#[source] Box<dyn Error + Send + Sync>),
    /// The callback panicked; the payload is rendered as text.
    #[error("handler panicked: {0}")]
    Panicked(String),
    /// Reading from the connection or socket failed.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),
}

impl HandlerError {
    /// Wrap any error or message as [`HandlerError::Failed`].
    pub fn failed(error: impl Into<Box<dyn Error + Send + Sync>>) -> Self { Self::Failed(error.into()) }
}

/// Result returned by handler callbacks.
pub type HandlerResult<T = ()> = Result<T, HandlerError>;

/// Server-wide details passed to every callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServerContext {
    pub protocol: ServerProtocol,
    pub local_addr: SocketAddr,
}

/// Where an event or lifecycle change came from.
///
/// `connection` is `None` for datagrams, which have no session state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Origin {
    pub connection: Option<ConnectionId>,
    pub peer: SocketAddr,
}

impl Origin {
    #[must_use]
    pub fn stream(connection: ConnectionId, peer: SocketAddr) -> Self {
        Self {
            connection: Some(connection),
            peer,
        }
    }

    #[must_use]
    pub fn datagram(peer: SocketAddr) -> Self {
        Self {
            connection: None,
            peer,
        }
    }
}

/// Handler receiving connection lifecycle callbacks.
pub trait SessionEventHandler: Send + Sync {
    /// Called once before the server starts receiving.
    fn initialize(&self, _server: &ServerContext) -> HandlerResult { Ok(()) }

    /// Called when a stream connection opens; a returned token is stored and
    /// passed to later callbacks for that connection.
    fn session_opened(
        &self,
        _server: &ServerContext,
        _origin: &Origin,
    ) -> HandlerResult<Option<SessionToken>> {
        Ok(None)
    }

    /// Called for every parsed event. `session` is `None` for datagrams and
    /// when `session_opened` returned no token.
    fn event(
        &self,
        session: Option<&SessionToken>,
        server: &ServerContext,
        origin: &Origin,
        event: &SyslogEvent,
    ) -> HandlerResult;

    /// Receives failures of this handler's other callbacks and transport
    /// errors. An error returned here is discarded.
    fn exception(
        &self,
        _session: Option<&SessionToken>,
        _server: &ServerContext,
        _origin: Option<&Origin>,
        _error: &HandlerError,
    ) -> HandlerResult {
        Ok(())
    }

    /// Called when a stream connection closes, with `timed_out` set when the
    /// idle timeout closed it.
    fn session_closed(
        &self,
        _session: Option<&SessionToken>,
        _server: &ServerContext,
        _origin: &Origin,
        _timed_out: bool,
    ) -> HandlerResult {
        Ok(())
    }

    /// Called once after the server stops.
    fn destroy(&self, _server: &ServerContext) -> HandlerResult { Ok(()) }
}

/// Handler receiving events with no connection awareness.
pub trait SessionlessEventHandler: Send + Sync {
    fn initialize(&self, _server: &ServerContext) -> HandlerResult { Ok(()) }

    fn event(&self, server: &ServerContext, origin: &Origin, event: &SyslogEvent) -> HandlerResult;

    fn exception(
        &self,
        _server: &ServerContext,
        _origin: Option<&Origin>,
        _error: &HandlerError,
    ) -> HandlerResult {
        Ok(())
    }

    fn destroy(&self, _server: &ServerContext) -> HandlerResult { Ok(()) }
}

/// A registered handler tagged with its capability.
#[derive(Clone)]
pub enum EventHandler {
    Session(Arc<dyn SessionEventHandler>),
    Sessionless(Arc<dyn SessionlessEventHandler>),
}

impl EventHandler {
    /// Register a session-capable handler.
    pub fn session(handler: impl SessionEventHandler + 'static) -> Self { Self::Session(Arc::new(handler)) }

    /// Register a sessionless handler.
    pub fn sessionless(handler: impl SessionlessEventHandler + 'static) -> Self {
        Self::Sessionless(Arc::new(handler))
    }

    /// Returns `true` for the session-capable variant.
    #[must_use]
    pub fn is_session_capable(&self) -> bool { matches!(self, Self::Session(_)) }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Session(_) => "EventHandler::Session",
            Self::Sessionless(_) => "EventHandler::Sessionless",
        })
    }
}

impl From<Arc<dyn SessionEventHandler>> for EventHandler {
    fn from(handler: Arc<dyn SessionEventHandler>) -> Self { Self::Session(handler) }
}

impl From<Arc<dyn SessionlessEventHandler>> for EventHandler {
    fn from(handler: Arc<dyn SessionlessEventHandler>) -> Self { Self::Sessionless(handler) }
}

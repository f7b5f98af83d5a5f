//! Tokio-based syslog server.
//!
//! `SyslogServer` receives messages over UDP datagrams or delimited TCP
//! streams, parses each into a [`SyslogEvent`](crate::event::SyslogEvent)
//! and hands it to a [`DispatchEngine`](crate::dispatch::DispatchEngine)
//! running the registered handlers.

use std::{fmt, net::SocketAddr, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};
use tokio::{
    net::{TcpListener, UdpSocket},
    sync::oneshot,
};

use crate::{error::ConfigError, handler::EventHandler, session::SessionRegistry};

/// Transport a server instance listens on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerProtocol {
    Udp,
    Tcp,
}

impl ServerProtocol {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Udp => "udp",
            Self::Tcp => "tcp",
        }
    }
}

impl fmt::Display for ServerProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for ServerProtocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "udp" => Ok(Self::Udp),
            "tcp" => Ok(Self::Tcp),
            _ => Err(ConfigError::UnknownProtocol(s.to_owned())),
        }
    }
}

/// Tokio-based syslog server.
///
/// The server carries a typestate `S` indicating whether it is [`Unbound`]
/// or [`Bound`]. New servers start `Unbound` and must call
/// [`bind`](SyslogServer::bind) or one of the `bind_existing_*` methods
/// before running.
pub struct SyslogServer<S = Unbound>
where
    S: ServerState,
{
    pub(crate) protocol: ServerProtocol,
    pub(crate) config: ServerConfig,
    pub(crate) handlers: Vec<EventHandler>,
    pub(crate) registry: Arc<SessionRegistry>,
    /// One-shot readiness notification; a new sender is needed per run.
    pub(crate) ready_tx: Option<oneshot::Sender<()>>,
    pub(crate) state: S,
}

/// Marker indicating the server has not yet bound a socket.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbound;

/// Marker indicating the server is bound to a socket or listener.
#[derive(Debug, Clone)]
pub struct Bound {
    pub(crate) socket: BoundSocket,
    pub(crate) local_addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub(crate) enum BoundSocket {
    Udp(Arc<UdpSocket>),
    Tcp(Arc<TcpListener>),
}

/// Trait implemented by [`Unbound`] and [`Bound`] to model binding typestate.
pub trait ServerState: sealed::Sealed {}

mod sealed {
    //! Prevent external implementations of [`ServerState`].

    pub trait Sealed {}
    impl Sealed for super::Unbound {}
    impl Sealed for super::Bound {}
}

impl ServerState for Unbound {}
impl ServerState for Bound {}

mod config;
pub use config::{ExhaustedBehavior, ServerConfig};
mod connection;
pub mod error;
pub use error::ServerError;
mod runtime;

pub use runtime::BackoffConfig;

#[cfg(test)]
pub(crate) mod test_util;

//! Socket binding for [`SyslogServer`].

use std::{
    net::{SocketAddr, TcpListener as StdTcpListener, UdpSocket as StdUdpSocket},
    sync::Arc,
};

use tokio::net::{TcpListener, UdpSocket};

use crate::server::{Bound, BoundSocket, ServerError, ServerProtocol, SyslogServer, Unbound};

impl SyslogServer<Unbound> {
    /// Return `None` as the server is not bound.
    ///
    /// ```
    /// use syslog_wire::server::{ServerProtocol, SyslogServer};
    ///
    /// assert!(SyslogServer::new(ServerProtocol::Udp).local_addr().is_none());
    /// ```
    #[must_use]
    pub const fn local_addr(&self) -> Option<SocketAddr> { None }

    /// Bind a UDP socket or TCP listener to `addr`, according to the
    /// server's protocol.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// Returns a [`ServerError`] if binding or configuring the socket fails.
    pub fn bind(self, addr: SocketAddr) -> Result<SyslogServer<Bound>, ServerError> {
        match self.protocol {
            ServerProtocol::Udp => {
                let socket = StdUdpSocket::bind(addr).map_err(ServerError::Bind)?;
                self.bind_existing_socket(socket)
            }
            ServerProtocol::Tcp => {
                let listener = StdTcpListener::bind(addr).map_err(ServerError::Bind)?;
                self.bind_existing_listener(listener)
            }
        }
    }

    /// Serve TCP on an existing `StdTcpListener`.
    ///
    /// # Errors
    /// Returns a [`ServerError`] if configuring the listener fails.
    pub fn bind_existing_listener(
        self,
        std_listener: StdTcpListener,
    ) -> Result<SyslogServer<Bound>, ServerError> {
        std_listener.set_nonblocking(true).map_err(ServerError::Io)?;
        let listener = TcpListener::from_std(std_listener).map_err(ServerError::Io)?;
        let local_addr = listener.local_addr().map_err(ServerError::Io)?;
        Ok(self.into_bound(
            ServerProtocol::Tcp,
            BoundSocket::Tcp(Arc::new(listener)),
            local_addr,
        ))
    }

    /// Serve UDP on an existing `StdUdpSocket`.
    ///
    /// # Errors
    /// Returns a [`ServerError`] if configuring the socket fails.
    pub fn bind_existing_socket(
        self,
        std_socket: StdUdpSocket,
    ) -> Result<SyslogServer<Bound>, ServerError> {
        std_socket.set_nonblocking(true).map_err(ServerError::Io)?;
        let socket = UdpSocket::from_std(std_socket).map_err(ServerError::Io)?;
        let local_addr = socket.local_addr().map_err(ServerError::Io)?;
        Ok(self.into_bound(
            ServerProtocol::Udp,
            BoundSocket::Udp(Arc::new(socket)),
            local_addr,
        ))
    }

    fn into_bound(
        self,
        protocol: ServerProtocol,
        socket: BoundSocket,
        local_addr: SocketAddr,
    ) -> SyslogServer<Bound> {
        let SyslogServer {
            config,
            handlers,
            registry,
            ready_tx,
            ..
        } = self;
        SyslogServer {
            protocol,
            config,
            handlers,
            registry,
            ready_tx,
            state: Bound { socket, local_addr },
        }
    }
}

impl SyslogServer<Bound> {
    /// Returns the bound address.
    ///
    /// ```
    /// use syslog_wire::server::{ServerProtocol, SyslogServer};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), syslog_wire::server::ServerError> {
    /// let server = SyslogServer::new(ServerProtocol::Tcp).bind("127.0.0.1:0".parse().unwrap())?;
    /// assert!(server.local_addr().is_some());
    /// # Ok(())
    /// # }
    /// ```
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> { Some(self.state.local_addr) }
}

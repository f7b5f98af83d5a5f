//! Writers that put formatted messages on the wire.

use std::{fmt, io, net::SocketAddr};

use async_trait::async_trait;
use tokio::{
    io::AsyncWriteExt,
    net::{TcpSocket, TcpStream, UdpSocket, lookup_host},
    time::Instant,
};

use super::config::{TcpConfig, TransportConfig};

/// A connection able to send formatted syslog messages.
#[async_trait]
pub trait SyslogWriter: Send + Sync {
    /// Send one complete message.
    async fn write(&mut self, message: &[u8]) -> io::Result<()>;

    /// Release the underlying socket.
    async fn close(&mut self) -> io::Result<()> { Ok(()) }
}

/// Opens new writers for a pool.
#[async_trait]
pub trait WriterFactory: Send + Sync {
    async fn open(&self) -> io::Result<Box<dyn SyslogWriter>>;
}

async fn resolve(host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
    let addrs: Vec<SocketAddr> = lookup_host((host, port)).await?.collect();
    if addrs.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("{host}:{port} did not resolve to any address"),
        ));
    }
    Ok(addrs)
}

/// Sends each message as a single datagram.
#[derive(Debug)]
pub struct UdpWriter {
    socket: UdpSocket,
}

impl UdpWriter {
    /// Bind an ephemeral socket and connect it to `host:port`.
    ///
    /// # Errors
    ///
    /// Returns an error if the host does not resolve or the socket cannot
    /// be bound.
    pub async fn connect(host: &str, port: u16) -> io::Result<Self> {
        let target = resolve(host, port).await?[0];
        let local: SocketAddr = if target.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0_u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(target).await?;
        Ok(Self { socket })
    }

    /// Address the writer sends from.
    ///
    /// # Errors
    ///
    /// Propagates the socket's error.
    pub fn local_addr(&self) -> io::Result<SocketAddr> { self.socket.local_addr() }
}

#[async_trait]
impl SyslogWriter for UdpWriter {
    async fn write(&mut self, message: &[u8]) -> io::Result<()> {
        self.socket.send(message).await.map(|_| ())
    }
}

/// Writes delimited messages to a TCP stream.
///
/// The stream is opened lazily on the first write. Persistent writers keep
/// it open between messages, reconnecting after a failure or once
/// `fresh_connection_interval` has elapsed; other writers open a fresh
/// connection for every message.
pub struct TcpWriter {
    host: String,
    port: u16,
    config: TcpConfig,
    stream: Option<(TcpStream, Instant)>,
}

impl TcpWriter {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, config: TcpConfig) -> Self {
        Self {
            host: host.into(),
            port,
            config,
            stream: None,
        }
    }

    /// Returns `true` while a connection is held open.
    #[must_use]
    pub fn is_connected(&self) -> bool { self.stream.is_some() }

    async fn connect(&self) -> io::Result<TcpStream> {
        let mut last_error = None;
        for addr in resolve(&self.host, self.port).await? {
            let socket = if addr.is_ipv4() {
                TcpSocket::new_v4()?
            } else {
                TcpSocket::new_v6()?
            };
            self.config.socket.apply(&socket)?;
            match socket.connect(addr).await {
                Ok(stream) => return Ok(stream),
                Err(e) => last_error = Some(e),
            }
        }
        Err(last_error.unwrap_or_else(|| io::Error::from(io::ErrorKind::NotConnected)))
    }

    fn is_stale(&self, opened: Instant) -> bool {
        self.config
            .fresh_connection_interval
            .is_some_and(|interval| opened.elapsed() >= interval)
    }

    async fn stream(&mut self) -> io::Result<&mut TcpStream> {
        let stale = matches!(self.stream, Some((_, opened)) if self.is_stale(opened));
        if stale {
            tracing::debug!(host = %self.host, port = self.port, "refreshing syslog connection");
            self.release().await;
        }
        if self.stream.is_none() {
            let stream = self.connect().await?;
            self.stream = Some((stream, Instant::now()));
        }
        match self.stream.as_mut() {
            Some((stream, _)) => Ok(stream),
            None => Err(io::ErrorKind::NotConnected.into()),
        }
    }

    /// Drop the current connection, logging rather than returning any
    /// shutdown error.
    async fn release(&mut self) {
        if let Err(error) = self.close().await {
            tracing::debug!(host = %self.host, port = self.port, %error, "syslog connection closed uncleanly");
        }
    }

    async fn send(&mut self, message: &[u8]) -> io::Result<()> {
        let delimiter = self.config.delimiter.clone();
        let stream = self.stream().await?;
        stream.write_all(message).await?;
        if !message.ends_with(&delimiter) {
            stream.write_all(&delimiter).await?;
        }
        stream.flush().await
    }
}

#[async_trait]
impl SyslogWriter for TcpWriter {
    async fn write(&mut self, message: &[u8]) -> io::Result<()> {
        let result = self.send(message).await;
        if result.is_err() {
            self.stream = None;
        } else if !self.config.persistent_connection {
            self.release().await;
        }
        result
    }

    async fn close(&mut self) -> io::Result<()> {
        match self.stream.take() {
            Some((mut stream, _)) => stream.shutdown().await,
            None => Ok(()),
        }
    }
}

impl fmt::Debug for TcpWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpWriter")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

/// Opens UDP or TCP writers for a configured server.
#[derive(Clone, Debug)]
pub struct TransportFactory {
    host: String,
    port: u16,
    transport: TransportConfig,
}

impl TransportFactory {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, transport: TransportConfig) -> Self {
        Self {
            host: host.into(),
            port,
            transport,
        }
    }
}

#[async_trait]
impl WriterFactory for TransportFactory {
    async fn open(&self) -> io::Result<Box<dyn SyslogWriter>> {
        match &self.transport {
            TransportConfig::Udp => Ok(Box::new(UdpWriter::connect(&self.host, self.port).await?)),
            TransportConfig::Tcp(tcp) => Ok(Box::new(TcpWriter::new(self.host.clone(), self.port, tcp.clone()))),
        }
    }
}

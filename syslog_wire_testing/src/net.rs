//! Ephemeral sockets and background servers for integration tests.

use std::{
    error::Error,
    net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener, UdpSocket as StdUdpSocket},
};

use rstest::fixture;
use syslog_wire::server::{Bound, ServerError, SyslogServer};
use tokio::{sync::oneshot, task::JoinHandle};

/// Result type for integration tests and their helpers.
pub type TestResult<T = ()> = Result<T, Box<dyn Error + Send + Sync>>;

/// A TCP listener bound to a free loopback port.
///
/// The listener stays bound, so no other process can claim the port
/// before the server takes it over.
///
/// # Errors
///
/// Propagates the bind failure.
#[fixture]
pub fn unused_listener() -> std::io::Result<StdTcpListener> {
    StdTcpListener::bind(SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0))
}

/// A UDP socket bound to a free loopback port.
///
/// # Errors
///
/// Propagates the bind failure.
#[fixture]
pub fn unused_udp_socket() -> std::io::Result<StdUdpSocket> {
    StdUdpSocket::bind(SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0))
}

/// A server running on a background task.
#[derive(Debug)]
pub struct RunningServer {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<Result<(), ServerError>>,
}

impl RunningServer {
    #[must_use]
    pub fn addr(&self) -> SocketAddr { self.addr }

    /// Trigger shutdown and wait for the server task to finish.
    ///
    /// # Errors
    ///
    /// Returns the server's error or the join failure.
    pub async fn stop(self) -> TestResult {
        let _ = self.shutdown.send(());
        self.handle.await??;
        Ok(())
    }
}

/// Spawn `server` and wait until it is receiving.
///
/// # Errors
///
/// Fails if the server exits before signalling readiness.
pub async fn spawn_server(server: SyslogServer<Bound>) -> TestResult<RunningServer> {
    let addr = server.local_addr().ok_or("server is not bound")?;
    let (ready_tx, ready_rx) = oneshot::channel();
    let (shutdown, shutdown_rx) = oneshot::channel::<()>();
    let server = server.ready_signal(ready_tx);
    let handle = tokio::spawn(server.run_with_shutdown(async {
        let _ = shutdown_rx.await;
    }));
    ready_rx.await?;
    Ok(RunningServer {
        addr,
        shutdown,
        handle,
    })
}

//! Shared utilities for integration tests.
//!
//! Helpers for pushing raw syslog lines at a running server over UDP or
//! TCP, plus the timeouts the tests wait with.

// Items in this shared module may not be used by all test binaries that import it.
#![allow(
    dead_code,
    reason = "shared test utilities are not used by all test binaries"
)]

use std::{
    net::{Ipv4Addr, SocketAddr},
    time::Duration,
};

use tokio::{
    io::AsyncWriteExt,
    net::{TcpStream, UdpSocket},
};

/// How long tests wait for callbacks to arrive.
pub const WAIT: Duration = Duration::from_secs(2);

/// Send each line as its own datagram to `addr`.
pub async fn send_datagrams(addr: SocketAddr, lines: &[&str]) {
    let socket = UdpSocket::bind(SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0))
        .await
        .expect("bind client socket");
    for line in lines {
        socket.send_to(line.as_bytes(), addr).await.expect("send datagram");
    }
}

/// Open a connection to `addr` and write `payload` in one go.
pub async fn send_stream(addr: SocketAddr, payload: &[u8]) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.expect("connect to server");
    stream.write_all(payload).await.expect("write payload");
    stream.flush().await.expect("flush payload");
    stream
}

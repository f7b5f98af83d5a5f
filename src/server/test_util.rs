//! Test helpers shared across server modules.

use std::{
    net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener},
    sync::Arc,
};

use rstest::fixture;

use super::{Bound, ServerProtocol, SyslogServer};
use crate::{dispatch::DispatchEngine, handler::ServerContext, session::SessionRegistry};

#[fixture]
/// Returns a bound [`StdTcpListener`] on a free port for use in tests.
///
/// Keeping the listener bound prevents race conditions where another
/// process could claim the port between discovery and use.
pub fn free_listener() -> StdTcpListener {
    let addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0);
    StdTcpListener::bind(addr).expect("Failed to bind free port listener")
}

#[fixture]
/// Dispatch engine with no handlers.
pub fn engine() -> Arc<DispatchEngine> {
    Arc::new(DispatchEngine::new(
        Vec::new(),
        Arc::new(SessionRegistry::default()),
        ServerContext {
            protocol: ServerProtocol::Tcp,
            local_addr: SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0),
        },
    ))
}

pub fn bind_server(listener: StdTcpListener) -> SyslogServer<Bound> {
    SyslogServer::new(ServerProtocol::Tcp)
        .bind_existing_listener(listener)
        .expect("Failed to bind")
}

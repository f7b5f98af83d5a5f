//! Helpers shared by the `syslog-wire` integration tests.
//!
//! Recording handlers capture every callback the dispatch engine makes,
//! [`MemoryPool`] stands in for a network writer pool, and the network
//! helpers bind ephemeral sockets and run servers until told to stop.
//!
//! ```rust,no_run
//! use syslog_wire::server::{ServerProtocol, SyslogServer};
//! use syslog_wire_testing::{CallLog, RecordingSessionlessHandler, TestResult, spawn_server, unused_udp_socket};
//!
//! # async fn demo() -> TestResult {
//! let log = CallLog::default();
//! let server = SyslogServer::new(ServerProtocol::Udp)
//!     .sessionless_handler(RecordingSessionlessHandler::new(log.clone()))
//!     .bind_existing_socket(unused_udp_socket()?)?;
//! let running = spawn_server(server).await?;
//! running.stop().await?;
//! # Ok(())
//! # }
//! ```

mod handlers;
mod logging;
mod net;
mod pool;

pub use handlers::{Call, CallLog, RecordingSessionHandler, RecordingSessionlessHandler};
pub use logging::{LoggerHandle, logger};
pub use net::{RunningServer, TestResult, spawn_server, unused_listener, unused_udp_socket};
pub use pool::MemoryPool;

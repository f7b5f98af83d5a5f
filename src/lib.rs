#![doc(html_root_url = "https://docs.rs/syslog-wire/latest")]
//! Public API for the `syslog-wire` library.
//!
//! This crate implements both sides of the syslog wire protocol: a tokio
//! server that ingests UDP datagrams and delimited TCP streams, parses them
//! into events and dispatches them to pluggable handlers, and a client that
//! formats, modifies and reliably delivers log messages over UDP or TCP.

pub mod client;
pub mod codec;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod handler;
pub mod metrics;
pub mod panic;
pub mod priority;
pub mod server;
pub mod session;

pub use client::{ClientConfig, ClientError, SyslogClient};
pub use codec::{CodecError, StructuredMessage};
pub use dispatch::DispatchEngine;
pub use error::{ConfigError, SyslogError};
pub use event::{RawEvent, StructuredEvent, SyslogEvent};
pub use handler::{EventHandler, HandlerError, SessionToken};
pub use priority::{Facility, Severity};
pub use server::{ServerConfig, ServerProtocol, SyslogServer};
pub use session::{ConnectionId, HandlerId, SessionRegistry};

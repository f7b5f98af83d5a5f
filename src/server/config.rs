//! Configuration for [`SyslogServer`].

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use super::{BackoffConfig, ServerProtocol, ServerState, SyslogServer, Unbound};
use crate::{
    codec::line::{DEFAULT_DELIMITER, clamp_frame_length},
    handler::{EventHandler, SessionEventHandler, SessionlessEventHandler},
    session::SessionRegistry,
};

mod binding;

/// What the TCP accept loop does once `max_active_connections` are open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExhaustedBehavior {
    /// Stop accepting until a connection closes.
    #[default]
    Block,
    /// Accept and immediately close the new connection.
    Reject,
}

/// Tunables for a server instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Classify and parse structured messages; everything is treated as
    /// legacy when disabled.
    pub use_structured_data: bool,
    /// Byte sequence terminating each message on a TCP stream.
    pub delimiter: Vec<u8>,
    /// Close TCP connections idle for this long.
    pub idle_timeout: Option<Duration>,
    /// Upper bound on concurrently open TCP connections.
    pub max_active_connections: Option<usize>,
    pub when_exhausted: ExhaustedBehavior,
    /// Largest TCP frame accepted before the connection is dropped.
    pub max_frame_length: usize,
    /// How long shutdown waits for open connections to finish.
    pub shutdown_wait: Duration,
    pub backoff: BackoffConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            use_structured_data: true,
            delimiter: DEFAULT_DELIMITER.to_vec(),
            idle_timeout: None,
            max_active_connections: None,
            when_exhausted: ExhaustedBehavior::Block,
            max_frame_length: 64 * 1024,
            shutdown_wait: Duration::from_millis(500),
            backoff: BackoffConfig::default(),
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn use_structured_data(mut self, enabled: bool) -> Self {
        self.use_structured_data = enabled;
        self
    }

    #[must_use]
    pub fn delimiter(mut self, delimiter: impl Into<Vec<u8>>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn max_active_connections(mut self, limit: usize, when_exhausted: ExhaustedBehavior) -> Self {
        self.max_active_connections = Some(limit);
        self.when_exhausted = when_exhausted;
        self
    }

    #[must_use]
    pub fn max_frame_length(mut self, length: usize) -> Self {
        self.max_frame_length = length;
        self
    }

    #[must_use]
    pub fn shutdown_wait(mut self, wait: Duration) -> Self {
        self.shutdown_wait = wait;
        self
    }

    #[must_use]
    pub fn backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Replace values that cannot work with the nearest usable ones.
    ///
    /// An empty delimiter becomes `\n`, a zero connection limit becomes one,
    /// zero idle timeouts are dropped and the frame length is clamped.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.delimiter.is_empty() {
            self.delimiter = DEFAULT_DELIMITER.to_vec();
        }
        self.max_active_connections = self.max_active_connections.map(|limit| limit.max(1));
        self.idle_timeout = self.idle_timeout.filter(|timeout| !timeout.is_zero());
        self.max_frame_length = clamp_frame_length(self.max_frame_length);
        self.backoff = self.backoff.normalized();
        self
    }
}

impl SyslogServer<Unbound> {
    /// Create an unbound server for `protocol` with default configuration
    /// and no handlers.
    #[must_use]
    pub fn new(protocol: ServerProtocol) -> Self {
        Self {
            protocol,
            config: ServerConfig::default(),
            handlers: Vec::new(),
            registry: Arc::new(SessionRegistry::default()),
            ready_tx: None,
            state: Unbound,
        }
    }
}

impl<S> SyslogServer<S>
where
    S: ServerState,
{
    /// Replace the server configuration.
    #[must_use]
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Append a handler; handlers run in registration order and duplicates
    /// are kept.
    #[must_use]
    pub fn handler(mut self, handler: EventHandler) -> Self {
        self.handlers.push(handler);
        self
    }

    #[must_use]
    pub fn session_handler(self, handler: impl SessionEventHandler + 'static) -> Self {
        self.handler(EventHandler::session(handler))
    }

    #[must_use]
    pub fn sessionless_handler(self, handler: impl SessionlessEventHandler + 'static) -> Self {
        self.handler(EventHandler::sessionless(handler))
    }

    /// Configure a channel used to signal when the server is ready to receive.
    #[must_use]
    pub fn ready_signal(mut self, tx: oneshot::Sender<()>) -> Self {
        self.ready_tx = Some(tx);
        self
    }

    #[must_use]
    pub fn protocol(&self) -> ServerProtocol { self.protocol }

    #[must_use]
    pub fn server_config(&self) -> &ServerConfig { &self.config }

    #[must_use]
    pub fn handler_count(&self) -> usize { self.handlers.len() }

    /// Session registry shared with the dispatch engine once running.
    #[must_use]
    pub fn session_registry(&self) -> &Arc<SessionRegistry> { &self.registry }
}

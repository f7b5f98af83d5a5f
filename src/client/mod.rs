//! Syslog client.
//!
//! A [`SyslogClient`] runs each message body through its
//! [`ModifierPipeline`](modifier::ModifierPipeline), formats the syslog
//! header and hands the result to its
//! [`DeliveryPipeline`](delivery::DeliveryPipeline), which writes through a
//! pool of UDP or TCP writers.
//!
//! ```no_run
//! use syslog_wire::client::{ClientConfig, SyslogClient};
//!
//! # async fn demo() -> Result<(), syslog_wire::ClientError> {
//! let client = SyslogClient::new(ClientConfig::default().host("127.0.0.1").ident("demo"))?;
//! client.info("service started").await?;
//! client.shutdown().await;
//! # Ok(())
//! # }
//! ```

use std::{fmt, sync::Arc};

use chrono::Local;

pub mod backlog;
mod config;
pub mod delivery;
mod error;
mod format;
pub mod modifier;
pub mod pool;
pub mod registry;
mod socket;
pub mod transport;

pub use backlog::BackLogHandler;
pub use config::{
    ClientConfig,
    DEFAULT_PORT,
    DEFAULT_SPLIT_TEXT,
    DeliveryConfig,
    DeliveryMode,
    PoolConfig,
    TcpConfig,
    TransportConfig,
    WhenExhausted,
};
pub use error::{ClientError, DeliveryError, PoolError};
pub use registry::SyslogRegistry;
pub use socket::SocketOptions;

use self::{
    backlog::BackLogChain,
    delivery::{DeliveryPipeline, Outgoing},
    modifier::{MessageModifier, ModifierPipeline},
    pool::{BoundedPool, WriterPool},
    transport::TransportFactory,
};
use crate::{codec::StructuredMessage, priority::Severity};

/// Builder for [`SyslogClient`].
pub struct ClientBuilder {
    config: ClientConfig,
    modifiers: ModifierPipeline,
    backlog: BackLogChain,
    pool: Option<Arc<dyn WriterPool>>,
}

impl ClientBuilder {
    /// Append a modifier to the pipeline.
    #[must_use]
    pub fn modifier(mut self, modifier: impl MessageModifier + 'static) -> Self {
        self.modifiers.push(Arc::new(modifier));
        self
    }

    /// Register a handler for messages that could not be delivered.
    #[must_use]
    pub fn backlog_handler(mut self, handler: impl BackLogHandler + 'static) -> Self {
        self.backlog.push(Arc::new(handler));
        self
    }

    /// Use `pool` instead of a [`BoundedPool`] over the configured
    /// transport.
    #[must_use]
    pub fn pool(mut self, pool: Arc<dyn WriterPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Finish building the client.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Runtime`] when queued delivery is configured
    /// outside a tokio runtime.
    pub fn build(self) -> Result<SyslogClient, ClientError> {
        let config = self.config.normalized();
        let pool = self.pool.unwrap_or_else(|| {
            let factory = TransportFactory::new(config.host.clone(), config.port, config.transport.clone());
            Arc::new(BoundedPool::new(Arc::new(factory), config.pool.clone()))
        });
        let delivery = DeliveryPipeline::new(
            &config.delivery,
            pool,
            self.backlog.clone(),
            config.throw_exception_on_write,
        )?;
        self.backlog.initialize();
        Ok(SyslogClient {
            config,
            modifiers: self.modifiers,
            backlog: self.backlog,
            delivery,
        })
    }
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("config", &self.config)
            .field("modifiers", &self.modifiers)
            .field("backlog", &self.backlog)
            .field("custom_pool", &self.pool.is_some())
            .finish()
    }
}

/// Formats and delivers syslog messages to one server.
#[derive(Debug)]
pub struct SyslogClient {
    config: ClientConfig,
    modifiers: ModifierPipeline,
    backlog: BackLogChain,
    delivery: DeliveryPipeline,
}

macro_rules! severity_methods {
    ($($(#[$meta:meta])* $name:ident => $severity:ident),+ $(,)?) => {
        $(
            $(#[$meta])*
            ///
            /// # Errors
            ///
            /// See [`SyslogClient::log`].
            pub async fn $name(&self, message: &str) -> Result<(), ClientError> {
                self.log(Severity::$severity, message).await
            }
        )+
    };
}

impl SyslogClient {
    #[must_use]
    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder {
            config,
            modifiers: ModifierPipeline::default(),
            backlog: BackLogChain::default(),
            pool: None,
        }
    }

    /// Build a client with no modifiers or backlog handlers.
    ///
    /// # Errors
    ///
    /// See [`ClientBuilder::build`].
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> { Self::builder(config).build() }

    #[must_use]
    pub fn config(&self) -> &ClientConfig { &self.config }

    #[must_use]
    pub fn modifiers(&self) -> &ModifierPipeline { &self.modifiers }

    #[must_use]
    pub fn delivery(&self) -> &DeliveryPipeline { &self.delivery }

    /// Modify, format and deliver `message`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ShutDown`] after [`shutdown`](Self::shutdown),
    /// [`ClientError::Config`] when an over-long message cannot be split, or
    /// a delivery failure when `throw_exception_on_write` is set, no backlog
    /// handler is registered and delivery is direct.
    pub async fn log(&self, severity: Severity, message: &str) -> Result<(), ClientError> {
        let body = self.modifiers.apply(self.config.facility, severity, message);
        let frames = format::format_message(&self.config, severity, &body, Local::now())?;
        self.deliver(severity, frames).await
    }

    /// Send a message with structured data, modifying only its free text.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Codec`] when the message cannot be serialized,
    /// otherwise as [`log`](Self::log).
    pub async fn log_structured(&self, severity: Severity, message: &StructuredMessage) -> Result<(), ClientError> {
        let body = self.modifiers.apply(self.config.facility, severity, message.message());
        let message = message.clone().with_message(body);
        let frames = format::format_structured(&self.config, severity, &message, Local::now())?;
        self.deliver(severity, frames).await
    }

    async fn deliver(&self, severity: Severity, frames: Vec<String>) -> Result<(), ClientError> {
        for payload in frames {
            self.delivery.deliver(Outgoing { severity, payload }).await?;
        }
        Ok(())
    }

    severity_methods! {
        /// Log at [`Severity::Debug`].
        debug => Debug,
        /// Log at [`Severity::Info`].
        info => Info,
        /// Log at [`Severity::Notice`].
        notice => Notice,
        /// Log at [`Severity::Warning`].
        warn => Warning,
        /// Log at [`Severity::Error`].
        error => Error,
        /// Log at [`Severity::Critical`].
        critical => Critical,
        /// Log at [`Severity::Alert`].
        alert => Alert,
        /// Log at [`Severity::Emergency`].
        emergency => Emergency,
    }

    /// Pass a message straight to the backlog handlers.
    pub fn backlog(&self, severity: Severity, message: &str, reason: &str) {
        self.backlog.log(severity, message, reason);
    }

    /// Wait until queued messages have been written or failed.
    pub async fn flush(&self) { self.delivery.flush().await; }

    /// Drain the queue, close every writer and reject further messages.
    pub async fn shutdown(&self) { self.delivery.shutdown().await; }
}

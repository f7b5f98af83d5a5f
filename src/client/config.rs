//! Configuration for [`SyslogClient`](super::SyslogClient).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::SocketOptions;
use crate::{codec::line::DEFAULT_DELIMITER, error::ConfigError, priority::Facility};

/// Well-known syslog port.
pub const DEFAULT_PORT: u16 = 514;

/// Default marker around the seams of a split message.
pub const DEFAULT_SPLIT_TEXT: &str = "...";

/// Tunables for a client instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Facility stamped on every message.
    pub facility: Facility,
    /// Server host name or address.
    pub host: String,
    pub port: u16,
    /// Application name written after the host field.
    pub ident: String,
    /// Host name reported in the header when `send_local_name` is set.
    pub local_name: String,
    pub send_local_timestamp: bool,
    pub send_local_name: bool,
    /// Emit the structured header (`<PRI>1 TIMESTAMP ...`) instead of the
    /// legacy one.
    pub use_structured_data: bool,
    /// Cut formatted messages at `max_message_length` bytes. When unset,
    /// longer messages are split into several.
    pub truncate_message: bool,
    pub max_message_length: usize,
    /// Marker opening every split chunk after the first.
    pub split_message_begin_text: String,
    /// Marker closing every split chunk before the last.
    pub split_message_end_text: String,
    /// Surface exhausted delivery failures to the caller when no backlog
    /// handler is registered.
    pub throw_exception_on_write: bool,
    pub delivery: DeliveryConfig,
    pub pool: PoolConfig,
    pub transport: TransportConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            facility: Facility::User,
            host: "localhost".to_owned(),
            port: DEFAULT_PORT,
            ident: String::new(),
            local_name: "localhost".to_owned(),
            send_local_timestamp: true,
            send_local_name: true,
            use_structured_data: false,
            truncate_message: false,
            max_message_length: 1024,
            split_message_begin_text: DEFAULT_SPLIT_TEXT.to_owned(),
            split_message_end_text: DEFAULT_SPLIT_TEXT.to_owned(),
            throw_exception_on_write: false,
            delivery: DeliveryConfig::default(),
            pool: PoolConfig::default(),
            transport: TransportConfig::Udp,
        }
    }
}

impl ClientConfig {
    /// Default configuration for the named transport (`udp` or `tcp`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownProtocol`] for any other name.
    pub fn for_protocol(name: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            transport: TransportConfig::from_protocol(name)?,
            ..Self::default()
        })
    }

    #[must_use]
    pub fn facility(mut self, facility: Facility) -> Self {
        self.facility = facility;
        self
    }

    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn ident(mut self, ident: impl Into<String>) -> Self {
        self.ident = ident.into();
        self
    }

    #[must_use]
    pub fn local_name(mut self, name: impl Into<String>) -> Self {
        self.local_name = name.into();
        self
    }

    #[must_use]
    pub fn send_local_timestamp(mut self, enabled: bool) -> Self {
        self.send_local_timestamp = enabled;
        self
    }

    #[must_use]
    pub fn send_local_name(mut self, enabled: bool) -> Self {
        self.send_local_name = enabled;
        self
    }

    #[must_use]
    pub fn use_structured_data(mut self, enabled: bool) -> Self {
        self.use_structured_data = enabled;
        self
    }

    /// Truncate formatted messages longer than `max_length` bytes.
    #[must_use]
    pub fn truncate_message(mut self, max_length: usize) -> Self {
        self.truncate_message = true;
        self.max_message_length = max_length;
        self
    }

    /// Limit formatted messages to `max_length` bytes, splitting longer ones
    /// unless truncation is enabled.
    #[must_use]
    pub fn max_message_length(mut self, max_length: usize) -> Self {
        self.max_message_length = max_length;
        self
    }

    #[must_use]
    pub fn split_message_text(mut self, begin: impl Into<String>, end: impl Into<String>) -> Self {
        self.split_message_begin_text = begin.into();
        self.split_message_end_text = end.into();
        self
    }

    #[must_use]
    pub fn throw_exception_on_write(mut self, enabled: bool) -> Self {
        self.throw_exception_on_write = enabled;
        self
    }

    #[must_use]
    pub fn delivery(mut self, delivery: DeliveryConfig) -> Self {
        self.delivery = delivery;
        self
    }

    #[must_use]
    pub fn pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    #[must_use]
    pub fn transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    /// Replace values that cannot work with the nearest usable ones.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.max_message_length = self.max_message_length.max(1);
        self.delivery = self.delivery.normalized();
        self.pool = self.pool.normalized();
        if let TransportConfig::Tcp(tcp) = &mut self.transport {
            if tcp.delimiter.is_empty() {
                tcp.delimiter = DEFAULT_DELIMITER.to_vec();
            }
        }
        self
    }
}

/// Whether messages are written on the caller's task or by a worker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Format and write before `log` returns.
    #[default]
    Direct,
    /// Enqueue and let a background worker write.
    Queued,
}

/// Queueing, retry and shutdown settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    pub mode: DeliveryMode,
    /// How often the worker wakes to check for shutdown when the queue is
    /// idle.
    pub poll_interval: Duration,
    /// Longest time shutdown waits for the queue to drain.
    pub max_shutdown_wait: Duration,
    /// Extra attempts after the first failed write.
    pub write_retries: u32,
    /// Queue capacity; negative means unbounded.
    pub max_queue_size: i64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            mode: DeliveryMode::Direct,
            poll_interval: Duration::from_millis(500),
            max_shutdown_wait: Duration::from_secs(30),
            write_retries: 2,
            max_queue_size: -1,
        }
    }
}

impl DeliveryConfig {
    /// Background delivery with default settings.
    #[must_use]
    pub fn queued() -> Self {
        Self {
            mode: DeliveryMode::Queued,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn max_shutdown_wait(mut self, wait: Duration) -> Self {
        self.max_shutdown_wait = wait;
        self
    }

    #[must_use]
    pub fn write_retries(mut self, retries: u32) -> Self {
        self.write_retries = retries;
        self
    }

    #[must_use]
    pub fn max_queue_size(mut self, size: i64) -> Self {
        self.max_queue_size = size;
        self
    }

    /// Queue capacity, or `None` when unbounded.
    #[must_use]
    pub fn queue_capacity(&self) -> Option<usize> {
        usize::try_from(self.max_queue_size).ok().map(|size| size.max(1))
    }

    /// A zero poll interval becomes the default interval and a zero queue
    /// size becomes one.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.poll_interval.is_zero() {
            self.poll_interval = Self::default().poll_interval;
        }
        if self.max_queue_size == 0 {
            self.max_queue_size = 1;
        }
        self
    }
}

/// What borrowing does once `max_active` writers are in use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhenExhausted {
    /// Wait for a writer to be returned, up to `max_wait` if set.
    #[default]
    Block,
    /// Fail immediately.
    Fail,
    /// Create a writer beyond the limit.
    Grow,
}

/// Writer pool limits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Writers that may be borrowed at once.
    pub max_active: usize,
    /// Returned writers kept open for reuse.
    pub max_idle: usize,
    /// Upper bound on a blocking borrow.
    pub max_wait: Option<Duration>,
    pub when_exhausted: WhenExhausted,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_active: 8,
            max_idle: 8,
            max_wait: None,
            when_exhausted: WhenExhausted::Block,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn max_active(mut self, max_active: usize) -> Self {
        self.max_active = max_active;
        self
    }

    #[must_use]
    pub fn max_idle(mut self, max_idle: usize) -> Self {
        self.max_idle = max_idle;
        self
    }

    #[must_use]
    pub fn max_wait(mut self, wait: Duration) -> Self {
        self.max_wait = Some(wait);
        self
    }

    #[must_use]
    pub fn when_exhausted(mut self, behavior: WhenExhausted) -> Self {
        self.when_exhausted = behavior;
        self
    }

    /// At least one active writer; idle writers never exceed active ones.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.max_active = self.max_active.max(1);
        self.max_idle = self.max_idle.min(self.max_active);
        self
    }
}

/// Transport used to reach the server.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "protocol", rename_all = "lowercase")]
pub enum TransportConfig {
    /// One message per datagram.
    #[default]
    Udp,
    /// Delimited messages over a stream.
    Tcp(TcpConfig),
}

impl TransportConfig {
    /// Map a protocol name to its default transport.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownProtocol`] for names other than `udp`
    /// and `tcp`.
    pub fn from_protocol(name: &str) -> Result<Self, ConfigError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "udp" => Ok(Self::Udp),
            "tcp" => Ok(Self::Tcp(TcpConfig::default())),
            _ => Err(ConfigError::UnknownProtocol(name.to_owned())),
        }
    }

    /// Lowercase protocol name.
    #[must_use]
    pub const fn protocol(&self) -> &'static str {
        match self {
            Self::Udp => "udp",
            Self::Tcp(_) => "tcp",
        }
    }
}

/// Stream transport settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpConfig {
    /// Bytes appended after every message.
    pub delimiter: Vec<u8>,
    /// Keep the connection open between messages.
    pub persistent_connection: bool,
    /// Reconnect once a connection has been open this long.
    pub fresh_connection_interval: Option<Duration>,
    #[serde(skip)]
    pub socket: SocketOptions,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER.to_vec(),
            persistent_connection: true,
            fresh_connection_interval: None,
            socket: SocketOptions::default(),
        }
    }
}

impl TcpConfig {
    #[must_use]
    pub fn delimiter(mut self, delimiter: impl Into<Vec<u8>>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    #[must_use]
    pub fn persistent_connection(mut self, enabled: bool) -> Self {
        self.persistent_connection = enabled;
        self
    }

    #[must_use]
    pub fn fresh_connection_interval(mut self, interval: Duration) -> Self {
        self.fresh_connection_interval = Some(interval);
        self
    }

    #[must_use]
    pub fn socket_options(mut self, options: SocketOptions) -> Self {
        self.socket = options;
        self
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn defaults_match_the_wire_conventions() {
        let config = ClientConfig::default();
        assert_eq!(config.port, 514);
        assert_eq!(config.max_message_length, 1024);
        assert_eq!(config.delivery.write_retries, 2);
        assert_eq!(config.delivery.queue_capacity(), None);
        assert_eq!(config.transport, TransportConfig::Udp);
    }

    #[rstest]
    #[case(-1, None)]
    #[case(-50, None)]
    #[case(0, Some(1))]
    #[case(16, Some(16))]
    fn queue_capacity_interprets_sign(#[case] size: i64, #[case] expected: Option<usize>) {
        let delivery = DeliveryConfig::default().max_queue_size(size);
        assert_eq!(delivery.queue_capacity(), expected);
    }

    #[rstest]
    #[case("udp", "udp")]
    #[case("TCP", "tcp")]
    fn protocol_names_map_to_transports(#[case] name: &str, #[case] expected: &str) {
        let transport = TransportConfig::from_protocol(name).expect("known protocol");
        assert_eq!(transport.protocol(), expected);
    }

    #[test]
    fn unknown_protocol_is_a_config_error() {
        assert_eq!(
            ClientConfig::for_protocol("unix_syslog"),
            Err(ConfigError::UnknownProtocol("unix_syslog".into()))
        );
    }

    #[test]
    fn normalized_repairs_unusable_values() {
        let config = ClientConfig::default()
            .pool(PoolConfig::default().max_active(0).max_idle(4))
            .delivery(DeliveryConfig::queued().poll_interval(Duration::ZERO).max_queue_size(0))
            .transport(TransportConfig::Tcp(TcpConfig::default().delimiter(Vec::new())))
            .normalized();
        assert_eq!(config.pool.max_active, 1);
        assert_eq!(config.pool.max_idle, 1);
        assert_eq!(config.delivery.poll_interval, Duration::from_millis(500));
        assert_eq!(config.delivery.max_queue_size, 1);
        let TransportConfig::Tcp(tcp) = config.transport else {
            panic!("expected tcp transport");
        };
        assert_eq!(tcp.delimiter, b"\n");
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: ClientConfig = serde_json::from_str(
            r#"{"host":"logs.example","facility":"local0","transport":{"protocol":"tcp"}}"#,
        )
        .expect("valid config");
        assert_eq!(config.host, "logs.example");
        assert_eq!(config.facility, Facility::Local0);
        assert!(matches!(config.transport, TransportConfig::Tcp(ref tcp) if tcp.persistent_connection));
        assert_eq!(config.split_message_begin_text, DEFAULT_SPLIT_TEXT);
        assert_eq!(config.split_message_end_text, DEFAULT_SPLIT_TEXT);
    }
}

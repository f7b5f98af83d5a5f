//! Metric helpers for `syslog-wire`.
//!
//! This module defines metric names and simple helper functions wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. With the `metrics` feature
//! disabled every helper compiles to a no-op.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the gauge tracking open TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "syslog_connections_active";
/// Name of the counter tracking events received by the server.
pub const EVENTS_RECEIVED: &str = "syslog_events_received_total";
/// Name of the counter tracking structured parses that fell back to raw text.
pub const PARSE_FALLBACKS: &str = "syslog_parse_fallbacks_total";
/// Name of the counter tracking contained handler failures.
pub const HANDLER_FAILURES: &str = "syslog_handler_failures_total";
/// Name of the counter tracking messages written by the client.
pub const MESSAGES_SENT: &str = "syslog_messages_sent_total";
/// Name of the counter tracking client write retries.
pub const DELIVERY_RETRIES: &str = "syslog_delivery_retries_total";
/// Name of the counter tracking messages that exhausted all retries.
pub const DELIVERY_FAILURES: &str = "syslog_delivery_failures_total";
/// Name of the counter tracking panicking connection tasks.
pub const CONNECTION_PANICS: &str = "syslog_connection_panics_total";

/// Transport an event arrived on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transport {
    /// A single UDP datagram.
    Udp,
    /// A delimited frame on a TCP stream.
    Tcp,
}

impl Transport {
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    fn as_str(self) -> &'static str {
        match self {
            Transport::Udp => "udp",
            Transport::Tcp => "tcp",
        }
    }
}

/// Increment the active connections gauge.
pub fn inc_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).increment(1.0);
}

/// Decrement the active connections gauge.
pub fn dec_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record an event received over `transport`.
pub fn inc_events(transport: Transport) {
    #[cfg(feature = "metrics")]
    counter!(EVENTS_RECEIVED, "transport" => transport.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = transport;
}

/// Record a structured parse that fell back to the unparsed form.
pub fn inc_parse_fallbacks() {
    #[cfg(feature = "metrics")]
    counter!(PARSE_FALLBACKS).increment(1);
}

/// Record a handler failure contained by the dispatcher.
pub fn inc_handler_failures() {
    #[cfg(feature = "metrics")]
    counter!(HANDLER_FAILURES).increment(1);
}

/// Record a message successfully written by the client.
pub fn inc_messages_sent() {
    #[cfg(feature = "metrics")]
    counter!(MESSAGES_SENT).increment(1);
}

/// Record a retried client write.
pub fn inc_delivery_retries() {
    #[cfg(feature = "metrics")]
    counter!(DELIVERY_RETRIES).increment(1);
}

/// Record a message that exhausted its write retries.
pub fn inc_delivery_failures() {
    #[cfg(feature = "metrics")]
    counter!(DELIVERY_FAILURES).increment(1);
}

/// Record a connection task that panicked.
pub fn inc_connection_panics() {
    #[cfg(feature = "metrics")]
    counter!(CONNECTION_PANICS).increment(1);
}
